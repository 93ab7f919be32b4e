//! Container configuration.

use crate::error::{CoreError, CoreResult};
use crate::eviction::{EvictionPolicy, NeverPolicy, RecencyPolicy, TimedPolicy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default segment capacity for both container kinds.
pub const DEFAULT_MAX_SEGMENT_SIZE: usize = 1000;

/// Default resident count of the recency policy for sequences.
pub const DEFAULT_LIST_RESIDENT: usize = 2;

/// Default resident count of the recency policy for maps.
pub const DEFAULT_MAP_RESIDENT: usize = 5;

/// Which eviction policy a container is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionConfig {
    /// Keep about `resident` recently touched segments loaded.
    Recency {
        /// Desired number of resident segments.
        resident: usize,
    },
    /// Unload segments untouched for longer than `lifetime`.
    Timed {
        /// Idle time after which a segment may be unloaded.
        lifetime: Duration,
    },
    /// Never unload anything.
    Never,
}

impl EvictionConfig {
    /// Checks the policy parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a zero resident count or a zero
    /// lifetime.
    pub fn validate(&self) -> CoreResult<()> {
        match *self {
            Self::Recency { resident: 0 } => Err(CoreError::invalid_configuration(
                "recency policy needs a resident count of at least 1",
            )),
            Self::Timed { lifetime } if lifetime.is_zero() => Err(
                CoreError::invalid_configuration("timed policy needs a non-zero lifetime"),
            ),
            _ => Ok(()),
        }
    }

    /// Builds a policy instance with empty bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if [`validate`](Self::validate) fails.
    pub fn build(&self) -> CoreResult<Box<dyn EvictionPolicy>> {
        self.validate()?;
        Ok(match *self {
            Self::Recency { resident } => Box::new(RecencyPolicy::new(resident)?),
            Self::Timed { lifetime } => Box::new(TimedPolicy::new(lifetime)?),
            Self::Never => Box::new(NeverPolicy),
        })
    }
}

impl fmt::Display for EvictionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recency { resident } => write!(f, "recency:{resident}"),
            Self::Timed { lifetime } => write!(f, "timed:{}", lifetime.as_millis()),
            Self::Never => write!(f, "never"),
        }
    }
}

impl FromStr for EvictionConfig {
    type Err = CoreError;

    /// Parses `recency:<k>`, `timed:<millis>` or `never`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::invalid_configuration(format!("unknown eviction policy: {s}"));

        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        let config = match (kind.trim(), arg.map(str::trim)) {
            ("never", None) => Self::Never,
            ("recency", Some(k)) => Self::Recency {
                resident: k.parse().map_err(|_| invalid())?,
            },
            ("timed", Some(ms)) => Self::Timed {
                lifetime: Duration::from_millis(ms.parse().map_err(|_| invalid())?),
            },
            _ => return Err(invalid()),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for building a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Segment capacity: a hard cap for sequences, a split target for maps.
    pub max_segment_size: usize,

    /// Eviction policy to build.
    pub eviction: EvictionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_list()
    }
}

impl Config {
    /// Creates a new configuration with sequence defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence defaults: 1000 elements per segment, two resident segments.
    #[must_use]
    pub const fn for_list() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            eviction: EvictionConfig::Recency {
                resident: DEFAULT_LIST_RESIDENT,
            },
        }
    }

    /// Map defaults: 1000 entries per segment, five resident segments.
    #[must_use]
    pub const fn for_map() -> Self {
        Self {
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            eviction: EvictionConfig::Recency {
                resident: DEFAULT_MAP_RESIDENT,
            },
        }
    }

    /// Sets the segment capacity.
    #[must_use]
    pub const fn max_segment_size(mut self, size: usize) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the eviction policy.
    #[must_use]
    pub const fn eviction(mut self, eviction: EvictionConfig) -> Self {
        self.eviction = eviction;
        self
    }

    /// Checks the configuration for a sequence container.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the capacity is zero or the policy
    /// parameters are invalid.
    pub fn validate_list(&self) -> CoreResult<()> {
        if self.max_segment_size == 0 {
            return Err(CoreError::invalid_configuration(
                "list max_segment_size must be at least 1",
            ));
        }
        self.eviction.validate()
    }

    /// Checks the configuration for a map container.
    ///
    /// A capacity of zero is allowed: every insert then attempts a split.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the policy parameters are invalid.
    pub fn validate_map(&self) -> CoreResult<()> {
        self.eviction.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let list = Config::for_list();
        assert_eq!(list.max_segment_size, 1000);
        assert_eq!(list.eviction, EvictionConfig::Recency { resident: 2 });

        let map = Config::for_map();
        assert_eq!(map.eviction, EvictionConfig::Recency { resident: 5 });
        assert_eq!(Config::default(), list);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .max_segment_size(3)
            .eviction(EvictionConfig::Never);

        assert_eq!(config.max_segment_size, 3);
        assert_eq!(config.eviction, EvictionConfig::Never);
    }

    #[test]
    fn zero_list_capacity_rejected() {
        let config = Config::for_list().max_segment_size(0);
        assert!(matches!(
            config.validate_list(),
            Err(CoreError::InvalidConfiguration { .. })
        ));
        assert!(config.validate_map().is_ok());
    }

    #[test]
    fn parse_policies() {
        assert_eq!(
            "recency:4".parse::<EvictionConfig>().unwrap(),
            EvictionConfig::Recency { resident: 4 }
        );
        assert_eq!(
            "timed:250".parse::<EvictionConfig>().unwrap(),
            EvictionConfig::Timed {
                lifetime: Duration::from_millis(250)
            }
        );
        assert_eq!("never".parse::<EvictionConfig>().unwrap(), EvictionConfig::Never);
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", "lru", "recency", "recency:x", "recency:0", "timed:0", "never:1"] {
            assert!(
                matches!(
                    input.parse::<EvictionConfig>(),
                    Err(CoreError::InvalidConfiguration { .. })
                ),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn display_parses_back() {
        for config in [
            EvictionConfig::Recency { resident: 2 },
            EvictionConfig::Timed {
                lifetime: Duration::from_millis(1500),
            },
            EvictionConfig::Never,
        ] {
            assert_eq!(config.to_string().parse::<EvictionConfig>().unwrap(), config);
        }
    }

    #[test]
    fn build_names_policy() {
        assert_eq!(EvictionConfig::Never.build().unwrap().name(), "never");
        assert_eq!(
            EvictionConfig::Recency { resident: 1 }.build().unwrap().name(),
            "recency"
        );
        assert!(EvictionConfig::Recency { resident: 0 }.build().is_err());
    }
}
