//! CLI command implementations.

pub mod compact;
pub mod list;
pub mod map;

use clap::{Args, ValueEnum};
use lazyseg_core::{CoreError, EvictionConfig, MapSegmentInfo, SegmentInfo, StatsSnapshot};
use lazyseg_storage::StorageError;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    /// A container operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The file store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Reading or writing a manifest file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A report could not be rendered.
    #[error("failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

/// Where payloads go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Keep persisted payloads in memory.
    Memory,
    /// A file store directory.
    Directory(PathBuf),
}

impl FromStr for StoreTarget {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "memory" => Self::Memory,
            path => Self::Directory(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Directory(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Arguments shared by the container workloads.
#[derive(Debug, Args)]
pub struct WorkloadArgs {
    /// Number of elements to insert
    #[arg(short, long, default_value_t = 10_000)]
    pub count: usize,

    /// Segment capacity (split target for maps)
    #[arg(long, default_value_t = lazyseg_core::DEFAULT_MAX_SEGMENT_SIZE)]
    pub segment_size: usize,

    /// Eviction policy: `recency:<k>`, `timed:<millis>` or `never`
    #[arg(short, long, default_value = "recency:2")]
    pub policy: EvictionConfig,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print the final segment table
    #[arg(long)]
    pub segments: bool,
}

/// A segment table row.
pub trait SegmentRow: Serialize {
    /// Whether the payload is in memory.
    fn loaded(&self) -> bool;

    /// One line describing the segment.
    fn row(&self) -> String;
}

fn flags(loaded: bool, dirty: bool, pinned: bool) -> String {
    let mut out = String::with_capacity(3);
    out.push(if loaded { 'L' } else { '-' });
    out.push(if dirty { 'D' } else { '-' });
    out.push(if pinned { 'P' } else { '-' });
    out
}

impl SegmentRow for SegmentInfo {
    fn loaded(&self) -> bool {
        self.loaded
    }

    fn row(&self) -> String {
        format!(
            "{}  offset {:>8}  len {:>6}  {}",
            self.id,
            self.offset,
            self.len,
            flags(self.loaded, self.dirty, self.pinned)
        )
    }
}

impl SegmentRow for MapSegmentInfo {
    fn loaded(&self) -> bool {
        self.loaded
    }

    fn row(&self) -> String {
        format!(
            "{}  hash [{:>11}, {:>11})  len {:>6}  {}",
            self.id,
            self.min_hash,
            self.max_hash,
            self.len,
            flags(self.loaded, self.dirty, self.pinned)
        )
    }
}

/// Outcome of a workload run.
#[derive(Debug, Serialize)]
pub struct Report<R> {
    /// Container kind.
    pub container: &'static str,
    /// Payload store used.
    pub store: String,
    /// Eviction policy used.
    pub policy: String,
    /// Elements inserted.
    pub inserted: usize,
    /// Elements removed by the thinning pass.
    pub removed: usize,
    /// Final element count.
    pub len: usize,
    /// Wrapping sum of every value read back.
    pub checksum: u64,
    /// Segments whose payload is in memory at the end.
    pub resident: usize,
    /// Final segment table.
    pub segments: Vec<R>,
    /// Container counters.
    pub stats: StatsSnapshot,
}

impl<R: SegmentRow> Report<R> {
    /// Prints the report in the requested format.
    pub fn print(&self, format: OutputFormat, show_segments: bool) -> CliResult<()> {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(self)?),
            OutputFormat::Text => self.print_text(show_segments),
        }
        Ok(())
    }

    fn print_text(&self, show_segments: bool) {
        println!("lazyseg {} workload", self.container);
        println!("=====================");
        println!();
        println!("Store:    {}", self.store);
        println!("Policy:   {}", self.policy);
        println!();
        println!("Inserted: {}", self.inserted);
        println!("Removed:  {}", self.removed);
        println!("Length:   {}", self.len);
        println!("Checksum: {}", self.checksum);
        println!();
        println!("Segments: {} ({} resident)", self.segments.len(), self.resident);
        if show_segments {
            for segment in &self.segments {
                println!("  {}", segment.row());
            }
        }
        println!();
        println!("Loads:       {}", self.stats.loads);
        println!("Evictions:   {}", self.stats.evictions);
        println!("Persists:    {}", self.stats.persists);
        println!("Splits:      {}", self.stats.splits);
        println!("Degenerate:  {}", self.stats.degenerate_splits);
        println!("Merges:      {}", self.stats.merges);
        println!("Created:     {}", self.stats.segments_created);
        println!("Dropped:     {}", self.stats.segments_dropped);
    }
}

/// Counts resident segments in a table.
pub fn resident<R: SegmentRow>(segments: &[R]) -> usize {
    segments.iter().filter(|segment| segment.loaded()).count()
}
