//! Segment index: which segment covers a position.
//!
//! Sequence segments are found by logical index, map segments by hash. Both
//! rely on the segments forming a gapless ascending partition; a miss is an
//! internal fault reported as `CorruptSegmentIndex`.

use crate::error::{CoreError, CoreResult};
use crate::segment::Segment;
use crate::types::{HASH_MAX, HASH_MIN};
use std::cmp::Ordering;

/// Position of a sequence segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SeqSpan {
    /// First logical index the segment covers.
    pub(crate) offset: usize,
}

/// Hash range `[min, max)` owned by a map segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HashSpan {
    pub(crate) min: i64,
    pub(crate) max: i64,
}

impl HashSpan {
    /// The whole hash domain.
    pub(crate) const FULL: Self = Self {
        min: HASH_MIN,
        max: HASH_MAX,
    };

    pub(crate) const fn contains(self, hash: i64) -> bool {
        self.min <= hash && hash < self.max
    }

    /// Where the segment lies relative to `hash`.
    fn locate(self, hash: i64) -> Ordering {
        if hash < self.min {
            Ordering::Greater
        } else if hash >= self.max {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

fn locate_index<E>(segment: &Segment<E, SeqSpan>, index: usize) -> Ordering {
    let offset = segment.span.offset;
    if index < offset {
        Ordering::Greater
    } else if index >= offset + segment.len {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Finds the sequence segment covering `index`.
///
/// Guesses `index / capacity` first, which is exact while every segment
/// before the index is full, then binary searches the side the guess missed.
pub(crate) fn segment_for_index<E>(
    segments: &[Segment<E, SeqSpan>],
    index: usize,
    capacity: usize,
) -> CoreResult<usize> {
    let miss = || CoreError::corrupt_index(format!("no segment covers index {index}"));

    let guess = index / capacity.max(1);
    let (from, to) = match segments.get(guess).map(|segment| locate_index(segment, index)) {
        Some(Ordering::Equal) => return Ok(guess),
        Some(Ordering::Less) => (guess + 1, segments.len()),
        Some(Ordering::Greater) => (0, guess),
        None => (0, segments.len()),
    };

    segments[from..to]
        .binary_search_by(|segment| locate_index(segment, index))
        .map(|found| from + found)
        .map_err(|_| miss())
}

/// Finds the map segment whose range contains `hash`.
pub(crate) fn segment_for_hash<E>(
    segments: &[Segment<E, HashSpan>],
    hash: i64,
) -> CoreResult<usize> {
    segments
        .binary_search_by(|segment| segment.span.locate(hash))
        .map_err(|_| CoreError::corrupt_index(format!("no segment covers hash {hash}")))
}
