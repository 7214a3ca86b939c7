//! Locating validly timestamped records inside an unsorted sequence
//!
//! Device logs are stored in their original order, which is not guaranteed to
//! be chronological and may contain records with missing or unparseable
//! timestamps. These helpers find the first (or last) record that carries a
//! usable timestamp.

use crate::error::FeatureError;
use crate::types::RecordTime;

/// Direction in which a sequence is scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    /// Scan `[start, len)` in increasing order
    #[default]
    Forward,
    /// Scan `[0, len - start)` in decreasing order
    Reverse,
}

/// Find the index of the next valid timestamp in a sequence of timestamps.
///
/// See [`find_next_valid_by`] for the scanning rules.
pub fn find_next_valid(
    times: &[RecordTime],
    start: usize,
    direction: ScanDirection,
) -> Result<Option<usize>, FeatureError> {
    find_next_valid_by(times, start, direction, |t| t)
}

/// Find the index of the next element whose accessed timestamp is valid.
///
/// In forward mode indices `start..len` are scanned upwards. In reverse mode
/// `start` is an offset from the end: indices `0..len - start` are scanned
/// downwards, so an offset of 0 begins at the last element.
///
/// Returns `Ok(None)` when no element qualifies, which callers treat as "no
/// usable data". A `start` greater than the sequence length is a caller bug and
/// yields [`FeatureError::SearchStartOutOfRange`].
pub fn find_next_valid_by<T, F>(
    items: &[T],
    start: usize,
    direction: ScanDirection,
    accessor: F,
) -> Result<Option<usize>, FeatureError>
where
    F: Fn(&T) -> &RecordTime,
{
    let len = items.len();
    if start > len {
        return Err(FeatureError::SearchStartOutOfRange { start, len });
    }

    let found = match direction {
        ScanDirection::Forward => (start..len).find(|&i| accessor(&items[i]).is_valid()),
        ScanDirection::Reverse => (0..len - start)
            .rev()
            .find(|&i| accessor(&items[i]).is_valid()),
    };
    Ok(found)
}
