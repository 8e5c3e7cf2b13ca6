//! Resolved genomic sequence intervals.
//!
//! A [`SequenceInterval`] is an immutable, half-open range `[start, end)` on a
//! single chromosome together with the sequence bytes read for it. Intervals
//! are built once a fetch settles and never change afterwards; the cache only
//! ever adds or drops whole intervals.

use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Errors produced when slicing an interval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("range {start}..{end} is outside interval {interval_start}..{interval_end}")]
    OutOfRange {
        start: u64,
        end: u64,
        interval_start: u64,
        interval_end: u64,
    },
}

/// A half-open range of sequence on one chromosome, plus its payload.
///
/// The payload is `None` when the source reported no data for the
/// chromosome. When present, its length always equals `end - start`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use seqcache::SequenceInterval;
///
/// let interval = SequenceInterval::new("chr1", 100, 110, Some(Bytes::from_static(b"ACGTACGTAC")));
/// assert!(interval.contains("chr1", 102, 106));
/// assert_eq!(interval.slice(102, 106).unwrap().as_deref(), Some(&b"GTAC"[..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInterval {
    chromosome: String,
    start: u64,
    end: u64,
    payload: Option<Bytes>,
}

impl SequenceInterval {
    /// Creates an interval covering `[start, end)`.
    ///
    /// If a payload is supplied whose length disagrees with the range, the
    /// range is shrunk (or grown) to `start + payload.len()` so the payload
    /// length invariant holds. A short payload is what a source returns for
    /// a read that runs past the end of the chromosome.
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64, payload: Option<Bytes>) -> Self {
        let end = match &payload {
            Some(bytes) => start + bytes.len() as u64,
            None => end.max(start),
        };
        Self {
            chromosome: chromosome.into(),
            start,
            end,
            payload,
        }
    }

    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bases covered by the interval.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the sequence bytes, or `None` if the source had no data.
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    /// Returns `true` if `[start, end)` on `chromosome` lies entirely inside this interval.
    pub fn contains(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start >= self.start && end <= self.end
    }

    /// Returns `true` if `other` lies entirely inside this interval.
    ///
    /// Equal ranges count as contained.
    pub fn contains_range(&self, other: &SequenceInterval) -> bool {
        self.contains(&other.chromosome, other.start, other.end)
    }

    /// Returns `true` if `[start, end)` on `chromosome` shares at least one base with this interval.
    pub fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start < self.end && end > self.start
    }

    /// Returns the payload bytes for `[start, end)`.
    ///
    /// The returned [`Bytes`] shares the interval's buffer; no copy is made.
    /// Returns `Ok(None)` when the interval has no payload.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalError::OutOfRange`] if `[start, end)` is not inside
    /// the interval.
    pub fn slice(&self, start: u64, end: u64) -> Result<Option<Bytes>, IntervalError> {
        if start > end || start < self.start || end > self.end {
            return Err(IntervalError::OutOfRange {
                start,
                end,
                interval_start: self.start,
                interval_end: self.end,
            });
        }
        let offset = (start - self.start) as usize;
        let len = (end - start) as usize;
        Ok(self
            .payload
            .as_ref()
            .map(|bytes| bytes.slice(offset..offset + len)))
    }
}

impl fmt::Display for SequenceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chromosome, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acgt(chr: &str, start: u64, len: usize) -> SequenceInterval {
        let payload: Vec<u8> = b"ACGT".iter().copied().cycle().take(len).collect();
        SequenceInterval::new(chr, start, start + len as u64, Some(Bytes::from(payload)))
    }

    #[test]
    fn contains_is_half_open() {
        let i = acgt("chr1", 100, 100);
        assert!(i.contains("chr1", 100, 200));
        assert!(i.contains("chr1", 150, 150));
        assert!(!i.contains("chr1", 99, 150));
        assert!(!i.contains("chr1", 150, 201));
        assert!(!i.contains("chr2", 120, 130));
    }

    #[test]
    fn contains_range_counts_equal_ranges() {
        let outer = acgt("chr1", 0, 50);
        let same = acgt("chr1", 0, 50);
        let inner = acgt("chr1", 10, 20);
        let other_chr = acgt("chr2", 10, 20);
        assert!(outer.contains_range(&same));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(!outer.contains_range(&other_chr));
    }

    #[test]
    fn slice_returns_requested_length() {
        let i = acgt("chr1", 1000, 40);
        for (s, e) in [(1000, 1040), (1001, 1002), (1010, 1030), (1039, 1040), (1020, 1020)] {
            let bytes = i.slice(s, e).unwrap().unwrap();
            assert_eq!(bytes.len() as u64, e - s);
        }
        assert_eq!(i.slice(1004, 1008).unwrap().as_deref(), Some(&b"ACGT"[..]));
    }

    #[test]
    fn slice_out_of_range_fails() {
        let i = acgt("chr1", 1000, 40);
        assert_eq!(
            i.slice(990, 1010),
            Err(IntervalError::OutOfRange {
                start: 990,
                end: 1010,
                interval_start: 1000,
                interval_end: 1040,
            })
        );
        assert!(i.slice(1030, 1041).is_err());
        assert!(i.slice(1020, 1010).is_err());
    }

    #[test]
    fn slice_without_payload_is_none() {
        let i = SequenceInterval::new("chrUn", 0, 100, None);
        assert_eq!(i.slice(10, 20), Ok(None));
        assert!(i.slice(90, 110).is_err());
    }

    #[test]
    fn short_payload_shrinks_interval() {
        let i = SequenceInterval::new("chrM", 16000, 116000, Some(Bytes::from_static(b"ACGTA")));
        assert_eq!(i.end(), 16005);
        assert_eq!(i.len(), 5);
    }

    #[test]
    fn overlaps_detects_shared_bases() {
        let i = acgt("chr1", 100, 100);
        assert!(i.overlaps("chr1", 50, 101));
        assert!(i.overlaps("chr1", 199, 300));
        assert!(!i.overlaps("chr1", 200, 300));
        assert!(!i.overlaps("chr1", 0, 100));
        assert!(!i.overlaps("chrX", 120, 130));
    }

    #[test]
    fn display_uses_locus_notation() {
        assert_eq!(acgt("chr7", 5, 10).to_string(), "chr7:5-15");
    }
}
