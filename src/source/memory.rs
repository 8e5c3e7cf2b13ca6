//! A [`SequenceSource`] backed by whole chromosome sequences held in memory.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use super::{ChromosomeRecord, SequenceSource, SourceError};

/// Serves reads from preloaded chromosome sequences.
///
/// Chromosome order follows insertion order. Reads are clipped to the
/// chromosome length, and unknown chromosomes read as `Ok(None)`.
///
/// # Examples
///
/// ```
/// use seqcache::source::{InMemorySource, SequenceSource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let source = InMemorySource::new()
///     .with_sequence("chr1", "ACGTACGTAC")
///     .with_sequence("chr2", "TTTT");
///
/// assert_eq!(source.chromosome_names(), ["chr1", "chr2"]);
/// let bases = source.read_sequence("chr1", 2, 6).await.unwrap();
/// assert_eq!(bases.as_deref(), Some(&b"GTAC"[..]));
/// assert!(source.read_sequence("chrZ", 0, 4).await.unwrap().is_none());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    sequences: HashMap<String, Bytes>,
    records: HashMap<String, ChromosomeRecord>,
    names: Vec<String>,
}

impl InMemorySource {
    /// Creates a source with no chromosomes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the full sequence of `name`.
    pub fn with_sequence(mut self, name: impl Into<String>, sequence: impl Into<Bytes>) -> Self {
        self.insert(name, sequence);
        self
    }

    /// Adds (or replaces) the full sequence of `name`.
    pub fn insert(&mut self, name: impl Into<String>, sequence: impl Into<Bytes>) {
        let name = name.into();
        let sequence = sequence.into();
        let order = match self.records.get(&name) {
            Some(existing) => existing.order,
            None => {
                self.names.push(name.clone());
                self.names.len() - 1
            }
        };
        self.records.insert(
            name.clone(),
            ChromosomeRecord::new(name.clone(), order, sequence.len() as u64),
        );
        self.sequences.insert(name, sequence);
    }
}

#[async_trait]
impl SequenceSource for InMemorySource {
    async fn read_sequence(
        &self,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<Bytes>, SourceError> {
        let Some(sequence) = self.sequences.get(chromosome) else {
            trace!(chromosome, "no sequence loaded");
            return Ok(None);
        };
        let len = sequence.len();
        let start = usize::try_from(start).unwrap_or(usize::MAX).min(len);
        let end = usize::try_from(end).unwrap_or(usize::MAX).clamp(start, len);
        Ok(Some(sequence.slice(start..end)))
    }

    fn sequence_record(&self, chromosome: &str) -> Option<&ChromosomeRecord> {
        self.records.get(chromosome)
    }

    fn chromosomes(&self) -> &HashMap<String, ChromosomeRecord> {
        &self.records
    }

    fn chromosome_names(&self) -> &[String] {
        &self.names
    }

    fn first_chromosome_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> InMemorySource {
        InMemorySource::new()
            .with_sequence("chr1", "AAAACCCCGGGGTTTT")
            .with_sequence("chrM", "ACGT")
    }

    #[test]
    fn records_follow_insertion_order() {
        let s = source();
        assert_eq!(s.chromosome_names(), ["chr1", "chrM"]);
        assert_eq!(s.first_chromosome_name(), Some("chr1"));
        assert_eq!(s.sequence_record("chrM"), Some(&ChromosomeRecord::new("chrM", 1, 4)));
        assert_eq!(s.chromosomes().len(), 2);
        assert!(s.sequence_record("chr2").is_none());
    }

    #[test]
    fn replacing_a_sequence_keeps_its_order() {
        let mut s = source();
        s.insert("chr1", "AC");
        assert_eq!(s.chromosome_names(), ["chr1", "chrM"]);
        assert_eq!(s.sequence_record("chr1").map(|r| (r.order, r.length)), Some((0, 2)));
    }

    #[tokio::test]
    async fn reads_are_clipped_to_chromosome_length() {
        let s = source();
        let bases = s.read_sequence("chr1", 12, 100).await.unwrap();
        assert_eq!(bases.as_deref(), Some(&b"TTTT"[..]));
        let past_end = s.read_sequence("chrM", 10, 20).await.unwrap();
        assert_eq!(past_end.as_deref(), Some(&b""[..]));
    }

    #[tokio::test]
    async fn huge_coordinates_do_not_wrap() {
        let s = source();
        let far = s.read_sequence("chr1", 1 << 40, u64::MAX).await.unwrap();
        assert_eq!(far.as_deref(), Some(&b""[..]));
        let tail = s.read_sequence("chr1", 14, u64::MAX).await.unwrap();
        assert_eq!(tail.as_deref(), Some(&b"TT"[..]));
    }

    #[tokio::test]
    async fn unknown_chromosome_reads_as_none() {
        assert!(source().read_sequence("chrUn", 0, 10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn init_defaults_to_ready() {
        assert!(source().init().await.is_ok());
    }
}
