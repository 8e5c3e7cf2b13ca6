//! Upstream sequence sources.
//!
//! A [`SequenceSource`] performs the actual random-access read of reference
//! sequence and describes the chromosomes it knows about. The cache treats it
//! as slow and only calls [`SequenceSource::read_sequence`] on a miss.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::InMemorySource;

/// Errors reported by an upstream source.
///
/// "No data for this chromosome" is not an error: sources signal it by
/// returning `Ok(None)` from [`SequenceSource::read_sequence`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Metadata for a single chromosome (or contig) known to a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromosomeRecord {
    pub name: String,
    /// Position of the chromosome in the source's canonical ordering.
    pub order: usize,
    /// Length in bases.
    pub length: u64,
}

impl ChromosomeRecord {
    pub fn new(name: impl Into<String>, order: usize, length: u64) -> Self {
        Self {
            name: name.into(),
            order,
            length,
        }
    }
}

/// An upstream provider of reference sequence.
///
/// Implementations own their I/O and file format handling. Metadata accessors
/// are synchronous and expected to be cheap; only reads are asynchronous.
#[async_trait]
pub trait SequenceSource: Send + Sync {
    /// Prepares the source for reads (loading an index, opening a handle, ...).
    async fn init(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Reads the bases in `[start, end)` of `chromosome`.
    ///
    /// Returns `Ok(None)` if the source has no data for `chromosome`. A read
    /// that extends past the end of the chromosome may return fewer bytes
    /// than requested.
    async fn read_sequence(
        &self,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<Bytes>, SourceError>;

    /// Returns the record for `chromosome`, if known.
    fn sequence_record(&self, chromosome: &str) -> Option<&ChromosomeRecord>;

    /// All chromosome records keyed by name.
    fn chromosomes(&self) -> &HashMap<String, ChromosomeRecord>;

    /// Chromosome names in canonical order.
    fn chromosome_names(&self) -> &[String];

    /// The chromosome to show by default, if the source has an opinion.
    fn first_chromosome_name(&self) -> Option<&str> {
        None
    }
}
