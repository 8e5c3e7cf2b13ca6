//! # seqcache
//!
//! A read-through cache for ranged reads of genomic reference sequence.
//!
//! Interactive genome browsing issues a stream of small, overlapping sequence
//! requests as the user pans and zooms. [`SequenceCache`] answers repeated or
//! contained requests from memory, widens misses so nearby requests hit
//! afterwards, and collapses concurrent misses over the same neighborhood
//! into a single upstream read.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use seqcache::{CacheConfig, InMemorySource, SequenceCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = InMemorySource::new().with_sequence("chr1", "ACGT".repeat(50_000));
//!     let config = CacheConfig::new().with_min_query_size(10_000);
//!     let cache = SequenceCache::with_config(Arc::new(source), config)?;
//!     cache.init().await?;
//!
//!     let bases = cache.get_sequence("chr1", 1_000, 1_100).await?;
//!     println!("{:?}", bases.map(|b| b.len()));
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod interval;
pub mod source;
pub mod viewport;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheStats, SequenceCache, SequenceCacheBuilder, SequenceError};
pub use config::{CacheConfig, ConfigError};
pub use interval::{IntervalError, SequenceInterval};
pub use source::{ChromosomeRecord, InMemorySource, SequenceSource, SourceError};
pub use viewport::{GenomicWindow, Viewport, ViewportSet, Viewports};
