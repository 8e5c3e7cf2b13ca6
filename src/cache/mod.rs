//! Read-through sequence cache with single-flight fetch coalescing.
//!
//! [`SequenceCache`] sits between callers that repeatedly ask for small,
//! overlapping ranges of reference sequence and a slow [`SequenceSource`].
//!
//! - A request fully inside a cached interval is served from memory.
//! - A miss is widened to at least [`CacheConfig::min_query_size`] bases,
//!   centered on the request, so nearby requests hit afterwards.
//! - A miss whose range lies inside a window already being fetched waits on
//!   that fetch instead of issuing another read.
//! - Each settled fetch trims the cache before its interval is appended:
//!   covered intervals are dropped, the oldest interval is evicted when the
//!   cache is full (FIFO, hits do not refresh), and intervals outside every
//!   viewport are dropped when a [`ViewportSet`] is attached.
//!
//! Fetches run as spawned Tokio tasks. They are never cancelled: a fetch
//! completes even if every caller waiting on it goes away.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use crate::config::{CacheConfig, ConfigError};
use crate::interval::{IntervalError, SequenceInterval};
use crate::source::{ChromosomeRecord, SequenceSource, SourceError};
use crate::viewport::ViewportSet;

pub mod stats;


pub use stats::CacheStats;

/// Errors returned by [`SequenceCache`].
///
/// Cloneable so that every caller coalesced onto one fetch receives the
/// same failure.
#[derive(Debug, Clone, Error)]
pub enum SequenceError {
    #[error("invalid range {start}..{end}: start is past end")]
    InvalidRange { start: u64, end: u64 },

    #[error("failed to read {chromosome}:{start}-{end} from source: {source}")]
    SourceRead {
        chromosome: String,
        start: u64,
        end: u64,
        #[source]
        source: Arc<SourceError>,
    },

    #[error("fetch of {chromosome}:{start}-{end} aborted: {reason}")]
    FetchAborted {
        chromosome: String,
        start: u64,
        end: u64,
        reason: String,
    },

    #[error("source initialization failed: {0}")]
    SourceInit(#[source] Arc<SourceError>),

    #[error(transparent)]
    Interval(#[from] IntervalError),
}

type FetchOutcome = Result<Arc<SequenceInterval>, SequenceError>;

/// The pending result of one upstream read, shared by every caller waiting on it.
type PendingFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Identifies an in-flight read by chromosome and expanded window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FetchKey {
    chromosome: String,
    start: u64,
    end: u64,
}

impl FetchKey {
    fn contains(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start >= self.start && end <= self.end
    }
}

struct InflightFetch {
    id: u64,
    pending: PendingFetch,
}

/// A registered fetch waiting to be spawned.
struct FetchJob {
    key: FetchKey,
    id: u64,
    epoch: u64,
    tx: oneshot::Sender<FetchOutcome>,
}

#[derive(Default)]
struct CacheState {
    /// Resolved intervals, oldest first.
    intervals: VecDeque<Arc<SequenceInterval>>,
    inflight: HashMap<FetchKey, InflightFetch>,
    /// Bumped by `clear_cache`; fetches from an older epoch do not populate the cache.
    epoch: u64,
    next_fetch_id: u64,
    stats: CacheStats,
}

impl CacheState {
    fn find(&self, chromosome: &str, start: u64, end: u64) -> Option<&Arc<SequenceInterval>> {
        self.intervals
            .iter()
            .find(|interval| interval.contains(chromosome, start, end))
    }

    /// Removes the in-flight entry for `key` if it still belongs to fetch `id`.
    fn remove_inflight(&mut self, key: &FetchKey, id: u64) {
        if self.inflight.get(key).is_some_and(|fetch| fetch.id == id) {
            self.inflight.remove(key);
        }
    }
}

/// State shared between the cache handle and its fetch tasks.
struct Inner {
    config: CacheConfig,
    viewports: Option<Arc<dyn ViewportSet>>,
    state: Mutex<CacheState>,
}

impl Inner {
    /// Records the outcome of fetch `id` and, if it is still current, caches it.
    ///
    /// The in-flight entry is removed before the outcome reaches any waiter,
    /// so a later request for the same window always issues a fresh read.
    fn settle(
        &self,
        key: &FetchKey,
        id: u64,
        epoch: u64,
        result: Result<Option<Bytes>, SourceError>,
    ) -> FetchOutcome {
        let mut state = self.state.lock();
        state.remove_inflight(key, id);

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                state.stats.upstream_failures += 1;
                warn!(
                    chromosome = %key.chromosome,
                    start = key.start,
                    end = key.end,
                    error = %e,
                    "upstream read failed"
                );
                return Err(SequenceError::SourceRead {
                    chromosome: key.chromosome.clone(),
                    start: key.start,
                    end: key.end,
                    source: Arc::new(e),
                });
            }
        };

        if let Some(bytes) = &payload {
            let expected = key.end - key.start;
            if bytes.len() as u64 != expected {
                debug!(
                    chromosome = %key.chromosome,
                    expected,
                    received = bytes.len(),
                    "short read, trimming interval to payload"
                );
            }
        }

        let interval = Arc::new(SequenceInterval::new(
            key.chromosome.clone(),
            key.start,
            key.end,
            payload,
        ));

        if state.epoch != epoch {
            debug!(interval = %interval, "cache cleared while fetching, result not cached");
            return Ok(interval);
        }

        self.trim(&mut state, &interval);
        state.intervals.push_back(Arc::clone(&interval));
        debug!(interval = %interval, cached = state.intervals.len(), "interval cached");
        Ok(interval)
    }

    /// Makes room for `incoming`, which is not yet in the cache.
    fn trim(&self, state: &mut CacheState, incoming: &SequenceInterval) {
        let before = state.intervals.len();
        state
            .intervals
            .retain(|cached| !incoming.contains_range(cached));
        let subsumed = before - state.intervals.len();
        if subsumed > 0 {
            trace!(count = subsumed, by = %incoming, "dropped covered intervals");
        }
        state.stats.pruned += subsumed as u64;

        if state.intervals.len() >= self.config.max_intervals {
            if let Some(evicted) = state.intervals.pop_front() {
                trace!(interval = %evicted, "evicted oldest interval");
                state.stats.evictions += 1;
            }
        }

        let Some(viewports) = &self.viewports else {
            return;
        };
        if viewports.viewport_count() >= self.config.viewport_check_threshold {
            trace!(
                viewports = viewports.viewport_count(),
                "too many viewports, skipping visibility pruning"
            );
            return;
        }
        let before = state.intervals.len();
        state.intervals.retain(|cached| {
            viewports.any_overlaps(cached.chromosome(), cached.start(), cached.end())
        });
        let hidden = before - state.intervals.len();
        if hidden > 0 {
            trace!(count = hidden, "dropped intervals outside every viewport");
        }
        state.stats.pruned += hidden as u64;
    }
}

/// Widens `[start, end)` to at least `min_query_size` bases, centered on the request.
///
/// The lower bound is clamped at 0. When `chromosome_length` is known the
/// upper bound is clamped to it, but never below `end`. Ranges already at
/// least `min_query_size` long are returned unchanged.
fn expand_range(
    start: u64,
    end: u64,
    min_query_size: u64,
    chromosome_length: Option<u64>,
) -> (u64, u64) {
    if end - start >= min_query_size {
        return (start, end);
    }
    let center = start + (end - start) / 2;
    let expanded_start = center.saturating_sub(min_query_size / 2);
    let mut expanded_end = expanded_start.saturating_add(min_query_size);
    if let Some(length) = chromosome_length {
        expanded_end = expanded_end.min(length.max(end));
    }
    (expanded_start, expanded_end)
}

/// A read-through cache in front of a [`SequenceSource`].
///
/// Methods that may fetch must be called from within a Tokio runtime.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use seqcache::{InMemorySource, SequenceCache};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), seqcache::SequenceError> {
/// let source = InMemorySource::new().with_sequence("chr1", "ACGTACGTACGT");
/// let cache = SequenceCache::new(Arc::new(source));
///
/// let bases = cache.get_sequence("chr1", 2, 6).await?;
/// assert_eq!(bases.as_deref(), Some(&b"GTAC"[..]));
///
/// // Served from the cached window, no second read.
/// let bases = cache.get_sequence("chr1", 8, 12).await?;
/// assert_eq!(bases.as_deref(), Some(&b"ACGT"[..]));
/// assert_eq!(cache.stats().upstream_reads, 1);
/// # Ok(())
/// # }
/// ```
pub struct SequenceCache {
    source: Arc<dyn SequenceSource>,
    inner: Arc<Inner>,
}

/// Assembles a [`SequenceCache`] before any state is shared.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use seqcache::{CacheConfig, GenomicWindow, InMemorySource, SequenceCache, Viewports};
///
/// let viewports = Viewports::new();
/// viewports.push(GenomicWindow::new("chr1", 0, 1_000));
///
/// let cache = SequenceCache::builder(Arc::new(InMemorySource::new()))
///     .config(CacheConfig::new().with_max_intervals(4))
///     .viewports(Arc::new(viewports))
///     .build()
///     .unwrap();
/// assert_eq!(cache.config().max_intervals, 4);
/// ```
pub struct SequenceCacheBuilder {
    source: Arc<dyn SequenceSource>,
    config: CacheConfig,
    viewports: Option<Arc<dyn ViewportSet>>,
}

impl SequenceCacheBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables visibility pruning against `viewports`.
    pub fn viewports(mut self, viewports: Arc<dyn ViewportSet>) -> Self {
        self.viewports = Some(viewports);
        self
    }

    /// Validates the configuration and creates the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration fails validation.
    pub fn build(self) -> Result<SequenceCache, ConfigError> {
        self.config.validate()?;
        Ok(SequenceCache {
            source: self.source,
            inner: Arc::new(Inner {
                config: self.config,
                viewports: self.viewports,
                state: Mutex::new(CacheState::default()),
            }),
        })
    }
}

impl SequenceCache {
    /// Creates a cache over `source` with the default configuration.
    pub fn new(source: Arc<dyn SequenceSource>) -> Self {
        Self {
            source,
            inner: Arc::new(Inner {
                config: CacheConfig::default(),
                viewports: None,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// Creates a cache over `source` with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails validation.
    pub fn with_config(
        source: Arc<dyn SequenceSource>,
        config: CacheConfig,
    ) -> Result<Self, ConfigError> {
        Self::builder(source).config(config).build()
    }

    /// Starts building a cache over `source`, for options beyond the configuration.
    pub fn builder(source: Arc<dyn SequenceSource>) -> SequenceCacheBuilder {
        SequenceCacheBuilder {
            source,
            config: CacheConfig::default(),
            viewports: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Forwards initialization to the source.
    pub async fn init(&self) -> Result<(), SequenceError> {
        self.source
            .init()
            .await
            .map_err(|e| SequenceError::SourceInit(Arc::new(e)))
    }

    /// Returns the bases in `[start, end)` of `chromosome`.
    ///
    /// Resolves to `Ok(None)` when the source has no data for `chromosome`.
    /// If the read ran past the end of the chromosome, only the available
    /// bases are returned.
    ///
    /// # Errors
    ///
    /// - [`SequenceError::InvalidRange`] if `start > end`.
    /// - [`SequenceError::SourceRead`] if the upstream read failed. Every
    ///   caller waiting on that read receives the same error; nothing is
    ///   cached, so calling again retries.
    /// - [`SequenceError::FetchAborted`] if the fetch task ended without a
    ///   result, for example because the source panicked.
    pub async fn get_sequence(
        &self,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> Result<Option<Bytes>, SequenceError> {
        if start > end {
            return Err(SequenceError::InvalidRange { start, end });
        }
        // Bases past the chromosome end do not exist, so look up and fetch
        // only the part of the request that does.
        let (start, end) = match self.source.sequence_record(chromosome) {
            Some(record) => (start.min(record.length), end.min(record.length)),
            None => (start, end),
        };

        let (pending, job) = {
            let mut state = self.inner.state.lock();
            if let Some(interval) = state.find(chromosome, start, end) {
                let bases = interval.slice(start, end)?;
                state.stats.hits += 1;
                trace!(chromosome, start, end, "cache hit");
                return Ok(bases);
            }
            state.stats.misses += 1;
            // Registration must happen before the first await so concurrent
            // misses for the same window see this fetch.
            self.join_or_issue(&mut state, chromosome, start, end)
        };
        if let Some(job) = job {
            self.spawn_fetch(job);
        }

        let interval = pending.await?;
        serve(&interval, start, end)
    }

    /// Returns the first cached interval containing `[start, end)`, without fetching.
    pub fn get_sequence_interval(
        &self,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> Option<Arc<SequenceInterval>> {
        self.inner
            .state
            .lock()
            .find(chromosome, start, end)
            .cloned()
    }

    /// Drops every cached interval and forgets every in-flight fetch.
    ///
    /// Reads already issued keep running and still resolve their waiting
    /// callers, but their results are discarded rather than cached.
    pub fn clear_cache(&self) {
        let mut state = self.inner.state.lock();
        let dropped = state.intervals.len();
        let abandoned = state.inflight.len();
        state.intervals.clear();
        state.inflight.clear();
        state.epoch += 1;
        debug!(dropped, abandoned, "cache cleared");
    }

    /// Snapshot of the cached intervals, oldest first.
    pub fn cached_intervals(&self) -> Vec<Arc<SequenceInterval>> {
        self.inner.state.lock().intervals.iter().cloned().collect()
    }

    /// Number of cached intervals.
    pub fn cached_len(&self) -> usize {
        self.inner.state.lock().intervals.len()
    }

    /// Number of upstream reads not yet settled.
    pub fn inflight_len(&self) -> usize {
        self.inner.state.lock().inflight.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.state.lock().stats
    }

    pub fn chromosome_names(&self) -> &[String] {
        self.source.chromosome_names()
    }

    pub fn chromosomes(&self) -> &HashMap<String, ChromosomeRecord> {
        self.source.chromosomes()
    }

    /// The source's default chromosome, or `None` if it does not name one.
    pub fn first_chromosome_name(&self) -> Option<&str> {
        self.source.first_chromosome_name()
    }

    pub fn sequence_record(&self, chromosome: &str) -> Option<&ChromosomeRecord> {
        self.source.sequence_record(chromosome)
    }

    /// Returns a fetch covering `[start, end)`, joining one already in flight if possible.
    ///
    /// A new fetch is registered here but not started; the caller spawns the
    /// returned `FetchJob` once the state lock is released.
    fn join_or_issue(
        &self,
        state: &mut CacheState,
        chromosome: &str,
        start: u64,
        end: u64,
    ) -> (PendingFetch, Option<FetchJob>) {
        let joined = state
            .inflight
            .iter()
            .find(|(key, _)| key.contains(chromosome, start, end))
            .map(|(key, fetch)| (key.clone(), fetch.pending.clone()));
        if let Some((key, pending)) = joined {
            state.stats.coalesced += 1;
            debug!(
                chromosome,
                start,
                end,
                window_start = key.start,
                window_end = key.end,
                "joining in-flight fetch"
            );
            return (pending, None);
        }

        let chromosome_length = self
            .source
            .sequence_record(chromosome)
            .map(|record| record.length);
        let (window_start, window_end) = expand_range(
            start,
            end,
            self.inner.config.min_query_size,
            chromosome_length,
        );
        let key = FetchKey {
            chromosome: chromosome.to_owned(),
            start: window_start,
            end: window_end,
        };
        let id = state.next_fetch_id;
        state.next_fetch_id += 1;
        state.stats.upstream_reads += 1;
        debug!(
            chromosome,
            start,
            end,
            window_start,
            window_end,
            "cache miss, fetching window"
        );

        let (tx, rx) = oneshot::channel();
        let pending = self.pending_result(key.clone(), id, rx);
        state.inflight.insert(
            key.clone(),
            InflightFetch {
                id,
                pending: pending.clone(),
            },
        );
        let job = FetchJob {
            key,
            id,
            epoch: state.epoch,
            tx,
        };
        (pending, Some(job))
    }

    /// Wraps the receiving end of a fetch so any number of callers can await it.
    fn pending_result(
        &self,
        key: FetchKey,
        id: u64,
        rx: oneshot::Receiver<FetchOutcome>,
    ) -> PendingFetch {
        // The in-flight table holds this future, so it must not keep the
        // shared state alive.
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        rx.map(move |received| match received {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    chromosome = %key.chromosome,
                    start = key.start,
                    end = key.end,
                    "fetch task ended without a result"
                );
                if let Some(inner) = weak.upgrade() {
                    inner.state.lock().remove_inflight(&key, id);
                }
                Err(SequenceError::FetchAborted {
                    chromosome: key.chromosome.clone(),
                    start: key.start,
                    end: key.end,
                    reason: "fetch task ended without a result".into(),
                })
            }
        })
        .boxed()
        .shared()
    }

    /// Runs a registered fetch to completion on its own task.
    fn spawn_fetch(&self, job: FetchJob) {
        let source = Arc::clone(&self.source);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let FetchJob { key, id, epoch, tx } = job;
            let result = source
                .read_sequence(&key.chromosome, key.start, key.end)
                .await;
            let outcome = inner.settle(&key, id, epoch, result);
            // Every waiter may have gone away; the outcome is already recorded.
            let _ = tx.send(outcome);
        });
    }
}

/// Slices the requested range out of a freshly fetched interval.
fn serve(interval: &SequenceInterval, start: u64, end: u64) -> Result<Option<Bytes>, SequenceError> {
    if interval.payload().is_none() {
        return Ok(None);
    }
    // A short read leaves the interval ending before `end`.
    let end = end.min(interval.end());
    let start = start.clamp(interval.start(), end);
    Ok(interval.slice(start, end)?)
}
