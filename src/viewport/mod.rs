//! Visible genomic windows, used to prune cached intervals nobody is looking at.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Something on screen that covers part of a chromosome.
pub trait Viewport: Send + Sync {
    /// Returns `true` if the viewport shows any base of `[start, end)` on `chromosome`.
    fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool;
}

/// The set of viewports currently on screen.
pub trait ViewportSet: Send + Sync {
    /// Number of tracked viewports.
    fn viewport_count(&self) -> usize;

    /// Returns `true` if any viewport overlaps `[start, end)` on `chromosome`.
    fn any_overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool;
}

/// A plain half-open window `[start, end)` on one chromosome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomicWindow {
    pub chromosome: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicWindow {
    pub fn new(chromosome: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            start,
            end,
        }
    }
}

impl Viewport for GenomicWindow {
    fn overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.chromosome == chromosome && start < self.end && end > self.start
    }
}

/// A shared, mutable collection of viewports.
///
/// Cloning yields another handle to the same collection, so the application
/// can keep updating windows after handing a clone to the cache.
///
/// # Examples
///
/// ```
/// use seqcache::viewport::{GenomicWindow, ViewportSet, Viewports};
///
/// let viewports = Viewports::new();
/// viewports.push(GenomicWindow::new("chr1", 1_000, 2_000));
/// assert!(viewports.any_overlaps("chr1", 1_500, 3_000));
/// assert!(!viewports.any_overlaps("chr2", 1_500, 3_000));
/// ```
#[derive(Clone, Default)]
pub struct Viewports {
    inner: Arc<RwLock<Vec<Arc<dyn Viewport>>>>,
}

impl Viewports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a viewport.
    pub fn push(&self, viewport: impl Viewport + 'static) {
        self.inner.write().push(Arc::new(viewport));
    }

    /// Replaces every viewport with `viewports`.
    pub fn replace<V>(&self, viewports: impl IntoIterator<Item = V>)
    where
        V: Viewport + 'static,
    {
        let next: Vec<Arc<dyn Viewport>> = viewports
            .into_iter()
            .map(|v| Arc::new(v) as Arc<dyn Viewport>)
            .collect();
        *self.inner.write() = next;
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl ViewportSet for Viewports {
    fn viewport_count(&self) -> usize {
        self.len()
    }

    fn any_overlaps(&self, chromosome: &str, start: u64, end: u64) -> bool {
        self.inner
            .read()
            .iter()
            .any(|v| v.overlaps(chromosome, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_overlap_is_half_open() {
        let w = GenomicWindow::new("chr3", 100, 200);
        assert!(w.overlaps("chr3", 199, 250));
        assert!(w.overlaps("chr3", 0, 101));
        assert!(!w.overlaps("chr3", 200, 250));
        assert!(!w.overlaps("chr3", 50, 100));
        assert!(!w.overlaps("chr4", 150, 160));
    }

    #[test]
    fn clones_share_the_same_windows() {
        let a = Viewports::new();
        let b = a.clone();
        a.push(GenomicWindow::new("chr1", 0, 10));
        assert_eq!(b.viewport_count(), 1);
        b.replace([
            GenomicWindow::new("chr2", 0, 10),
            GenomicWindow::new("chr2", 50, 60),
        ]);
        assert_eq!(a.len(), 2);
        assert!(!a.any_overlaps("chr1", 0, 10));
        assert!(a.any_overlaps("chr2", 55, 56));
        a.clear();
        assert!(b.is_empty());
    }
}
