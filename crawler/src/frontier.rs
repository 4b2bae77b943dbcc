//! Priority frontier and visited set for one crawl run.

use catalog_core::product::is_product_url;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

pub const PRODUCT_PRIORITY: u8 = 0;
pub const DEFAULT_PRIORITY: u8 = 1;

/// Product pages first, everything else after.
pub fn priority_for(url: &str) -> u8 {
    if is_product_url(url) { PRODUCT_PRIORITY } else { DEFAULT_PRIORITY }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    priority: u8,
    seq: u64,
    url: String,
}

/// Min-heap on `(priority, insertion sequence)`: lower priority pops first, equal priorities pop FIFO.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, priority: u8, url: impl Into<String>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry { priority, seq, url: url.into() }));
    }

    pub fn pop(&mut self) -> Option<(u8, String)> {
        self.heap.pop().map(|Reverse(e)| (e.priority, e.url))
    }

    pub fn len(&self) -> usize { self.heap.len() }

    pub fn is_empty(&self) -> bool { self.heap.is_empty() }
}

/// URLs fetched or rejected during the run. Never shrinks.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
}

impl VisitedSet {
    /// Returns false if the URL was already present.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.urls.contains(url) {
            return false;
        }
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool { self.urls.contains(url) }

    pub fn len(&self) -> usize { self.urls.len() }

    pub fn is_empty(&self) -> bool { self.urls.is_empty() }
}
