//! Polite, product-first crawler for a single shop site.

pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod robots;

pub use crawl::{CrawlConfig, Crawler};
pub use extract::{CrawledPage, Extractor};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher};
pub use frontier::{Frontier, VisitedSet};
pub use robots::{PolitenessGate, RobotsPolicy};
