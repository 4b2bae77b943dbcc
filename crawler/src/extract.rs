use anyhow::{anyhow, Result};
use catalog_core::{extract_product_info, ProductInfo};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// One crawled page as persisted in the crawl output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledPage {
    pub title: String,
    pub url: String,
    pub first_paragraph: String,
    pub links: Vec<String>,
    #[serde(flatten)]
    pub product: ProductInfo,
}

pub struct Extractor {
    title: Selector,
    paragraph: Selector,
    anchor: Selector,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

/// Drops the fragment so `page#a` and `page#b` are one URL.
pub fn normalize(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.to_string()
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self { title: selector("title")?, paragraph: selector("p")?, anchor: selector("a[href]")? })
    }

    /// Title, first non-empty paragraph and absolute http(s) links in document order, deduplicated.
    pub fn extract(&self, page_url: &Url, html: &str) -> CrawledPage {
        let doc = Html::parse_document(html);
        let text_of = |el: scraper::ElementRef<'_>| el.text().collect::<String>().trim().to_string();

        let title = doc.select(&self.title).next().map(text_of).unwrap_or_default();
        let first_paragraph = doc
            .select(&self.paragraph)
            .map(text_of)
            .find(|t| !t.is_empty())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for a in doc.select(&self.anchor) {
            let Some(href) = a.value().attr("href") else { continue };
            let Ok(resolved) = page_url.join(href.trim()) else { continue };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            let link = normalize(&resolved);
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        let url = normalize(page_url);
        let product = extract_product_info(&url);
        CrawledPage { title, url, first_paragraph, links, product }
    }
}
