use crate::extract::{normalize, CrawledPage, Extractor};
use crate::fetch::Fetcher;
use crate::frontier::{priority_for, Frontier, VisitedSet, PRODUCT_PRIORITY};
use crate::robots::PolitenessGate;
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use url::Url;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Hard cap on visited URLs (fetched or rejected).
    pub max_pages: usize,
    /// Minimum gap between two requests; a robots `Crawl-delay` can only lengthen it.
    pub delay: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 50,
            delay: Duration::from_secs(1),
            user_agent: "catalogbot/0.1 (+https://example.com/bot)".to_string(),
        }
    }
}

/// Enforces a minimum gap between consecutive requests.
struct Pacer {
    last: Option<Instant>,
}

impl Pacer {
    async fn wait(&mut self, gap: Duration) {
        if let Some(last) = self.last {
            sleep_until(last + gap).await;
        }
        self.last = Some(Instant::now());
    }
}

/// `www.shop.example` -> `shop.example`
fn site_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn same_site(url: &Url, domain: &str) -> bool {
    url.host_str().map_or(false, |h| {
        let h = h.to_lowercase();
        h == domain || h.ends_with(&format!(".{domain}"))
    })
}

pub struct Crawler<F> {
    fetcher: F,
    gate: PolitenessGate,
    extractor: Extractor,
    config: CrawlConfig,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(fetcher: F, config: CrawlConfig) -> Result<Self> {
        Ok(Self { fetcher, gate: PolitenessGate::new(), extractor: Extractor::new()?, config })
    }

    pub fn gate(&self) -> &PolitenessGate { &self.gate }

    /// Crawls from `seed` until the frontier is empty or `max_pages` URLs were visited.
    ///
    /// Pages are returned in fetch order. Only links on the seed's site are followed.
    pub async fn crawl(&self, seed: &str) -> Result<Vec<CrawledPage>> {
        let seed_url = Url::parse(seed).with_context(|| format!("invalid seed url {seed}"))?;
        let domain = site_domain(&seed_url).ok_or_else(|| anyhow!("seed url {seed} has no host"))?;
        let ua = self.config.user_agent.as_str();

        let mut frontier = Frontier::new();
        let mut visited = VisitedSet::default();
        let mut pacer = Pacer { last: None };
        let mut pages = Vec::new();
        frontier.push(PRODUCT_PRIORITY, normalize(&seed_url));

        while visited.len() < self.config.max_pages {
            let Some((priority, url)) = frontier.pop() else { break };
            if visited.contains(&url) {
                continue;
            }
            let Ok(parsed) = Url::parse(&url) else {
                tracing::warn!(%url, "skipping unparsable url");
                visited.insert(&url);
                continue;
            };

            if self.gate.needs_fetch(&parsed, ua) {
                pacer.wait(self.config.delay).await;
            }
            if !self.gate.can_fetch(&self.fetcher, &parsed, ua).await {
                tracing::debug!(%url, "disallowed by robots");
                visited.insert(&url);
                continue;
            }

            let gap = self.gate.crawl_delay(&parsed, ua).map_or(self.config.delay, |d| d.max(self.config.delay));
            pacer.wait(gap).await;
            visited.insert(&url);

            let resp = match self.fetcher.fetch(&parsed).await {
                Ok(resp) => resp,
                Err(err) => {
                    tracing::warn!(%url, error = %err, "fetch failed");
                    continue;
                }
            };
            if !resp.is_success() || !resp.is_html() {
                tracing::debug!(%url, status = resp.status, content_type = ?resp.content_type, "skipping response");
                continue;
            }

            let page = self.extractor.extract(&parsed, &resp.body);
            for link in &page.links {
                if visited.contains(link) {
                    continue;
                }
                let same = Url::parse(link).map_or(false, |l| same_site(&l, &domain));
                if same {
                    frontier.push(priority_for(link), link.clone());
                }
            }
            tracing::info!(%url, priority, visited = visited.len(), frontier = frontier.len(), "page crawled");
            pages.push(page);
        }

        tracing::info!(pages = pages.len(), visited = visited.len(), frontier = frontier.len(), "crawl done");
        Ok(pages)
    }
}
