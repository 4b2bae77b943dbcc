use anyhow::{Context, Result};
use clap::Parser;
use crawler::{CrawlConfig, Crawler, HttpFetcher};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl a shop site product-first, respecting robots.txt")]
struct Cli {
    /// Seed URL; only links on its site are followed
    #[arg(long, env = "CRAWL_SEED")]
    seed: String,
    /// Output JSON file path
    #[arg(long, env = "CRAWL_OUTPUT", default_value = "crawl.json")]
    output: PathBuf,
    /// Maximum number of URLs to visit
    #[arg(long, env = "CRAWL_MAX_PAGES", default_value_t = 50)]
    max_pages: usize,
    /// Minimum delay between requests in milliseconds
    #[arg(long, env = "CRAWL_DELAY_MS", default_value_t = 1000)]
    delay_ms: u64,
    /// User-Agent string used for robots.txt matching and requests
    #[arg(long, env = "CRAWL_USER_AGENT", default_value = "catalogbot/0.1 (+https://example.com/bot)")]
    user_agent: String,
    /// Request timeout seconds
    #[arg(long, default_value_t = 12)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let fetcher = HttpFetcher::new(&args.user_agent, Duration::from_secs(args.timeout_secs))?;
    let config = CrawlConfig {
        max_pages: args.max_pages,
        delay: Duration::from_millis(args.delay_ms),
        user_agent: args.user_agent.clone(),
    };
    let crawler = Crawler::new(fetcher, config)?;
    let pages = crawler.crawl(&args.seed).await?;

    if let Some(dir) = args.output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let file = File::create(&args.output).with_context(|| format!("creating {}", args.output.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, &pages)?;
    w.flush()?;

    tracing::info!(pages = pages.len(), output = %args.output.display(), "wrote crawl output");
    Ok(())
}
