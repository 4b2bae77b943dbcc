use anyhow::Result;
use clap::{Parser, Subcommand};
use indexer::{build_index, BuildOptions};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build positional, features and reviews indices from a product catalog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every index from a JSONL file or a directory of JSONL files
    Build {
        /// Input path (file or directory)
        #[arg(long, env = "CATALOG_INPUT", default_value = "products.jsonl")]
        input: PathBuf,
        /// Output index directory
        #[arg(long, env = "CATALOG_INDEX_DIR", default_value = "index")]
        output: PathBuf,
        /// Skip the title forward index (disables the positional boost at query time)
        #[arg(long, default_value_t = false)]
        no_forward: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, no_forward } => {
            let report = build_index(&input, &output, &BuildOptions { forward_index: !no_forward })?;
            for (file, err) in &report.skipped_records {
                tracing::warn!(file = %file.display(), error = %err, "skipped record");
            }
            println!("{}", serde_json::to_string_pretty(&report.summary())?);
            Ok(())
        }
    }
}
