use anyhow::{anyhow, bail, Context, Result};
use catalog_core::index::IndexBuilder;
use catalog_core::persist::{
    load_documents, save_documents, save_features_index, save_forward_index, save_meta,
    save_positional_index, save_reviews_index, IndexPaths, MetaFile,
};
use catalog_core::{extract_product_info, DocError, Document, Field, ForwardIndex, Tokenizer};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Also write the title forward index used by the positional boost.
    pub forward_index: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { forward_index: true }
    }
}

/// Everything that was skipped along the way, plus output sizes.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub num_docs: usize,
    pub skipped_records: Vec<(PathBuf, DocError)>,
    pub review_failures: Vec<DocError>,
    pub title_tokens: usize,
    pub description_tokens: usize,
    pub feature_tokens: usize,
    pub reviewed_docs: usize,
}

#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub num_docs: usize,
    pub skipped_records: usize,
    pub review_failures: usize,
    pub title_tokens: usize,
    pub description_tokens: usize,
    pub feature_tokens: usize,
    pub reviewed_docs: usize,
}

impl BuildReport {
    pub fn summary(&self) -> BuildSummary {
        BuildSummary {
            num_docs: self.num_docs,
            skipped_records: self.skipped_records.len(),
            review_failures: self.review_failures.len(),
            title_tokens: self.title_tokens,
            description_tokens: self.description_tokens,
            feature_tokens: self.feature_tokens,
            reviewed_docs: self.reviewed_docs,
        }
    }
}

/// A single file, or every `.jsonl` under a directory in path order.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }
    if files.is_empty() {
        bail!("no .jsonl files under {}", input.display());
    }
    Ok(files)
}

/// Adds `product_id` and `variant` parsed from each document's URL.
pub fn process_documents(docs: &mut [Document]) {
    for doc in docs.iter_mut() {
        let info = extract_product_info(&doc.url);
        doc.product_id = info.product_id;
        doc.variant = info.variant;
    }
}

/// Loads, processes and indexes the collection, then writes every output.
///
/// Outputs are written to a staging directory next to `output` and moved into
/// place only once all of them are on disk, so `output` never holds a partial
/// index.
pub fn build_index(input: &Path, output: &Path, opts: &BuildOptions) -> Result<BuildReport> {
    let files = collect_inputs(input)?;
    let mut report = BuildReport::default();
    let mut docs: Vec<Document> = Vec::new();
    for file in &files {
        let loaded = load_documents(file)?;
        tracing::info!(file = %file.display(), docs = loaded.documents.len(), skipped = loaded.skipped.len(), "loaded");
        docs.extend(loaded.documents);
        report.skipped_records.extend(loaded.skipped.into_iter().map(|e| (file.clone(), e)));
    }
    if docs.is_empty() {
        bail!("no documents could be read from {}", input.display());
    }
    if docs.len() > u32::MAX as usize {
        bail!("{} documents exceed the doc id range", docs.len());
    }

    process_documents(&mut docs);

    let builder = IndexBuilder::new(Tokenizer::default());
    let titles = builder.build_positional_index(Field::Title, &docs);
    let descriptions = builder.build_positional_index(Field::Description, &docs);
    let features = builder.build_features_index(&docs);
    let (reviews, review_failures) = builder.build_reviews_index(&docs);
    let forward = opts.forward_index.then(|| ForwardIndex::from_positional(&titles));

    let staging = sibling(output, "staging")?;
    if staging.is_dir() {
        fs::remove_dir_all(&staging).with_context(|| format!("removing stale {}", staging.display()))?;
    }
    let paths = IndexPaths::new(&staging);
    save_documents(&paths.documents(), &docs)?;
    save_positional_index(&paths, Field::Title, &titles)?;
    save_positional_index(&paths, Field::Description, &descriptions)?;
    save_features_index(&paths, &features)?;
    save_reviews_index(&paths, &reviews)?;
    if let Some(forward) = &forward {
        save_forward_index(&paths, forward)?;
    }
    // meta.json marks a complete index; readers refuse a directory without it
    save_meta(&paths, &MetaFile::now(docs.len() as u32))?;
    commit(&staging, output)?;

    report.num_docs = docs.len();
    report.review_failures = review_failures;
    report.title_tokens = titles.len();
    report.description_tokens = descriptions.len();
    report.feature_tokens = features.len();
    report.reviewed_docs = reviews.len();
    tracing::info!(output = %output.display(), num_docs = report.num_docs, "index build complete");
    Ok(report)
}

/// `dir/index` -> `dir/.index.<suffix>`
fn sibling(output: &Path, suffix: &str) -> Result<PathBuf> {
    let name = output
        .file_name()
        .ok_or_else(|| anyhow!("output {} has no directory name", output.display()))?;
    Ok(output.with_file_name(format!(".{}.{suffix}", name.to_string_lossy())))
}

/// Swaps `staging` in for `output`, keeping the old index until the new one is in place.
fn commit(staging: &Path, output: &Path) -> Result<()> {
    let previous = sibling(output, "previous")?;
    if previous.exists() {
        fs::remove_dir_all(&previous).with_context(|| format!("removing stale {}", previous.display()))?;
    }
    if output.exists() {
        fs::rename(output, &previous).with_context(|| format!("moving aside {}", output.display()))?;
    }
    if let Err(err) = fs::rename(staging, output) {
        if previous.exists() {
            // put the old index back; the build error below is what gets reported
            let _ = fs::rename(&previous, output);
        }
        return Err(err).with_context(|| format!("moving {} into place", staging.display()));
    }
    if previous.exists() {
        fs::remove_dir_all(&previous).with_context(|| format!("removing {}", previous.display()))?;
    }
    Ok(())
}
