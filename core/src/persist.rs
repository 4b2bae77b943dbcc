use crate::index::{FeaturesIndex, ForwardIndex, InvertedIndex, ReviewsIndex};
use crate::ranking::Synonyms;
use crate::error::DocError;
use crate::{Document, Field};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn now(num_docs: u32) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs, created_at, version: 1 }
    }
}

/// File layout of one index directory.
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn positional(&self, field: Field) -> PathBuf {
        self.root.join(format!("index_{}_with_positions.json", field.as_str()))
    }
    pub fn features(&self) -> PathBuf { self.root.join("features_index.json") }
    pub fn reviews(&self) -> PathBuf { self.root.join("reviews_index.json") }
    pub fn forward(&self) -> PathBuf { self.root.join("forward_title.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn documents(&self) -> PathBuf { self.root.join("processed_products.jsonl") }
    pub fn synonyms(&self) -> PathBuf { self.root.join("synonyms.json") }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn load_optional_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if path.exists() { load_json(path).map(Some) } else { Ok(None) }
}

pub fn save_positional_index(paths: &IndexPaths, field: Field, index: &InvertedIndex) -> Result<()> {
    save_json(&paths.positional(field), index)
}

pub fn load_positional_index(paths: &IndexPaths, field: Field) -> Result<InvertedIndex> {
    load_json(&paths.positional(field))
}

pub fn save_features_index(paths: &IndexPaths, index: &FeaturesIndex) -> Result<()> {
    save_json(&paths.features(), index)
}

pub fn load_features_index(paths: &IndexPaths) -> Result<FeaturesIndex> {
    load_json(&paths.features())
}

pub fn save_reviews_index(paths: &IndexPaths, index: &ReviewsIndex) -> Result<()> {
    save_json(&paths.reviews(), index)
}

/// Missing file means no document had reviews.
pub fn load_reviews_index(paths: &IndexPaths) -> Result<ReviewsIndex> {
    Ok(load_optional_json(&paths.reviews())?.unwrap_or_default())
}

pub fn save_forward_index(paths: &IndexPaths, index: &ForwardIndex) -> Result<()> {
    save_json(&paths.forward(), index)
}

pub fn load_forward_index(paths: &IndexPaths) -> Result<Option<ForwardIndex>> {
    load_optional_json(&paths.forward())
}

pub fn load_synonyms(paths: &IndexPaths) -> Result<Synonyms> {
    Ok(load_optional_json(&paths.synonyms())?.unwrap_or_default())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    save_json(&paths.meta(), meta)
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    load_json(&paths.meta())
}

/// Documents read from a JSONL collection, in file order, plus the lines that were skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<DocError>,
}

/// Reads a JSONL collection. Bad lines are skipped and reported; a missing or
/// unreadable file is an error.
pub fn load_documents(path: &Path) -> Result<LoadReport> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut report = LoadReport::default();
    for (i, line) in BufReader::new(f).split(b'\n').enumerate() {
        let line_no = i + 1;
        let bytes = line.with_context(|| format!("reading {}", path.display()))?;
        let Ok(text) = String::from_utf8(bytes) else {
            tracing::warn!(line = line_no, "skipping line: invalid UTF-8");
            report.skipped.push(DocError::Encoding { line: line_no });
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Document>(text) {
            Ok(doc) => report.documents.push(doc),
            Err(source) => {
                tracing::warn!(line = line_no, error = %source, "skipping malformed record");
                report.skipped.push(DocError::Malformed { line: line_no, source });
            }
        }
    }
    Ok(report)
}

/// Writes one JSON object per line.
pub fn save_documents(path: &Path, docs: &[Document]) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let f = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for doc in docs {
        serde_json::to_writer(&mut w, doc)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn positional_index_survives_disk() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let docs = vec![Document::new("a").with_title("red potion blue potion")];
        let index = IndexBuilder::default().build_positional_index(Field::Title, &docs);
        save_positional_index(&paths, Field::Title, &index).unwrap();

        let raw: serde_json::Value = load_json(&paths.positional(Field::Title)).unwrap();
        assert_eq!(raw["potion"]["0"], json!([1, 3]));
        assert_eq!(load_positional_index(&paths, Field::Title).unwrap(), index);
    }

    #[test]
    fn load_skips_bad_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(br#"{"url": "https://shop.example/product/1", "title": "Blue Potion"}"#);
        bytes.extend_from_slice(b"\nnot json\n\n");
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        bytes.extend_from_slice(br#"{"title": "no url"}"#);
        bytes.extend_from_slice(b"\n");
        bytes.extend_from_slice(br#"{"url": "u2", "brand_extra": 3}"#);
        std::fs::write(&path, bytes).unwrap();

        let report = load_documents(&path).unwrap();
        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.documents[0].title.as_deref(), Some("Blue Potion"));
        assert_eq!(report.documents[1].extra["brand_extra"], json!(3));
        let lines: Vec<_> = report.skipped.iter().filter_map(DocError::line).collect();
        assert_eq!(lines, vec![2, 4, 5]);
    }

    #[test]
    fn null_reviews_and_features_keep_the_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("products.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"url": "a", "title": "red potion", "product_reviews": null, "product_features": null}"#,
                "\n",
                r#"{"url": "b", "title": "blue potion"}"#,
                "\n",
            ),
        )
        .unwrap();

        let report = load_documents(&path).unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.documents.len(), 2);
        assert!(report.documents[0].product_reviews.is_empty());
        assert!(report.documents[0].product_features.is_empty());
        assert!(report.documents[0].extra.is_empty());

        let (reviews, failures) = IndexBuilder::default().build_reviews_index(&report.documents);
        assert!(reviews.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_documents(&dir.path().join("nope.jsonl")).is_err());
    }

    #[test]
    fn absent_optional_files() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        assert!(load_reviews_index(&paths).unwrap().is_empty());
        assert!(load_forward_index(&paths).unwrap().is_none());
        assert!(load_synonyms(&paths).unwrap().is_empty());
        assert!(load_positional_index(&paths, Field::Description).is_err());
    }
}
