use crate::error::DocError;
use crate::tokenizer::Tokenizer;
use crate::{DocId, Document, Field, Position};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Positions of one token, per document, in ascending order.
pub type PostingList = BTreeMap<DocId, Vec<Position>>;

/// token -> doc_id -> positions, for a single text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    postings: BTreeMap<String, PostingList>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, token: &str, doc_id: DocId, position: Position) {
        self.postings
            .entry(token.to_string())
            .or_default()
            .entry(doc_id)
            .or_default()
            .push(position);
    }

    pub fn get(&self, token: &str) -> Option<&PostingList> {
        self.postings.get(token)
    }

    pub fn contains(&self, token: &str, doc_id: DocId) -> bool {
        self.postings.get(token).map_or(false, |p| p.contains_key(&doc_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PostingList)> {
        self.postings.iter()
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize { self.postings.len() }

    pub fn is_empty(&self) -> bool { self.postings.is_empty() }

    /// Number of distinct documents that appear in any posting list.
    pub fn num_docs(&self) -> usize {
        self.postings
            .values()
            .flat_map(|p| p.keys())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Distinct tokens recorded per document.
    pub fn doc_lengths(&self) -> BTreeMap<DocId, usize> {
        let mut lengths = BTreeMap::new();
        for plist in self.postings.values() {
            for doc_id in plist.keys() {
                *lengths.entry(*doc_id).or_insert(0) += 1;
            }
        }
        lengths
    }

    /// Mean posting-list length over all tokens; 0 for an empty index.
    pub fn avg_docs_per_token(&self) -> f64 {
        if self.postings.is_empty() {
            return 0.0;
        }
        let total: usize = self.postings.values().map(|p| p.len()).sum();
        total as f64 / self.postings.len() as f64
    }
}

/// token -> documents whose structured features contain it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeaturesIndex {
    docs: BTreeMap<String, BTreeSet<DocId>>,
}

impl FeaturesIndex {
    pub fn get(&self, token: &str) -> Option<&BTreeSet<DocId>> {
        self.docs.get(token)
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    fn add(&mut self, token: String, doc_id: DocId) {
        self.docs.entry(token).or_default().insert(doc_id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total_reviews: usize,
    pub average_rating: f64,
    pub last_rating: Option<f64>,
}

/// doc_id -> review aggregate. Documents without reviews have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewsIndex {
    stats: BTreeMap<DocId, ReviewStats>,
}

impl ReviewsIndex {
    pub fn get(&self, doc_id: DocId) -> Option<&ReviewStats> {
        self.stats.get(&doc_id)
    }

    pub fn insert(&mut self, doc_id: DocId, stats: ReviewStats) {
        self.stats.insert(doc_id, stats);
    }

    pub fn iter(&self) -> impl Iterator<Item = (DocId, &ReviewStats)> {
        self.stats.iter().map(|(id, s)| (*id, s))
    }

    pub fn len(&self) -> usize { self.stats.len() }

    pub fn is_empty(&self) -> bool { self.stats.is_empty() }
}

/// doc_id -> tokens of one field in position order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForwardIndex {
    sequences: BTreeMap<DocId, Vec<String>>,
}

impl ForwardIndex {
    /// Rebuilds per-document token sequences from a positional index.
    pub fn from_positional(index: &InvertedIndex) -> Self {
        let mut slots: BTreeMap<DocId, Vec<Option<&str>>> = BTreeMap::new();
        for (token, plist) in index.iter() {
            for (doc_id, positions) in plist {
                let seq = slots.entry(*doc_id).or_default();
                for &pos in positions {
                    let pos = pos as usize;
                    if seq.len() <= pos {
                        seq.resize(pos + 1, None);
                    }
                    seq[pos] = Some(token.as_str());
                }
            }
        }
        let sequences = slots
            .into_iter()
            .map(|(doc_id, seq)| (doc_id, seq.into_iter().flatten().map(str::to_string).collect()))
            .collect();
        Self { sequences }
    }

    pub fn get(&self, doc_id: DocId) -> Option<&[String]> {
        self.sequences.get(&doc_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize { self.sequences.len() }

    pub fn is_empty(&self) -> bool { self.sequences.is_empty() }
}

/// Builds every index over one document collection. The slice order is the doc id order.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    tokenizer: Tokenizer,
}

impl IndexBuilder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn build_positional_index(&self, field: Field, docs: &[Document]) -> InvertedIndex {
        let mut index = InvertedIndex::new();
        for (doc_id, doc) in docs.iter().enumerate() {
            let tokens = self.tokenizer.tokenize(field.value(doc));
            for (position, token) in tokens.iter().enumerate() {
                index.insert(token, doc_id as DocId, position as Position);
            }
        }
        tracing::debug!(field = field.as_str(), tokens = index.len(), "positional index built");
        index
    }

    pub fn build_features_index(&self, docs: &[Document]) -> FeaturesIndex {
        let mut index = FeaturesIndex::default();
        for (doc_id, doc) in docs.iter().enumerate() {
            for value in doc.product_features.values() {
                let Some(text) = feature_text(value) else { continue };
                for token in self.tokenizer.tokenize(&text) {
                    index.add(token, doc_id as DocId);
                }
            }
        }
        index
    }

    /// Aggregates reviews per document. Documents whose reviews cannot be
    /// aggregated are left out and returned as errors.
    pub fn build_reviews_index(&self, docs: &[Document]) -> (ReviewsIndex, Vec<DocError>) {
        let mut index = ReviewsIndex::default();
        let mut failures = Vec::new();
        for (doc_id, doc) in docs.iter().enumerate() {
            let doc_id = doc_id as DocId;
            if doc.product_reviews.is_empty() {
                tracing::debug!(doc_id, "no reviews");
                continue;
            }
            match aggregate_reviews(doc_id, &doc.product_reviews) {
                Ok(stats) => index.insert(doc_id, stats),
                Err(err) => {
                    tracing::warn!(doc_id, error = %err, "skipping reviews");
                    failures.push(err);
                }
            }
        }
        (index, failures)
    }
}

fn aggregate_reviews(doc_id: DocId, reviews: &[Value]) -> Result<ReviewStats, DocError> {
    let mut sum = 0.0;
    let mut last_rating = None;
    for (i, review) in reviews.iter().enumerate() {
        let obj = review.as_object().ok_or(DocError::Review { doc_id, review: i })?;
        let rating = match obj.get("rating") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_f64().ok_or_else(|| DocError::Rating {
                doc_id,
                review: i,
                value: v.clone(),
            })?),
        };
        sum += rating.unwrap_or(0.0);
        last_rating = rating;
    }
    Ok(ReviewStats {
        total_reviews: reviews.len(),
        average_rating: sum / reviews.len() as f64,
        last_rating,
    })
}

/// Text form of a feature value; `None` for empty or falsy values.
fn feature_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("True".to_string()),
        Value::Number(n) => (n.as_f64() != Some(0.0)).then(|| n.to_string()),
        Value::String(s) => (!s.is_empty()).then(|| s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(feature_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map.values().filter_map(feature_text).collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
    }
}
