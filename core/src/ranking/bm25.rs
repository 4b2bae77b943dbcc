use crate::index::InvertedIndex;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

pub fn idf(n: f64, df: f64) -> f64 {
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Saturating term-frequency component with length normalization.
pub fn term_weight(tf: f64, doc_len: f64, avgdl: f64, params: Bm25Params) -> f64 {
    let Bm25Params { k1, b } = params;
    (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * doc_len / avgdl))
}

/// BM25 over a positional index.
///
/// `N` is the number of distinct documents in the index, `tf` the number of
/// recorded positions, `doc_len` the number of distinct tokens recorded for the
/// document and `avgdl` the mean posting-list length. Repeated query tokens
/// contribute once per occurrence.
pub fn compute_bm25(tokens: &[String], index: &InvertedIndex, params: Bm25Params) -> BTreeMap<DocId, f64> {
    let mut scores = BTreeMap::new();
    if index.is_empty() {
        return scores;
    }
    let n = index.num_docs() as f64;
    let avgdl = index.avg_docs_per_token();
    let lengths = index.doc_lengths();

    for token in tokens {
        let Some(plist) = index.get(token) else { continue };
        let token_idf = idf(n, plist.len() as f64);
        for (doc_id, positions) in plist {
            let tf = positions.len() as f64;
            let doc_len = lengths.get(doc_id).copied().unwrap_or(0) as f64;
            *scores.entry(*doc_id).or_insert(0.0) += token_idf * term_weight(tf, doc_len, avgdl, params);
        }
    }
    scores
}
