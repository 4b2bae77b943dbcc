//! Query-time scoring: synonym expansion, an advisory prefilter, BM25, the
//! boost pipeline (title, reviews, topical rules, position) and tie-breaking.

mod bm25;
mod boosts;
mod tiebreak;

pub use bm25::{compute_bm25, idf, term_weight, Bm25Params};
pub use boosts::{
    apply_boost_rules, apply_positional_boost, apply_review_boost, apply_title_boost, default_rules,
    rating_tier, BoostEffect, BoostRule, Scores,
};
pub use tiebreak::{ensure_unique_scores, PERTURBATION};

use crate::index::{ForwardIndex, InvertedIndex, ReviewsIndex};
use crate::tokenizer::Tokenizer;
use crate::DocId;
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// token -> synonyms appended after it during query expansion.
pub type Synonyms = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub k1: f64,
    pub b: f64,
    pub title_boost: f64,
    pub boost_rules: Vec<BoostRule>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        let Bm25Params { k1, b } = Bm25Params::default();
        Self { k1, b, title_boost: 2.0, boost_rules: default_rules() }
    }
}

impl RankingConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading ranking config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing ranking config {}", path.display()))
    }

    pub fn bm25(&self) -> Bm25Params {
        Bm25Params { k1: self.k1, b: self.b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

/// Indices a query is scored against. `forward` enables the positional boost.
#[derive(Debug, Clone, Copy)]
pub struct QueryIndices<'a> {
    pub inverted: &'a InvertedIndex,
    pub titles: &'a InvertedIndex,
    pub reviews: &'a ReviewsIndex,
    pub forward: Option<&'a ForwardIndex>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub tokens: Vec<String>,
    /// Advisory prefilter result; not applied to `results`.
    pub candidates: BTreeSet<DocId>,
    pub results: Vec<ScoredDoc>,
}

/// Substring prefilter over index keys.
///
/// A key matches when it contains all (`match_all`) or any of the tokens.
/// Every document listed under a matching key is a candidate.
pub fn filter_documents(tokens: &[String], index: &InvertedIndex, match_all: bool) -> BTreeSet<DocId> {
    let mut matched = BTreeSet::new();
    for (key, plist) in index.iter() {
        let key = key.to_lowercase();
        let hit = if match_all {
            tokens.iter().all(|t| key.contains(t.as_str()))
        } else {
            tokens.iter().any(|t| key.contains(t.as_str()))
        };
        if hit {
            matched.extend(plist.keys().copied());
        }
    }
    matched
}

#[derive(Debug, Clone, Default)]
pub struct Ranker {
    tokenizer: Tokenizer,
    synonyms: Synonyms,
    config: RankingConfig,
}

impl Ranker {
    pub fn new(tokenizer: Tokenizer, synonyms: Synonyms, config: RankingConfig) -> Self {
        Self { tokenizer, synonyms, config }
    }

    pub fn config(&self) -> &RankingConfig { &self.config }

    /// Tokenizes the query and appends each token's synonyms right after it.
    pub fn expand_query(&self, query: &str) -> Vec<String> {
        let mut expanded = Vec::new();
        for token in self.tokenizer.tokenize(query) {
            let synonyms = self.synonyms.get(&token).cloned().unwrap_or_default();
            expanded.push(token);
            expanded.extend(synonyms);
        }
        expanded
    }

    /// Scores every document reachable from the indices, sorted descending. Ties are kept.
    pub fn rank_documents(&self, tokens: &[String], indices: &QueryIndices<'_>) -> Vec<ScoredDoc> {
        let mut scores = compute_bm25(tokens, indices.inverted, self.config.bm25());
        apply_title_boost(&mut scores, tokens, indices.titles, self.config.title_boost);
        apply_review_boost(&mut scores, indices.reviews);
        apply_boost_rules(&mut scores, &self.config.boost_rules, indices.inverted);
        if let Some(forward) = indices.forward {
            apply_positional_boost(&mut scores, tokens, forward);
        }

        let mut ranked: Vec<ScoredDoc> = scores
            .into_iter()
            .map(|(doc_id, score)| ScoredDoc { doc_id, score })
            .collect();
        tiebreak::sort_descending(&mut ranked);
        ranked
    }

    pub fn search<R: Rng + ?Sized>(
        &self,
        query: &str,
        indices: &QueryIndices<'_>,
        match_all: bool,
        rng: &mut R,
    ) -> SearchOutcome {
        let tokens = self.expand_query(query);
        let candidates = filter_documents(&tokens, indices.inverted, match_all);
        let ranked = self.rank_documents(&tokens, indices);
        let results = ensure_unique_scores(ranked, rng);
        tracing::debug!(tokens = tokens.len(), candidates = candidates.len(), results = results.len(), "query ranked");
        SearchOutcome { tokens, candidates, results }
    }

    /// Ranked `(doc_id, score)` list with pairwise distinct scores.
    pub fn process_query<R: Rng + ?Sized>(
        &self,
        query: &str,
        indices: &QueryIndices<'_>,
        match_all: bool,
        rng: &mut R,
    ) -> Vec<ScoredDoc> {
        self.search(query, indices, match_all, rng).results
    }
}
