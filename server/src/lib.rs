use anyhow::{Context, Result};
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use catalog_core::persist::{
    load_documents, load_forward_index, load_meta, load_positional_index, load_reviews_index, load_synonyms,
    IndexPaths,
};
use catalog_core::{Document, Field, ForwardIndex, InvertedIndex, QueryIndices, Ranker, RankingConfig, ReviewsIndex, Tokenizer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const SNIPPET_CHARS: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_match_all")]
    pub match_all: bool,
    /// Fixes the tie-break draw so a response can be reproduced.
    pub seed: Option<u64>,
}
fn default_k() -> usize { 10 }
fn default_match_all() -> bool { true }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub tokens: Vec<String>,
    pub took_s: f64,
    pub total_documents: usize,
    /// Size of the advisory prefilter; results are not restricted to it.
    pub filtered_documents: usize,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub score: f64,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

/// Everything loaded from one index directory. Read-only after startup.
pub struct AppState {
    pub ranker: Ranker,
    pub titles: InvertedIndex,
    pub descriptions: InvertedIndex,
    pub reviews: ReviewsIndex,
    pub forward: Option<ForwardIndex>,
    pub documents: Vec<Document>,
}

impl AppState {
    pub fn load(index_dir: &FsPath, ranking_config: Option<&FsPath>) -> Result<Self> {
        let paths = IndexPaths::new(index_dir);
        let meta = load_meta(&paths).context("index directory has no meta.json; run the indexer first")?;
        let config = match ranking_config {
            Some(path) => RankingConfig::from_json_file(path)?,
            None => RankingConfig::default(),
        };
        let ranker = Ranker::new(Tokenizer::default(), load_synonyms(&paths)?, config);
        let state = Self {
            ranker,
            titles: load_positional_index(&paths, Field::Title)?,
            descriptions: load_positional_index(&paths, Field::Description)?,
            reviews: load_reviews_index(&paths)?,
            forward: load_forward_index(&paths)?,
            documents: load_documents(&paths.documents())?.documents,
        };
        if state.documents.len() != meta.num_docs as usize {
            tracing::warn!(meta = meta.num_docs, loaded = state.documents.len(), "document count differs from meta.json");
        }
        tracing::info!(
            docs = state.documents.len(),
            title_tokens = state.titles.len(),
            description_tokens = state.descriptions.len(),
            forward = state.forward.is_some(),
            created_at = %meta.created_at,
            "index loaded"
        );
        Ok(state)
    }

    fn indices(&self) -> QueryIndices<'_> {
        QueryIndices {
            inverted: &self.descriptions,
            titles: &self.titles,
            reviews: &self.reviews,
            forward: self.forward.as_ref(),
        }
    }
}

fn cors_layer() -> CorsLayer {
    // CORS_ALLOW_ORIGIN is comma-separated; unset or unparsable means any origin
    let origins: Vec<_> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(index_dir: &FsPath, ranking_config: Option<&FsPath>) -> Result<Router> {
    let state = Arc::new(AppState::load(index_dir, ranking_config)?);
    Ok(router(state))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<Arc<AppState>>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let outcome = state.ranker.search(&params.q, &state.indices(), params.match_all, &mut rng);

    let k = params.k.clamp(1, 100);
    let total_hits = if outcome.tokens.is_empty() { 0 } else { outcome.results.len() };
    let results = outcome
        .results
        .iter()
        .take(if outcome.tokens.is_empty() { 0 } else { k })
        .filter_map(|hit| {
            let doc = state.documents.get(hit.doc_id as usize)?;
            Some(SearchHit {
                doc_id: hit.doc_id,
                score: hit.score,
                title: doc.title.clone().unwrap_or_default(),
                url: doc.url.clone(),
                snippet: doc.description.as_deref().and_then(|d| snippet(d, &outcome.tokens)),
            })
        })
        .collect();

    let elapsed = start.elapsed();
    tracing::info!(q = %params.q, hits = total_hits, took_s = elapsed.as_secs_f64(), "search");
    Json(SearchResponse {
        query: params.q,
        tokens: outcome.tokens,
        took_s: elapsed.as_secs_f64(),
        total_documents: state.documents.len(),
        filtered_documents: outcome.candidates.len(),
        total_hits,
        results,
    })
}

pub async fn doc_handler(
    State(state): State<Arc<AppState>>,
    Path(doc_id): Path<u32>,
) -> Result<Json<Document>, (StatusCode, Json<serde_json::Value>)> {
    state
        .documents
        .get(doc_id as usize)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))))
}

/// Window of `text` around the first query token, with every token wrapped in `<em>`.
fn snippet(text: &str, tokens: &[String]) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let lower = text.to_lowercase();
    let first = tokens.iter().filter(|t| !t.is_empty()).find_map(|t| lower.find(t.as_str()));
    let chars: Vec<char> = text.chars().collect();
    let start = first
        .map(|byte| lower[..byte].chars().count().saturating_sub(SNIPPET_CHARS / 2))
        .unwrap_or(0)
        .min(chars.len());
    let window: String = chars[start..].iter().take(SNIPPET_CHARS).collect();
    Some(highlight_terms(&window, tokens))
}

fn highlight_terms(snippet: &str, tokens: &[String]) -> String {
    let mut s = snippet.to_string();
    for t in tokens {
        if t.trim().is_empty() {
            continue;
        }
        let Ok(pat) = regex::RegexBuilder::new(&regex::escape(t)).case_insensitive(true).build() else {
            continue;
        };
        s = pat.replace_all(&s, |caps: &regex::Captures| format!("<em>{}</em>", &caps[0])).to_string();
    }
    s
}
