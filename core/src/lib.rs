use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub mod error;
pub mod index;
pub mod persist;
pub mod product;
pub mod ranking;
pub mod tokenizer;

pub use error::DocError;
pub use index::{FeaturesIndex, ForwardIndex, InvertedIndex, PostingList, ReviewStats, ReviewsIndex};
pub use product::{extract_product_info, ProductInfo};
pub use ranking::{QueryIndices, Ranker, RankingConfig, ScoredDoc};
pub use tokenizer::Tokenizer;

/// Position of a document in the collection it was indexed from.
pub type DocId = u32;
/// 0-based token offset inside one field of one document.
pub type Position = u32;

/// One product record as read from the catalog JSONL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_features: BTreeMap<String, serde_json::Value>,
    /// Kept as raw JSON so a single bad review only affects review aggregation.
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_reviews: Vec<serde_json::Value>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `null` reads as the empty value, same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Document {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.product_features.insert(name.into(), value);
        self
    }

    pub fn with_review(mut self, review: serde_json::Value) -> Self {
        self.product_reviews.push(review);
        self
    }
}

/// Text fields that carry a positional index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Title,
    Description,
}

impl Field {
    pub fn value<'a>(&self, doc: &'a Document) -> &'a str {
        match self {
            Field::Title => doc.title.as_deref().unwrap_or(""),
            Field::Description => doc.description.as_deref().unwrap_or(""),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Description => "description",
        }
    }
}
