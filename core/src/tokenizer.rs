use lazy_static::lazy_static;
use std::collections::HashSet;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "the","a","an","and","or","of","to","in","on","with","for","by","at","from",
            "is","it","this","that","as","are","was","were","be","been","has","have","had",
        ];
        words.iter().copied().collect()
    };
}

/// Lowercases, deletes ASCII punctuation, splits on whitespace and drops stopwords.
///
/// Punctuation is removed rather than replaced, so `"new-york"` becomes `"newyork"`.
/// Output depends only on the input text and the stopword set.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(STOPWORDS.iter().copied())
    }
}

impl Tokenizer {
    pub fn new<I, S>(stopwords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { stopwords: stopwords.into_iter().map(Into::into).collect() }
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .collect();
        cleaned
            .split_whitespace()
            .filter(|token| !self.is_stopword(token))
            .map(str::to_string)
            .collect()
    }
}
