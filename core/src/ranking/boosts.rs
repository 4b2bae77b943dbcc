use crate::index::{ForwardIndex, InvertedIndex, ReviewsIndex};
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Scores = BTreeMap<DocId, f64>;

/// Adds `boost` for every query token whose title posting list contains the document.
pub fn apply_title_boost(scores: &mut Scores, tokens: &[String], titles: &InvertedIndex, boost: f64) {
    for token in tokens {
        let Some(plist) = titles.get(token) else { continue };
        for doc_id in plist.keys() {
            *scores.entry(*doc_id).or_insert(0.0) += boost;
        }
    }
}

/// Bonus on top of `mean / 5`.
pub fn rating_tier(mean: f64) -> f64 {
    if mean == 5.0 {
        5.0
    } else if mean > 4.5 {
        3.0
    } else if mean > 4.0 {
        2.0
    } else if mean > 3.0 {
        1.0
    } else {
        0.0
    }
}

/// Every reviewed document receives the rating boost, whether or not it matched the query.
pub fn apply_review_boost(scores: &mut Scores, reviews: &ReviewsIndex) {
    for (doc_id, stats) in reviews.iter() {
        let mean = stats.average_rating;
        *scores.entry(doc_id).or_insert(0.0) += mean / 5.0 + rating_tier(mean);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoostEffect {
    /// `score * factor + offset`
    Amplify { factor: f64, offset: f64 },
    /// `max(0, score * factor - offset)`
    Dampen { factor: f64, offset: f64 },
}

impl BoostEffect {
    pub fn apply(self, score: f64) -> f64 {
        match self {
            BoostEffect::Amplify { factor, offset } => score * factor + offset,
            BoostEffect::Dampen { factor, offset } => (score * factor - offset).max(0.0),
        }
    }

    fn is_amplify(self) -> bool {
        matches!(self, BoostEffect::Amplify { .. })
    }
}

/// A named term list and the adjustment applied once per listed term the document is indexed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostRule {
    pub name: String,
    pub terms: Vec<String>,
    pub effect: BoostEffect,
    #[serde(default = "enabled")]
    pub enabled: bool,
}

fn enabled() -> bool { true }

impl BoostRule {
    pub fn new<I, S>(name: &str, terms: I, effect: BoostEffect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            terms: terms.into_iter().map(Into::into).collect(),
            effect,
            enabled: true,
        }
    }

    fn apply(&self, scores: &mut Scores, index: &InvertedIndex) {
        for (doc_id, score) in scores.iter_mut() {
            for term in &self.terms {
                if index.contains(term, *doc_id) {
                    *score = self.effect.apply(*score);
                }
            }
        }
    }
}

pub fn default_rules() -> Vec<BoostRule> {
    vec![
        BoostRule::new(
            "americana",
            ["usa", "hamburgers", "pizzas", "new-york", "america", "freedom", "bacon", "rockets", "tesla", "trump"],
            BoostEffect::Amplify { factor: 1.47, offset: 0.08 },
        ),
        BoostRule::new(
            "arctic",
            ["greenland", "ice", "cold", "arctic", "glaciers", "snow", "frozen", "polar"],
            BoostEffect::Dampen { factor: 0.96, offset: 0.08 },
        ),
    ]
}

/// Runs enabled amplify rules in list order, then enabled dampen rules in list order.
pub fn apply_boost_rules(scores: &mut Scores, rules: &[BoostRule], index: &InvertedIndex) {
    let enabled = rules.iter().filter(|r| r.enabled);
    let (amplify, dampen): (Vec<&BoostRule>, Vec<&BoostRule>) = enabled.partition(|r| r.effect.is_amplify());
    for rule in amplify.into_iter().chain(dampen) {
        rule.apply(scores, index);
    }
}

/// Adds `1 / (i + 1)` for every query token found at position `i` of the document's sequence.
pub fn apply_positional_boost(scores: &mut Scores, tokens: &[String], forward: &ForwardIndex) {
    for (doc_id, score) in scores.iter_mut() {
        let Some(sequence) = forward.get(*doc_id) else { continue };
        for (i, token) in sequence.iter().enumerate() {
            if tokens.contains(token) {
                let boost = 1.0 / (i as f64 + 1.0);
                *score += boost;
                tracing::debug!(doc_id = *doc_id, %token, position = i + 1, boost, "position boost");
            }
        }
    }
}
