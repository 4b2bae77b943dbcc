use catalog_core::index::IndexBuilder;
use catalog_core::ranking::{compute_bm25, Bm25Params, Synonyms};
use catalog_core::{Document, Field, ForwardIndex, QueryIndices, Ranker, RankingConfig, Tokenizer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::collections::HashSet;

fn catalog() -> Vec<Document> {
    vec![
        Document::new("https://shop.example/product/1")
            .with_title("Blue Potion")
            .with_review(json!({"rating": 5}))
            .with_review(json!({"rating": 5})),
        Document::new("https://shop.example/product/2").with_title("Green Potion"),
    ]
}

#[test]
fn reviewed_document_outranks_equal_title_match() {
    let docs = catalog();
    let builder = IndexBuilder::default();
    let titles = builder.build_positional_index(Field::Title, &docs);
    let (reviews, failures) = builder.build_reviews_index(&docs);
    assert!(failures.is_empty());

    let ranker = Ranker::default();
    let indices = QueryIndices { inverted: &titles, titles: &titles, reviews: &reviews, forward: None };
    let results = ranker.process_query("potion", &indices, true, &mut StdRng::seed_from_u64(3));

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].doc_id, 0);
    assert_eq!(results[1].doc_id, 1);
    // both get BM25 + title boost; doc 0 adds 5/5 + 5
    assert!((results[0].score - results[1].score - 6.0).abs() < 1e-9);
}

#[test]
fn identical_documents_get_distinct_scores() {
    let docs = vec![
        Document::new("a").with_title("red potion"),
        Document::new("b").with_title("red potion"),
        Document::new("c").with_title("red potion"),
    ];
    let titles = IndexBuilder::default().build_positional_index(Field::Title, &docs);
    let reviews = Default::default();
    let indices = QueryIndices { inverted: &titles, titles: &titles, reviews: &reviews, forward: None };
    let ranker = Ranker::default();

    let raw = ranker.rank_documents(&ranker.expand_query("potion"), &indices);
    let tied = raw[0].score;
    assert!(raw.iter().all(|d| d.score == tied));

    let results = ranker.process_query("potion", &indices, true, &mut StdRng::seed_from_u64(11));
    let distinct: HashSet<u64> = results.iter().map(|d| d.score.to_bits()).collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(results.iter().filter(|d| d.score == tied).count(), 1);
    assert_eq!(results.last().map(|d| d.score), Some(tied));
}

#[test]
fn huge_review_ratings_still_rank() {
    let docs = vec![
        Document::new("a").with_title("red potion").with_review(json!({"rating": 1e17})),
        Document::new("b").with_title("red potion").with_review(json!({"rating": 1e17})),
    ];
    let builder = IndexBuilder::default();
    let titles = builder.build_positional_index(Field::Title, &docs);
    let (reviews, failures) = builder.build_reviews_index(&docs);
    assert!(failures.is_empty());
    let indices = QueryIndices { inverted: &titles, titles: &titles, reviews: &reviews, forward: None };

    let results = Ranker::default().process_query("potion", &indices, true, &mut StdRng::seed_from_u64(2));
    assert_eq!(results.len(), 2);
    assert_ne!(results[0].score.to_bits(), results[1].score.to_bits());
    assert!(results[0].score > results[1].score);
}

#[test]
fn bm25_grows_with_term_frequency() {
    let builder = IndexBuilder::default();
    let tokens = vec!["potion".to_string()];
    let mut previous = 0.0;
    for repeats in 1..6 {
        let title = format!("{} red", "potion ".repeat(repeats));
        let docs = vec![Document::new("a").with_title(title), Document::new("b").with_title("potion blue")];
        let index = builder.build_positional_index(Field::Title, &docs);
        let score = compute_bm25(&tokens, &index, Bm25Params::default())[&0];
        assert!(score >= previous, "tf={repeats}: {score} < {previous}");
        previous = score;
    }
}

#[test]
fn synonyms_pull_in_matching_documents() {
    let docs = vec![
        Document::new("a").with_description("healing elixir"),
        Document::new("b").with_description("iron sword"),
    ];
    let description = IndexBuilder::default().build_positional_index(Field::Description, &docs);
    let titles = Default::default();
    let reviews = Default::default();
    let indices = QueryIndices { inverted: &description, titles: &titles, reviews: &reviews, forward: None };

    let synonyms = Synonyms::from([("potion".to_string(), vec!["elixir".to_string()])]);
    let ranker = Ranker::new(Tokenizer::default(), synonyms, RankingConfig::default());
    let outcome = ranker.search("potion", &indices, false, &mut StdRng::seed_from_u64(0));

    assert_eq!(outcome.tokens, vec!["potion", "elixir"]);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].doc_id, 0);
    assert!(outcome.candidates.contains(&0));
}

#[test]
fn prefilter_does_not_restrict_results() {
    let docs = vec![
        Document::new("a").with_title("red potion"),
        Document::new("b").with_title("blue potion"),
    ];
    let titles = IndexBuilder::default().build_positional_index(Field::Title, &docs);
    let reviews = Default::default();
    let indices = QueryIndices { inverted: &titles, titles: &titles, reviews: &reviews, forward: None };
    let ranker = Ranker::default();

    let outcome = ranker.search("red potion", &indices, true, &mut StdRng::seed_from_u64(5));
    // no single key contains both "red" and "potion"
    assert!(outcome.candidates.is_empty());
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[0].doc_id, 0);
}

#[test]
fn forward_index_adds_positional_boost() {
    let docs = vec![
        Document::new("a").with_title("potion red"),
        Document::new("b").with_title("red potion"),
    ];
    let titles = IndexBuilder::default().build_positional_index(Field::Title, &docs);
    let forward = ForwardIndex::from_positional(&titles);
    let reviews = Default::default();
    let ranker = Ranker::default();

    let plain = QueryIndices { inverted: &titles, titles: &titles, reviews: &reviews, forward: None };
    let base = ranker.rank_documents(&ranker.expand_query("potion"), &plain);
    assert_eq!(base[0].score, base[1].score);

    let boosted = QueryIndices { forward: Some(&forward), ..plain };
    let ranked = ranker.rank_documents(&ranker.expand_query("potion"), &boosted);
    assert_eq!(ranked[0].doc_id, 0);
    assert!((ranked[0].score - base[0].score - 1.0).abs() < 1e-9);
    assert!((ranked[1].score - base[1].score - 0.5).abs() < 1e-9);
}
