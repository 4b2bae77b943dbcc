use catalog_core::persist::{
    load_documents, load_features_index, load_forward_index, load_meta, load_positional_index,
    load_reviews_index, IndexPaths,
};
use catalog_core::Field;
use indexer::{build_index, collect_inputs, process_documents, BuildOptions};
use std::fs;
use tempfile::tempdir;

const CATALOG: &str = r#"{"url": "https://shop.example/product/10?variant=red", "title": "Red Potion", "description": "A red potion for brave heroes", "product_features": {"brand": "Alchemix", "origin": "USA", "stock": 0}, "product_reviews": [{"rating": 3}, {"rating": 5}, {"rating": 4}]}
this line is broken
{"url": "https://shop.example/product/11", "title": "Blue Potion", "product_features": {"brand": "Alchemix"}}
{"url": "https://shop.example/product/12", "title": "Odd Reviews", "product_reviews": [{"rating": "five"}]}
"#;

#[test]
fn builds_every_index_and_skips_bad_records() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("products.jsonl");
    fs::write(&input, CATALOG).unwrap();
    let out = dir.path().join("index");

    let report = build_index(&input, &out, &BuildOptions::default()).unwrap();
    assert_eq!(report.num_docs, 3);
    assert_eq!(report.skipped_records.len(), 1);
    assert_eq!(report.review_failures.len(), 1);
    assert_eq!(report.reviewed_docs, 1);

    let paths = IndexPaths::new(&out);
    let titles = load_positional_index(&paths, Field::Title).unwrap();
    assert_eq!(titles.get("potion").unwrap().keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(titles.get("red").unwrap()[&0], vec![0]);

    let descriptions = load_positional_index(&paths, Field::Description).unwrap();
    assert_eq!(descriptions.get("heroes").unwrap()[&0], vec![3]);

    let features = load_features_index(&paths).unwrap();
    assert_eq!(features.get("alchemix").unwrap().len(), 2);
    assert!(features.get("0").is_none());

    let reviews = load_reviews_index(&paths).unwrap();
    let stats = reviews.get(0).unwrap();
    assert_eq!(stats.total_reviews, 3);
    assert_eq!(stats.average_rating, 4.0);
    assert_eq!(stats.last_rating, Some(4.0));
    assert!(reviews.get(1).is_none());
    assert!(reviews.get(2).is_none());

    assert!(load_forward_index(&paths).unwrap().is_some());
    assert_eq!(load_meta(&paths).unwrap().num_docs, 3);

    let processed = load_documents(&paths.documents()).unwrap();
    assert!(processed.skipped.is_empty());
    assert_eq!(processed.documents[0].product_id.as_deref(), Some("10"));
    assert_eq!(processed.documents[0].variant.as_deref(), Some("red"));
    assert_eq!(processed.documents[1].variant, None);
}

#[test]
fn missing_input_aborts_without_output() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("index");
    assert!(build_index(&dir.path().join("absent.jsonl"), &out, &BuildOptions::default()).is_err());
    assert!(!out.exists());
}

#[test]
fn all_bad_records_abort_without_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("products.jsonl");
    fs::write(&input, "garbage\n{\"title\": \"no url\"}\n").unwrap();
    let out = dir.path().join("index");
    assert!(build_index(&input, &out, &BuildOptions::default()).is_err());
    assert!(!out.exists());
}

#[test]
fn directory_inputs_in_name_order() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("b.jsonl"), "{\"url\": \"b\"}\n").unwrap();
    fs::write(data.join("a.jsonl"), "{\"url\": \"a\"}\n").unwrap();
    fs::write(data.join("notes.txt"), "ignored").unwrap();

    let files = collect_inputs(&data).unwrap();
    let names: Vec<_> = files.iter().map(|f| f.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["a.jsonl", "b.jsonl"]);
}

#[test]
fn processing_fills_product_fields() {
    let mut docs = vec![catalog_core::Document::new("https://shop.example/category/hats")];
    process_documents(&mut docs);
    assert_eq!(docs[0].product_id, None);
    assert_eq!(docs[0].variant, None);
}

#[test]
fn rebuild_replaces_the_whole_index() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("products.jsonl");
    fs::write(&input, CATALOG).unwrap();
    let out = dir.path().join("index");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("leftover.json"), "{}").unwrap();

    build_index(&input, &out, &BuildOptions::default()).unwrap();

    assert!(!out.join("leftover.json").exists());
    assert_eq!(load_meta(&IndexPaths::new(&out)).unwrap().num_docs, 3);
    let mut names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["index", "products.jsonl"]);
}

#[test]
fn failed_write_keeps_the_previous_index() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("products.jsonl");
    fs::write(&input, CATALOG).unwrap();
    let out = dir.path().join("index");
    build_index(&input, &out, &BuildOptions::default()).unwrap();
    let before = fs::read_to_string(out.join("meta.json")).unwrap();

    // a plain file where the staging directory has to go
    fs::write(dir.path().join(".index.staging"), "blocked").unwrap();
    fs::write(&input, r#"{"url": "https://shop.example/product/99", "title": "New Potion"}"#).unwrap();
    assert!(build_index(&input, &out, &BuildOptions::default()).is_err());

    assert_eq!(fs::read_to_string(out.join("meta.json")).unwrap(), before);
    assert_eq!(load_meta(&IndexPaths::new(&out)).unwrap().num_docs, 3);
}
