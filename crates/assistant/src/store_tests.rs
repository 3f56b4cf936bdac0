// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

use serde_json::json;

use super::*;

fn doc(value: Value) -> anyhow::Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("not an object: {other}"),
    }
}

#[yare::parameterized(
    scalar_match = { json!({"name": "lab"}), "name", json!("lab"), true },
    scalar_miss = { json!({"name": "lab"}), "name", json!("other"), false },
    missing_field = { json!({"name": "lab"}), "open_id", json!("x"), false },
    array_contains = { json!({"lab_ids": ["a", "b"]}), "lab_ids", json!("b"), true },
    array_lacks = { json!({"lab_ids": ["a", "b"]}), "lab_ids", json!("c"), false },
    bool_match = { json!({"is_default": true}), "is_default", json!(true), true },
)]
fn filter_matching(document: Value, field: &str, value: Value, expected: bool) -> anyhow::Result<()> {
    let filter = Filter::all().eq(field, value);
    assert_eq!(filter.matches(&doc(document)?), expected);
    Ok(())
}

#[test]
fn empty_filter_matches_everything() -> anyhow::Result<()> {
    assert!(Filter::all().matches(&doc(json!({}))?));
    Ok(())
}

#[tokio::test]
async fn insert_find_replace_delete() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.insert("labs", doc(json!({"_id": "l1", "name": "Chem"}))?).await?;
    store.insert("labs", doc(json!({"_id": "l2", "name": "Bio"}))?).await?;

    let found = store.find_one("labs", &Filter::by_id("l2")).await?;
    assert_eq!(found.and_then(|d| d.get("name").cloned()), Some(json!("Bio")));
    assert_eq!(store.find_many("labs", &Filter::all()).await?.len(), 2);

    let replaced = store
        .replace("labs", &Filter::by_id("l1"), doc(json!({"_id": "l1", "name": "Physics"}))?)
        .await?;
    assert!(replaced);
    let renamed = store.find_one("labs", &Filter::all().eq("name", "Physics")).await?;
    assert!(renamed.is_some());

    assert_eq!(store.delete("labs", &Filter::by_id("l1")).await?, 1);
    assert_eq!(store.delete("labs", &Filter::by_id("l1")).await?, 0);
    assert_eq!(store.find_many("labs", &Filter::all()).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn missing_collection_reads_empty() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    assert!(store.find_one("users", &Filter::all()).await?.is_none());
    assert!(store.find_many("users", &Filter::all()).await?.is_empty());
    assert!(!store.replace("users", &Filter::all(), Document::new()).await?);
    Ok(())
}

#[tokio::test]
async fn insert_rejects_duplicate_and_missing_ids() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.insert("users", doc(json!({"_id": "u1"}))?).await?;

    let dup = store.insert("users", doc(json!({"_id": "u1"}))?).await;
    assert!(matches!(dup, Err(StoreError::DuplicateId { .. })));

    let missing = store.insert("users", doc(json!({"name": "anon"}))?).await;
    assert!(matches!(missing, Err(StoreError::MissingId { .. })));
    Ok(())
}

#[yare::parameterized(
    other_id = { json!({"_id": "u2", "name": "thief"}), "ID_MISMATCH" },
    no_id = { json!({"name": "anon"}), "MISSING_ID" },
    empty_id = { json!({"_id": "", "name": "anon"}), "MISSING_ID" },
)]
#[test_macro(tokio::test)]
async fn replace_keeps_the_matched_id(replacement: Value, code: &str) -> anyhow::Result<()> {
    let store = MemoryStore::new();
    store.insert("users", doc(json!({"_id": "u1", "name": "alice"}))?).await?;
    store.insert("users", doc(json!({"_id": "u2", "name": "bob"}))?).await?;

    let err = match store.replace("users", &Filter::by_id("u1"), doc(replacement)?).await {
        Ok(replaced) => anyhow::bail!("replace accepted a foreign id: {replaced}"),
        Err(e) => e,
    };
    assert_eq!(err.as_str(), code);

    let kept = store.find_one("users", &Filter::by_id("u1")).await?;
    assert_eq!(kept.and_then(|d| d.get("name").cloned()), Some(json!("alice")));
    assert_eq!(store.find_many("users", &Filter::all()).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn seed_file_populates_collections() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{"labs": [{{"_id": "l1", "is_default": true}}], "roles": [{{"_id": "r1", "lab_id": "l1"}}]}}"#
    )?;

    let store = MemoryStore::from_seed_file(file.path())?;
    assert_eq!(store.find_many("labs", &Filter::all()).await?.len(), 1);
    assert_eq!(store.find_many("roles", &Filter::all().eq("lab_id", "l1")).await?.len(), 1);
    Ok(())
}

#[yare::parameterized(
    not_json = { "labs" },
    not_array = { r#"{"labs": {"_id": "l1"}}"# },
    not_object = { r#"{"labs": [1]}"# },
    no_id = { r#"{"labs": [{"name": "x"}]}"# },
)]
fn bad_seed_is_rejected(raw: &str) {
    assert!(MemoryStore::from_seed(raw).is_err());
}
