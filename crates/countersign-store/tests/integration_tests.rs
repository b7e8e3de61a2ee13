//! Integration tests for countersign-store
//!
//! These tests verify the full persistence cycle for reviews and the
//! atomic single-use semantics of approval codes and download tokens.

use countersign_domain::traits::{CredentialStore, ReviewFilter, ReviewStore};
use countersign_domain::{
    ApprovalCode, DataMap, DownloadToken, Review, ReviewId, ReviewStatus,
};
use countersign_store::SqliteStore;
use serde_json::json;

fn sample_review(created_by: &str) -> Review {
    let mut data = DataMap::new();
    data.insert("Name".to_string(), json!("Acme"));
    data.insert("Partners".to_string(), json!([{"name": "Ada"}]));
    Review::create("engagement_letter", data, created_by)
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_store_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("countersign.db");

    let review = sample_review("employee-7");
    let id = review.id;
    {
        let store = SqliteStore::new(&path).unwrap();
        store.save_review(&review).unwrap();
    }

    // Reopen and read back
    let store = SqliteStore::new(&path).unwrap();
    let loaded = store.load_review(id).unwrap().unwrap();
    assert_eq!(loaded, review);
}

#[test]
fn test_save_and_load_roundtrip_preserves_audit_order() {
    let store = SqliteStore::new(":memory:").unwrap();

    let mut review = sample_review("employee-7");
    review
        .update_field("Name", json!("Acme2"), "employee-7", None)
        .unwrap();
    review.log_unauthorized_attempt("Locked", Some(json!("x")), "employee-7", None);
    review.submit("employee-7", None).unwrap();

    store.save_review(&review).unwrap();
    let loaded = store.load_review(review.id).unwrap().unwrap();

    assert_eq!(loaded, review);
    assert_eq!(loaded.audit_log.len(), review.audit_log.len());
    for (a, b) in loaded.audit_log.iter().zip(review.audit_log.iter()) {
        assert_eq!(a, b);
    }
}

#[test]
fn test_save_replaces_snapshot() {
    let store = SqliteStore::new(":memory:").unwrap();

    let mut review = sample_review("employee-7");
    store.save_review(&review).unwrap();

    review
        .update_field("Name", json!("Acme2"), "employee-7", None)
        .unwrap();
    store.save_review(&review).unwrap();

    let loaded = store.load_review(review.id).unwrap().unwrap();
    assert_eq!(loaded.data["Name"], json!("Acme2"));
    assert_eq!(loaded.audit_log.len(), 2);
}

#[test]
fn test_load_missing_review() {
    let store = SqliteStore::new(":memory:").unwrap();
    assert!(store.load_review(ReviewId::new()).unwrap().is_none());
    assert!(!store.review_exists(ReviewId::new()).unwrap());
}

#[test]
fn test_list_reviews_newest_first_with_filters() {
    let store = SqliteStore::new(":memory:").unwrap();

    let mut first = sample_review("alice");
    first.created_at = 1000;
    let mut second = sample_review("bob");
    second.created_at = 2000;
    second.submit("bob", None).unwrap();
    let mut third = sample_review("alice");
    third.created_at = 3000;

    store.save_review(&first).unwrap();
    store.save_review(&second).unwrap();
    store.save_review(&third).unwrap();

    let all = store.list_reviews(&ReviewFilter::default()).unwrap();
    let ids: Vec<_> = all.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);

    let drafts = store
        .list_reviews(&ReviewFilter {
            status: Some(ReviewStatus::Draft),
            created_by: None,
        })
        .unwrap();
    assert_eq!(drafts.len(), 2);

    let by_alice = store
        .list_reviews(&ReviewFilter {
            status: None,
            created_by: Some("alice".to_string()),
        })
        .unwrap();
    assert_eq!(by_alice.len(), 2);
    assert!(by_alice.iter().all(|r| r.created_by == "alice"));
}

fn sample_code(review_id: ReviewId, expires_at: u64) -> ApprovalCode {
    ApprovalCode {
        code: "A1B2C3D4".to_string(),
        review_id,
        supervisor_id: "maria".to_string(),
        created_at: 1000,
        expires_at,
        used: false,
        used_at: None,
    }
}

#[test]
fn test_code_roundtrip_and_single_use() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();

    store.put_code(&sample_code(review_id, 5000)).unwrap();
    assert!(store.code_exists("A1B2C3D4").unwrap());

    let code = store.get_code("A1B2C3D4").unwrap().unwrap();
    assert_eq!(code.review_id, review_id);
    assert!(!code.used);

    // First mark succeeds, second fails
    assert!(store.mark_code_used("A1B2C3D4", 2000).unwrap());
    assert!(!store.mark_code_used("A1B2C3D4", 2001).unwrap());

    let code = store.get_code("A1B2C3D4").unwrap().unwrap();
    assert!(code.used);
    assert_eq!(code.used_at, Some(2000));
}

#[test]
fn test_codes_for_review() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();

    let mut a = sample_code(review_id, 5000);
    a.code = "AAAAAAAA".to_string();
    a.created_at = 100;
    let mut b = sample_code(review_id, 5000);
    b.code = "BBBBBBBB".to_string();
    b.created_at = 200;
    let mut other = sample_code(ReviewId::new(), 5000);
    other.code = "CCCCCCCC".to_string();

    store.put_code(&a).unwrap();
    store.put_code(&b).unwrap();
    store.put_code(&other).unwrap();

    let codes = store.codes_for_review(review_id).unwrap();
    let names: Vec<_> = codes.iter().map(|c| c.code.as_str()).collect();
    assert_eq!(names, vec!["BBBBBBBB", "AAAAAAAA"]);
}

#[test]
fn test_purge_keeps_used_codes() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();

    let mut stale = sample_code(review_id, 1500);
    stale.code = "STALE000".to_string();
    let mut spent = sample_code(review_id, 1500);
    spent.code = "SPENT000".to_string();
    let mut live = sample_code(review_id, 9000);
    live.code = "LIVE0000".to_string();

    store.put_code(&stale).unwrap();
    store.put_code(&spent).unwrap();
    store.put_code(&live).unwrap();
    assert!(store.mark_code_used("SPENT000", 1400).unwrap());

    let removed = store.purge_expired_codes(2000).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_code("STALE000").unwrap().is_none());
    // Used codes survive for the audit record
    assert!(store.get_code("SPENT000").unwrap().is_some());
    assert!(store.get_code("LIVE0000").unwrap().is_some());
}

fn sample_token(review_id: ReviewId, expires_at: u64) -> DownloadToken {
    DownloadToken {
        token: "tok".repeat(14),
        review_id,
        created_at: 1000,
        expires_at,
        used: false,
        used_at: None,
    }
}

#[test]
fn test_token_consume_exactly_once() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();
    let token = sample_token(review_id, 5000);

    store.put_token(&token).unwrap();

    assert!(store.consume_token(&token.token, review_id, 2000).unwrap());
    // Same token, same review: spent
    assert!(!store.consume_token(&token.token, review_id, 2001).unwrap());
    // Same token, different review: also fails
    assert!(!store
        .consume_token(&token.token, ReviewId::new(), 2001)
        .unwrap());
}

#[test]
fn test_token_consume_checks_binding_and_expiry() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();
    let token = sample_token(review_id, 5000);
    store.put_token(&token).unwrap();

    // Wrong review never consumes
    assert!(!store
        .consume_token(&token.token, ReviewId::new(), 2000)
        .unwrap());
    // Past expiry never consumes
    assert!(!store.consume_token(&token.token, review_id, 5001).unwrap());
    // Still intact for the valid case
    assert!(store.consume_token(&token.token, review_id, 5000).unwrap());
}

#[test]
fn test_token_restore_after_failed_render() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();
    let token = sample_token(review_id, 5000);
    store.put_token(&token).unwrap();

    assert!(store.consume_token(&token.token, review_id, 2000).unwrap());
    store.restore_token(&token.token).unwrap();

    let restored = store.get_token(&token.token).unwrap().unwrap();
    assert!(!restored.used);
    assert_eq!(restored.used_at, None);

    // Usable again exactly once
    assert!(store.consume_token(&token.token, review_id, 2500).unwrap());
    assert!(!store.consume_token(&token.token, review_id, 2501).unwrap());
}

#[test]
fn test_purge_expired_tokens() {
    let store = SqliteStore::new(":memory:").unwrap();
    let review_id = ReviewId::new();

    let mut stale = sample_token(review_id, 1500);
    stale.token = "stale".to_string();
    let mut live = sample_token(review_id, 9000);
    live.token = "live".to_string();

    store.put_token(&stale).unwrap();
    store.put_token(&live).unwrap();

    let removed = store.purge_expired_tokens(2000).unwrap();
    assert_eq!(removed, 1);
    assert!(store.get_token("stale").unwrap().is_none());
    assert!(store.get_token("live").unwrap().is_some());
}
