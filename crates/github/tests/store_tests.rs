//! Tests for the GitHub cache store's response handling and context resolution

use cachequota_github::{GitHubContext, check_status, parse_page, store_from_context};

const LISTING: &str = r#"{
  "total_count": 2,
  "actions_caches": [
    {
      "id": 505,
      "ref": "refs/heads/main",
      "key": "Linux-node-958aff96db2d75d67787d1e634ae70b659de937b",
      "version": "73885106f58cc52a7df9ec4d4a5622a5614813162cb516c759a30af6bf56e6f0",
      "last_accessed_at": "2019-01-24T22:45:36.000Z",
      "created_at": "2019-01-24T22:45:36.000Z",
      "size_in_bytes": 1024
    },
    {
      "id": 506,
      "ref": "refs/pull/7/merge",
      "key": "Linux-cargo-abc",
      "version": "73885106f58cc52a7df9ec4d4a5622a5614813162cb516c759a30af6bf56e6f1",
      "last_accessed_at": "2019-01-23T10:00:00.000Z",
      "created_at": "2019-01-20T10:00:00.000Z",
      "size_in_bytes": 536870912
    }
  ]
}"#;

#[test]
fn test_parse_listing_page() {
    let page = parse_page(LISTING).unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.actions_caches.len(), 2);

    let first = &page.actions_caches[0];
    assert_eq!(first.id, 505);
    assert_eq!(first.size_bytes, 1024);
    assert_eq!(first.git_ref.as_deref(), Some("refs/heads/main"));
    assert!(first.last_accessed_at.is_some());

    let second = &page.actions_caches[1];
    assert_eq!(second.key, "Linux-cargo-abc");
    assert_eq!(second.size_bytes, 512 * 1024 * 1024);
    assert!(second.recency() < first.recency());
}

#[test]
fn test_parse_empty_listing() {
    let page = parse_page(r#"{"total_count": 0, "actions_caches": []}"#).unwrap();
    assert_eq!(page.total_count, 0);
    assert!(page.actions_caches.is_empty());

    let page = parse_page(r#"{"total_count": 0}"#).unwrap();
    assert!(page.actions_caches.is_empty());
}

#[test]
fn test_parse_malformed_listing() {
    let err = parse_page("<html>bad gateway</html>").unwrap_err();
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("Invalid cache listing"));

    assert!(parse_page(r#"{"actions_caches": []}"#).is_err());
}

#[test]
fn test_status_classification() {
    assert!(check_status(204, "", "actions/caches/1").is_ok());
    assert!(check_status(404, "", "actions/caches/1").unwrap_err().is_not_found());
    assert!(check_status(502, "bad gateway", "r").unwrap_err().is_retryable());
    assert!(check_status(429, "{}", "r").unwrap_err().is_retryable());
    assert!(!check_status(401, r#"{"message":"Bad credentials"}"#, "r")
        .unwrap_err()
        .is_retryable());
}

#[test]
fn test_resolve_with_enterprise_api_url() {
    let context = GitHubContext::resolve(
        "octo-org/octo-repo",
        "ghs_example",
        Some("https://ghe.example.com/api/v3".to_string()),
    )
    .unwrap();
    assert_eq!(context.owner, "octo-org");
    assert_eq!(context.repo, "octo-repo");
    assert_eq!(context.token, "ghs_example");
    assert_eq!(context.api_url, "https://ghe.example.com/api/v3");
}

#[test]
fn test_resolve_rejects_malformed_repository() {
    let err = GitHubContext::resolve("octo-repo", "ghs_example", None).unwrap_err();
    assert!(err.contains("expected owner/repo"));
}

#[test]
fn test_missing_token_yields_unavailable_store() {
    let store = store_from_context(GitHubContext::resolve("o/r", "", None));
    assert_eq!(store.scope(), "unavailable");
}

#[tokio::test]
async fn test_store_scope_names_repository() {
    let context = GitHubContext::new("octo-org/octo-repo", "ghs_example", None).unwrap();
    let store = store_from_context(Ok(context));
    assert_eq!(store.scope(), "github:octo-org/octo-repo");
}
