//! Error module tests

use crate::error::{Error, Result};

#[test]
fn test_concept_not_found_error() {
    let error = Error::ConceptNotFound("limits".to_string());
    assert_eq!(error.code(), "E001");
    assert_eq!(
        error.suggestion(),
        Some("skilltree concept list".to_string())
    );
    assert!(error.to_string().contains("limits"));
}

#[test]
fn test_user_not_found_error() {
    let error = Error::UserNotFound("ada".to_string());
    assert_eq!(error.code(), "E002");
    assert_eq!(error.suggestion(), None);
    assert!(error.to_string().contains("ada"));
}

#[test]
fn test_cycle_detected_error() {
    let error = Error::cycle("limits", "derivatives");
    assert_eq!(error.code(), "E100");
    assert_eq!(error.suggestion(), Some("skilltree chain limits".to_string()));
    assert!(error.is_integrity_violation());

    let message = error.to_string();
    assert!(message.contains("'derivatives'"));
    assert!(message.contains("'limits'"));
}

#[test]
fn test_unknown_concept_reference_lists_ids() {
    let error = Error::UnknownConceptReference(vec!["a".into(), "b".into()]);
    assert_eq!(error.code(), "E102");
    assert!(error.is_integrity_violation());
    assert!(error.to_string().contains("a, b"));
}

#[test]
fn test_upstream_errors() {
    let unavailable = Error::UpstreamUnavailable("connection refused".into());
    assert_eq!(unavailable.code(), "E200");
    assert!(unavailable.suggestion().unwrap().contains("SKILLTREE_API_KEY"));
    assert!(!unavailable.is_integrity_violation());

    let failed = Error::ExtractionFailed("not JSON".into());
    assert_eq!(failed.code(), "E201");
    assert_eq!(failed.suggestion(), None);
}

#[test]
fn test_timeout_errors() {
    assert_eq!(Error::LockTimeout("concept:limits".into()).code(), "E300");
    assert_eq!(Error::StoreTimeout("get".into()).code(), "E301");
    assert!(
        Error::LockTimeout("structure".into())
            .to_string()
            .contains("Try again later")
    );
}

#[test]
fn test_config_error() {
    let error = Error::ConfigError("bad rules".into());
    assert_eq!(error.code(), "E600");
    assert_eq!(error.suggestion(), Some("skilltree config list".to_string()));
}

#[test]
fn test_generic_errors_share_code() {
    let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
    assert_eq!(io.code(), "E9999");
    assert_eq!(Error::Other("x".into()).code(), "E9999");
}

#[test]
fn test_serde_error_converts() {
    fn parse() -> Result<serde_json::Value> {
        Ok(serde_json::from_str("{")?)
    }
    let error = parse().unwrap_err();
    assert!(matches!(error, Error::Serialization(_)));
}

#[tokio::test]
async fn test_database_error_converts() {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    let result: std::result::Result<(i64,), sqlx::Error> =
        sqlx::query_as("SELECT * FROM missing_table").fetch_one(&pool).await;
    let error: Error = result.unwrap_err().into();
    assert_eq!(error.code(), "E400");
}
