use scout_error::{ErrorCode, ErrorContext, ScoutError};
use serde_json::Value;

#[test]
fn test_json_serialization() {
    let error = ScoutError::execution("Table 'deployment' not found")
        .with_context(ErrorContext::TableNotFound {
            table: "deployment".to_string(),
            available_tables: vec!["deployments".to_string(), "services".to_string()],
        })
        .with_hint("Did you mean 'deployments'?");

    let json = error.to_json();

    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["code"], "EXECUTION_ERROR");
    assert_eq!(v["message"], "Table 'deployment' not found");
    assert_eq!(v["hint"], "Did you mean 'deployments'?");
    assert_eq!(v["context"]["type"], "table_not_found");
    assert_eq!(v["context"]["table"], "deployment");
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "PLUGIN_ERROR".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::Plugin);
}

#[test]
fn test_round_trip_without_cause() {
    let error = ScoutError::cancelled("Query cancelled by caller");
    let json = error.to_json();
    let back: ScoutError = serde_json::from_str(&json).expect("valid json");

    assert_eq!(back.code, ErrorCode::PluginCancelled);
    assert!(back.is_cancelled());
}
