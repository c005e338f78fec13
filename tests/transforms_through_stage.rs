//! Built-in transforms driven through the stage and the in-memory host

use flowstep::transforms::AddUuidField;
use flowstep::{Document, InMemoryHost, StageConfig, TransformRegistry};
use serde_json::json;

fn run(config: &str, input: &str) -> (bool, Vec<u8>) {
    let stage = StageConfig::from_yaml_str(config)
        .unwrap()
        .build_stage(&TransformRegistry::with_builtins())
        .unwrap();
    let host = InMemoryHost::new();
    let id = host.enqueue(input);

    let attempt = stage.process(&host).unwrap();
    (attempt.succeeded(), host.find(id).unwrap().record.content)
}

fn decode(bytes: &[u8]) -> Document {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn test_snake_case_then_dedupe() {
    let config = r#"
transforms:
  - transform: convert_key_case
    args: { case: snake }
  - transform: remove_duplicates
    args: { keys: "order_id" }
"#;
    let input = r#"[
        {"OrderId": 1, "lineTotal": 10},
        {"OrderId": 2, "lineTotal": 20},
        {"OrderId": 1, "lineTotal": 15}
    ]"#;

    let (ok, content) = run(config, input);

    assert!(ok);
    assert_eq!(decode(&content), Document::from(json!([
        {"order_id": 2, "line_total": 20},
        {"order_id": 1, "line_total": 15}
    ])));
}

#[test]
fn test_add_field_with_date() {
    let config = r#"
transforms:
  - transform: add_field
    args:
      field: summary
      template: "${customer.name} @ ${created:date}"
"#;
    let input = r#"{"customer": {"name": "Acme"}, "created": "2024-03-05T10:20:30Z"}"#;

    let (ok, content) = run(config, input);

    assert!(ok);
    assert_eq!(
        decode(&content).get("summary").and_then(|d| d.as_str()),
        Some("Acme @ 2024-03-05 10:20:30")
    );
}

#[test]
fn test_add_uuid_field_is_stable_across_records() {
    let config = r#"
transforms:
  - transform: add_uuid_field
    args:
      field: key
      template: "${region}/${sku}"
"#;

    let (_, first) = run(config, r#"{"region": "eu", "sku": "A-1", "qty": 1}"#);
    let (_, second) = run(config, r#"{"qty": 9, "sku": "A-1", "region": "eu"}"#);

    let expected = "fb6e0bd5-3d2a-1866-1d63-26431491cc9d";
    assert_eq!(AddUuidField::uuid_for("eu/A-1").to_string(), expected);
    assert_eq!(decode(&first).get("key").and_then(|d| d.as_str()), Some(expected));
    assert_eq!(decode(&second).get("key").and_then(|d| d.as_str()), Some(expected));
}

#[test]
fn test_add_field_on_scalar_routes_to_failure() {
    let config = r#"
transforms:
  - transform: add_field
    args: { field: x, template: "y" }
"#;

    let (ok, content) = run(config, "42");

    assert!(!ok);
    assert_eq!(content, b"42".to_vec());
}

#[test]
fn test_legacy_to_lower_flag() {
    let config = r#"
transforms:
  - transform: convert_key_case
    args: { to_lower: "false" }
"#;

    let (ok, content) = run(config, r#"{"mixedKey": {"inner": 1}}"#);

    assert!(ok);
    assert_eq!(decode(&content), Document::from(json!({"MIXEDKEY": {"INNER": 1}})));
}

#[test]
fn test_dedupe_with_scalar_items_routes_to_failure() {
    let config = r#"
transforms:
  - transform: remove_duplicates
    args: { keys: "id" }
"#;

    let (ok, content) = run(config, r#"[1, 2, 3, "x"]"#);

    assert!(!ok);
    assert_eq!(content, br#"[1, 2, 3, "x"]"#.to_vec());
}

#[test]
fn test_dedupe_compares_text_by_default() {
    let config = r#"
transforms:
  - transform: remove_duplicates
    args: { keys: ["sku"] }
"#;

    let (ok, content) = run(config, r#"[{"sku": 7, "n": 1}, {"sku": "7", "n": 2}]"#);

    assert!(ok);
    assert_eq!(decode(&content), Document::from(json!([{"sku": "7", "n": 2}])));
}
