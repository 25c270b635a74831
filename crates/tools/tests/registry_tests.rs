use regex::Regex;
use roster_config::DatabaseConfig;
use roster_database::{initialize_database, AttendeeRepository};
use roster_tools::{ToolError, ToolRegistry};
use serde_json::{json, Value};
use tempfile::TempDir;

async fn setup() -> (ToolRegistry, AttendeeRepository, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("tools.db").display()),
        max_connections: 1,
    };
    let pool = initialize_database(&config).await.unwrap();
    let repository = AttendeeRepository::new(pool);
    (ToolRegistry::new(repository.clone()), repository, temp_dir)
}

fn structured(output: &roster_tools::ToolOutput) -> Value {
    output.structured_content.clone().expect("structured content")
}

fn invalid_message(error: ToolError) -> String {
    match error {
        ToolError::InvalidArguments { message, .. } => message,
        other => panic!("expected invalid arguments, got {other:?}"),
    }
}

#[tokio::test]
async fn descriptors_cover_the_four_tools() {
    let (registry, _repo, _dir) = setup().await;
    let names: Vec<&str> = registry.descriptors().iter().map(|d| d.name).collect();

    assert_eq!(
        names,
        ["roll_dice", "attendees_list", "attendees_insert", "attendees_update_by_id"]
    );
    let dice = registry.descriptor("roll_dice").unwrap();
    assert_eq!(dice.input_schema["properties"]["sides"]["minimum"], 2);
}

#[tokio::test]
async fn roll_dice_returns_value_in_range() {
    let (registry, _repo, _dir) = setup().await;
    let pattern = Regex::new(r"^🎲 You rolled a (\d+)!$").unwrap();

    for _ in 0..50 {
        let output = registry.call("roll_dice", &json!({"sides": 6})).await.unwrap();
        let text = output.joined_text();
        let captures = pattern.captures(&text).expect("dice text");
        let value: i64 = captures[1].parse().unwrap();
        assert!((1..=6).contains(&value));
        assert!(!output.is_error);
    }
}

#[tokio::test]
async fn roll_dice_rejects_bad_sides() {
    let (registry, _repo, _dir) = setup().await;

    let too_small = registry.call("roll_dice", &json!({"sides": 1})).await.unwrap_err();
    assert!(invalid_message(too_small).contains("sides"));

    let fractional = registry.call("roll_dice", &json!({"sides": 2.5})).await.unwrap_err();
    assert!(invalid_message(fractional).contains("integer"));

    let missing = registry.call("roll_dice", &json!({})).await.unwrap_err();
    assert!(invalid_message(missing).contains("required"));
}

#[tokio::test]
async fn unknown_tool_is_reported() {
    let (registry, _repo, _dir) = setup().await;
    let err = registry.call("delete_everything", &json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::UnknownTool(name) if name == "delete_everything"));
}

#[tokio::test]
async fn insert_list_update_scenario() {
    let (registry, _repo, _dir) = setup().await;

    let inserted = registry
        .call("attendees_insert", &json!({"firstName": "Ava", "lastName": "Smith"}))
        .await
        .unwrap();
    let attendee = structured(&inserted);
    let nickname = attendee["nickname"].as_str().unwrap().to_string();
    assert!(Regex::new(r"^ava-smith-\d{4}$").unwrap().is_match(&nickname));
    let id = attendee["id"].as_i64().unwrap();

    let listed = registry.call("attendees_list", &Value::Null).await.unwrap();
    let rows = structured(&listed)["attendees"].as_array().unwrap().clone();
    assert!(rows.iter().any(|row| row["id"] == id && row["firstName"] == "Ava"));

    let updated = registry
        .call("attendees_update_by_id", &json!({"id": id, "lastName": "Jones"}))
        .await
        .unwrap();
    let row = structured(&updated);
    assert_eq!(row["firstName"], "Ava");
    assert_eq!(row["lastName"], "Jones");
    assert_eq!(row["nickname"], nickname.as_str());
}

#[tokio::test]
async fn explicit_nickname_is_stored_verbatim() {
    let (registry, repo, _dir) = setup().await;

    registry
        .call(
            "attendees_insert",
            &json!({"firstName": "Liam", "lastName": "Brown", "nickname": "Captain L"}),
        )
        .await
        .unwrap();

    let rows = repo.list().await.unwrap();
    assert_eq!(rows[0].nickname.as_deref(), Some("Captain L"));
}

#[tokio::test]
async fn blank_nickname_is_synthesized() {
    let (registry, _repo, _dir) = setup().await;

    let output = registry
        .call(
            "attendees_insert",
            &json!({"firstName": "Mary Ann", "lastName": "O'Neil", "nickname": "   "}),
        )
        .await
        .unwrap();

    let nickname = structured(&output)["nickname"].as_str().unwrap().to_string();
    assert!(Regex::new(r"^mary-ann-o-neil-\d{4}$").unwrap().is_match(&nickname));
}

#[tokio::test]
async fn invalid_insert_touches_nothing() {
    let (registry, repo, _dir) = setup().await;

    let err = registry
        .call("attendees_insert", &json!({"firstName": "", "lastName": "Smith"}))
        .await
        .unwrap_err();

    assert!(invalid_message(err).contains("firstName"));
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn update_of_missing_id_is_a_normal_result() {
    let (registry, repo, _dir) = setup().await;
    registry
        .call("attendees_insert", &json!({"firstName": "Mia", "lastName": "Davis", "nickname": "md"}))
        .await
        .unwrap();
    let before = repo.list().await.unwrap();

    let output = registry
        .call("attendees_update_by_id", &json!({"id": 999, "firstName": "Zed"}))
        .await
        .unwrap();

    assert!(!output.is_error);
    assert_eq!(output.joined_text(), "No attendee found with id 999");
    assert!(output.structured_content.is_none());
    assert_eq!(repo.list().await.unwrap(), before);
}

#[tokio::test]
async fn update_rejects_non_positive_id() {
    let (registry, _repo, _dir) = setup().await;

    let err = registry
        .call("attendees_update_by_id", &json!({"id": 0}))
        .await
        .unwrap_err();

    assert!(invalid_message(err).contains("id"));
}
