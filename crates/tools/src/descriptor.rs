use serde::Serialize;
use serde_json::{json, Value};

/// Name, description and JSON input schema advertised through `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub const ROLL_DICE: &str = "roll_dice";
pub const ATTENDEES_LIST: &str = "attendees_list";
pub const ATTENDEES_INSERT: &str = "attendees_insert";
pub const ATTENDEES_UPDATE_BY_ID: &str = "attendees_update_by_id";

pub const NAME_MAX_LENGTH: usize = 255;

pub fn builtin_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: ROLL_DICE,
            description: "Rolls an N-sided die",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sides": { "type": "integer", "minimum": 2 }
                },
                "required": ["sides"],
                "additionalProperties": false
            }),
        },
        ToolDescriptor {
            name: ATTENDEES_LIST,
            description: "Lists every attendee ordered by id",
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        },
        ToolDescriptor {
            name: ATTENDEES_INSERT,
            description: "Adds an attendee; a nickname is generated when none is given",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "firstName": name_schema(),
                    "lastName": name_schema(),
                    "nickname": { "type": "string", "maxLength": NAME_MAX_LENGTH }
                },
                "required": ["firstName", "lastName"],
                "additionalProperties": false
            }),
        },
        ToolDescriptor {
            name: ATTENDEES_UPDATE_BY_ID,
            description: "Updates the supplied fields of the attendee with the given id",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer", "minimum": 1 },
                    "firstName": name_schema(),
                    "lastName": name_schema(),
                    "nickname": name_schema()
                },
                "required": ["id"],
                "additionalProperties": false
            }),
        },
    ]
}

fn name_schema() -> Value {
    json!({ "type": "string", "minLength": 1, "maxLength": NAME_MAX_LENGTH })
}
