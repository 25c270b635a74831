//! Attendee entity definitions

use serde::{Deserialize, Serialize};

/// A roster entry as stored in the `attendees` table.
///
/// Serialises with the application-facing names (`firstName`, `lastName`)
/// while the columns keep their snake_case names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
}

/// Request for inserting a new attendee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendee {
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
}

impl NewAttendee {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        nickname: Option<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            nickname,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeePatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attendee_serializes_with_camel_case_names() {
        let attendee = Attendee {
            id: 7,
            first_name: "Ava".to_string(),
            last_name: "Smith".to_string(),
            nickname: None,
        };

        let json = serde_json::to_value(&attendee).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "firstName": "Ava", "lastName": "Smith", "nickname": null})
        );
    }
}
