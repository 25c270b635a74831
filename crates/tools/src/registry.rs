//! Dispatch of tool calls by name.

use rand::Rng;
use roster_database::{AttendeePatch, AttendeeRepository, NewAttendee};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::content::ToolOutput;
use crate::descriptor::{
    builtin_descriptors, ToolDescriptor, ATTENDEES_INSERT, ATTENDEES_LIST, ATTENDEES_UPDATE_BY_ID,
    NAME_MAX_LENGTH, ROLL_DICE,
};
use crate::error::{ToolError, ToolResult};
use crate::nickname::synthesize_nickname;
use crate::validation::{Arguments, Validator};

/// The four roster tools bound to an attendee store.
#[derive(Clone)]
pub struct ToolRegistry {
    attendees: AttendeeRepository,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(attendees: AttendeeRepository) -> Self {
        Self {
            attendees,
            descriptors: builtin_descriptors(),
        }
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|descriptor| descriptor.name == name)
    }

    /// Validate `arguments` for `name` and run the tool.
    ///
    /// Validation completes before any store access or randomness.
    pub async fn call(&self, name: &str, arguments: &Value) -> ToolResult<ToolOutput> {
        debug!(tool = name, "tool call received");

        let result = match name {
            ROLL_DICE => self.roll_dice(arguments),
            ATTENDEES_LIST => self.list(arguments).await,
            ATTENDEES_INSERT => self.insert(arguments).await,
            ATTENDEES_UPDATE_BY_ID => self.update_by_id(arguments).await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        };

        if let Err(error) = &result {
            warn!(tool = name, %error, "tool call failed");
        }
        result
    }

    fn roll_dice(&self, raw: &Value) -> ToolResult<ToolOutput> {
        let args = Arguments::parse(ROLL_DICE, raw)?;
        args.deny_unknown(&["sides"])?;
        let sides = args.required_integer("sides")?;
        Validator::minimum(ROLL_DICE, "sides", sides, 2)?;

        let value = roll_dice_with(&mut rand::thread_rng(), sides);
        Ok(ToolOutput::text(format!("🎲 You rolled a {value}!")))
    }

    async fn list(&self, raw: &Value) -> ToolResult<ToolOutput> {
        Arguments::parse(ATTENDEES_LIST, raw)?.deny_unknown(&[])?;

        let attendees = self.attendees.list().await?;
        Ok(ToolOutput::json("attendees", to_json(&attendees)))
    }

    async fn insert(&self, raw: &Value) -> ToolResult<ToolOutput> {
        let args = Arguments::parse(ATTENDEES_INSERT, raw)?;
        args.deny_unknown(&["firstName", "lastName", "nickname"])?;
        let first_name = args.required_string("firstName")?;
        let last_name = args.required_string("lastName")?;
        Validator::name(ATTENDEES_INSERT, "firstName", first_name, NAME_MAX_LENGTH)?;
        Validator::name(ATTENDEES_INSERT, "lastName", last_name, NAME_MAX_LENGTH)?;

        let nickname = match args.optional_string("nickname")? {
            Some(nickname) if !nickname.trim().is_empty() => {
                Validator::name(ATTENDEES_INSERT, "nickname", nickname, NAME_MAX_LENGTH)?;
                nickname.to_string()
            }
            _ => synthesize_nickname(first_name, last_name),
        };

        let attendee = self
            .attendees
            .insert(&NewAttendee::new(first_name, last_name, Some(nickname)))
            .await?;
        info!(attendee_id = attendee.id, "attendee added via tool call");
        Ok(ToolOutput::json("attendee", to_json(&attendee)))
    }

    async fn update_by_id(&self, raw: &Value) -> ToolResult<ToolOutput> {
        let args = Arguments::parse(ATTENDEES_UPDATE_BY_ID, raw)?;
        args.deny_unknown(&["id", "firstName", "lastName", "nickname"])?;
        let id = args.required_integer("id")?;
        Validator::minimum(ATTENDEES_UPDATE_BY_ID, "id", id, 1)?;

        let mut patch = AttendeePatch::default();
        for (key, slot) in [
            ("firstName", &mut patch.first_name),
            ("lastName", &mut patch.last_name),
            ("nickname", &mut patch.nickname),
        ] {
            if let Some(value) = args.optional_string(key)? {
                Validator::name(ATTENDEES_UPDATE_BY_ID, key, value, NAME_MAX_LENGTH)?;
                *slot = Some(value.to_string());
            }
        }

        match self.attendees.update_by_id(id, &patch).await? {
            Some(attendee) => Ok(ToolOutput::json("attendee", to_json(&attendee))),
            None => Ok(ToolOutput::text(format!("No attendee found with id {id}"))),
        }
    }
}

/// Uniform roll in `1..=sides`.
pub fn roll_dice_with<R: Rng + ?Sized>(rng: &mut R, sides: i64) -> i64 {
    rng.gen_range(1..=sides)
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
