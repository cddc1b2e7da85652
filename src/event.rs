//! Telemetry events routed through the queues
//!
//! Only [`Event::command`] and [`Event::key`] matter to the routers; the rest
//! of the payload is carried along untouched.

use crate::queue::error::{QueueError, QueueResult};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Kind of telemetry carried by an [`Event`]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum Command {
    /// New machine mode
    MachineMode = 0,
    /// Value of a CNC field, the key being the field code
    CncValue = 1,
    /// New stamp to process
    Stamp = 2,
    /// Other action, like StartCycle, StopCycle or StopIsoFile
    Action = 3,
    /// Stop recording a CNC value because it is not valid any more
    StopCncValue = 5,
    /// CNC alarm
    CncAlarm = 7,
    /// Neutral time stamp telling the acquisition is still active
    DetectionTimeStamp = 8,
    /// Machine mode attached to a specific machine module
    MachineModuleActivity = 9,
    /// CNC variable set
    CncVariableSet = 10,
    /// Sequence milestone
    SequenceMilestone = 11,
}

impl Command {
    /// Every command kind, in declaration order
    pub fn all() -> Vec<Command> {
        Command::iter().collect()
    }

    /// Whether the key of this command is a field code
    pub fn is_value(self) -> bool {
        matches!(self, Command::CncValue | Command::StopCncValue)
    }

    /// Parse a command filter such as `"MachineMode|CncAlarm"`
    ///
    /// Entries are separated by `|`, `,` or `;`. A filter without any entry
    /// selects every command.
    pub fn parse_filter(filter: &str) -> QueueResult<Vec<Command>> {
        let mut commands = Vec::new();
        for entry in filter.split(['|', ',', ';']) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let command =
                Command::from_str(entry).map_err(|_| QueueError::InvalidCommandFilter {
                    filter: filter.to_string(),
                    entry: entry.to_string(),
                })?;
            if !commands.contains(&command) {
                commands.push(command);
            }
        }

        if commands.is_empty() {
            Ok(Command::all())
        } else {
            Ok(commands)
        }
    }
}

/// Key of a start cycle action
pub const ACTION_START_CYCLE: &str = "StartCycle";
/// Key of a stop cycle action
pub const ACTION_STOP_CYCLE: &str = "StopCycle";
/// Key of a stop ISO file action
pub const ACTION_STOP_ISO_FILE: &str = "StopIsoFile";
/// Key of a machine mode given by its id
pub const MACHINE_MODE_ID: &str = "Id";

/// A single telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub machine_id: i32,
    pub machine_module_id: i32,
    pub date_time: DateTime<Utc>,
    pub command: Command,
    /// Field code for value commands, action name for actions, ...
    pub key: Option<String>,
    pub value: serde_json::Value,
}

impl Event {
    /// Create an event; the date/time is truncated to the second
    pub fn new(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        command: Command,
        key: Option<String>,
        value: serde_json::Value,
    ) -> Self {
        let date_time = date_time
            .duration_trunc(TimeDelta::seconds(1))
            .unwrap_or(date_time);
        Self {
            machine_id,
            machine_module_id,
            date_time,
            command,
            key,
            value,
        }
    }

    pub fn machine_mode(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        machine_mode_id: i64,
    ) -> Self {
        Self::new(
            machine_id,
            machine_module_id,
            date_time,
            Command::MachineMode,
            Some(MACHINE_MODE_ID.to_string()),
            serde_json::Value::from(machine_mode_id),
        )
    }

    pub fn cnc_value(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        field: &str,
        value: serde_json::Value,
    ) -> Self {
        Self::new(
            machine_id,
            machine_module_id,
            date_time,
            Command::CncValue,
            Some(field.to_string()),
            value,
        )
    }

    pub fn stop_cnc_value(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        field: &str,
    ) -> Self {
        Self::new(
            machine_id,
            machine_module_id,
            date_time,
            Command::StopCncValue,
            Some(field.to_string()),
            serde_json::Value::Null,
        )
    }

    pub fn alarm(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        alarm: serde_json::Value,
    ) -> Self {
        Self::new(
            machine_id,
            machine_module_id,
            date_time,
            Command::CncAlarm,
            None,
            alarm,
        )
    }

    pub fn action(
        machine_id: i32,
        machine_module_id: i32,
        date_time: DateTime<Utc>,
        action: &str,
        value: serde_json::Value,
    ) -> Self {
        Self::new(
            machine_id,
            machine_module_id,
            date_time,
            Command::Action,
            Some(action.to_string()),
            value,
        )
    }

    /// Subject of the field-key filters: the key, or `""` when absent
    pub fn routing_key(&self) -> &str {
        self.key.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[Event MachineModuleId={} Command={} Key={} Value={} Date={}]",
            self.machine_module_id,
            self.command,
            self.routing_key(),
            self.value,
            self.date_time.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}
