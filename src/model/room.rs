use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a pairing room.
///
/// Rendered as `room_<unix-millis>_<sequence>`; the sequence comes from the
/// matchmaker so two rooms of one process never share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(unix_millis: u128, sequence: u64) -> Self {
        RoomId(format!("room_{}_{}", unix_millis, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        RoomId(value.to_string())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        RoomId(value)
    }
}
