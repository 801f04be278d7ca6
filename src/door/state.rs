//! Canonical door state model.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Normalized physical door state, independent of vendor encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CurrentDoorState {
    Open,
    Opening,
    Closing,
    Closed,
    Stopped,
}

impl CurrentDoorState {
    /// Mirror the state for a sensor mounted with reversed polarity.
    pub fn flipped(self) -> Self {
        match self {
            CurrentDoorState::Open => CurrentDoorState::Closed,
            CurrentDoorState::Opening => CurrentDoorState::Closing,
            CurrentDoorState::Closing => CurrentDoorState::Opening,
            CurrentDoorState::Closed => CurrentDoorState::Open,
            CurrentDoorState::Stopped => CurrentDoorState::Stopped,
        }
    }

    /// Whether the door has reached an end position.
    pub fn is_terminal(self) -> bool {
        matches!(self, CurrentDoorState::Open | CurrentDoorState::Closed)
    }
}

/// Desired end state exposed to the consumer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TargetDoorState {
    Open,
    #[strum(to_string = "closed", serialize = "close")]
    Closed,
}

impl TargetDoorState {
    pub fn flipped(self) -> Self {
        match self {
            TargetDoorState::Open => TargetDoorState::Closed,
            TargetDoorState::Closed => TargetDoorState::Open,
        }
    }
}

/// Upward change notification. Emitted only when the value actually changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorEvent {
    CurrentState(CurrentDoorState),
    TargetState(TargetDoorState),
    Obstruction(bool),
}
