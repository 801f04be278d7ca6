//! Vendor encoding translators.
//!
//! Pure mappings between raw datapoint values and the canonical door model.
//! Unknown encodings map to `None`; the caller decides how to report them.

use super::profile::VendorKind;
use super::state::{CurrentDoorState, TargetDoorState};
use crate::datapoint::DpValue;

// Kogan status strings. "openning" is a firmware misspelling seen in the wild.
const STATUS_OPENED: &str = "opened";
const STATUS_OPENNING: &str = "openning";
const STATUS_OPENING: &str = "opening";
const STATUS_CLOSING: &str = "closing";
const STATUS_CLOSED: &str = "closed";

// Kogan action strings.
const ACTION_OPEN: &str = "open";
const ACTION_CLOSE: &str = "close";

/// Sentinel alarm value meaning "no alarm".
const ALARM_NONE: &str = "none";

/// Translate a raw status value into the canonical state, applying polarity last.
pub fn to_canonical(
    vendor: VendorKind,
    raw: &DpValue,
    flip_state: bool,
) -> Option<CurrentDoorState> {
    let state = if vendor.uses_boolean_status() {
        match raw.as_bool()? {
            true => CurrentDoorState::Open,
            false => CurrentDoorState::Closed,
        }
    } else {
        match raw.as_str()? {
            STATUS_OPENED => CurrentDoorState::Open,
            STATUS_OPENNING | STATUS_OPENING => CurrentDoorState::Opening,
            STATUS_CLOSING => CurrentDoorState::Closing,
            STATUS_CLOSED => CurrentDoorState::Closed,
            _ => return None,
        }
    };

    Some(if flip_state { state.flipped() } else { state })
}

/// Target state implied by a canonical state.
///
/// A stopped door is reported as open, matching the stop-in-place convention.
pub fn to_target(current: CurrentDoorState) -> TargetDoorState {
    match current {
        CurrentDoorState::Open | CurrentDoorState::Opening | CurrentDoorState::Stopped => {
            TargetDoorState::Open
        }
        CurrentDoorState::Closed | CurrentDoorState::Closing => TargetDoorState::Closed,
    }
}

/// Command value that moves the door toward `target`, given in device space.
pub fn from_target(vendor: VendorKind, target: TargetDoorState) -> DpValue {
    if vendor.uses_boolean_status() {
        DpValue::Bool(target == TargetDoorState::Open)
    } else {
        match target {
            TargetDoorState::Open => DpValue::from(ACTION_OPEN),
            TargetDoorState::Closed => DpValue::from(ACTION_CLOSE),
        }
    }
}

/// The single toggle value sent to halt a door that is already moving.
pub fn activate_command(vendor: VendorKind, target: TargetDoorState) -> DpValue {
    if vendor.uses_boolean_status() {
        DpValue::Bool(true)
    } else {
        from_target(vendor, target)
    }
}

/// Map a target exposed upward into the device's own polarity.
pub fn to_device_target(target: TargetDoorState, flip_state: bool) -> TargetDoorState {
    if flip_state { target.flipped() } else { target }
}

/// Whether an alarm value signals an obstruction.
///
/// Missing, empty, `false` and zero values count as the "none" sentinel.
pub fn to_obstructed(raw: Option<&DpValue>) -> bool {
    let value = match raw {
        None => return false,
        Some(DpValue::Bool(false)) | Some(DpValue::Integer(0)) => return false,
        Some(DpValue::Float(f)) if *f == 0.0 => return false,
        Some(v) => v.to_string(),
    };

    let value = value.to_lowercase();
    !value.is_empty() && value != ALARM_NONE
}
