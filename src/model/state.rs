// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Climate device operating state and state diffing.
//!
//! [`DeviceState`] is an immutable value type: updates always produce a new
//! instance, either by replacing the whole state (full-state snapshot) or by
//! copying with field overrides ([`DeviceState::patched`]). This keeps a
//! diff against the previous instance valid at all times.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Operating state of a climate device.
///
/// Fields mirror the cloud wire schema one-to-one. The `heater` device
/// family omits some fields in its snapshots; serde defaults fill those in
/// so that diffing never has to deal with absent fields. The all-default
/// instance (see [`DeviceState::default`]) is the "nothing observed yet"
/// sentinel a session starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    /// Whether the device is powered on.
    pub power_on: bool,
    /// Operating mode, e.g. `"normal"`.
    pub mode: String,
    /// Measured temperature in degrees Celsius.
    pub current_temperature: i64,
    /// Requested temperature in degrees Celsius.
    pub target_temperature: i64,
    /// Fan speed step.
    pub fan_speed: i64,
    /// Whether oscillation is enabled.
    pub oscillate: bool,
    /// Remaining timer in minutes.
    pub timer: i64,
    /// Active device error codes.
    pub error: Vec<String>,
    /// Heating element status, e.g. `"idle"`.
    pub heat_status: String,
    /// Whether vent heating is active.
    pub vent_heat: bool,
    /// Whether silent mode is active.
    pub silent: bool,
    /// Whether the heating element is selected (as opposed to cooling).
    pub heater: bool,
    /// Modes reported by the external sensor.
    pub ext_mode: Vec<String>,
    /// Measured temperature mirrored from the external sensor.
    pub ext_current_temperature: i64,
    /// Target temperature mirrored from the external sensor.
    pub ext_target_temperature: i64,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            power_on: false,
            mode: "normal".to_string(),
            current_temperature: 0,
            target_temperature: 0,
            fan_speed: 0,
            oscillate: false,
            timer: 0,
            error: Vec::new(),
            heat_status: "idle".to_string(),
            vent_heat: false,
            silent: false,
            heater: false,
            ext_mode: Vec::new(),
            ext_current_temperature: 0,
            ext_target_temperature: 0,
        }
    }
}

/// Runs a macro over every state field in declaration order.
///
/// Declaration order is load-bearing: diffs report changes in this order.
macro_rules! for_each_field {
    ($mac:ident, $($args:tt)*) => {
        $mac!(power_on, $($args)*);
        $mac!(mode, $($args)*);
        $mac!(current_temperature, $($args)*);
        $mac!(target_temperature, $($args)*);
        $mac!(fan_speed, $($args)*);
        $mac!(oscillate, $($args)*);
        $mac!(timer, $($args)*);
        $mac!(error, $($args)*);
        $mac!(heat_status, $($args)*);
        $mac!(vent_heat, $($args)*);
        $mac!(silent, $($args)*);
        $mac!(heater, $($args)*);
        $mac!(ext_mode, $($args)*);
        $mac!(ext_current_temperature, $($args)*);
        $mac!(ext_target_temperature, $($args)*);
    };
}

impl DeviceState {
    /// Creates the sentinel "nothing observed yet" state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this state with the named fields overridden.
    ///
    /// Field names that are not part of the schema, and values of the wrong
    /// JSON type, are silently ignored: vendor firmware is free to invent
    /// fields and must not be able to take the session down. Applying the
    /// same override map twice yields the same state as applying it once.
    #[must_use]
    pub fn patched(&self, overrides: &Map<String, Value>) -> Self {
        let mut next = self.clone();
        for (field, value) in overrides {
            next.set_field(field, value);
        }
        next
    }

    /// Computes the ordered field-level difference between `self` and `newer`.
    ///
    /// One entry per field whose values differ, in field declaration order.
    /// `diff(a, a)` is empty.
    #[must_use]
    pub fn diff(&self, newer: &Self) -> StateDiff {
        let mut changes = Vec::new();

        macro_rules! compare {
            ($field:ident, $old:expr, $new:expr, $out:expr) => {
                if $old.$field != $new.$field {
                    $out.push(FieldChange {
                        field: stringify!($field),
                        old: json!($old.$field),
                        new: json!($new.$field),
                    });
                }
            };
        }
        for_each_field!(compare, self, newer, changes);

        StateDiff { changes }
    }

    fn set_field(&mut self, field: &str, value: &Value) {
        match field {
            "power_on" => {
                if let Some(v) = value.as_bool() {
                    self.power_on = v;
                }
            }
            "mode" => {
                if let Some(v) = value.as_str() {
                    self.mode = v.to_string();
                }
            }
            "current_temperature" => {
                if let Some(v) = value.as_i64() {
                    self.current_temperature = v;
                }
            }
            "target_temperature" => {
                if let Some(v) = value.as_i64() {
                    self.target_temperature = v;
                }
            }
            "fan_speed" => {
                if let Some(v) = value.as_i64() {
                    self.fan_speed = v;
                }
            }
            "oscillate" => {
                if let Some(v) = value.as_bool() {
                    self.oscillate = v;
                }
            }
            "timer" => {
                if let Some(v) = value.as_i64() {
                    self.timer = v;
                }
            }
            "error" => {
                if let Some(v) = string_list(value) {
                    self.error = v;
                }
            }
            "heat_status" => {
                if let Some(v) = value.as_str() {
                    self.heat_status = v.to_string();
                }
            }
            "vent_heat" => {
                if let Some(v) = value.as_bool() {
                    self.vent_heat = v;
                }
            }
            "silent" => {
                if let Some(v) = value.as_bool() {
                    self.silent = v;
                }
            }
            "heater" => {
                if let Some(v) = value.as_bool() {
                    self.heater = v;
                }
            }
            "ext_mode" => {
                if let Some(v) = string_list(value) {
                    self.ext_mode = v;
                }
            }
            "ext_current_temperature" => {
                if let Some(v) = value.as_i64() {
                    self.ext_current_temperature = v;
                }
            }
            "ext_target_temperature" => {
                if let Some(v) = value.as_i64() {
                    self.ext_target_temperature = v;
                }
            }
            unknown => {
                tracing::debug!(field = unknown, "ignoring unknown state field");
            }
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect()
    })
}

/// One field-level difference between two states.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// The schema name of the field.
    pub field: &'static str,
    /// The value before the transition.
    pub old: Value,
    /// The value after the transition.
    pub new: Value,
}

/// An ordered list of field changes describing a state transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDiff {
    /// Changes in field declaration order.
    pub changes: Vec<FieldChange>,
}

impl StateDiff {
    /// Returns `true` if no field changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }
}

impl std::fmt::Display for StateDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for change in &self.changes {
            write!(f, "{}: {} -> {}, ", change.field, change.old, change.new)?;
        }
        Ok(())
    }
}
