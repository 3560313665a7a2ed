// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound frame construction.
//!
//! Everything the client ever writes to the websocket is built here: the
//! two handshake frames ([`hello`] and [`subscribe`]) and the control
//! commands. A control [`Command`] maps to exactly one `replace` operation
//! on exactly one `/state/<field>` path inside a `json_patch` frame.
//!
//! Building a frame is pure and cannot fail at runtime: all inputs are
//! plain owned data, and serialization of the fixed shapes is infallible.
//!
//! # Examples
//!
//! ```
//! use hwclimate::command::Command;
//!
//! let frame = Command::SetFanSpeed(3).to_frame("hw-1234");
//! assert!(frame.contains("/state/fan_speed"));
//! ```

use serde_json::{Value, json};

/// Client identification sent in the `hello` frame.
const SOURCE: &str = "https://codeberg.org/hwclimate/hwclimate";

/// Protocol compatibility marker expected by the cloud endpoint.
const COMPATIBILITY: u8 = 4;

/// Builds the `hello` frame that opens every websocket session.
///
/// Carries the current bearer token and the protocol compatibility marker.
#[must_use]
pub fn hello(token: &str) -> String {
    json!({
        "message_id": "hello",
        "token": token,
        "type": "hello",
        "source": SOURCE,
        "compatibility": COMPATIBILITY,
    })
    .to_string()
}

/// Builds the `subscribe_device` frame for the target device.
#[must_use]
pub fn subscribe(device_id: &str) -> String {
    json!({
        "type": "subscribe_device",
        "device": device_id,
        "message_id": "subscribe",
    })
    .to_string()
}

/// A control operation on a climate device.
///
/// Each variant patches a single state field. The session exposes one
/// convenience method per variant; this enum is the single source of truth
/// for the wire mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Power the device on or off.
    Power(bool),
    /// Set the fan speed step.
    SetFanSpeed(i64),
    /// Set the target temperature in degrees Celsius.
    SetTargetTemperature(i64),
    /// Select the heating element (`true`) or cooling (`false`).
    Heater(bool),
    /// Enable or disable oscillation.
    Oscillate(bool),
    /// Switch the operating mode.
    SetMode(String),
}

impl Command {
    /// Returns the patched `/state/<field>` path.
    #[must_use]
    pub fn field_path(&self) -> &'static str {
        match self {
            Self::Power(_) => "/state/power_on",
            Self::SetFanSpeed(_) => "/state/fan_speed",
            Self::SetTargetTemperature(_) => "/state/target_temperature",
            Self::Heater(_) => "/state/heater",
            Self::Oscillate(_) => "/state/oscillate",
            Self::SetMode(_) => "/state/mode",
        }
    }

    /// Returns the replacement value for the patched field.
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Power(v) | Self::Heater(v) | Self::Oscillate(v) => json!(v),
            Self::SetFanSpeed(v) | Self::SetTargetTemperature(v) => json!(v),
            Self::SetMode(mode) => json!(mode),
        }
    }

    /// Returns the `message_id` attached to the frame, if any.
    ///
    /// Only power commands carry one; the cloud echoes it back in its
    /// `response` frame.
    #[must_use]
    pub fn message_id(&self) -> Option<&'static str> {
        match self {
            Self::Power(true) => Some("turn_on"),
            Self::Power(false) => Some("turn_off"),
            _ => None,
        }
    }

    /// Serializes this command into a `json_patch` frame for `device_id`.
    #[must_use]
    pub fn to_frame(&self, device_id: &str) -> String {
        let mut frame = json!({
            "device": device_id,
            "type": "json_patch",
            "patch": [{
                "op": "replace",
                "path": self.field_path(),
                "value": self.value(),
            }],
        });
        if let Some(id) = self.message_id()
            && let Some(obj) = frame.as_object_mut()
        {
            obj.insert("message_id".to_string(), json!(id));
        }
        frame.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(frame: &str) -> Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn hello_frame_shape() {
        let frame = parse(&hello("secret-token"));
        assert_eq!(frame["message_id"], "hello");
        assert_eq!(frame["type"], "hello");
        assert_eq!(frame["token"], "secret-token");
        assert_eq!(frame["compatibility"], 4);
        assert!(frame["source"].is_string());
    }

    #[test]
    fn subscribe_frame_shape() {
        let frame = parse(&subscribe("hw-1234"));
        assert_eq!(frame["type"], "subscribe_device");
        assert_eq!(frame["device"], "hw-1234");
        assert_eq!(frame["message_id"], "subscribe");
    }

    #[test]
    fn every_command_patches_exactly_one_field() {
        let commands = [
            Command::Power(true),
            Command::Power(false),
            Command::SetFanSpeed(3),
            Command::SetTargetTemperature(21),
            Command::Heater(true),
            Command::Heater(false),
            Command::Oscillate(true),
            Command::SetMode("silent".to_string()),
        ];

        for cmd in commands {
            let frame = parse(&cmd.to_frame("hw-1"));
            assert_eq!(frame["type"], "json_patch");
            assert_eq!(frame["device"], "hw-1");
            let patch = frame["patch"].as_array().unwrap();
            assert_eq!(patch.len(), 1, "{cmd:?} must produce one patch op");
            assert_eq!(patch[0]["op"], "replace");
            assert!(
                patch[0]["path"]
                    .as_str()
                    .unwrap()
                    .starts_with("/state/")
            );
        }
    }

    #[test]
    fn power_commands_carry_message_ids() {
        let on = parse(&Command::Power(true).to_frame("hw-1"));
        assert_eq!(on["message_id"], "turn_on");
        assert_eq!(on["patch"][0]["path"], "/state/power_on");
        assert_eq!(on["patch"][0]["value"], true);

        let off = parse(&Command::Power(false).to_frame("hw-1"));
        assert_eq!(off["message_id"], "turn_off");
        assert_eq!(off["patch"][0]["value"], false);
    }

    #[test]
    fn non_power_commands_omit_message_id() {
        let frame = parse(&Command::SetTargetTemperature(22).to_frame("hw-1"));
        assert!(frame.get("message_id").is_none());
        assert_eq!(frame["patch"][0]["path"], "/state/target_temperature");
        assert_eq!(frame["patch"][0]["value"], 22);
    }

    #[test]
    fn heater_and_cooler_share_the_heater_path() {
        assert_eq!(Command::Heater(true).field_path(), "/state/heater");
        assert_eq!(Command::Heater(false).field_path(), "/state/heater");
        assert_eq!(Command::Heater(false).value(), json!(false));
    }

    #[test]
    fn mode_command_sends_string_value() {
        let frame = parse(&Command::SetMode("eco".to_string()).to_frame("hw-1"));
        assert_eq!(frame["patch"][0]["path"], "/state/mode");
        assert_eq!(frame["patch"][0]["value"], "eco");
    }
}
