// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Climate device identity as returned by the cloud device listing.

use serde::{Deserialize, Serialize};

/// The climate device families this library understands.
///
/// The device listing only yields devices of these types; everything else
/// the account may own is filtered out. The wire string of the type doubles
/// as the frame type of full-state snapshots on the websocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Combined heater/fan devices.
    HeaterFan,
    /// Infrared panel heaters.
    InfraredHeater,
    /// Plain heaters. These report a reduced set of state fields.
    Heater,
}

impl DeviceType {
    /// All recognized device types.
    pub const ALL: [DeviceType; 3] = [Self::HeaterFan, Self::InfraredHeater, Self::Heater];

    /// Returns the wire representation of this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeaterFan => "heaterfan",
            Self::InfraredHeater => "infraredheater",
            Self::Heater => "heater",
        }
    }

    /// Parses a wire type string, returning `None` for unrecognized types.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A climate device as enumerated by the cloud account listing.
///
/// Immutable once obtained: a [`Session`](crate::Session) clones it and
/// never mutates it. The `identifier` is the stable key used to route
/// websocket frames to and from this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Stable device identifier used in frame routing.
    pub identifier: String,
    /// Optional user-assigned display name.
    #[serde(default)]
    pub name: Option<String>,
    /// The device family.
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Optional endpoint hint from the listing.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Opaque access grants attached to the device.
    #[serde(default)]
    pub grants: Vec<serde_json::Value>,
}

impl Device {
    /// Returns the display name if set, otherwise the identifier.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.identifier)
    }
}
