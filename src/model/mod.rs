// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity and operating-state types.

mod device;
mod state;

pub use device::{Device, DeviceType};
pub use state::{DeviceState, FieldChange, StateDiff};
