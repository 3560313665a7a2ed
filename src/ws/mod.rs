// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The persistent websocket session: frame classification, reconnect
//! policy, and the [`Session`] state machine.

mod backoff;
mod frame;
mod session;

pub use backoff::ReconnectPolicy;
pub use frame::{InboundFrame, PatchOp, collect_overrides};
pub use session::{DEFAULT_WS_URL, Session, SessionConfig, SessionEvent, SocketStatus};
