// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hwclimate` - A Rust library to control HomeWizard Climate devices.
//!
//! Devices are enumerated through the HomeWizard cloud REST API and then
//! controlled and observed over a persistent websocket session, one session
//! per device.
//!
//! # How a session works
//!
//! 1. [`CloudClient::login`] obtains a bearer token.
//! 2. [`CloudClient::devices`] lists the account's climate devices,
//!    filtered to the types this library understands.
//! 3. A [`Session`] connects its websocket, sends `hello` with the token,
//!    subscribes to the device, and waits for the first full-state
//!    snapshot before reporting the device ready.
//! 4. From then on the session applies full snapshots and incremental
//!    `json_patch` frames to its state model and publishes
//!    [`SessionEvent::StateChanged`] with a field-level diff.
//!
//! Unexpected socket closes are retried with bounded exponential backoff;
//! an expired token (a 401 `response` frame) triggers a single re-login
//! without dropping the socket. [`Session::disconnect`] ends the session
//! for good.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hwclimate::{ApiConfig, CloudClient, Session, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> hwclimate::Result<()> {
//!     // Credentials from HW_CLIMATE_USERNAME / HW_CLIMATE_PASSWORD.
//!     let api = Arc::new(CloudClient::new(ApiConfig::from_env()?)?);
//!     api.login().await?;
//!
//!     let devices = api.devices().await?;
//!     let session = Session::new(api, devices[0].clone());
//!
//!     let mut events = session.subscribe();
//!     session.connect_in_background();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Ready { device } => {
//!                 println!("{} is ready", device.display_name());
//!                 session.set_target_temperature(21);
//!             }
//!             SessionEvent::StateChanged { state, diff } => {
//!                 println!("now {}°C target ({diff})", state.target_temperature);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod command;
pub mod error;
pub mod model;
pub mod ws;

pub use api::{ApiConfig, CloudClient, DEFAULT_API_BASE};
pub use command::Command;
pub use error::{AuthError, Error, ProtocolError, Result, TransportError};
pub use model::{Device, DeviceState, DeviceType, FieldChange, StateDiff};
pub use ws::{
    DEFAULT_WS_URL, ReconnectPolicy, Session, SessionConfig, SessionEvent, SocketStatus,
};
