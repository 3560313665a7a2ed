// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `hwclimate` library.
//!
//! The taxonomy mirrors how failures are handled: authentication failures
//! are surfaced to the caller, transport failures are recovered locally by
//! the session's reconnect policy, and protocol-level oddities (malformed
//! or misdirected frames) are logged and discarded without affecting the
//! session.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during authentication or cloud API access.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Error occurred on the websocket transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors raised by the cloud REST API (login and device listing).
///
/// These are propagated synchronously to the caller and never retried by
/// the library itself.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The cloud rejected the credentials or returned an unexpected status.
    #[error("login rejected with status {0}")]
    Rejected(u16),

    /// The response was not the expected JSON shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A successful-looking login response carried no token.
    #[error("login response did not contain a token")]
    MissingToken,
}

/// Errors on the persistent websocket connection.
///
/// These never reach the caller of a command method; the session treats
/// them as an unexpected close and lets the reconnect policy take over.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Websocket connect, read or write failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// No live socket to write to.
    #[error("session is not connected")]
    NotConnected,

    /// The internal command channel was closed.
    #[error("command channel closed")]
    ChannelClosed,

    /// The outbound command buffer is full.
    #[error("command buffer full")]
    CommandBufferFull,
}

/// Errors describing frames that violate the wire protocol.
///
/// Reportable but non-fatal: the offending frame is discarded and the
/// session continues.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON or not an object.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// The frame addressed a different device than this session's.
    #[error("frame for device {got}, expected {expected}")]
    CrossDeviceFrame {
        /// The identifier this session is bound to.
        expected: String,
        /// The identifier carried by the frame.
        got: String,
    },

    /// The frame type is not one this client understands.
    #[error("unknown frame type: {0}")]
    UnknownFrameType(String),

    /// A full-state frame arrived without a `state` object.
    #[error("full-state frame without state object")]
    MissingState,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
