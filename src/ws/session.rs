// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-device websocket session state machine.
//!
//! A [`Session`] owns exactly one websocket at a time and drives the fixed
//! handshake: `hello` on open, `subscribe_device` once the hello is
//! acknowledged, then waiting for the first full-state snapshot before the
//! device counts as initialized. A subscribe acknowledgement alone does not
//! prove the device is reachable.
//!
//! All socket I/O and state mutation happen inside a single worker task;
//! command methods hand their frames to that task over a channel, so writes
//! are never interleaved. Unexpected closes are retried with bounded
//! exponential backoff; an explicit [`Session::disconnect`] permanently
//! stops reconnection for this instance.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use hwclimate::{ApiConfig, CloudClient, Session, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> hwclimate::Result<()> {
//!     let api = Arc::new(CloudClient::new(ApiConfig::from_env()?)?);
//!     api.login().await?;
//!
//!     let device = api.devices().await?.remove(0);
//!     let session = Session::new(api, device);
//!
//!     let mut events = session.subscribe();
//!     session.connect_in_background();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Ready { device } => {
//!                 println!("{} is online", device.display_name());
//!                 session.turn_on();
//!             }
//!             SessionEvent::StateChanged { diff, .. } => println!("changed: {diff}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{Notify, broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::api::CloudClient;
use crate::command::{self, Command};
use crate::error::TransportError;
use crate::model::{Device, DeviceState, StateDiff};

use super::ReconnectPolicy;
use super::backoff::Backoff;
use super::frame::{InboundFrame, collect_overrides};

/// Default cloud websocket endpoint.
pub const DEFAULT_WS_URL: &str = "wss://app-ws.homewizard.com/ws";

/// Buffered events per subscriber; slow consumers lag rather than block.
const EVENT_CAPACITY: usize = 64;

/// Pending outbound commands; beyond this, commands are dropped.
const COMMAND_CAPACITY: usize = 16;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Lifecycle status of a session's socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketStatus {
    /// No connection has been attempted yet.
    PreInit,
    /// Connected (or connecting) but the handshake has not completed.
    Initializing,
    /// The first full-state snapshot has arrived; the device is live.
    Initialized,
    /// The socket closed; a reconnect may be pending.
    NotInitialized,
}

/// Events a session publishes to its subscribers.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The handshake completed and the first full state arrived.
    Ready {
        /// The device this session is bound to.
        device: Device,
    },
    /// The device state changed.
    StateChanged {
        /// The new state.
        state: DeviceState,
        /// Field-level difference against the previous state.
        diff: StateDiff,
    },
}

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Websocket endpoint to connect to.
    pub ws_url: String,
    /// Reconnect policy for unexpected closes.
    pub reconnect: ReconnectPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Overrides the websocket endpoint. Mainly useful for tests.
    #[must_use]
    pub fn with_ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = url.into();
        self
    }

    /// Overrides the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// A persistent control session for one climate device.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    device: Device,
    api: Arc<CloudClient>,
    config: SessionConfig,
    status: RwLock<SocketStatus>,
    last_state: RwLock<DeviceState>,
    has_full_state: AtomicBool,
    disconnect_requested: AtomicBool,
    worker_live: AtomicBool,
    commands: RwLock<Option<mpsc::Sender<String>>>,
    shutdown: Notify,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Creates a session for `device` using `api` as the token holder.
    #[must_use]
    pub fn new(api: Arc<CloudClient>, device: Device) -> Self {
        Self::with_config(api, device, SessionConfig::default())
    }

    /// Creates a session with a custom configuration.
    #[must_use]
    pub fn with_config(api: Arc<CloudClient>, device: Device, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                device,
                api,
                config,
                status: RwLock::new(SocketStatus::PreInit),
                last_state: RwLock::new(DeviceState::new()),
                has_full_state: AtomicBool::new(false),
                disconnect_requested: AtomicBool::new(false),
                worker_live: AtomicBool::new(false),
                commands: RwLock::new(None),
                shutdown: Notify::new(),
                events,
            }),
        }
    }

    /// Returns the device this session is bound to.
    #[must_use]
    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    /// Returns the current socket status.
    #[must_use]
    pub fn status(&self) -> SocketStatus {
        *self.inner.status.read()
    }

    /// Returns a snapshot of the last known device state.
    #[must_use]
    pub fn last_state(&self) -> DeviceState {
        self.inner.last_state.read().clone()
    }

    /// Returns `true` iff the session is initialized and at least one
    /// full-state update has been received.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status() == SocketStatus::Initialized
            && self.inner.has_full_state.load(Ordering::Acquire)
    }

    /// Subscribes to [`SessionEvent`]s.
    ///
    /// Any number of subscribers may exist; a subscriber that falls more
    /// than the channel capacity behind loses the oldest events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Connects and drives the session until it ends.
    ///
    /// Returns when the reconnect budget is exhausted or after an explicit
    /// [`disconnect`](Self::disconnect). A no-op when a worker is already
    /// live or disconnect was requested, so duplicate sockets cannot exist.
    pub async fn connect(&self) {
        if !self.begin_worker() {
            return;
        }
        run(self.inner.clone()).await;
    }

    /// Like [`connect`](Self::connect), but drives the session on a
    /// background task.
    pub fn connect_in_background(&self) {
        if !self.begin_worker() {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(run(inner));
    }

    /// Requests a disconnect.
    ///
    /// Cooperative: sets the disconnect flag, then asks the worker to close
    /// the socket. The flag permanently suppresses automatic reconnection
    /// for this session instance.
    pub fn disconnect(&self) {
        self.inner
            .disconnect_requested
            .store(true, Ordering::Release);
        self.inner.shutdown.notify_one();
    }

    // ========== Control commands ==========

    /// Turns the device on.
    pub fn turn_on(&self) {
        self.send(Command::Power(true));
    }

    /// Turns the device off.
    pub fn turn_off(&self) {
        self.send(Command::Power(false));
    }

    /// Sets the fan speed step.
    pub fn set_fan_speed(&self, speed: i64) {
        self.send(Command::SetFanSpeed(speed));
    }

    /// Sets the target temperature in degrees Celsius.
    pub fn set_target_temperature(&self, temperature: i64) {
        self.send(Command::SetTargetTemperature(temperature));
    }

    /// Switches the device to heating.
    pub fn turn_on_heater(&self) {
        self.send(Command::Heater(true));
    }

    /// Switches the device to cooling.
    pub fn turn_on_cooler(&self) {
        self.send(Command::Heater(false));
    }

    /// Enables oscillation.
    pub fn turn_on_oscillation(&self) {
        self.send(Command::Oscillate(true));
    }

    /// Disables oscillation.
    pub fn turn_off_oscillation(&self) {
        self.send(Command::Oscillate(false));
    }

    /// Switches the operating mode.
    pub fn set_mode(&self, mode: impl Into<String>) {
        self.send(Command::SetMode(mode.into()));
    }

    /// Hands a command frame to the worker task.
    ///
    /// Transport problems are never surfaced here: with no live socket the
    /// reconnect policy is already at work and the command is dropped with
    /// a warning.
    fn send(&self, command: Command) {
        let frame = command.to_frame(&self.inner.device.identifier);
        let sender = self.inner.commands.read().clone();
        let Some(tx) = sender else {
            let e = TransportError::NotConnected;
            tracing::warn!(command = ?command, error = %e, "dropping command");
            return;
        };
        if let Err(e) = tx.try_send(frame) {
            let e = match e {
                mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
                mpsc::error::TrySendError::Full(_) => TransportError::CommandBufferFull,
            };
            tracing::warn!(command = ?command, error = %e, "dropping command");
        }
    }

    /// Claims the single worker slot. Returns `false` if a worker is
    /// already live or disconnect was requested.
    fn begin_worker(&self) -> bool {
        if self.inner.disconnect_requested.load(Ordering::Acquire) {
            tracing::info!("disconnect was requested, not connecting");
            return false;
        }
        let claimed = self
            .inner
            .worker_live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            tracing::info!(status = ?self.status(), "session worker already live, ignoring connect");
        }
        claimed
    }
}

/// The worker: owns the socket, reconnects on unexpected closes.
///
/// Reconnection happens inside this single task, so the previous connection
/// is always fully torn down before the next connect begins.
async fn run(inner: Arc<Inner>) {
    let mut backoff = Backoff::new(inner.config.reconnect.clone());

    loop {
        if inner.disconnect_requested.load(Ordering::Acquire) {
            break;
        }

        *inner.status.write() = SocketStatus::Initializing;
        tracing::info!(
            device = %inner.device.identifier,
            url = %inner.config.ws_url,
            "connecting to websocket"
        );

        match connect_async(inner.config.ws_url.as_str()).await {
            Ok((stream, _)) => drive(&inner, stream, &mut backoff).await,
            Err(e) => {
                tracing::warn!(error = %e, "websocket connect failed");
            }
        }

        inner.commands.write().take();
        *inner.status.write() = SocketStatus::NotInitialized;

        if inner.disconnect_requested.load(Ordering::Acquire) {
            tracing::debug!("disconnect was explicitly requested, not reconnecting");
            break;
        }

        let Some(delay) = backoff.next_delay() else {
            tracing::warn!(
                device = %inner.device.identifier,
                "reconnect attempts exhausted, giving up"
            );
            break;
        };
        tracing::debug!(delay = ?delay, "reconnecting after unexpected close");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = inner.shutdown.notified() => {}
        }
    }

    inner.worker_live.store(false, Ordering::Release);
}

/// Drives one connection: handshake, then the steady-state frame loop.
/// Returns when the socket closes for any reason.
async fn drive(
    inner: &Arc<Inner>,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    backoff: &mut Backoff,
) {
    let (mut sink, mut source) = stream.split();

    let token = inner.api.token().unwrap_or_default();
    if token.is_empty() {
        tracing::warn!("no bearer token held, sending empty hello");
    }
    if send_frame(&mut sink, command::hello(&token)).await.is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::channel::<String>(COMMAND_CAPACITY);
    *inner.commands.write() = Some(tx);

    loop {
        tokio::select! {
            () = inner.shutdown.notified() => {
                tracing::debug!("closing socket on disconnect request");
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            cmd = rx.recv() => {
                // The sender lives as long as this connection, so recv only
                // fails once teardown is underway.
                let Some(cmd) = cmd else { return };
                if send_frame(&mut sink, cmd).await.is_err() {
                    return;
                }
            }
            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !handle_frame(inner, &text, &mut sink, backoff).await {
                        return;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(frame = ?frame, "socket closed by peer");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    return;
                }
                None => {
                    tracing::debug!("websocket stream ended");
                    return;
                }
            }
        }
    }
}

/// Processes one inbound text frame. Returns `false` when the connection
/// must be torn down (write failure on the reply path).
async fn handle_frame(
    inner: &Arc<Inner>,
    text: &str,
    sink: &mut WsSink,
    backoff: &mut Backoff,
) -> bool {
    tracing::trace!(frame = %text, "received frame");

    let parsed = InboundFrame::parse(text, &inner.device.identifier, inner.device.device_type);
    let frame = match parsed {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "discarding frame");
            return true;
        }
    };

    match frame {
        InboundFrame::Response { message_id, status } => {
            match (message_id.as_deref(), status) {
                (Some("hello"), Some(200)) => {
                    tracing::debug!("hello acknowledged, subscribing to device");
                    let frame = command::subscribe(&inner.device.identifier);
                    if send_frame(sink, frame).await.is_err() {
                        return false;
                    }
                }
                (Some("subscribe"), Some(200)) => {
                    // The device only counts as online once an unsolicited
                    // full-state frame arrives; nothing to do yet.
                    tracing::debug!("subscribe acknowledged, awaiting full state");
                }
                (_, Some(401)) => {
                    tracing::warn!("token expired, refreshing login");
                    if let Err(e) = inner.api.login().await {
                        tracing::warn!(error = %e, "token refresh failed");
                    }
                }
                (id, status) => {
                    tracing::debug!(message_id = ?id, status = ?status, "unhandled response");
                }
            }
        }
        InboundFrame::Patch { ops } => {
            let overrides = collect_overrides(&ops);
            if overrides.is_empty() {
                return true;
            }
            let next = inner.last_state.read().patched(&overrides);
            publish_state(inner, next);
        }
        InboundFrame::FullState { state } => {
            let newly_initialized = {
                let mut status = inner.status.write();
                if *status == SocketStatus::Initializing {
                    *status = SocketStatus::Initialized;
                    true
                } else {
                    false
                }
            };
            inner.has_full_state.store(true, Ordering::Release);
            if newly_initialized {
                backoff.reset();
                tracing::info!(device = %inner.device.identifier, "session initialized");
                let _ = inner.events.send(SessionEvent::Ready {
                    device: inner.device.clone(),
                });
            }
            publish_state(inner, state);
        }
    }
    true
}

/// Replaces the last known state and publishes the diff.
fn publish_state(inner: &Arc<Inner>, next: DeviceState) {
    let diff = {
        let mut last = inner.last_state.write();
        let diff = last.diff(&next);
        *last = next.clone();
        diff
    };
    tracing::debug!(diff = %diff, "state updated");
    let _ = inner.events.send(SessionEvent::StateChanged { state: next, diff });
}

/// Writes one frame, logging it with the token redacted.
async fn send_frame(sink: &mut WsSink, frame: String) -> Result<(), TransportError> {
    tracing::debug!(frame = %redacted(&frame), "sending frame");
    sink.send(Message::Text(frame)).await.map_err(|e| {
        let e = TransportError::from(e);
        tracing::warn!(error = %e, "websocket write failed");
        e
    })
}

/// Returns `frame` with any bearer token shortened for logging.
fn redacted(frame: &str) -> String {
    if !frame.contains("\"token\"") {
        return frame.to_string();
    }
    let Ok(mut value) = serde_json::from_str::<serde_json::Value>(frame) else {
        return frame.to_string();
    };
    if let Some(token) = value.get("token").and_then(serde_json::Value::as_str) {
        // Counted in chars, not bytes: tokens are not guaranteed ASCII.
        let count = token.chars().count();
        let safe = if count > 24 {
            let head: String = token.chars().take(10).collect();
            let tail: String = token.chars().skip(count - 10).collect();
            format!("{head}...{tail}")
        } else {
            "...".to_string()
        };
        value["token"] = serde_json::Value::String(safe);
        return value.to_string();
    }
    frame.to_string()
}
