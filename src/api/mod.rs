// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud REST API: login and device listing.
//!
//! Plain request/response collaborators of the websocket session. The
//! [`CloudClient`] doubles as the token holder: `login()` stores the bearer
//! token, the session reads it for the `hello` frame and calls `login()`
//! again when the cloud reports the token expired.

use std::env;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::{AuthError, Result};
use crate::model::{Device, DeviceType};

/// Default cloud REST base URL.
pub const DEFAULT_API_BASE: &str = "https://api.homewizardeasyonline.com/v1";

/// Path of the login endpoint, relative to the base URL.
const LOGIN_PATH: &str = "auth/login";

/// Path of the device-listing endpoint, relative to the base URL.
const DEVICES_PATH: &str = "auth/devices";

/// Configuration for the cloud REST client.
///
/// # Examples
///
/// ```
/// use hwclimate::ApiConfig;
/// use std::time::Duration;
///
/// let config = ApiConfig::new("user@example.com", "hunter2")
///     .with_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct ApiConfig {
    username: String,
    password: String,
    base_url: String,
    timeout: Duration,
}

impl ApiConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the given account credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Reads credentials from `HW_CLIMATE_USERNAME` and `HW_CLIMATE_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnexpectedResponse`] naming the missing variable.
    pub fn from_env() -> Result<Self> {
        let username = env::var("HW_CLIMATE_USERNAME").map_err(|_| {
            AuthError::UnexpectedResponse("HW_CLIMATE_USERNAME is not set".to_string())
        })?;
        let password = env::var("HW_CLIMATE_PASSWORD").map_err(|_| {
            AuthError::UnexpectedResponse("HW_CLIMATE_PASSWORD is not set".to_string())
        })?;
        Ok(Self::new(username, password))
    }

    /// Overrides the REST base URL. Mainly useful for tests.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the REST base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Client for the HomeWizard cloud REST API.
///
/// Cheap to share behind an `Arc`; the stored token is guarded by a
/// `parking_lot::RwLock` so the session can read it while a refresh is in
/// flight elsewhere.
#[derive(Debug)]
pub struct CloudClient {
    config: ApiConfig,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl CloudClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AuthError::Http)?;

        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    /// Returns the current bearer token, if a login has succeeded.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Logs in with the configured credentials and stores the bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the cloud answers with a non-200 status,
    /// a non-JSON body, or a body without a `token` field. Login is never
    /// retried by the library.
    pub async fn login(&self) -> Result<String> {
        let url = format!("{}/{LOGIN_PATH}", self.config.base_url);
        tracing::debug!(url = %url, username = %self.config.username, "logging in");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(AuthError::Http)?;

        let status = response.status();
        tracing::debug!(status = %status, "login response");
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingToken)?
            .to_string();

        *self.token.write() = Some(token.clone());
        tracing::debug!(username = %self.config.username, "login successful");
        Ok(token)
    }

    /// Lists the account's climate devices, keeping only recognized types.
    ///
    /// Devices of types this library does not understand are filtered out
    /// before deserialization, so a new vendor product cannot break the
    /// listing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on a non-200 status or an unexpected body.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let url = format!("{}/{DEVICES_PATH}", self.config.base_url);
        tracing::debug!(url = %url, "listing devices");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(AuthError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()).into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;

        let entries = body
            .get("devices")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AuthError::UnexpectedResponse("listing without a devices array".to_string())
            })?;

        let mut devices = Vec::new();
        for entry in entries {
            let recognized = entry
                .get("type")
                .and_then(Value::as_str)
                .and_then(DeviceType::from_str_opt)
                .is_some();
            if !recognized {
                tracing::debug!(entry = %entry, "skipping unsupported device type");
                continue;
            }
            match serde_json::from_value::<Device>(entry.clone()) {
                Ok(device) => devices.push(device),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed device entry");
                }
            }
        }

        tracing::debug!(count = devices.len(), "device listing complete");
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ApiConfig::new("user", "pass");
        assert_eq!(config.base_url(), DEFAULT_API_BASE);
        assert_eq!(config.username(), "user");
        assert_eq!(config.timeout, ApiConfig::DEFAULT_TIMEOUT);
    }

    #[test]
    fn config_overrides() {
        let config = ApiConfig::new("user", "pass")
            .with_base_url("http://localhost:9999")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.base_url(), "http://localhost:9999");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn new_client_has_no_token() {
        let client = CloudClient::new(ApiConfig::new("user", "pass")).unwrap();
        assert!(client.token().is_none());
    }
}
