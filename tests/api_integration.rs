// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the cloud REST API using wiremock.

use hwclimate::{ApiConfig, AuthError, CloudClient, DeviceType, Error};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CloudClient {
    let config = ApiConfig::new("user@example.com", "hunter2").with_base_url(server.uri());
    CloudClient::new(config).unwrap()
}

mod login {
    use super::*;

    #[tokio::test]
    async fn stores_and_returns_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "bearer-token-123"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.token().is_none());

        let token = client.login().await.unwrap();
        assert_eq!(token, "bearer-token-123");
        assert_eq!(client.token().as_deref(), Some("bearer-token-123"));
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Rejected(401))));
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn non_json_body_is_an_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn missing_token_field_is_an_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.login().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn relogin_replaces_the_stored_token() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "first"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token": "second"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.login().await.unwrap();
        assert_eq!(client.token().as_deref(), Some("first"));

        client.login().await.unwrap();
        assert_eq!(client.token().as_deref(), Some("second"));
    }
}

mod devices {
    use super::*;

    #[tokio::test]
    async fn lists_only_recognized_device_types() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/devices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "devices": [
                    {
                        "identifier": "hw-fan",
                        "name": "Bedroom fan",
                        "type": "heaterfan",
                        "endpoint": "/device/hw-fan",
                        "grants": []
                    },
                    {
                        "identifier": "hw-lamp",
                        "type": "smartlamp"
                    },
                    {
                        "identifier": "hw-heat",
                        "type": "heater"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let devices = client.devices().await.unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].identifier, "hw-fan");
        assert_eq!(devices[0].device_type, DeviceType::HeaterFan);
        assert_eq!(devices[0].display_name(), "Bedroom fan");
        assert_eq!(devices[1].identifier, "hw-heat");
        assert_eq!(devices[1].device_type, DeviceType::Heater);
    }

    #[tokio::test]
    async fn empty_listing_yields_no_devices() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/devices"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"devices": []})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.devices().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_is_surfaced() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/devices"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.devices().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Rejected(500))));
    }

    #[tokio::test]
    async fn listing_without_devices_array_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/auth/devices"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.devices().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::UnexpectedResponse(_))
        ));
    }
}
