// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access-token identity lookup.
//!
//! `matrix-sdk` needs a user and device id before a session can be restored
//! from a bare access token, so `whoami` is asked over plain HTTP first.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use talkrelay_core::RelayError;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

/// The account and device an access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    homeserver: String,
    access_token: SecretString,
}

impl AccountClient {
    pub fn new(homeserver_url: &str, access_token: SecretString) -> Result<Self, RelayError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::room("failed to build HTTP client", e))?;
        Ok(Self {
            http,
            homeserver: homeserver_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    pub fn homeserver(&self) -> &str {
        &self.homeserver
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// `GET /account/whoami`
    ///
    /// Non-2xx answers become [`RelayError::Room`] carrying the homeserver's
    /// `errcode` and `error`.
    pub async fn whoami(&self) -> Result<Identity, RelayError> {
        let url = format!("{}/_matrix/client/v3/account/whoami", self.homeserver);
        let response = self
            .http
            .get(url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| RelayError::room("whoami: request failed", e))?;

        let status = response.status();
        debug!(status = %status, "whoami response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<MatrixErrorBody>(&body) {
                Ok(MatrixErrorBody {
                    errcode: Some(code),
                    error,
                }) => format!("{code} {}", error.unwrap_or_default()),
                _ => body.chars().take(300).collect(),
            };
            return Err(RelayError::Room {
                message: format!("whoami: HTTP {} {}", status.as_u16(), detail.trim()),
                source: None,
            });
        }

        response
            .json::<Identity>()
            .await
            .map_err(|e| RelayError::room("whoami: malformed response", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AccountClient {
        AccountClient::new(&server.uri(), SecretString::from("tok")).unwrap()
    }

    #[tokio::test]
    async fn whoami_reads_user_and_device() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_id": "@relay:x",
                "device_id": "RELAYDEV",
            })))
            .mount(&server)
            .await;

        let identity = client(&server).whoami().await.unwrap();
        assert_eq!(identity.user_id, "@relay:x");
        assert_eq!(identity.device_id.as_deref(), Some("RELAYDEV"));
    }

    #[tokio::test]
    async fn device_id_is_optional() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "user_id": "@relay:x" })),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).whoami().await.unwrap().device_id, None);
    }

    #[tokio::test]
    async fn error_body_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errcode": "M_UNKNOWN_TOKEN",
                "error": "Invalid access token",
            })))
            .mount(&server)
            .await;

        let err = client(&server).whoami().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("401"), "{message}");
        assert!(message.contains("M_UNKNOWN_TOKEN"), "{message}");
    }
}
