// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the remote backend.
//!
//! Provides [`RemoteClient`], which handles URL composition, bearer
//! authentication, and the mapping of HTTP statuses onto [`RelayError`].
//! It never retries; retry policy belongs to the relay's queues and poller.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use talkrelay_config::RemoteConfig;
use talkrelay_core::RelayError;
use tracing::debug;

use crate::types::{
    ConfirmMessagesRequest, ErrorBody, GetMessagesResponse, ReceiveMessageRequest, TagRoomRequest,
};

/// HTTP client for remote backend communication.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    receive_message_path: String,
    get_messages_path: String,
    confirm_messages_path: String,
    tag_room_path: Option<String>,
}

impl RemoteClient {
    /// Creates a client whose every request is bounded by `fixed_timeout_ms`.
    pub fn new(config: &RemoteConfig) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(config.fixed_timeout())
            .build()
            .map_err(|e| RelayError::transport("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone().map(SecretString::from),
            base_url: config.base_url(),
            receive_message_path: config.receive_message_path.clone(),
            get_messages_path: config.get_messages_path.clone(),
            confirm_messages_path: config.confirm_messages_path.clone(),
            tag_room_path: config.tag_room_path.clone(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// `{protocol}://{server}:{port}`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_tag_endpoint(&self) -> bool {
        self.tag_room_path.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }

    /// `POST receiveMessage`.
    pub async fn receive_message(
        &self,
        request: &ReceiveMessageRequest<'_>,
    ) -> Result<(), RelayError> {
        self.post_json(&self.receive_message_path, request).await
    }

    /// `GET getMessages`.
    pub async fn get_messages(&self) -> Result<GetMessagesResponse, RelayError> {
        let url = self.endpoint(&self.get_messages_path);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("cannot access {url}"), e))?;

        let response = check_status(&self.get_messages_path, response).await?;
        response
            .json::<GetMessagesResponse>()
            .await
            .map_err(|e| RelayError::transport(format!("{url}: malformed response"), e))
    }

    /// `POST confirmMessages`.
    pub async fn confirm_messages(
        &self,
        request: &ConfirmMessagesRequest,
    ) -> Result<(), RelayError> {
        self.post_json(&self.confirm_messages_path, request).await
    }

    /// `POST tagRoom`. Fails with [`RelayError::Config`] when no path is configured.
    pub async fn tag_room(&self, request: &TagRoomRequest<'_>) -> Result<(), RelayError> {
        let path = self
            .tag_room_path
            .as_deref()
            .ok_or_else(|| RelayError::Config("remote.tag_room_path is not set".into()))?;
        self.post_json(path, request).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), RelayError> {
        let url = self.endpoint(path);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayError::transport(format!("cannot access {url}"), e))?;

        check_status(path, response).await?;
        Ok(())
    }
}

/// Accepts exactly 200. 4xx becomes [`RelayError::ClientRequest`], anything else
/// [`RelayError::Protocol`], both carrying the backend's `description`.
async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, RelayError> {
    let status = response.status();
    debug!(endpoint, status = %status, "remote response received");

    if status == StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let description = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|e| e.description)
        .unwrap_or(body);

    let endpoint = endpoint.to_string();
    let status = status.as_u16();
    if (400..500).contains(&status) {
        Err(RelayError::ClientRequest {
            endpoint,
            status,
            description,
        })
    } else {
        Err(RelayError::Protocol {
            endpoint,
            status,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use talkrelay_core::{DeliveryRecord, EventId};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> RemoteClient {
        let config = RemoteConfig {
            api_key: Some("test-key".into()),
            tag_room_path: Some("/tagRoom".into()),
            ..RemoteConfig::default()
        };
        RemoteClient::new(&config)
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    #[test]
    fn base_url_is_composed_from_config() {
        let config = RemoteConfig {
            protocol: "https".into(),
            server: "talks.example.org".into(),
            port: 9443,
            ..RemoteConfig::default()
        };
        let client = RemoteClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://talks.example.org:9443");
        assert!(!client.has_tag_endpoint());
    }

    #[tokio::test]
    async fn get_messages_sends_bearer_and_parses_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getMessages"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [
                    { "id": "1", "roomId": "!a:x", "bodyType": "TEXT", "body": "hi" }
                ]
            })))
            .mount(&server)
            .await;

        let response = test_client(&server.uri()).get_messages().await.unwrap();
        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].room_id, "!a:x");
    }

    #[tokio::test]
    async fn client_error_maps_to_client_request_with_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/confirmMessages"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "description": "unknown sourceId" })),
            )
            .mount(&server)
            .await;

        let records = [DeliveryRecord {
            remote_id: "9".into(),
            room_event_id: Some(EventId::from("$e")),
            media_uri: None,
        }];
        let err = test_client(&server.uri())
            .confirm_messages(&ConfirmMessagesRequest::from(&records[..]))
            .await
            .unwrap_err();

        match err {
            RelayError::ClientRequest {
                status,
                description,
                ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(description, "unknown sourceId");
            }
            other => panic!("expected ClientRequest, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_without_json_uses_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getMessages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).get_messages().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            RelayError::Protocol { status: 503, ref description, .. }
                if description == "maintenance"
        ));
    }

    #[tokio::test]
    async fn malformed_success_body_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/getMessages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).get_messages().await.unwrap_err();
        assert!(matches!(err, RelayError::Transport { .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let err = test_client("http://127.0.0.1:1").get_messages().await.unwrap_err();
        assert!(matches!(err, RelayError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn tag_room_posts_camel_case_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tagRoom"))
            .and(body_json(serde_json::json!({
                "roomId": "!a:x", "tag": "tier", "value": "gold"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        test_client(&server.uri())
            .tag_room(&TagRoomRequest {
                room_id: "!a:x",
                tag: "tier",
                value: "gold",
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn tag_room_without_path_is_config_error() {
        let client = RemoteClient::new(&RemoteConfig::default()).unwrap();
        let err = client
            .tag_room(&TagRoomRequest {
                room_id: "!a:x",
                tag: "t",
                value: "v",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
