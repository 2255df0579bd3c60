// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matrix room transport adapter for the Talkrelay message relay.
//!
//! Implements [`RoomTransport`] on `matrix-sdk`: a session is restored from
//! the configured access token, and a background sync loop feeds a bounded
//! channel. Encryption, joins and invites are not handled; the bot account
//! must already be in its rooms.

pub mod identity;
pub mod sync;

use std::time::Duration;

use async_trait::async_trait;
use matrix_sdk::authentication::matrix::MatrixSession;
use matrix_sdk::config::SyncSettings;
use matrix_sdk::media::{MediaFormat, MediaRequestParameters};
use matrix_sdk::ruma::api::client::receipt::create_receipt::v3::ReceiptType;
use matrix_sdk::ruma::events::receipt::ReceiptThread;
use matrix_sdk::ruma::events::room::MediaSource;
use matrix_sdk::ruma::{OwnedEventId, OwnedMxcUri, OwnedRoomId, OwnedUserId};
use matrix_sdk::{Client, Room, SessionMeta, SessionTokens};
use secrecy::{ExposeSecret, SecretString};
use talkrelay_config::MatrixConfig;
use talkrelay_core::{
    AdapterType, ConversationId, EventId, HealthStatus, InboundEvent, PluginAdapter, RelayError,
    RoomContent, RoomTransport,
};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::identity::AccountClient;

const EVENT_BUFFER: usize = 256;
const MESSAGE_EVENT_TYPE: &str = "m.room.message";

/// Matrix room transport implementing [`RoomTransport`].
pub struct MatrixTransport {
    account: AccountClient,
    device_id_hint: Option<String>,
    own_user_id: String,
    sync_timeout: Duration,
    client: Option<Client>,
    events: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

fn parse_room_id(value: &str) -> Result<OwnedRoomId, RelayError> {
    value
        .parse::<OwnedRoomId>()
        .map_err(|e| RelayError::room(format!("invalid room id '{value}'"), e))
}

fn parse_event_id(value: &str) -> Result<OwnedEventId, RelayError> {
    value
        .parse::<OwnedEventId>()
        .map_err(|e| RelayError::room(format!("invalid event id '{value}'"), e))
}

impl MatrixTransport {
    /// Creates the transport from the `[matrix]` configuration section.
    ///
    /// Fails with [`RelayError::Config`] when no access token is configured.
    pub fn new(config: &MatrixConfig) -> Result<Self, RelayError> {
        let token = config
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RelayError::Config("matrix.access_token is not set".into()))?;

        let account = AccountClient::new(&config.homeserver_url, SecretString::from(token))?;
        info!(homeserver = account.homeserver(), "matrix transport initialized");

        Ok(Self {
            account,
            device_id_hint: config.device_id.clone().filter(|d| !d.trim().is_empty()),
            own_user_id: config.bot_user.clone().unwrap_or_default(),
            sync_timeout: Duration::from_millis(config.sync_timeout_ms),
            client: None,
            events: Mutex::new(None),
            sync_task: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    fn client(&self) -> Result<&Client, RelayError> {
        self.client
            .as_ref()
            .ok_or_else(|| RelayError::Internal("matrix transport not connected".into()))
    }

    fn room(&self, conversation: &ConversationId) -> Result<Room, RelayError> {
        let room_id = parse_room_id(conversation.as_str())?;
        self.client()?
            .get_room(&room_id)
            .ok_or_else(|| RelayError::Room {
                message: format!("room not joined: {room_id}"),
                source: None,
            })
    }

    /// Builds an SDK client and restores the access-token session on it.
    async fn restore(&self, user_id: &str, device_id: String) -> Result<Client, RelayError> {
        let client = Client::builder()
            .homeserver_url(self.account.homeserver())
            .build()
            .await
            .map_err(|e| RelayError::room("failed to build matrix client", e))?;

        let user_id = user_id
            .parse::<OwnedUserId>()
            .map_err(|e| RelayError::room(format!("invalid user id '{user_id}'"), e))?;
        let session = MatrixSession {
            meta: SessionMeta {
                user_id,
                device_id: device_id.into(),
            },
            tokens: SessionTokens {
                access_token: self.account.access_token().expose_secret().to_string(),
                refresh_token: None,
            },
        };
        client
            .restore_session(session)
            .await
            .map_err(|e| RelayError::room("failed to restore matrix session", e))?;
        Ok(client)
    }
}

#[async_trait]
impl PluginAdapter for MatrixTransport {
    fn name(&self) -> &str {
        "matrix"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Room
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(match self.account.whoami().await {
            Ok(identity) if identity.user_id == self.own_user_id => HealthStatus::Healthy,
            Ok(identity) => {
                HealthStatus::Degraded(format!("token belongs to {}", identity.user_id))
            }
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.cancel.cancel();
        if let Some(task) = self.sync_task.lock().await.take() {
            task.await
                .map_err(|e| RelayError::Internal(format!("matrix sync task failed: {e}")))?;
        }
        debug!("matrix transport shut down");
        Ok(())
    }
}

#[async_trait]
impl RoomTransport for MatrixTransport {
    fn own_user_id(&self) -> &str {
        &self.own_user_id
    }

    /// Resolves the bot identity, restores the session and starts syncing.
    /// Idempotent.
    ///
    /// The first sync only establishes the sync position; history it carries
    /// is not relayed.
    async fn connect(&mut self) -> Result<(), RelayError> {
        if self.events.get_mut().is_some() {
            return Ok(());
        }

        let identity = self.account.whoami().await?;
        if !self.own_user_id.is_empty() && self.own_user_id != identity.user_id {
            warn!(
                configured = %self.own_user_id,
                actual = %identity.user_id,
                "matrix.bot_user does not match the access token, using the token's user"
            );
        }
        let device_id = match (identity.device_id, self.device_id_hint.clone()) {
            (Some(actual), Some(hint)) if actual != hint => {
                warn!(configured = %hint, actual = %actual, "matrix.device_id ignored");
                actual
            }
            (Some(actual), _) => actual,
            (None, Some(hint)) => hint,
            (None, None) => {
                return Err(RelayError::Config(
                    "homeserver did not report a device for the access token; \
                     set matrix.device_id"
                        .into(),
                ));
            }
        };
        self.own_user_id = identity.user_id;

        let client = self.restore(&self.own_user_id, device_id).await?;
        let bootstrap = client
            .sync_once(SyncSettings::default().timeout(Duration::ZERO))
            .await
            .map_err(|e| RelayError::room("initial matrix sync failed", e))?;
        info!(since = %bootstrap.next_batch, "matrix sync position established");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        sync::register_handler(&client, tx);
        let settings = SyncSettings::default()
            .timeout(self.sync_timeout)
            .token(bootstrap.next_batch);
        let task = tokio::spawn(sync::run_sync_loop(
            client.clone(),
            settings,
            self.cancel.clone(),
        ));

        self.client = Some(client);
        *self.events.get_mut() = Some(rx);
        *self.sync_task.get_mut() = Some(task);

        info!(user_id = %self.own_user_id, "matrix transport connected");
        Ok(())
    }

    async fn next_event(&self) -> Result<InboundEvent, RelayError> {
        let mut events = self.events.lock().await;
        let rx = events
            .as_mut()
            .ok_or_else(|| RelayError::Internal("matrix transport not connected".into()))?;
        rx.recv().await.ok_or_else(|| RelayError::Room {
            message: "matrix sync loop stopped".into(),
            source: None,
        })
    }

    async fn mark_read(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<(), RelayError> {
        let room = self.room(conversation)?;
        room.send_single_receipt(
            ReceiptType::Read,
            ReceiptThread::Unthreaded,
            parse_event_id(event_id.as_str())?,
        )
        .await
        .map_err(|e| RelayError::room("read receipt failed", e))
    }

    async fn send_content(
        &self,
        conversation: &ConversationId,
        content: &RoomContent,
    ) -> Result<EventId, RelayError> {
        let room = self.room(conversation)?;
        let response = room
            .send_raw(MESSAGE_EVENT_TYPE, content.to_event_content())
            .await
            .map_err(|e| RelayError::room("send failed", e))?;
        Ok(EventId(response.event_id.to_string()))
    }

    async fn download_media(&self, uri: &str) -> Result<Vec<u8>, RelayError> {
        let mxc = OwnedMxcUri::from(uri);
        mxc.validate()
            .map_err(|e| RelayError::room(format!("not a media URI: {uri}"), e))?;
        let request = MediaRequestParameters {
            source: MediaSource::Plain(mxc),
            format: MediaFormat::File,
        };
        self.client()?
            .media()
            .get_media_content(&request, false)
            .await
            .map_err(|e| RelayError::room(format!("download {uri} failed"), e))
    }

    async fn upload_media(&self, bytes: Vec<u8>, mime_type: &str) -> Result<String, RelayError> {
        let mime = mime_type
            .parse::<mime_guess::mime::Mime>()
            .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM);
        let response = self
            .client()?
            .media()
            .upload(&mime, bytes, None)
            .await
            .map_err(|e| RelayError::room("upload failed", e))?;
        Ok(response.content_uri.to_string())
    }

    async fn redact(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<EventId, RelayError> {
        let room = self.room(conversation)?;
        let target = parse_event_id(event_id.as_str())?;
        let response = room
            .redact(&target, reason, None)
            .await
            .map_err(|e| RelayError::room("redact failed", e))?;
        Ok(EventId(response.event_id.to_string()))
    }

    async fn get_event(
        &self,
        conversation: &ConversationId,
        event_id: &EventId,
    ) -> Result<serde_json::Value, RelayError> {
        let room = self.room(conversation)?;
        let target = parse_event_id(event_id.as_str())?;
        let event = room
            .event(&target, None)
            .await
            .map_err(|e| RelayError::room(format!("fetch {target} failed"), e))?;
        event
            .raw()
            .deserialize_as::<serde_json::Value>()
            .map_err(|e| RelayError::room(format!("event {target} is not JSON"), e))
    }
}
