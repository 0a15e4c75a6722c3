//! Hosted backend adapter.
//!
//! One explicitly constructed client talks to the hosted platform for all
//! three ports: auth endpoints for identity, the REST endpoint for posts and
//! the realtime websocket for change notifications. Components receive it by
//! `Arc`; there is no global client.
//!
//! # Endpoints
//!
//! | Port | Endpoint |
//! |---|---|
//! | identity | `POST /auth/v1/otp`, `/auth/v1/verify`, `/auth/v1/token`, `/auth/v1/logout` |
//! | store | `GET`/`POST /rest/v1/<collection>` |
//! | channel | `GET /realtime/v1/websocket` (upgrade) |

pub mod protocol;
pub mod realtime;
pub mod rest;

use crate::config::FileConfig;
use crate::error::{BackendError, Result};
use crate::session_store::FileSessionStore;
use async_trait::async_trait;
use chrono::Utc;
use protocol::PhoenixMessage;
use realtime::{ChannelJoin, RealtimeConnection, RealtimeHandle};
use reqwest::{Client, RequestBuilder, Response, Url};
use rest::{
    AuthSessionResponse, InsertPostRow, OtpRequest, PostRow, RefreshRequest, VerifyRequest,
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tradehub_application::{
    AuthError, ChannelError, FeedQuery, IdentityProvider, NewPost, NotificationChannel,
    RemoteStore, StoreError, Subscription, SubscriptionId,
};
use tradehub_domain::{EventFilter, Post, Session};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const REALTIME_PROTOCOL_VERSION: &str = "1.0.0";

/// Resolved connection settings for the hosted backend
#[derive(Debug, Clone)]
pub struct HostedSettings {
    pub url: Url,
    pub anon_key: String,
    /// Full websocket URL including `apikey` and `vsn` query parameters
    pub realtime_url: Url,
    pub channel: String,
    pub heartbeat: Duration,
    pub session_file: Option<PathBuf>,
}

impl HostedSettings {
    pub fn from_config(config: &FileConfig) -> Result<Self> {
        let mut url = Url::parse(config.backend.url.trim())
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.backend.url, e)))?;
        // Keep joins relative to the project root
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }

        let realtime_url = match &config.backend.realtime_url {
            Some(explicit) => Url::parse(explicit)
                .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", explicit, e)))?,
            None => derive_realtime_url(&url)?,
        };
        let realtime_url = with_realtime_params(realtime_url, &config.backend.anon_key);

        Ok(Self {
            url,
            anon_key: config.backend.anon_key.clone(),
            realtime_url,
            channel: config.realtime.channel.clone(),
            heartbeat: Duration::from_secs(config.realtime.heartbeat_seconds),
            session_file: config
                .auth
                .session_file
                .clone()
                .or_else(FileSessionStore::default_path),
        })
    }
}

/// `https://host/` → `wss://host/realtime/v1/websocket`
fn derive_realtime_url(base: &Url) -> Result<Url> {
    let mut url = base
        .join("realtime/v1/websocket")
        .map_err(|e| BackendError::InvalidUrl(e.to_string()))?;
    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(BackendError::InvalidUrl(format!("unsupported scheme: {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| BackendError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;
    Ok(url)
}

fn with_realtime_params(mut url: Url, anon_key: &str) -> Url {
    url.query_pairs_mut()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", REALTIME_PROTOCOL_VERSION);
    url
}

/// Client for the hosted backend-as-a-service platform
pub struct HostedBackend {
    http: Client,
    settings: HostedSettings,
    sessions: Option<FileSessionStore>,
    session: RwLock<Option<Session>>,
    channels: Mutex<HashMap<SubscriptionId, RealtimeHandle>>,
    next_subscription_id: AtomicU64,
}

impl HostedBackend {
    /// Build the client and restore a persisted session, if any
    pub fn new(settings: HostedSettings) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let sessions = settings.session_file.clone().map(FileSessionStore::new);

        let restored = match sessions.as_ref().map(FileSessionStore::load) {
            Some(Ok(session)) => session,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring unreadable session file");
                None
            }
            None => None,
        };
        if let Some(session) = &restored {
            debug!(user_id = %session.user_id(), "Restored persisted session");
        }

        Ok(Self {
            http,
            settings,
            sessions,
            session: RwLock::new(restored),
            channels: Mutex::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
        })
    }

    pub fn from_config(config: &FileConfig) -> Result<Self> {
        Self::new(HostedSettings::from_config(config)?)
    }

    pub fn settings(&self) -> &HostedSettings {
        &self.settings
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.settings
            .url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(e.to_string()))
    }

    fn cached_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the session in memory and on disk
    fn store_session(&self, session: Option<Session>) {
        if let Some(store) = &self.sessions {
            let persisted = match &session {
                Some(s) => store.save(s),
                None => store.clear(),
            };
            if let Err(e) = persisted {
                warn!(path = %store.path().display(), error = %e, "Could not persist session");
            }
        }
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    /// Bearer token for requests: the user's access token, else the anon key
    fn bearer(&self) -> String {
        self.cached_session()
            .filter(|s| !s.is_expired(Utc::now()))
            .map(|s| s.access_token().to_string())
            .unwrap_or_else(|| self.settings.anon_key.clone())
    }

    fn request(&self, builder: RequestBuilder, bearer: &str) -> RequestBuilder {
        builder
            .header("apikey", &self.settings.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            message: rest::error_message(status.as_u16(), &body),
        })
    }

    async fn send_json<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R> {
        let text = self.send(builder).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let url = self.endpoint("auth/v1/token?grant_type=refresh_token")?;
        let builder = self
            .request(self.http.post(url), &self.settings.anon_key)
            .json(&RefreshRequest { refresh_token });
        let response: AuthSessionResponse = self.send_json(builder).await?;
        Ok(response.into_session(Utc::now()))
    }
}

#[async_trait]
impl IdentityProvider for HostedBackend {
    async fn get_session(&self) -> std::result::Result<Option<Session>, AuthError> {
        let Some(session) = self.cached_session() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token() else {
            debug!("Session expired without refresh token");
            self.store_session(None);
            return Ok(None);
        };

        match self.refresh_session(refresh_token).await {
            Ok(refreshed) => {
                info!(user_id = %refreshed.user_id(), "Session refreshed");
                self.store_session(Some(refreshed.clone()));
                Ok(Some(refreshed))
            }
            Err(BackendError::Status { message, .. }) => {
                warn!(%message, "Refresh token rejected; signing out locally");
                self.store_session(None);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_in_with_one_time_link(&self, email: &str) -> std::result::Result<(), AuthError> {
        let url = self.endpoint("auth/v1/otp").map_err(AuthError::from)?;
        let builder = self
            .request(self.http.post(url), &self.settings.anon_key)
            .json(&OtpRequest {
                email,
                create_user: true,
            });
        self.send(builder).await?;
        Ok(())
    }

    async fn verify_one_time_code(
        &self,
        email: &str,
        code: &str,
    ) -> std::result::Result<Session, AuthError> {
        let url = self.endpoint("auth/v1/verify").map_err(AuthError::from)?;
        let builder = self
            .request(self.http.post(url), &self.settings.anon_key)
            .json(&VerifyRequest {
                kind: "email",
                email,
                token: code,
            });
        let response: AuthSessionResponse = self.send_json(builder).await?;
        let session = response.into_session(Utc::now());
        self.store_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> std::result::Result<(), AuthError> {
        let Some(session) = self.cached_session() else {
            return Ok(());
        };

        let result = match self.endpoint("auth/v1/logout") {
            Ok(url) => {
                let builder = self.request(self.http.post(url), session.access_token());
                self.send(builder).await.map(|_| ())
            }
            Err(e) => Err(e),
        };
        self.store_session(None);
        result.map_err(AuthError::from)
    }
}

#[async_trait]
impl RemoteStore for HostedBackend {
    async fn select_posts(&self, query: &FeedQuery) -> std::result::Result<Vec<Post>, StoreError> {
        let url = self
            .endpoint(&format!("rest/v1/{}", query.collection))
            .map_err(StoreError::from)?;
        let builder = self
            .request(self.http.get(url), &self.bearer())
            .query(&rest::select_params(query));
        let rows: Vec<PostRow> = self.send_json(builder).await?;
        debug!(rows = rows.len(), "Selected posts");

        Ok(rows.into_iter().filter_map(PostRow::into_post).collect())
    }

    async fn insert_post(&self, post: &NewPost) -> std::result::Result<(), StoreError> {
        let url = self
            .endpoint(&format!("rest/v1/{}", tradehub_domain::POSTS_COLLECTION))
            .map_err(StoreError::from)?;
        let builder = self
            .request(self.http.post(url), &self.bearer())
            .header("Prefer", "return=minimal")
            .json(&InsertPostRow {
                user_id: post.author_id.as_str(),
                content: post.body.as_str(),
            });
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for HostedBackend {
    async fn subscribe(
        &self,
        collection: &str,
        filter: EventFilter,
    ) -> std::result::Result<Subscription, ChannelError> {
        let topic = PhoenixMessage::topic_for(&self.settings.channel);
        let token = self.bearer();
        let connection = RealtimeConnection::open(ChannelJoin {
            url: self.settings.realtime_url.as_str(),
            topic: topic.clone(),
            collection,
            filter,
            access_token: Some(&token),
            heartbeat: self.settings.heartbeat,
        })
        .await?;

        let id = SubscriptionId::new(format!(
            "{}#{}",
            topic,
            self.next_subscription_id.fetch_add(1, Ordering::Relaxed)
        ));
        let (events, handle) = connection.into_parts();
        self.channels.lock().await.insert(id.clone(), handle);
        info!(subscription = %id, collection, "Realtime subscription established");

        Ok(Subscription::new(id, events))
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> std::result::Result<(), ChannelError> {
        let handle = self
            .channels
            .lock()
            .await
            .remove(id)
            .ok_or_else(|| ChannelError::UnknownSubscription(id.clone()))?;
        handle.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use tradehub_domain::UserId;

    fn config(url: &str) -> FileConfig {
        let mut config = FileConfig::default();
        config.backend.kind = BackendKind::Hosted;
        config.backend.url = url.to_string();
        config.backend.anon_key = "anon-key".to_string();
        config
    }

    fn backend_with_session_file(dir: &tempfile::TempDir) -> HostedBackend {
        let mut config = config("https://demo.example.co");
        config.auth.session_file = Some(dir.path().join("session.json"));
        HostedBackend::from_config(&config).unwrap()
    }

    #[test]
    fn test_realtime_url_is_derived_from_project_url() {
        let settings = HostedSettings::from_config(&config("https://demo.example.co")).unwrap();
        assert_eq!(
            settings.realtime_url.as_str(),
            "wss://demo.example.co/realtime/v1/websocket?apikey=anon-key&vsn=1.0.0"
        );

        let settings = HostedSettings::from_config(&config("http://localhost:54321")).unwrap();
        assert!(settings
            .realtime_url
            .as_str()
            .starts_with("ws://localhost:54321/realtime/v1/websocket?"));
    }

    #[test]
    fn test_explicit_realtime_url_wins() {
        let mut config = config("https://demo.example.co");
        config.backend.realtime_url = Some("wss://rt.example.co/socket".to_string());
        let settings = HostedSettings::from_config(&config).unwrap();
        assert!(settings.realtime_url.as_str().starts_with("wss://rt.example.co/socket?apikey="));
    }

    #[test]
    fn test_endpoints_keep_project_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config("https://gateway.example.co/project-a");
        config.auth.session_file = Some(dir.path().join("session.json"));
        let backend = HostedBackend::from_config(&config).unwrap();

        assert_eq!(
            backend.endpoint("rest/v1/posts").unwrap().as_str(),
            "https://gateway.example.co/project-a/rest/v1/posts"
        );
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            HostedSettings::from_config(&config("not a url")),
            Err(BackendError::InvalidUrl(_))
        ));
        assert!(matches!(
            HostedSettings::from_config(&config("ftp://demo.example.co")),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_persisted_session_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(UserId::new("u1"), "jwt");
        FileSessionStore::new(dir.path().join("session.json"))
            .save(&session)
            .unwrap();

        let backend = backend_with_session_file(&dir);

        assert_eq!(backend.get_session().await.unwrap(), Some(session));
        assert_eq!(backend.bearer(), "jwt");
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let expired = Session::new(UserId::new("u1"), "jwt")
            .with_expiry(Utc::now() - chrono::Duration::minutes(5));
        FileSessionStore::new(&path).save(&expired).unwrap();

        let backend = backend_with_session_file(&dir);

        assert!(backend.get_session().await.unwrap().is_none());
        assert!(!path.exists());
        assert_eq!(backend.bearer(), "anon-key");
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_session_file(&dir);
        backend.sign_out().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend_with_session_file(&dir);
        let result = backend.unsubscribe(&SubscriptionId::new("nope")).await;
        assert!(matches!(result, Err(ChannelError::UnknownSubscription(_))));
    }
}
