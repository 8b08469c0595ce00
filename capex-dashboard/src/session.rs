//! Dashboard login sessions.
//!
//! A session is created by a successful login and lives until logout or until
//! it has been idle longer than the configured timeout. Each session carries
//! its own workbench: the last pipeline run, with any spend edits applied.

use std::collections::HashMap;
use std::sync::Arc;

use capex_common::config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pipeline::PipelineRun;

/// Session failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Login is not configured")]
    NotConfigured,

    #[error("Session not found")]
    NotFound,

    #[error("Session expired")]
    Expired,
}

/// One logged-in user.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(skip)]
    pub workbench: Option<PipelineRun>,
}

impl Session {
    pub fn new(username: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            token: Uuid::new_v4().to_string(),
            username: username.into(),
            created_at: now,
            last_activity: now,
            workbench: None,
        }
    }

    /// Check if the session has been idle too long.
    pub fn is_expired(&self, timeout_secs: i64) -> bool {
        Utc::now() - self.last_activity > Duration::seconds(timeout_secs)
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Session store keyed by bearer token.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    auth: Arc<AuthConfig>,
}

impl SessionManager {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            auth: Arc::new(auth),
        }
    }

    pub fn timeout_secs(&self) -> i64 {
        self.auth.session_timeout_secs
    }

    /// Check credentials and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        if !self.auth.is_configured() {
            warn!("Login attempted but no credentials are configured");
            return Err(SessionError::NotConfigured);
        }
        if !self.auth.verify(username, password) {
            warn!(username, "Login rejected");
            return Err(SessionError::InvalidCredentials);
        }

        let session = Session::new(username);
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        info!(username, "Session opened");
        Ok(session)
    }

    /// Resolve a token to its username and mark the session active.
    ///
    /// An expired session is removed on sight.
    pub async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        self.update(token, |session| session.username.clone()).await
    }

    /// Run `f` against a live session, refreshing its activity time.
    pub async fn update<F, R>(&self, token: &str, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&mut Session) -> R,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token).ok_or(SessionError::NotFound)?;

        if session.is_expired(self.timeout_secs()) {
            debug!(username = %session.username, "Session expired");
            sessions.remove(token);
            return Err(SessionError::Expired);
        }

        session.touch();
        Ok(f(session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        let removed = self
            .sessions
            .write()
            .await
            .remove(token)
            .ok_or(SessionError::NotFound)?;
        info!(username = %removed.username, "Session closed");
        Ok(())
    }

    /// Drop idle sessions; returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let timeout = self.timeout_secs();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(timeout));
        before - sessions.len()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
