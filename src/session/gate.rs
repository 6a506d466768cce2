//! Session gate
//!
//! Holds the current session and decides whether protected calls may go out.
//! A session is only usable while its token decodes and its `exp` claim is
//! not in the past; anything else counts as no session at all.

use crate::core::error::SessionError;
use crate::core::events::{ClearReason, ClientEvent, EventBus, SessionEvent};
use crate::session::store::SessionStore;
use crate::session::token::{Claims, decode_claims};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// The logged-in user as seen by the portal
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionUser {
    pub login: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl SessionUser {
    /// User derived from token claims (`sub` and `permissions`)
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            login: claims.sub.clone().unwrap_or_default(),
            permissions: claims.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub claims: Claims,
}

impl Session {
    /// Build a session from a token, rejecting undecodable or expired ones
    pub fn from_token(token: &str, now: DateTime<Utc>) -> Result<Self, SessionError> {
        let claims = decode_claims(token).map_err(|e| {
            tracing::debug!(error = %e, "rejecting undecodable token");
            SessionError::NotAuthenticated
        })?;
        if claims.is_expired_at(now) {
            return Err(SessionError::NotAuthenticated);
        }
        Ok(Self {
            token: token.to_string(),
            user: SessionUser::from_claims(&claims),
            claims,
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.claims.is_expired_at(now)
    }
}

pub struct SessionGate {
    current: RwLock<Option<Session>>,
    store: Arc<dyn SessionStore>,
    events: EventBus,
}

impl SessionGate {
    pub fn new(store: Arc<dyn SessionStore>, events: EventBus) -> Self {
        Self {
            current: RwLock::new(None),
            store,
            events,
        }
    }

    fn set(&self, session: Option<Session>) -> Option<Session> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, session)
    }

    /// Restore the persisted session, if it is still usable
    ///
    /// An expired or undecodable persisted token is removed from the store.
    pub async fn rehydrate(&self) -> Result<Option<SessionUser>, SessionError> {
        let Some(token) = self.store.load().await? else {
            return Ok(None);
        };

        match Session::from_token(&token, Utc::now()) {
            Ok(session) => {
                let user = session.user.clone();
                self.set(Some(session));
                tracing::info!(login = %user.login, "session restored");
                self.events
                    .publish(ClientEvent::Session(SessionEvent::Established {
                        login: Some(user.login.clone()),
                    }));
                Ok(Some(user))
            }
            Err(_) => {
                tracing::info!("discarding expired or unreadable stored session");
                self.store.clear().await?;
                Ok(None)
            }
        }
    }

    /// Install a freshly issued token
    ///
    /// `login` is the name the user logged in with, `permissions` the list
    /// returned by the backend; either falls back to the token claims when
    /// absent.
    pub async fn establish(
        &self,
        token: &str,
        login: Option<&str>,
        permissions: Vec<String>,
    ) -> Result<SessionUser, SessionError> {
        let mut session = Session::from_token(token, Utc::now())?;
        if let Some(login) = login {
            session.user.login = login.to_string();
        }
        if !permissions.is_empty() {
            session.user.permissions = permissions;
        }

        self.store.save(token).await?;
        let user = session.user.clone();
        self.set(Some(session));

        tracing::info!(login = %user.login, "session established");
        self.events
            .publish(ClientEvent::Session(SessionEvent::Established {
                login: Some(user.login.clone()),
            }));
        Ok(user)
    }

    /// Drop the session from memory and storage
    ///
    /// Returns whether a session was present. The `Cleared` event is only
    /// published in that case, so concurrent 401s produce a single event.
    pub async fn clear(&self, reason: ClearReason) -> bool {
        let previous = self.set(None);
        if let Err(e) = self.store.clear().await {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }

        if previous.is_some() {
            tracing::info!(reason = ?reason, "session cleared");
            self.events
                .publish(ClientEvent::Session(SessionEvent::Cleared { reason }));
        }
        previous.is_some()
    }

    /// Token to send as `Authorization: Bearer`, only while valid
    pub fn bearer_token(&self) -> Option<String> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .filter(|session| session.is_valid_at(Utc::now()))
            .map(|session| session.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    /// Whether a session is held whose token has expired since it was installed
    pub fn has_expired_session(&self) -> bool {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .is_some_and(|session| !session.is_valid_at(Utc::now()))
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.current().map(|session| session.user)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl std::fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGate")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
