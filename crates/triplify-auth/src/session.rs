//! Server-side sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use triplify_common::{Result, TriplifyError};
use triplify_store::Access;
use uuid::Uuid;

/// What the server remembers about a logged-in browser.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub username: String,
    pub admin: bool,
    pub blocked: bool,
    pub group: String,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { blocked: true, ..Default::default() }
    }

    pub fn logged_in(&self) -> bool {
        !self.username.is_empty()
    }

    /// 401 for anonymous sessions, 423 for blocked accounts.
    pub fn check_auth(&self) -> Result<()> {
        if !self.logged_in() {
            return Err(TriplifyError::Unauthorized);
        }
        if self.blocked {
            return Err(TriplifyError::Locked);
        }
        Ok(())
    }

    /// 403 for everyone but admins.
    pub fn check_admin(&self) -> Result<()> {
        if !self.admin {
            return Err(TriplifyError::Forbidden);
        }
        Ok(())
    }

    /// The identity the query builders work with.
    pub fn access(&self) -> Access {
        Access {
            username: self.username.clone(),
            admin: self.admin,
            group: self.group.clone(),
        }
    }
}

/// In-memory session table, shared behind the app state.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session, returning its cookie token.
    pub async fn insert(&self, session: Session) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions.write().await.insert(token.clone(), session);
        token
    }

    pub async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Replace the session stored under an existing token.
    pub async fn replace(&self, token: &str, session: Session) {
        self.sessions.write().await.insert(token.to_string(), session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_sessions_fail_the_auth_check() {
        let session = Session::anonymous();
        assert!(matches!(session.check_auth(), Err(TriplifyError::Unauthorized)));
    }

    #[test]
    fn blocked_accounts_are_locked_out() {
        let session = Session {
            username: "alice".to_string(),
            blocked: true,
            ..Default::default()
        };
        assert!(matches!(session.check_auth(), Err(TriplifyError::Locked)));
    }

    #[test]
    fn admin_check_rejects_plain_users() {
        let session = Session {
            username: "alice".to_string(),
            ..Default::default()
        };
        assert!(session.check_auth().is_ok());
        assert!(matches!(session.check_admin(), Err(TriplifyError::Forbidden)));
    }

    #[tokio::test]
    async fn sessions_round_trip_through_the_store() {
        let store = SessionStore::new();
        let token = store
            .insert(Session {
                username: "alice".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(store.get(&token).await.unwrap().username, "alice");
        store.remove(&token).await;
        assert!(store.get(&token).await.is_none());
    }
}
