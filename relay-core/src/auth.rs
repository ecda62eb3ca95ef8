//! Session validation collaborator

use async_trait::async_trait;
use config::SessionEntry;
use std::collections::HashMap;

use crate::storage::UserId;

/// Maps an inbound session credential to the user it belongs to.
#[async_trait]
pub trait SessionValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Option<UserId>;
}

/// Accepts the fixed set of tokens listed in the settings file.
#[derive(Debug, Default)]
pub struct StaticSessionValidator {
    sessions: HashMap<String, UserId>,
}

impl StaticSessionValidator {
    pub fn new(entries: &[SessionEntry]) -> Self {
        StaticSessionValidator {
            sessions: entries
                .iter()
                .filter(|e| !e.token.is_empty())
                .map(|e| (e.token.clone(), UserId::from_string(&e.user_id)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionValidator for StaticSessionValidator {
    async fn validate(&self, token: &str) -> Option<UserId> {
        self.sessions.get(token).cloned()
    }
}
