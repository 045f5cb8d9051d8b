//! Sign-in and the access gate
//!
//! The studio never asks the auth collaborator "who is signed in"; it only
//! reacts to the identity notifications delivered through
//! [`AuthProvider::subscribe`], including the initial one.

mod local;

pub use local::LocalAuth;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

use crate::error::StudioResult;

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

/// Auth collaborator
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Start sign-in with the identity provider
    async fn sign_in(&self) -> StudioResult<()>;

    async fn sign_out(&self) -> StudioResult<()>;

    /// Identity changes; the current value is the identity at subscription time
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// Whether capture may be started
#[derive(Debug, Clone, Default)]
pub struct AccessGate {
    require_login: bool,
    identity: Option<Identity>,
}

/// Result of applying an identity notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Granted,
    Revoked,
    Unchanged,
}

impl AccessGate {
    pub fn new(require_login: bool) -> Self {
        Self {
            require_login,
            identity: None,
        }
    }

    pub fn apply(&mut self, identity: Option<Identity>) -> AccessChange {
        let was_authorized = self.is_authorized();
        match &identity {
            Some(id) => info!("Identity established: {}", id.id),
            None if self.identity.is_some() => info!("Identity cleared"),
            None => {}
        }
        self.identity = identity;

        match (was_authorized, self.is_authorized()) {
            (false, true) => AccessChange::Granted,
            (true, false) => AccessChange::Revoked,
            _ => AccessChange::Unchanged,
        }
    }

    pub fn is_authorized(&self) -> bool {
        !self.require_login || self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }
}
