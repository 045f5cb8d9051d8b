use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use super::{AuthProvider, Identity};
use crate::error::StudioResult;

/// Auth provider for a single preconfigured local identity
///
/// Sign-in publishes the identity, sign-out clears it. Used by the bundled
/// binary where no third-party identity provider is wired in.
pub struct LocalAuth {
    identity: Identity,
    tx: watch::Sender<Option<Identity>>,
}

impl LocalAuth {
    pub fn new(identity: Identity) -> Self {
        let (tx, _) = watch::channel(None);
        Self { identity, tx }
    }

    /// Start out signed in, as when a session is restored at load
    pub fn signed_in(identity: Identity) -> Self {
        let (tx, _) = watch::channel(Some(identity.clone()));
        Self { identity, tx }
    }

    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn sign_in(&self) -> StudioResult<()> {
        info!("Signing in as {}", self.identity.id);
        self.tx.send_replace(Some(self.identity.clone()));
        Ok(())
    }

    async fn sign_out(&self) -> StudioResult<()> {
        info!("Signing out");
        self.tx.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
