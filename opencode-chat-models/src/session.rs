//! Session lifetime tracking.

use tracing::warn;

use crate::client::OpenCodeClient;

/// Owns a live server session and deletes it exactly once.
///
/// Call [`release`](Self::release) on every path that can await. If the guard
/// is dropped unreleased (a dropped future or stream), the delete is spawned
/// onto the current Tokio runtime instead.
pub(crate) struct SessionGuard {
    client: OpenCodeClient,
    session_id: Option<String>,
}

impl SessionGuard {
    pub(crate) fn new(client: OpenCodeClient, session_id: String) -> Self {
        Self {
            client,
            session_id: Some(session_id),
        }
    }

    /// Delete the session now.
    pub(crate) async fn release(mut self) {
        if let Some(id) = self.session_id.take() {
            self.client.delete_session(&id).await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    client.delete_session(&id).await;
                });
            }
            Err(_) => {
                warn!(session_id = %id, "No async runtime to delete session from; it will leak");
            }
        }
    }
}
