//! Process-start bootstrap: tokens and the sequence seed.

use std::sync::Arc;

use imgdrop_core::UploaderConfig;
use imgdrop_storage::Storage;

use crate::gate::{fetch_server_token, AuthorizationContext};

/// Everything read once when the process starts.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub auth: AuthorizationContext,
    /// Best-effort count of existing objects, used as the first sequence number.
    pub initial_count: u64,
}

impl Session {
    /// Capture the launch token, fetch the server token and seed the counter.
    ///
    /// Never fails: an unreadable server token leaves the gate closed and a failed
    /// listing seeds the counter at 0.
    #[tracing::instrument(skip(config, storage, launch_query), fields(prefix = %config.key_prefix))]
    pub async fn bootstrap(
        config: &UploaderConfig,
        storage: &Arc<dyn Storage>,
        launch_query: Option<&str>,
    ) -> Self {
        let client_token = launch_query.and_then(|query| {
            AuthorizationContext::token_from_launch_query(query, &config.token_param)
        });
        if client_token.is_none() {
            tracing::info!(param = %config.token_param, "No client token in launch query");
        }

        let server_token = fetch_server_token(storage, &config.server_token_key).await;

        let initial_count = match storage.count_objects(&config.key_prefix).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to count existing objects, starting at 0");
                0
            }
        };

        tracing::info!(
            initial_count,
            has_client_token = client_token.is_some(),
            has_server_token = server_token.is_some(),
            "Session started"
        );

        Self {
            auth: AuthorizationContext::new(client_token, server_token),
            initial_count,
        }
    }
}
