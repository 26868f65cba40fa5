//! Background token renewal.
//!
//! After a successful register or login the refresher sleeps until half of
//! the token's remaining lifetime has passed, then logs in again with the
//! same credentials. Failures are retried at a fixed interval until one
//! succeeds. Only the session's shutdown stops the loop.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::AuthApi;
use crate::token::TokenHolder;
use lockbox_common::Credentials;

/// Default delay between failed renewal attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Time to wait before renewing a token that expires at `expires_at`:
/// half the remaining lifetime, or zero if it already expired.
pub fn renewal_delay(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expires_at - now)
        .to_std()
        .map(|remaining| remaining / 2)
        .unwrap_or(Duration::ZERO)
}

/// One renewal loop per session.
pub struct TokenRefresher {
    api: Arc<dyn AuthApi>,
    holder: TokenHolder,
    retry_interval: Duration,
    started: AtomicBool,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TokenRefresher {
    pub fn new(api: Arc<dyn AuthApi>, holder: TokenHolder, retry_interval: Duration) -> Self {
        Self {
            api,
            holder,
            retry_interval,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Start the renewal loop unless it is already running.
    ///
    /// Returns `true` if this call started it. Concurrent callers race on a
    /// compare-and-swap; exactly one wins.
    pub async fn start(&self, credentials: Credentials, expires_at: DateTime<Utc>) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Token refresher already running");
            return false;
        }

        let task = refresh_loop(
            Arc::clone(&self.api),
            self.holder.clone(),
            credentials,
            expires_at,
            self.retry_interval,
            self.cancel.clone(),
        );
        *self.handle.lock().await = Some(tokio::spawn(task));
        info!("Token refresher started");
        true
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Stop the loop, including a pending retry, and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Token refresher task failed");
            }
            debug!("Token refresher stopped");
        }
    }
}

async fn refresh_loop(
    api: Arc<dyn AuthApi>,
    holder: TokenHolder,
    credentials: Credentials,
    mut expires_at: DateTime<Utc>,
    retry_interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        let delay = renewal_delay(expires_at, Utc::now());
        debug!(delay_secs = delay.as_secs(), "Token renewal scheduled");
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return,
                result = api.login(&credentials) => result,
            };

            match attempt {
                Ok(token) => {
                    expires_at = token.expires_at;
                    holder.set(token).await;
                    info!(expires_at = %expires_at, "Token renewed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, retry_secs = retry_interval.as_secs(), "Token renewal failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(retry_interval) => {}
                    }
                }
            }
        }
    }
}
