// Authenticated request gateway
// Wraps outbound calls with bearer attachment, coordinates a single in-flight
// token refresh, and replays queued requests in FIFO order with the new token.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::auth::store::CredentialStore;
use crate::auth::types::{AuthResponse, RefreshRequest};
use crate::config::Config;
use crate::error::ApiError;
use crate::transport::{HttpTransport, RequestDescriptor, Transport};

/// Refresh exchange endpoint, relative to the API base
const REFRESH_PATH: &str = "/auth/refresh";

/// A dispatch that hit an auth failure while a refresh was already in flight.
/// Holds enough of the original request to replay it once the refresh
/// resolves, and the channel its caller is waiting on.
struct PendingRequest {
    request: RequestDescriptor,
    tx: oneshot::Sender<Result<Value, ApiError>>,
}

/// Refresh slot and queue. Guarded by one mutex that is never held across an
/// await, so check-and-flip is atomic with respect to other dispatches.
#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<PendingRequest>,
}

struct GatewayInner {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    state: Mutex<RefreshState>,
    refresh_timeout: Duration,
}

/// Authenticated API client. Cheap to clone; all clones share one credential
/// store and one refresh slot.
#[derive(Clone)]
pub struct RequestGateway {
    inner: Arc<GatewayInner>,
}

impl RequestGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                transport,
                store,
                state: Mutex::new(RefreshState::default()),
                refresh_timeout,
            }),
        }
    }

    /// Build a gateway with the production HTTP transport and the configured
    /// credential store.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(
            &config.api_url,
            config.connect_timeout,
            config.request_timeout,
        )?;
        let store = match &config.credentials_db {
            Some(path) => CredentialStore::open(path)?,
            None => CredentialStore::in_memory(),
        };
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(store),
            Duration::from_secs(config.refresh_timeout),
        ))
    }

    pub fn store(&self) -> &CredentialStore {
        &self.inner.store
    }

    /// Single entry point for authenticated API calls.
    ///
    /// Attaches the stored access token, recovers transparently from an
    /// expired token via the refresh exchange, and otherwise forwards the
    /// failure unchanged. May clear stored credentials as a side effect
    /// (revoked/banned signals and failed refreshes).
    pub async fn dispatch(&self, request: RequestDescriptor) -> Result<Value, ApiError> {
        let request_id = short_request_id();
        let token = self.inner.store.access_token();
        let outcome = self.inner.transport.send(&request, token.as_deref()).await;

        let (status, message) = match outcome {
            Ok(value) => return Ok(value),
            Err(ApiError::Status { status, message }) => (status, message),
            Err(other) => return Err(other),
        };

        // Revoked/banned signals bypass the refresh cycle entirely
        if is_unrecoverable(status, &message) {
            tracing::warn!(
                "[{}] Unrecoverable auth failure ({}), clearing credentials",
                request_id,
                status
            );
            self.inner.store.clear_tokens();
            return Err(ApiError::Unrecoverable { status, message });
        }

        if status != 401 {
            return Err(ApiError::Status { status, message });
        }

        // Join the active refresh or become its holder. The flag flips under
        // the lock, before any await, so exactly one dispatch wins the slot.
        let waiter = {
            let mut state = self.inner.state.lock().unwrap();
            if state.refreshing {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(PendingRequest {
                    request: request.clone(),
                    tx,
                });
                Some(rx)
            } else {
                state.refreshing = true;
                None
            }
        };

        match waiter {
            Some(rx) => {
                tracing::debug!("[{}] Queued behind in-flight token refresh", request_id);
                rx.await.unwrap_or_else(|_| {
                    Err(ApiError::RefreshFailed(
                        "refresh coordinator dropped".to_string(),
                    ))
                })
            }
            None => {
                tracing::info!("[{}] Access token rejected, starting refresh", request_id);
                self.refresh_and_replay(request, status, message).await
            }
        }
    }

    /// Runs the refresh exchange while holding the refresh slot, then drains
    /// the queue. Replays go straight through the transport, so they can
    /// never re-enter the refresh cycle.
    async fn refresh_and_replay(
        &self,
        trigger: RequestDescriptor,
        trigger_status: u16,
        trigger_message: String,
    ) -> Result<Value, ApiError> {
        let mut slot = SlotGuard::new(&self.inner);

        let Some(refresh_token) = self.inner.store.refresh_token() else {
            tracing::warn!("No refresh token stored, clearing credentials");
            self.inner.store.clear_tokens();
            for pending in slot.release() {
                let _ = pending.tx.send(Err(ApiError::Status {
                    status: trigger_status,
                    message: trigger_message.clone(),
                }));
            }
            return Err(ApiError::Status {
                status: trigger_status,
                message: trigger_message,
            });
        };

        let refresh_request = RequestDescriptor::post(REFRESH_PATH)
            .with_json(serde_json::json!(RefreshRequest { refresh_token }));
        let exchange = self.inner.transport.send(&refresh_request, None);

        let auth: AuthResponse =
            match tokio::time::timeout(self.inner.refresh_timeout, exchange).await {
                Ok(Ok(value)) => match serde_json::from_value(value) {
                    Ok(auth) => auth,
                    Err(e) => {
                        return self
                            .fail_refresh(slot, format!("malformed refresh response: {}", e))
                    }
                },
                Ok(Err(e)) => return self.fail_refresh(slot, e.to_string()),
                Err(_) => {
                    return self.fail_refresh(
                        slot,
                        format!("timed out after {:?}", self.inner.refresh_timeout),
                    )
                }
            };

        self.inner
            .store
            .set_tokens(&auth.access_token, &auth.refresh_token);

        // Back to IDLE before draining; dispatches arriving from here on see
        // the new token and proceed normally.
        let pending = slot.release();
        tracing::info!(
            "Token refresh succeeded, replaying {} queued request(s)",
            pending.len()
        );
        for entry in pending {
            let result = self
                .inner
                .transport
                .send(&entry.request, Some(&auth.access_token))
                .await;
            let _ = entry.tx.send(result);
        }

        self.inner
            .transport
            .send(&trigger, Some(&auth.access_token))
            .await
    }

    fn fail_refresh(&self, mut slot: SlotGuard<'_>, reason: String) -> Result<Value, ApiError> {
        tracing::error!("Token refresh failed: {}", reason);
        self.inner.store.clear_tokens();
        for pending in slot.release() {
            let _ = pending
                .tx
                .send(Err(ApiError::RefreshFailed(reason.clone())));
        }
        Err(ApiError::RefreshFailed(reason))
    }
}

/// Holds the refresh slot. Dropping it without `release` (holder panicked or
/// was cancelled mid-exchange) restores the idle state and rejects anything
/// still queued.
struct SlotGuard<'a> {
    inner: &'a GatewayInner,
    released: bool,
}

impl<'a> SlotGuard<'a> {
    fn new(inner: &'a GatewayInner) -> Self {
        Self {
            inner,
            released: false,
        }
    }

    /// Return to IDLE and take ownership of the queue for draining
    fn release(&mut self) -> VecDeque<PendingRequest> {
        self.released = true;
        let mut state = self.inner.state.lock().unwrap();
        state.refreshing = false;
        std::mem::take(&mut state.queue)
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        state.refreshing = false;
        for pending in state.queue.drain(..) {
            let _ = pending
                .tx
                .send(Err(ApiError::RefreshFailed("refresh aborted".to_string())));
        }
    }
}

/// Failures no refresh can fix: the backend revoked the token or banned the
/// account. Matched by case-insensitive substring against the backend's
/// free-text error messages.
fn is_unrecoverable(status: u16, message: &str) -> bool {
    let message = message.to_lowercase();
    (status == 401 && message.contains("token revoked"))
        || (status == 403 && message.contains("banned"))
}

fn short_request_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}
