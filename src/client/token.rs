//! Single-flight access-token refresh for one client session.
//!
//! The session lives behind a `tokio::sync::Mutex`. A refresh holds the lock for
//! the whole network call, so concurrent callers queue on the mutex. Each caller
//! passes the token it saw rejected; once it gets the lock, a different token in
//! the session means someone else already refreshed and the new token is returned
//! without another call. A failed refresh ends the session; callers that queued
//! behind it with the same stale token receive the same error.

use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::auth::TokenPair;
use crate::client::ClientError;

/// Refresh this long before the access token actually expires.
const DEFAULT_REFRESH_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct Session {
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<TokenPair> for Session {
    fn from(pair: TokenPair) -> Self {
        Session {
            expires_at: Utc::now() + Duration::seconds(pair.expires_in),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug)]
enum SessionState {
    Empty,
    Active(Session),
    /// The refresh of `stale` failed with `error`.
    Failed { stale: String, error: ClientError },
}

impl SessionState {
    fn active(&self) -> Option<&Session> {
        match self {
            SessionState::Active(session) => Some(session),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct TokenCoordinator {
    session: Mutex<SessionState>,
    refresh_skew: Duration,
}

impl Default for TokenCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCoordinator {
    pub fn new() -> Self {
        Self::with_skew(Duration::seconds(DEFAULT_REFRESH_SKEW_SECS))
    }

    pub fn with_skew(refresh_skew: Duration) -> Self {
        Self {
            session: Mutex::new(SessionState::Empty),
            refresh_skew,
        }
    }

    pub async fn set_session(&self, pair: TokenPair) {
        *self.session.lock().await = SessionState::Active(Session::from(pair));
    }

    pub async fn clear(&self) {
        *self.session.lock().await = SessionState::Empty;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.lock().await.active().is_some()
    }

    /// The current access token, without checking its expiry.
    pub async fn access_token(&self) -> Option<String> {
        self.session.lock().await.active().map(|s| s.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.session.lock().await.active().map(|s| s.refresh_token.clone())
    }

    /// Returns a usable access token, refreshing first if it is about to expire.
    ///
    /// # Errors
    ///
    /// [`ClientError::NotAuthenticated`] without a session, or whatever the
    /// refresher returns.
    pub async fn acquire_token<F, Fut>(&self, refresher: F) -> Result<String, ClientError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenPair, ClientError>>,
    {
        let stale = {
            let guard = self.session.lock().await;
            let session = guard.active().ok_or(ClientError::NotAuthenticated)?;
            if session.expires_at - self.refresh_skew > Utc::now() {
                return Ok(session.access_token.clone());
            }
            session.access_token.clone()
        };
        self.refresh(&stale, refresher).await
    }

    /// Replaces `stale` with a fresh access token.
    ///
    /// `refresher` receives the refresh token and is only called when the session
    /// still holds `stale`. On failure the session is cleared and callers waiting
    /// behind this one with the same `stale` token get a copy of the error.
    ///
    /// # Errors
    ///
    /// The refresher's error, or [`ClientError::NotAuthenticated`] when there is
    /// no session left to refresh.
    pub async fn refresh<F, Fut>(&self, stale: &str, refresher: F) -> Result<String, ClientError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<TokenPair, ClientError>>,
    {
        let mut guard = self.session.lock().await;
        let session = match &*guard {
            SessionState::Active(session) => session,
            SessionState::Failed { stale: failed, error } if failed == stale => {
                return Err(error.clone());
            }
            _ => return Err(ClientError::NotAuthenticated),
        };
        if session.access_token != stale {
            tracing::debug!("token already refreshed by a concurrent caller");
            return Ok(session.access_token.clone());
        }

        match refresher(session.refresh_token.clone()).await {
            Ok(pair) => {
                let session = Session::from(pair);
                let token = session.access_token.clone();
                *guard = SessionState::Active(session);
                tracing::debug!("access token refreshed");
                Ok(token)
            }
            Err(err) => {
                *guard = SessionState::Failed {
                    stale: stale.to_string(),
                    error: err.clone(),
                };
                tracing::warn!(error = %err, "token refresh failed; session cleared");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    fn pair(access: &str, expires_in: i64) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: format!("refresh-{access}"),
            expires_in,
        }
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_call() {
        let coordinator = Arc::new(TokenCoordinator::new());
        coordinator.set_session(pair("old", 900)).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh("old", |refresh_token| async move {
                        assert_eq!(refresh_token, "refresh-old");
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(pair("new", 900))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "new");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.refresh_token().await.as_deref(), Some("refresh-new"));
    }

    #[tokio::test]
    async fn failed_refresh_error_reaches_waiters() {
        let coordinator = TokenCoordinator::new();
        coordinator.set_session(pair("old", 900)).await;

        let first = coordinator
            .refresh("old", |_| async { Err(ClientError::SessionExpired) })
            .await;
        assert!(matches!(first, Err(ClientError::SessionExpired)));
        assert!(!coordinator.is_authenticated().await);

        let second = coordinator
            .refresh("old", |_| async { Ok(pair("never", 900)) })
            .await;
        assert!(matches!(second, Err(ClientError::SessionExpired)), "got {second:?}");

        let unrelated = coordinator
            .refresh("other", |_| async { Ok(pair("never", 900)) })
            .await;
        assert!(matches!(unrelated, Err(ClientError::NotAuthenticated)));
        let next = coordinator.acquire_token(|_| async { Ok(pair("never", 900)) }).await;
        assert!(matches!(next, Err(ClientError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn concurrent_waiters_share_one_failed_refresh() {
        let coordinator = Arc::new(TokenCoordinator::new());
        coordinator.set_session(pair("old", 900)).await;
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .refresh("old", |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Err(ClientError::Api {
                            status: 500,
                            message: "refresh backend down".to_string(),
                        })
                    })
                    .await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Err(ClientError::Api { status, message }) => {
                    assert_eq!(status, 500);
                    assert_eq!(message, "refresh backend down");
                }
                other => panic!("expected the refresh error, got {other:?}"),
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_token_is_returned_without_refresh() {
        let coordinator = TokenCoordinator::new();
        coordinator.set_session(pair("live", 900)).await;

        let token = coordinator
            .acquire_token(|_| async { Ok(pair("unexpected", 900)) })
            .await
            .unwrap();
        assert_eq!(token, "live");
    }

    #[tokio::test]
    async fn token_near_expiry_is_refreshed_first() {
        let coordinator = TokenCoordinator::new();
        coordinator.set_session(pair("expiring", 10)).await;

        let token = coordinator
            .acquire_token(|_| async { Ok(pair("renewed", 900)) })
            .await
            .unwrap();
        assert_eq!(token, "renewed");
        assert_eq!(coordinator.access_token().await.as_deref(), Some("renewed"));
    }

    #[tokio::test]
    async fn no_session_means_not_authenticated() {
        let coordinator = TokenCoordinator::new();
        let result = coordinator.acquire_token(|_| async { Ok(pair("x", 900)) }).await;
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    }
}
