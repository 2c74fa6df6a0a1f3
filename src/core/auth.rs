//! Admin authentication guard.
//!
//! Failed attempts and the lockout expiry are persisted through the key-value
//! store, so restarting the process does not lift a lockout. Sessions (one
//! per chat user) hold a login generation: a verification answer that arrives
//! after a newer login was started for the same session never grants access.

use crate::config::SecurityConfig;
use crate::core::verifier::CredentialVerifier;
use crate::errors::Result;
use crate::repository::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Key holding the persisted [`SecurityState`].
pub const SECURITY_STATE_KEY: &str = "admin_security_state";

/// Persisted attempt counter and lockout expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityState {
    /// Consecutive failures since the last success or lockout expiry
    pub failed_attempts: u32,
    /// End of the current lockout
    pub locked_until: Option<DateTime<Utc>>,
}

/// Result of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Correct secret; the session is now authenticated
    Granted,
    /// Wrong secret
    Denied {
        /// Failures left before lockout
        attempts_remaining: u32,
    },
    /// Locked out; the secret was not checked
    LockedOut {
        /// Time until the lockout ends
        remaining: Duration,
    },
    /// A newer login for the same session started; this answer is ignored
    Superseded,
}

impl AuthOutcome {
    /// Message for the person logging in.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Granted => "✅ Logged in as admin.".to_string(),
            Self::Denied { attempts_remaining } => format!(
                "❌ Incorrect password. {attempts_remaining} attempt(s) remaining before lockout."
            ),
            Self::LockedOut { remaining } => {
                let seconds = remaining.num_seconds().max(0);
                let minutes = (seconds + 59) / 60;
                format!("🔒 Too many failed attempts. Try again in {minutes} minute(s).")
            }
            Self::Superseded => "⚠️ A newer login attempt replaced this one.".to_string(),
        }
    }
}

/// Handle for one in-flight login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTicket {
    session: String,
    generation: u64,
}

#[derive(Debug, Default)]
struct Session {
    generation: u64,
    authenticated: bool,
}

/// Lockout state machine plus authenticated sessions.
pub struct AdminGuard {
    kv: Arc<dyn KeyValueStore>,
    verifier: Arc<dyn CredentialVerifier>,
    config: SecurityConfig,
    sessions: Mutex<HashMap<String, Session>>,
}

impl AdminGuard {
    /// Creates a guard.
    #[must_use]
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        verifier: Arc<dyn CredentialVerifier>,
        config: SecurityConfig,
    ) -> Self {
        Self {
            kv,
            verifier,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    async fn load(&self) -> Result<SecurityState> {
        let Some(raw) = self.kv.get_value(SECURITY_STATE_KEY).await? else {
            return Ok(SecurityState::default());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Resetting unreadable admin security state: {}", e);
            SecurityState::default()
        }))
    }

    async fn save(&self, state: &SecurityState) -> Result<()> {
        self.kv
            .set_value(SECURITY_STATE_KEY, &serde_json::to_string(state)?)
            .await
    }

    /// Current persisted state, with an expired lockout already cleared.
    pub async fn state(&self, now: DateTime<Utc>) -> Result<SecurityState> {
        let mut state = self.load().await?;
        if state.locked_until.is_some_and(|until| now >= until) {
            state = SecurityState::default();
            self.save(&state).await?;
            info!("Admin lockout expired");
        }
        Ok(state)
    }

    /// Starts a login for `session`, superseding any login still in flight
    /// for it.
    pub async fn begin(&self, session: &str) -> LoginTicket {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(session.to_string()).or_default();
        entry.generation += 1;
        LoginTicket {
            session: session.to_string(),
            generation: entry.generation,
        }
    }

    async fn is_current(&self, ticket: &LoginTicket) -> bool {
        self.sessions
            .lock()
            .await
            .get(&ticket.session)
            .is_some_and(|s| s.generation == ticket.generation)
    }

    /// Checks `secret` for the login identified by `ticket`.
    ///
    /// While locked out the secret is not checked. Failures count even when
    /// the ticket has been superseded, so racing logins cannot dodge the
    /// lockout.
    ///
    /// # Errors
    /// Store errors, or `Error::Connectivity` if no verifier could answer. A
    /// verifier error does not count as a failed attempt.
    pub async fn submit(
        &self,
        ticket: &LoginTicket,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthOutcome> {
        if !self.is_current(ticket).await {
            return Ok(AuthOutcome::Superseded);
        }

        let mut state = self.state(now).await?;
        if let Some(until) = state.locked_until {
            return Ok(AuthOutcome::LockedOut {
                remaining: until - now,
            });
        }

        let valid = self.verifier.verify(secret).await?;

        if valid {
            if !self.is_current(ticket).await {
                return Ok(AuthOutcome::Superseded);
            }
            self.save(&SecurityState::default()).await?;
            if let Some(session) = self.sessions.lock().await.get_mut(&ticket.session) {
                session.authenticated = true;
            }
            info!("Admin login succeeded for session {}", ticket.session);
            return Ok(AuthOutcome::Granted);
        }

        state.failed_attempts += 1;
        let max_attempts = self.config.max_login_attempts.max(1);
        let outcome = if state.failed_attempts >= max_attempts {
            let lockout = self.config.lockout_duration();
            state.locked_until = Some(now + lockout);
            warn!(
                "Admin login locked for {} minutes after {} failures",
                lockout.num_minutes(),
                state.failed_attempts
            );
            AuthOutcome::LockedOut { remaining: lockout }
        } else {
            warn!(
                "Admin login failed ({}/{})",
                state.failed_attempts, max_attempts
            );
            AuthOutcome::Denied {
                attempts_remaining: max_attempts - state.failed_attempts,
            }
        };
        self.save(&state).await?;

        if self.is_current(ticket).await {
            Ok(outcome)
        } else {
            Ok(AuthOutcome::Superseded)
        }
    }

    /// True if `session` has logged in and not logged out.
    pub async fn is_authenticated(&self, session: &str) -> bool {
        self.sessions
            .lock()
            .await
            .get(session)
            .is_some_and(|s| s.authenticated)
    }

    /// Ends a session. Any login in flight for it is superseded.
    pub async fn logout(&self, session: &str) {
        if let Some(entry) = self.sessions.lock().await.get_mut(session) {
            entry.authenticated = false;
            entry.generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::verifier::DigestVerifier;
    use crate::errors::Error;
    use crate::test_utils::setup_test_store;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const SECRET: &str = "taro-please";

    struct Counting {
        inner: DigestVerifier,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CredentialVerifier for Counting {
        async fn verify(&self, secret: &str) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(secret).await
        }
    }

    struct Down;

    #[async_trait]
    impl CredentialVerifier for Down {
        async fn verify(&self, _secret: &str) -> Result<bool> {
            Err(Error::Connectivity {
                message: "down".to_string(),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    async fn guard() -> (AdminGuard, Arc<Counting>, Arc<crate::repository::SqlStore>) {
        let store = Arc::new(setup_test_store().await.unwrap());
        let verifier = Arc::new(Counting {
            inner: DigestVerifier::from_secret(SECRET),
            calls: AtomicU32::new(0),
        });
        let guard = AdminGuard::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Arc::clone(&verifier) as Arc<dyn CredentialVerifier>,
            SecurityConfig::default(),
        );
        (guard, verifier, store)
    }

    async fn attempt(guard: &AdminGuard, secret: &str, at: DateTime<Utc>) -> AuthOutcome {
        let ticket = guard.begin("user").await;
        guard.submit(&ticket, secret, at).await.unwrap()
    }

    #[tokio::test]
    async fn test_correct_secret_grants_session() {
        let (guard, _, _) = guard().await;
        assert!(!guard.is_authenticated("user").await);
        assert_eq!(attempt(&guard, SECRET, now()).await, AuthOutcome::Granted);
        assert!(guard.is_authenticated("user").await);

        guard.logout("user").await;
        assert!(!guard.is_authenticated("user").await);
    }

    #[tokio::test]
    async fn test_three_failures_lock_and_fourth_is_not_checked() {
        let (guard, verifier, _) = guard().await;

        assert_eq!(
            attempt(&guard, "wrong", now()).await,
            AuthOutcome::Denied {
                attempts_remaining: 2
            }
        );
        assert_eq!(
            attempt(&guard, "wrong", now()).await,
            AuthOutcome::Denied {
                attempts_remaining: 1
            }
        );
        assert_eq!(
            attempt(&guard, "wrong", now()).await,
            AuthOutcome::LockedOut {
                remaining: Duration::minutes(15)
            }
        );
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);

        let fourth = attempt(&guard, SECRET, now() + Duration::minutes(5)).await;
        assert_eq!(
            fourth,
            AuthOutcome::LockedOut {
                remaining: Duration::minutes(10)
            }
        );
        assert!(fourth.message().contains("10 minute"));
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 3);
        assert!(!guard.is_authenticated("user").await);
    }

    #[tokio::test]
    async fn test_lockout_expires_and_success_resets() {
        let (guard, _, _) = guard().await;
        for _ in 0..3 {
            attempt(&guard, "wrong", now()).await;
        }

        let later = now() + Duration::minutes(15);
        assert_eq!(attempt(&guard, SECRET, later).await, AuthOutcome::Granted);
        assert_eq!(guard.state(later).await.unwrap(), SecurityState::default());
    }

    #[tokio::test]
    async fn test_lockout_survives_new_guard() {
        let (guard, _, store) = guard().await;
        for _ in 0..3 {
            attempt(&guard, "wrong", now()).await;
        }

        let fresh = AdminGuard::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Arc::new(DigestVerifier::from_secret(SECRET)),
            SecurityConfig::default(),
        );
        assert!(matches!(
            attempt(&fresh, SECRET, now() + Duration::minutes(1)).await,
            AuthOutcome::LockedOut { .. }
        ));
    }

    #[tokio::test]
    async fn test_success_clears_earlier_failures() {
        let (guard, _, _) = guard().await;
        attempt(&guard, "wrong", now()).await;
        attempt(&guard, "wrong", now()).await;
        assert_eq!(attempt(&guard, SECRET, now()).await, AuthOutcome::Granted);
        assert_eq!(guard.state(now()).await.unwrap().failed_attempts, 0);
        assert_eq!(
            attempt(&guard, "wrong", now()).await,
            AuthOutcome::Denied {
                attempts_remaining: 2
            }
        );
    }

    #[tokio::test]
    async fn test_superseded_login_never_grants() {
        let (guard, _, _) = guard().await;
        let stale = guard.begin("user").await;
        let _fresh = guard.begin("user").await;

        assert_eq!(
            guard.submit(&stale, SECRET, now()).await.unwrap(),
            AuthOutcome::Superseded
        );
        assert!(!guard.is_authenticated("user").await);

        // Other sessions are unaffected by this session's tickets
        let other = guard.begin("someone-else").await;
        assert_eq!(
            guard.submit(&other, "wrong", now()).await.unwrap(),
            AuthOutcome::Denied {
                attempts_remaining: 2
            }
        );
        assert_eq!(guard.state(now()).await.unwrap().failed_attempts, 1);
    }

    #[tokio::test]
    async fn test_verifier_outage_does_not_count() {
        let store = Arc::new(setup_test_store().await.unwrap());
        let guard = AdminGuard::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Arc::new(Down),
            SecurityConfig::default(),
        );
        let ticket = guard.begin("user").await;
        assert!(matches!(
            guard.submit(&ticket, SECRET, now()).await,
            Err(Error::Connectivity { .. })
        ));
        assert_eq!(guard.state(now()).await.unwrap().failed_attempts, 0);
    }
}
