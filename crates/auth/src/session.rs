//! In-memory operator sessions with sliding expiry.
//!
//! An operator is authorized while less than `ttl` has elapsed since their
//! last authorized action. Every successful check moves the window forward;
//! an expired entry is evicted by the check that finds it.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use {
    maxrelay_common::OperatorId,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::password::verify_password;

/// One hour, measured from the last authorized action.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

pub struct SessionAuthority {
    password: Secret<String>,
    ttl: Duration,
    sessions: Mutex<HashMap<OperatorId, Instant>>,
}

impl SessionAuthority {
    pub fn new(password: Secret<String>, ttl: Duration) -> Self {
        if password.expose_secret().is_empty() {
            warn!("admin password is empty, every login attempt will be rejected");
        }
        Self {
            password,
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open a session for `operator` if `password` matches.
    pub fn authenticate(&self, operator: OperatorId, password: &str) -> bool {
        self.authenticate_at(operator, password, Instant::now())
    }

    pub fn authenticate_at(&self, operator: OperatorId, password: &str, now: Instant) -> bool {
        if !verify_password(password, self.password.expose_secret()) {
            warn!(%operator, "rejected login attempt");
            return false;
        }
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, last| now.saturating_duration_since(*last) < self.ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "dropped expired operator sessions");
        }
        sessions.insert(operator, now);
        info!(%operator, "operator authenticated");
        true
    }

    /// Whether `operator` holds a live session. Refreshes it on success.
    pub fn is_authorized(&self, operator: OperatorId) -> bool {
        self.is_authorized_at(operator, Instant::now())
    }

    pub fn is_authorized_at(&self, operator: OperatorId, now: Instant) -> bool {
        let mut sessions = self.lock();
        let Some(last) = sessions.get_mut(&operator) else {
            return false;
        };
        if now.saturating_duration_since(*last) < self.ttl {
            *last = now;
            return true;
        }
        sessions.remove(&operator);
        debug!(%operator, "operator session expired");
        false
    }

    /// Drop the session. Returns whether one existed.
    pub fn logout(&self, operator: OperatorId) -> bool {
        let removed = self.lock().remove(&operator).is_some();
        if removed {
            info!(%operator, "operator logged out");
        }
        removed
    }

    /// Sessions currently held, including ones not yet evicted.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<OperatorId, Instant>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const OP: OperatorId = OperatorId(1001);
    const HOUR: Duration = Duration::from_secs(3600);

    fn authority() -> SessionAuthority {
        SessionAuthority::new(Secret::new("letmein".into()), HOUR)
    }

    #[test]
    fn test_wrong_password_opens_no_session() {
        let auth = authority();
        assert!(!auth.authenticate(OP, "nope"));
        assert!(!auth.is_authorized(OP));
    }

    #[test]
    fn test_authorized_until_ttl_elapses() {
        let auth = authority();
        let t0 = Instant::now();
        assert!(auth.authenticate_at(OP, "letmein", t0));
        assert!(auth.is_authorized_at(OP, t0));

        let auth = authority();
        auth.authenticate_at(OP, "letmein", t0);
        assert!(auth.is_authorized_at(OP, t0 + HOUR - Duration::from_millis(1)));

        let auth = authority();
        auth.authenticate_at(OP, "letmein", t0);
        assert!(!auth.is_authorized_at(OP, t0 + HOUR));
    }

    #[test]
    fn test_authorized_check_slides_the_window() {
        let auth = authority();
        let t0 = Instant::now();
        auth.authenticate_at(OP, "letmein", t0);

        let t1 = t0 + Duration::from_secs(1800);
        assert!(auth.is_authorized_at(OP, t1));
        // Past the original deadline but inside the extended one.
        assert!(auth.is_authorized_at(OP, t0 + HOUR + Duration::from_secs(60)));
        let t2 = t0 + HOUR + Duration::from_secs(60);
        assert!(!auth.is_authorized_at(OP, t2 + HOUR));
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let auth = authority();
        let t0 = Instant::now();
        auth.authenticate_at(OP, "letmein", t0);
        assert_eq!(auth.session_count(), 1);
        assert!(!auth.is_authorized_at(OP, t0 + HOUR * 2));
        assert_eq!(auth.session_count(), 0);
        // Stays rejected even if the clock is wound back.
        assert!(!auth.is_authorized_at(OP, t0));
    }

    #[test]
    fn test_login_sweeps_abandoned_sessions() {
        let auth = authority();
        let t0 = Instant::now();
        auth.authenticate_at(OperatorId(1), "letmein", t0);
        auth.authenticate_at(OperatorId(2), "letmein", t0 + Duration::from_secs(1800));
        assert_eq!(auth.session_count(), 2);

        auth.authenticate_at(OP, "letmein", t0 + HOUR + Duration::from_secs(1));
        assert_eq!(auth.session_count(), 2);
        assert!(!auth.is_authorized_at(OperatorId(1), t0 + HOUR + Duration::from_secs(2)));
        assert!(auth.is_authorized_at(OperatorId(2), t0 + HOUR + Duration::from_secs(2)));
    }

    #[test]
    fn test_logout() {
        let auth = authority();
        auth.authenticate(OP, "letmein");
        assert!(auth.logout(OP));
        assert!(!auth.logout(OP));
        assert!(!auth.is_authorized(OP));
    }

    #[test]
    fn test_sessions_are_per_operator() {
        let auth = authority();
        auth.authenticate(OP, "letmein");
        assert!(!auth.is_authorized(OperatorId(2002)));
    }
}
