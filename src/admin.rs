use chrono::{DateTime, Duration, Utc};

use crate::error::BookingError;

/// Shared-secret check for the admin commands.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    password: String,
    session_ttl: Duration,
}

/// Server-side admin session, kept in the chat's state and checked on every
/// admin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminSession {
    expires_at: DateTime<Utc>,
}

impl AdminAuth {
    pub fn new(password: impl Into<String>, session_ttl: Duration) -> Self {
        AdminAuth {
            password: password.into(),
            session_ttl,
        }
    }

    pub fn login(&self, attempt: &str, now: DateTime<Utc>) -> Result<AdminSession, BookingError> {
        if !constant_time_eq(attempt.trim().as_bytes(), self.password.as_bytes()) {
            warn!("rejected admin login attempt");
            return Err(BookingError::Unauthorized);
        }
        Ok(AdminSession {
            expires_at: now + self.session_ttl,
        })
    }
}

impl AdminSession {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Fails unless `session` exists and has not expired.
pub fn require(session: Option<&AdminSession>, now: DateTime<Utc>) -> Result<(), BookingError> {
    match session {
        Some(s) if s.is_active(now) => Ok(()),
        _ => Err(BookingError::Unauthorized),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
