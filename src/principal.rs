//! Caller identity
//!
//! The registry asks an [`AccessPrincipal`] who is calling. Session
//! mechanics (token refresh, sign-in flows) belong to the implementation;
//! the registry only needs an identity string and an expiry flag.

use chrono::{DateTime, Utc};

/// Identity reported for unauthenticated callers.
///
/// An experiment owned by the guest identity is writable by anyone.
pub const GUEST_IDENTITY: &str = "guest";

/// Resolves the identity of the current caller.
pub trait AccessPrincipal: Send + Sync {
    /// Authenticated user id, or [`GUEST_IDENTITY`].
    fn current_identity(&self) -> String;

    /// Whether the principal's credentials are no longer valid.
    fn is_expired(&self) -> bool;

    /// Email of the authenticated user, if known.
    fn email(&self) -> Option<String> {
        None
    }

    /// Whether the caller is authenticated (not the guest identity).
    fn is_authenticated(&self) -> bool {
        self.current_identity() != GUEST_IDENTITY
    }
}

/// Unauthenticated principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestPrincipal;

impl AccessPrincipal for GuestPrincipal {
    fn current_identity(&self) -> String {
        GUEST_IDENTITY.to_string()
    }

    fn is_expired(&self) -> bool {
        false
    }
}

/// Principal with a fixed user id, optional email and optional expiry.
#[derive(Debug, Clone)]
pub struct StaticPrincipal {
    user_id: String,
    email: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl StaticPrincipal {
    /// Principal for `user_id` that never expires.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            expires_at: None,
        }
    }

    /// Set the user's email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Credentials expire at `at`.
    #[must_use]
    pub const fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

impl AccessPrincipal for StaticPrincipal {
    fn current_identity(&self) -> String {
        if self.user_id.is_empty() {
            GUEST_IDENTITY.to_string()
        } else {
            self.user_id.clone()
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    fn email(&self) -> Option<String> {
        self.email.clone()
    }
}
