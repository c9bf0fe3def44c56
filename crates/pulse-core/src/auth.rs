//! Authenticated session context.
//!
//! The transport resolves who is on the other end of a connection exactly
//! once, at upgrade time, and hands the result to every inbound operation as
//! a [`SessionContext`]. Nothing below the transport inspects raw
//! credentials.

use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId};

/// A resolved, authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Tracker user ID.
    pub user_id: UserId,
    /// Optional name for logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Principal {
    /// Principal with only a user ID.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
        }
    }
}

/// Everything an inbound operation knows about its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionContext {
    /// Transport connection this call arrived on.
    pub session_id: SessionId,
    /// Authenticated user, `None` when the transport could not resolve one.
    pub principal: Option<Principal>,
}

impl SessionContext {
    /// Context for an authenticated caller.
    pub fn authenticated(session_id: impl Into<SessionId>, principal: Principal) -> Self {
        Self {
            session_id: session_id.into(),
            principal: Some(principal),
        }
    }

    /// Context for a caller with no usable credentials.
    pub fn anonymous(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            principal: None,
        }
    }

    /// User ID of the principal, if authenticated.
    pub fn user_id(&self) -> Option<UserId> {
        self.principal.as_ref().map(|p| p.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_context_exposes_user() {
        let ctx = SessionContext::authenticated("sess-1", Principal::new(UserId(10)));
        assert_eq!(ctx.user_id(), Some(UserId(10)));
        assert_eq!(ctx.session_id.as_str(), "sess-1");
    }

    #[test]
    fn anonymous_context_has_no_user() {
        assert_eq!(SessionContext::anonymous("sess-2").user_id(), None);
    }
}
