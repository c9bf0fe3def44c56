//! Identifier newtypes.
//!
//! Two families live here:
//!
//! - Opaque string IDs minted by this process ([`SessionId`],
//!   [`SubscriptionId`]). Generated values are UUID v7 so they sort by
//!   creation time, but callers may supply any string (the transport layer
//!   usually owns session naming).
//! - Numeric entity IDs owned by the surrounding tracker
//!   ([`UserId`], [`ProjectId`], [`TaskId`], [`ActivityId`]). These are
//!   database keys; this crate only carries them around.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Borrow the raw string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the raw string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the raw key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }
    };
}

opaque_id! {
    /// One live client connection.
    SessionId
}

opaque_id! {
    /// Handle returned to a client when a subscription is accepted.
    SubscriptionId
}

numeric_id! {
    /// Authenticated tracker user.
    UserId
}

numeric_id! {
    /// Tracker project.
    ProjectId
}

numeric_id! {
    /// Tracker task.
    TaskId
}

numeric_id! {
    /// Persisted activity record.
    ActivityId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_session_ids_are_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("valid uuid");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn minted_ids_are_unique() {
        assert_ne!(SubscriptionId::new(), SubscriptionId::new());
    }

    #[test]
    fn transport_supplied_session_name_is_kept() {
        let id = SessionId::from("sess-1");
        assert_eq!(id.as_str(), "sess-1");
        assert_eq!(id.to_string(), "sess-1");
        assert_eq!(String::from(id), "sess-1");
    }

    #[test]
    fn opaque_id_serializes_as_plain_string() {
        let id = SessionId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""abc""#);
        let back: SessionId = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn numeric_id_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ProjectId(7)).unwrap(), "7");
        let t: TaskId = serde_json::from_str("42").unwrap();
        assert_eq!(t, TaskId(42));
    }

    #[test]
    fn numeric_id_parses_from_str() {
        assert_eq!("11".parse::<UserId>().unwrap(), UserId(11));
        assert!("eleven".parse::<UserId>().is_err());
    }

    #[test]
    fn deref_to_str() {
        let id = SessionId::from("sess-9");
        let s: &str = &id;
        assert!(s.starts_with("sess"));
    }
}
