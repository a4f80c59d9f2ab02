//! String identifiers used on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Agent (greeter) identifier
    AgentId
);
string_id!(
    /// Anonymous visitor identifier assigned by the widget
    VisitorId
);
string_id!(
    /// Identifier of one call request, stable across re-offers
    RequestId
);
string_id!(
    /// Identifier of an accepted, active call
    CallId
);
string_id!(
    /// Pool identifier
    PoolId
);
string_id!(
    /// Organization identifier
    OrgId
);
string_id!(
    /// Site (embed) identifier used for path rules
    SiteId
);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("call_{}", Uuid::new_v4()))
    }
}

impl CallId {
    pub fn generate() -> Self {
        Self(format!("active_{}", Uuid::new_v4()))
    }
}
