use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;

/// Logical target of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "target")]
pub enum Destination {
    /// One user's private notification queue
    User(i64),
    /// Every subscriber of the global update channel
    Global,
    /// Everyone holding a role
    Role(String),
}

impl Destination {
    /// User destination, or `None` when no id was supplied
    pub fn user(id: Option<i64>) -> Option<Self> {
        id.map(Destination::User)
    }

    /// Role destination, or `None` when the name is absent or blank
    pub fn role(name: Option<&str>) -> Option<Self> {
        name.filter(|n| !n.trim().is_empty())
            .map(|n| Destination::Role(n.to_string()))
    }

    /// Whether the destination names a concrete target.
    ///
    /// Only a role with a blank name fails this; such a destination is
    /// skipped rather than resolved.
    pub fn is_addressable(&self) -> bool {
        match self {
            Destination::User(_) | Destination::Global => true,
            Destination::Role(name) => !name.trim().is_empty(),
        }
    }

    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::User(_) => "user",
            Destination::Global => "global",
            Destination::Role(_) => "role",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::User(id) => write!(f, "user({})", id),
            Destination::Global => write!(f, "global"),
            Destination::Role(name) => write!(f, "role({})", name),
        }
    }
}

/// Normalise a role name into its channel suffix: upper-case, spaces to
/// underscores. Nothing else is changed.
pub fn normalize_role(name: &str) -> String {
    name.to_uppercase().replace(' ', "_")
}

/// Concrete channel key a transport publishes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(channel: impl Into<String>) -> Self {
        Self(channel.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps destinations onto channel keys.
///
/// | Destination | Address |
/// |---|---|
/// | `User(42)` | `{user_namespace}:user:42` |
/// | `Global` | `{global_channel}` |
/// | `Role("team lead")` | `{role_namespace}:TEAM_LEAD` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressScheme {
    user_namespace: String,
    global_channel: String,
    role_namespace: String,
}

impl AddressScheme {
    pub fn new(
        user_namespace: impl Into<String>,
        global_channel: impl Into<String>,
        role_namespace: impl Into<String>,
    ) -> Self {
        Self {
            user_namespace: user_namespace.into(),
            global_channel: global_channel.into(),
            role_namespace: role_namespace.into(),
        }
    }

    pub fn resolve(&self, destination: &Destination) -> Address {
        match destination {
            Destination::User(id) => Address(format!("{}:user:{}", self.user_namespace, id)),
            Destination::Global => Address(self.global_channel.clone()),
            Destination::Role(name) => {
                Address(format!("{}:{}", self.role_namespace, normalize_role(name)))
            }
        }
    }

    pub fn global_address(&self) -> Address {
        Address(self.global_channel.clone())
    }
}

impl From<&RouterConfig> for AddressScheme {
    fn from(config: &RouterConfig) -> Self {
        Self::new(
            config.user_namespace.clone(),
            config.global_channel.clone(),
            config.role_namespace.clone(),
        )
    }
}

impl Default for AddressScheme {
    fn default() -> Self {
        Self::from(&RouterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_address() {
        let scheme = AddressScheme::default();
        assert_eq!(
            scheme.resolve(&Destination::User(42)).as_str(),
            "notifications:user:42"
        );
    }

    #[test]
    fn test_global_address() {
        let scheme = AddressScheme::default();
        assert_eq!(scheme.resolve(&Destination::Global), scheme.global_address());
        assert_eq!(scheme.global_address().as_str(), "data-updates");
    }

    #[test]
    fn test_role_normalisation() {
        let scheme = AddressScheme::default();
        let lower = scheme.resolve(&Destination::Role("team lead".into()));
        let upper = scheme.resolve(&Destination::Role("TEAM LEAD".into()));
        let joined = scheme.resolve(&Destination::Role("teamlead".into()));

        assert_eq!(lower.as_str(), "role:TEAM_LEAD");
        assert_eq!(lower, upper);
        assert_ne!(lower, joined);
    }

    #[test]
    fn test_missing_identifiers() {
        assert_eq!(Destination::user(None), None);
        assert_eq!(Destination::user(Some(7)), Some(Destination::User(7)));
        assert_eq!(Destination::role(None), None);
        assert_eq!(Destination::role(Some("")), None);
        assert_eq!(Destination::role(Some("   ")), None);
        assert!(!Destination::Role(String::new()).is_addressable());
        assert!(Destination::Global.is_addressable());
    }

    #[test]
    fn test_custom_scheme() {
        let scheme = AddressScheme::new("private", "updates", "roles");
        assert_eq!(scheme.resolve(&Destination::User(1)).as_str(), "private:user:1");
        assert_eq!(
            scheme.resolve(&Destination::Role("admin".into())).as_str(),
            "roles:ADMIN"
        );
    }
}
