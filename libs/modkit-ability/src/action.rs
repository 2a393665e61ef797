//! Action tags and the action hierarchy.
//!
//! Built-in tags cover CRUD plus `Manage`. Tenants may define their own tags
//! through persisted rule overrides; those are carried as [`Action::Custom`]
//! and compared byte-for-byte.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Manage,
    /// Tenant-defined tag, e.g. `"Export"`.
    Custom(String),
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
            Action::Custom(tag) => tag,
        }
    }

    /// Build a custom action tag.
    #[must_use]
    pub fn custom(tag: impl Into<String>) -> Self {
        Action::Custom(tag.into())
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Action::Custom(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    /// Built-in tags are recognised case-insensitively; anything else is a
    /// custom tag kept verbatim.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let action = match value.to_ascii_lowercase().as_str() {
            "create" => Action::Create,
            "read" => Action::Read,
            "update" => Action::Update,
            "delete" => Action::Delete,
            "manage" => Action::Manage,
            _ => Action::Custom(value.to_owned()),
        };
        Ok(action)
    }
}

impl From<&str> for Action {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(action) => action,
            Err(never) => match never {},
        }
    }
}

impl Serialize for Action {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Err(serde::de::Error::custom("action tag must not be empty"));
        }
        Ok(Action::from(raw.as_str()))
    }
}

/// Expands coarse actions into the fine-grained actions they stand for.
///
/// The default hierarchy has a single entry: `Manage` covers
/// `Create`, `Read`, `Update` and `Delete`. The expansion of an action always
/// contains the action itself.
#[derive(Debug, Clone)]
pub struct ActionResolver {
    aliases: BTreeMap<Action, Vec<Action>>,
}

impl Default for ActionResolver {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            Action::Manage,
            vec![Action::Create, Action::Read, Action::Update, Action::Delete],
        );
        Self { aliases }
    }
}

impl ActionResolver {
    /// Register an additional coarse action. Members are expanded
    /// transitively, so an alias may point at `Manage` or at another alias.
    #[must_use]
    pub fn with_alias(mut self, alias: Action, members: impl IntoIterator<Item = Action>) -> Self {
        self.aliases
            .entry(alias)
            .or_default()
            .extend(members);
        self
    }

    /// Expand `action` into the full set of actions it grants.
    #[must_use]
    pub fn expand(&self, action: &Action) -> BTreeSet<Action> {
        let mut expanded = BTreeSet::new();
        let mut pending = vec![action.clone()];

        while let Some(next) = pending.pop() {
            if !expanded.insert(next.clone()) {
                continue;
            }
            if let Some(members) = self.aliases.get(&next) {
                pending.extend(members.iter().filter(|m| !expanded.contains(*m)).cloned());
            }
        }

        expanded
    }

    /// Whether a rule written for `granted` covers a check for `requested`.
    #[must_use]
    pub fn covers(&self, granted: &Action, requested: &Action) -> bool {
        granted == requested || self.expand(granted).contains(requested)
    }
}
