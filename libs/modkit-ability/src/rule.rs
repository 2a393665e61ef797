use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionResolver};
use crate::condition::{self, Attributes, Condition};
use crate::resource::ALL_SUBJECTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// One permission statement: effect, action, subject type, and optional
/// condition and field list.
///
/// Serialized as `{ "effect", "action", "subjectType", "condition"?, "fields"? }`;
/// `effect` defaults to `allow` so persisted override rows may omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    effect: Effect,
    action: Action,
    #[serde(alias = "subject")]
    subject_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<String>>,
}

impl Rule {
    #[must_use]
    pub fn new(effect: Effect, action: impl Into<Action>, subject_type: impl Into<String>) -> Self {
        Self {
            effect,
            action: action.into(),
            subject_type: subject_type.into(),
            condition: None,
            fields: None,
        }
    }

    #[must_use]
    pub fn allow(action: impl Into<Action>, subject_type: impl Into<String>) -> Self {
        Self::new(Effect::Allow, action, subject_type)
    }

    #[must_use]
    pub fn deny(action: impl Into<Action>, subject_type: impl Into<String>) -> Self {
        Self::new(Effect::Deny, action, subject_type)
    }

    /// Attach a condition. An empty condition is stored as "no condition".
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = (!condition.is_empty()).then_some(condition);
        self
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn effect(&self) -> Effect {
        self.effect
    }

    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.effect == Effect::Deny
    }

    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    #[must_use]
    pub fn subject_type(&self) -> &str {
        &self.subject_type
    }

    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    #[must_use]
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    #[must_use]
    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    #[must_use]
    pub fn applies_to_subject(&self, subject_type: &str) -> bool {
        self.subject_type == ALL_SUBJECTS || self.subject_type == subject_type
    }

    #[must_use]
    pub fn covers_action(&self, resolver: &ActionResolver, action: &Action) -> bool {
        resolver.covers(&self.action, action)
    }

    /// Field applicability.
    ///
    /// A rule without a field list applies to every field. A rule with one
    /// applies to listed fields only; for whole-resource checks (`None`) an
    /// allow rule still applies (partial access) and a deny rule does not.
    #[must_use]
    pub fn applies_to_field(&self, field: Option<&str>) -> bool {
        match (&self.fields, field) {
            (None, _) => true,
            (Some(_), None) => !self.is_deny(),
            (Some(fields), Some(field)) => fields.iter().any(|f| f == field),
        }
    }

    #[must_use]
    pub fn matches_resource<A>(&self, candidate: &A) -> bool
    where
        A: Attributes + ?Sized,
    {
        condition::matches(self.condition.as_ref(), candidate)
    }
}
