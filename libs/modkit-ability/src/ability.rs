//! Request-scoped permission set.

use crate::action::{Action, ActionResolver};
use crate::resource::{Authorizable, detect_subject_type};
use crate::rule::Rule;

/// Ordered rules plus the action hierarchy used to evaluate them.
///
/// Evaluation of `can(action, resource)`:
/// 1. keep rules whose expanded action covers `action`,
/// 2. whose subject type is the resource's type tag or `all`,
/// 3. whose condition matches the resource;
///
/// then any `Deny` among them denies, otherwise at least one `Allow` is
/// required. Rule order never changes the outcome.
#[derive(Debug, Clone, Default)]
pub struct Ability {
    rules: Vec<Rule>,
    resolver: ActionResolver,
}

impl Ability {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self::with_resolver(rules, ActionResolver::default())
    }

    #[must_use]
    pub fn with_resolver(rules: Vec<Rule>, resolver: ActionResolver) -> Self {
        Self { rules, resolver }
    }

    /// Ability without rules; denies everything.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules that could apply to `action` on `subject_type`, ignoring conditions.
    pub fn rules_for<'a>(
        &'a self,
        action: &'a Action,
        subject_type: &'a str,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |rule| {
            rule.applies_to_subject(subject_type) && rule.covers_action(&self.resolver, action)
        })
    }

    /// Whether `action` is allowed on `resource`.
    ///
    /// A `Manage` check is only blocked by denies on `Manage` itself: with
    /// `Allow Manage all` and `Deny Delete AuditLog`, `can(Manage, AuditLog)`
    /// holds while `can(Delete, AuditLog)` does not. Gate destructive
    /// handlers on the concrete action.
    #[must_use]
    pub fn can<R>(&self, action: &Action, resource: &R) -> bool
    where
        R: Authorizable + ?Sized,
    {
        self.decide(action, resource, None)
    }

    #[must_use]
    pub fn cannot<R>(&self, action: &Action, resource: &R) -> bool
    where
        R: Authorizable + ?Sized,
    {
        !self.can(action, resource)
    }

    /// Field-level check, see [`Rule::applies_to_field`].
    #[must_use]
    pub fn can_field<R>(&self, action: &Action, resource: &R, field: &str) -> bool
    where
        R: Authorizable + ?Sized,
    {
        self.decide(action, resource, Some(field))
    }

    /// Type-level check used when no concrete instance is at hand.
    ///
    /// A conditional `Allow` counts, since some instance may satisfy it; a
    /// `Deny` only blocks when it is unconditional and covers all fields.
    #[must_use]
    pub fn can_type(&self, action: &Action, subject_type: &str) -> bool {
        let mut allowed = false;
        for rule in self.rules_for(action, subject_type) {
            if rule.is_deny() {
                if !rule.is_conditional() && rule.fields().is_none() {
                    return false;
                }
            } else {
                allowed = true;
            }
        }
        allowed
    }

    fn decide<R>(&self, action: &Action, resource: &R, field: Option<&str>) -> bool
    where
        R: Authorizable + ?Sized,
    {
        let subject_type = detect_subject_type(resource);
        let mut allowed = false;

        for rule in self.rules_for(action, subject_type) {
            if !rule.applies_to_field(field) || !rule.matches_resource(resource) {
                continue;
            }
            if rule.is_deny() {
                tracing::trace!(%action, subject_type, "deny rule matched");
                return false;
            }
            allowed = true;
        }

        allowed
    }
}
