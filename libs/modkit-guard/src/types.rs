//! Route metadata consumed by the guards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use modkit_ability::resource::detect_subject_type;
use modkit_ability::{Ability, Action, Authorizable, DEFAULT_TENANT_ATTRIBUTE};
use serde_json::Value;

type Check = dyn Fn(&Ability) -> bool + Send + Sync;

/// Route-attached predicate over the request's ability.
///
/// The label identifies the predicate in audit logs; it is never returned to
/// the caller.
#[derive(Clone)]
pub struct PolicyPredicate {
    label: String,
    check: Arc<Check>,
}

impl PolicyPredicate {
    #[must_use]
    pub fn new<F>(label: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Ability) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            check: Arc::new(check),
        }
    }

    /// `ability.can(action, resource)` on a concrete resource snapshot.
    ///
    /// The label names the resource's `id` and tenant when it carries them,
    /// e.g. `read Doc d-1 in t1`.
    #[must_use]
    pub fn can<R>(action: Action, resource: R) -> Self
    where
        R: Authorizable + Send + Sync + 'static,
    {
        let label = instance_label(&action, &resource);
        Self::new(label, move |ability| ability.can(&action, &resource))
    }

    /// `ability.can_type(action, subject_type)` when no instance is known yet.
    #[must_use]
    pub fn can_type(action: Action, subject_type: impl Into<String>) -> Self {
        let subject_type = subject_type.into();
        let label = format!("{action} any {subject_type}");
        Self::new(label, move |ability| ability.can_type(&action, &subject_type))
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn evaluate(&self, ability: &Ability) -> bool {
        (self.check)(ability)
    }
}

fn instance_label<R: Authorizable>(action: &Action, resource: &R) -> String {
    let mut label = format!("{action} {}", detect_subject_type(resource));
    if let Some(id) = resource.attribute("id") {
        label.push(' ');
        label.push_str(&attribute_text(id));
    }
    if let Some(tenant) = resource.attribute(DEFAULT_TENANT_ATTRIBUTE) {
        label.push_str(" in ");
        label.push_str(&attribute_text(tenant));
    }
    label
}

fn attribute_text(value: &Value) -> String {
    value
        .as_str()
        .map_or_else(|| value.to_string(), str::to_owned)
}

impl fmt::Debug for PolicyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyPredicate")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Security metadata attached to a route at registration time.
#[derive(Debug, Clone, Default)]
pub struct RouteMeta {
    pub is_public: bool,
    /// Principal must hold at least one of these roles.
    pub static_roles: Option<Vec<String>>,
    pub policy_predicates: Vec<PolicyPredicate>,
}

impl RouteMeta {
    /// Protected route with no extra requirements.
    #[must_use]
    pub fn protected() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_policy(mut self, predicate: PolicyPredicate) -> Self {
        self.policy_predicates.push(predicate);
        self
    }
}

/// Resolves the security metadata of a route.
#[async_trait]
pub trait RoutePolicy: Send + Sync {
    async fn resolve(&self, method: &http::Method, path: &str) -> RouteMeta;
}

/// Pattern table of route metadata, one `matchit` router per method.
///
/// Unregistered routes get the fallback metadata, which is protected by
/// default.
pub struct RouteTable {
    routes: HashMap<http::Method, matchit::Router<RouteMeta>>,
    fallback: RouteMeta,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: RouteMeta::protected(),
        }
    }
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: RouteMeta) -> Self {
        self.fallback = fallback;
        self
    }

    /// Register metadata for `path` (matchit syntax, e.g. `/docs/{id}`).
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is invalid or conflicts with an
    /// existing one.
    pub fn insert(
        &mut self,
        method: http::Method,
        path: &str,
        meta: RouteMeta,
    ) -> Result<(), matchit::InsertError> {
        self.routes.entry(method).or_default().insert(path, meta)
    }

    #[must_use]
    pub fn find(&self, method: &http::Method, path: &str) -> &RouteMeta {
        self.routes
            .get(method)
            .and_then(|router| router.at(path).ok())
            .map_or(&self.fallback, |matched| matched.value)
    }
}

#[async_trait]
impl RoutePolicy for RouteTable {
    async fn resolve(&self, method: &http::Method, path: &str) -> RouteMeta {
        self.find(method, path).clone()
    }
}

#[async_trait]
impl RoutePolicy for RouteMeta {
    async fn resolve(&self, _method: &http::Method, _path: &str) -> RouteMeta {
        self.clone()
    }
}
