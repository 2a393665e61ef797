use serde::Serialize;
use serde_json::{Map, Value};

use crate::condition::Attributes;

/// Subject type that matches every resource.
pub const ALL_SUBJECTS: &str = "all";

/// Something an [`crate::Ability`] can be checked against.
///
/// The subject type is a stable tag set when the value is constructed; it is
/// never derived from the Rust type.
pub trait Authorizable: Attributes {
    /// Declared type tag, `None` for untyped values.
    fn subject_type(&self) -> Option<&str>;
}

/// Type tag used for rule matching; untyped values fall back to [`ALL_SUBJECTS`].
#[must_use]
pub fn detect_subject_type<R>(resource: &R) -> &str
where
    R: Authorizable + ?Sized,
{
    resource.subject_type().unwrap_or(ALL_SUBJECTS)
}

/// JSON-backed resource snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resource {
    subject_type: Option<String>,
    attributes: Map<String, Value>,
}

impl Resource {
    #[must_use]
    pub fn new(subject_type: impl Into<String>) -> Self {
        Self {
            subject_type: Some(subject_type.into()),
            attributes: Map::new(),
        }
    }

    /// A resource without a type tag. Only rules on `all` apply to it.
    #[must_use]
    pub fn untyped() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Snapshot a serializable record under the given type tag.
    ///
    /// # Errors
    ///
    /// Returns an error if `record` does not serialize to a JSON object.
    pub fn from_serializable<T>(
        subject_type: impl Into<String>,
        record: &T,
    ) -> Result<Self, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let attributes = match serde_json::to_value(record)? {
            Value::Object(attributes) => attributes,
            other => {
                return Err(serde::ser::Error::custom(format!(
                    "resource attributes must serialize to an object, got {other}"
                )));
            }
        };
        Ok(Self {
            subject_type: Some(subject_type.into()),
            attributes,
        })
    }

    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

impl Attributes for Resource {
    fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

impl Authorizable for Resource {
    fn subject_type(&self) -> Option<&str> {
        self.subject_type.as_deref()
    }
}

impl<T> Authorizable for &T
where
    T: Authorizable + ?Sized,
{
    fn subject_type(&self) -> Option<&str> {
        (**self).subject_type()
    }
}

impl<T> Attributes for &T
where
    T: Attributes + ?Sized,
{
    fn attribute(&self, key: &str) -> Option<&Value> {
        (**self).attribute(key)
    }
}
