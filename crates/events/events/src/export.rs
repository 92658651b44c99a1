//! Exportable documents and attribute selection.
//!
//! Senders and event fields are carried as [`Exportable`] values. An object
//! either knows how to select its own fields ([`Exportable::Structured`]) or
//! is plain data that is exported whole ([`Exportable::Plain`]).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventResult;

/// A single selected field, optionally with a nested selection applied to a
/// related object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSelector {
    /// Field name.
    pub name: String,
    /// Selection applied to the related object, if any.
    pub nested: AttributeSpec,
}

impl AttributeSelector {
    /// Creates a selector without a nested selection.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested: AttributeSpec::new(),
        }
    }
}

/// Ordered attribute selection.
///
/// Written as dotted paths: `["id", "author.name", "author.email"]` selects
/// `id` and the `name`/`email` fields of the related `author`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct AttributeSpec {
    selectors: Vec<AttributeSelector>,
}

impl AttributeSpec {
    /// Creates an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection from dotted paths.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = Self::new();
        for path in paths {
            spec.insert_path(path.as_ref());
        }
        spec
    }

    /// Parses admin input where paths are separated by newlines or commas.
    pub fn parse_lines(input: &str) -> Self {
        Self::from_paths(input.split(|c| c == '\n' || c == ','))
    }

    /// Adds a dotted path. Repeated roots are merged in first-seen order.
    pub fn insert_path(&mut self, path: &str) {
        let path = path.trim();
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head.trim(), Some(rest)),
            None => (path, None),
        };
        if head.is_empty() {
            return;
        }

        let idx = match self.selectors.iter().position(|s| s.name == head) {
            Some(idx) => idx,
            None => {
                self.selectors.push(AttributeSelector::new(head));
                self.selectors.len() - 1
            }
        };

        if let Some(rest) = rest {
            self.selectors[idx].nested.insert_path(rest);
        }
    }

    /// Returns the union of two selections, `self` first.
    pub fn merged(&self, other: &AttributeSpec) -> AttributeSpec {
        let mut out = self.clone();
        for path in other.to_paths() {
            out.insert_path(&path);
        }
        out
    }

    /// Looks up the selector for a field.
    pub fn get(&self, name: &str) -> Option<&AttributeSelector> {
        self.selectors.iter().find(|s| s.name == name)
    }

    /// Checks whether a field is selected.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over the top-level selectors in order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeSelector> {
        self.selectors.iter()
    }

    /// Returns the number of top-level selectors.
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Checks if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Flattens the selection back into dotted paths.
    pub fn to_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for selector in &self.selectors {
            if selector.nested.is_empty() {
                paths.push(selector.name.clone());
            } else {
                for nested in selector.nested.to_paths() {
                    paths.push(format!("{}.{}", selector.name, nested));
                }
            }
        }
        paths
    }
}

impl From<Vec<String>> for AttributeSpec {
    fn from(paths: Vec<String>) -> Self {
        Self::from_paths(paths)
    }
}

impl From<AttributeSpec> for Vec<String> {
    fn from(spec: AttributeSpec) -> Self {
        spec.to_paths()
    }
}

impl<const N: usize> From<[&str; N]> for AttributeSpec {
    fn from(paths: [&str; N]) -> Self {
        Self::from_paths(paths)
    }
}

/// Capability of objects that select their own exportable fields.
pub trait FieldExport: Send + Sync {
    /// Fields exported when the object is reached through a relation that
    /// carries no nested selection.
    fn default_fields(&self) -> AttributeSpec;

    /// Exports the fields named in `base` followed by those in `extra`.
    /// Names the object does not have are skipped.
    fn export(&self, base: &AttributeSpec, extra: &AttributeSpec) -> Map<String, Value>;
}

/// A value that can be turned into a document.
#[derive(Clone)]
pub enum Exportable {
    /// Object that controls which of its fields are exported.
    Structured(Arc<dyn FieldExport>),
    /// Plain data exported as-is; attribute selections do not apply.
    Plain(Value),
}

impl Exportable {
    /// Wraps a structured object.
    pub fn structured(object: impl FieldExport + 'static) -> Self {
        Exportable::Structured(Arc::new(object))
    }

    /// Wraps any serializable value as plain data.
    pub fn try_plain(value: impl Serialize) -> EventResult<Self> {
        Ok(Exportable::Plain(serde_json::to_value(value)?))
    }

    /// Like [`Exportable::try_plain`], but a value that cannot be serialized
    /// is logged and exported as `null`.
    pub fn plain(value: impl Serialize) -> Self {
        Self::try_plain(value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not serialize plain value; exporting null");
            Exportable::Plain(Value::Null)
        })
    }

    /// An empty plain object.
    pub fn empty() -> Self {
        Exportable::Plain(Value::Object(Map::new()))
    }

    /// Exports with an explicit base and extra selection.
    pub fn export_with(&self, base: &AttributeSpec, extra: &AttributeSpec) -> Value {
        match self {
            Exportable::Structured(object) => Value::Object(object.export(base, extra)),
            Exportable::Plain(value) => value.clone(),
        }
    }

    /// Exports a related object reached through a selector.
    ///
    /// An empty nested selection falls back to the object's default fields.
    pub fn export_related(&self, nested: &AttributeSpec) -> Value {
        match self {
            Exportable::Structured(object) if nested.is_empty() => {
                Value::Object(object.export(&object.default_fields(), &AttributeSpec::new()))
            }
            _ => self.export_with(nested, &AttributeSpec::new()),
        }
    }

    /// Checks if this is the structured variant.
    pub fn is_structured(&self) -> bool {
        matches!(self, Exportable::Structured(_))
    }
}

impl fmt::Debug for Exportable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exportable::Structured(object) => f
                .debug_tuple("Structured")
                .field(&object.default_fields().to_paths())
                .finish(),
            Exportable::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
        }
    }
}

impl From<Value> for Exportable {
    fn from(value: Value) -> Self {
        Exportable::Plain(value)
    }
}

impl From<Record> for Exportable {
    fn from(record: Record) -> Self {
        Exportable::structured(record)
    }
}

#[derive(Debug, Clone)]
enum RecordValue {
    Scalar(Value),
    Related(Exportable),
}

/// Ordered set of named fields with structured export.
///
/// Scalar fields are exported by default; related objects only when
/// selected explicitly.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(String, RecordValue)>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a scalar field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name.into(), RecordValue::Scalar(value.into()));
        self
    }

    /// Sets a related object.
    pub fn related(mut self, name: impl Into<String>, value: impl Into<Exportable>) -> Self {
        self.set(name.into(), RecordValue::Related(value.into()));
        self
    }

    fn set(&mut self, name: String, value: RecordValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    fn lookup(&self, name: &str) -> Option<&RecordValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl FieldExport for Record {
    fn default_fields(&self) -> AttributeSpec {
        AttributeSpec::from_paths(self.fields.iter().filter_map(|(name, value)| match value {
            RecordValue::Scalar(_) => Some(name.as_str()),
            RecordValue::Related(_) => None,
        }))
    }

    fn export(&self, base: &AttributeSpec, extra: &AttributeSpec) -> Map<String, Value> {
        let selection = base.merged(extra);
        let mut out = Map::new();

        for selector in selection.iter() {
            match self.lookup(&selector.name) {
                Some(RecordValue::Scalar(value)) => {
                    out.insert(selector.name.clone(), value.clone());
                }
                Some(RecordValue::Related(related)) => {
                    out.insert(selector.name.clone(), related.export_related(&selector.nested));
                }
                None => {}
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spec_from_paths_merges_roots() {
        let spec = AttributeSpec::from_paths(["id", "author.name", "author.email", "id"]);

        assert_eq!(spec.len(), 2);
        let author = spec.get("author").unwrap();
        assert_eq!(author.nested.to_paths(), vec!["name", "email"]);
        assert_eq!(spec.to_paths(), vec!["id", "author.name", "author.email"]);
    }

    #[test]
    fn test_spec_parse_lines() {
        let spec = AttributeSpec::parse_lines("id\n author.name , \n\ntitle");
        assert_eq!(spec.to_paths(), vec!["id", "author.name", "title"]);
    }

    #[test]
    fn test_spec_serde_as_paths() {
        let spec: AttributeSpec = serde_json::from_value(json!(["id", "author.name"])).unwrap();
        assert!(spec.contains("author"));
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!(["id", "author.name"]));
    }

    #[test]
    fn test_merged_keeps_bare_roots() {
        let base = AttributeSpec::from_paths(["id"]);
        let extra = AttributeSpec::from_paths(["author", "title"]);
        let merged = base.merged(&extra);
        assert_eq!(merged.to_paths(), vec!["id", "author", "title"]);
    }

    #[test]
    fn test_record_exports_only_selected() {
        let record = Record::new().field("id", 42).field("email", "a@b.com");

        let doc = Exportable::from(record)
            .export_with(&AttributeSpec::new(), &AttributeSpec::from(["id"]));
        assert_eq!(doc, json!({"id": 42}));
    }

    #[test]
    fn test_record_nested_relation() {
        let author = Record::new().field("name", "Ann").field("email", "ann@example.test");
        let post = Record::new().field("id", 1).related("author", author);

        let exported = Exportable::from(post.clone())
            .export_with(&AttributeSpec::new(), &AttributeSpec::from(["author.name"]));
        assert_eq!(exported, json!({"author": {"name": "Ann"}}));

        // A bare relation exports the related object's default fields.
        let exported = Exportable::from(post)
            .export_with(&AttributeSpec::new(), &AttributeSpec::from(["id", "author"]));
        assert_eq!(
            exported,
            json!({"id": 1, "author": {"name": "Ann", "email": "ann@example.test"}})
        );
    }

    #[test]
    fn test_plain_ignores_selection() {
        let plain = Exportable::plain(json!({"a": 1, "b": 2}));
        let doc = plain.export_with(&AttributeSpec::new(), &AttributeSpec::from(["a"]));
        assert_eq!(doc, json!({"a": 1, "b": 2}));
        assert!(!plain.is_structured());
    }

    #[test]
    fn test_unserializable_plain_value() {
        let mut by_pair = std::collections::HashMap::new();
        by_pair.insert((1, 2), 3);

        assert!(matches!(
            Exportable::try_plain(&by_pair),
            Err(crate::EventError::SerializationError(_))
        ));
        let plain = Exportable::plain(&by_pair);
        assert_eq!(plain.export_with(&AttributeSpec::new(), &AttributeSpec::new()), Value::Null);
    }

    #[test]
    fn test_record_default_fields_skip_relations() {
        let record = Record::new()
            .field("id", 1)
            .related("owner", Record::new().field("id", 2));
        assert_eq!(record.default_fields().to_paths(), vec!["id"]);
    }
}
