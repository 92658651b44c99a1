//! Redaction of sensitive values before they leave the process.

use serde_json::{Map, Value};

/// Default character used to mask sensitive values.
pub const DEFAULT_MASK: char = '•';

/// Default sensitive keywords.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "authorization",
    "key",
    "pass",
    "password",
    "pw",
    "secret",
    "tok",
    "token",
];

/// Pluggable rule set deciding which values are masked.
///
/// Called once per scalar leaf with its dotted key path
/// (e.g. `sender.profile.apiKey`, `event.items.0.token`).
/// Implementations must be idempotent: redacting a redacted value returns
/// it unchanged.
pub trait RedactionPolicy: Send + Sync {
    /// Returns the value, or its masked form when the key is sensitive.
    fn redact(&self, key_path: &str, value: Value) -> Value;
}

/// Policy that never masks anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRedaction;

impl RedactionPolicy for NoRedaction {
    fn redact(&self, _key_path: &str, value: Value) -> Value {
        value
    }
}

/// Masks string values whose key contains a sensitive keyword.
///
/// The last segment of the key path is split into words on case changes,
/// `_`, `-` and digits, so `apiKey`, `api_key` and `X-Api-Key` all match
/// `key` while `keyboard` and `monkey` do not.
#[derive(Debug, Clone)]
pub struct KeywordRedactionPolicy {
    keywords: Vec<String>,
    mask: char,
}

impl KeywordRedactionPolicy {
    /// Creates a policy with the default keywords and mask.
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().copied())
    }

    /// Creates a policy with custom keywords.
    pub fn with_keywords(keywords: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
            mask: DEFAULT_MASK,
        }
    }

    /// Sets the mask character.
    pub fn mask(mut self, mask: char) -> Self {
        self.mask = mask;
        self
    }

    /// Checks whether a key name is sensitive.
    pub fn is_sensitive(&self, key: &str) -> bool {
        key_words(key)
            .iter()
            .any(|word| self.keywords.iter().any(|k| k == word))
    }
}

impl Default for KeywordRedactionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionPolicy for KeywordRedactionPolicy {
    fn redact(&self, key_path: &str, value: Value) -> Value {
        let key = key_path.rsplit('.').next().unwrap_or(key_path);
        match value {
            Value::String(s) if self.is_sensitive(key) => {
                Value::String(std::iter::repeat_n(self.mask, s.chars().count()).collect())
            }
            other => other,
        }
    }
}

/// Walks a document and passes every scalar leaf through the policy.
///
/// `root` prefixes every key path; array elements use their index.
pub fn redact_document(policy: &dyn RedactionPolicy, root: &str, document: Value) -> Value {
    match document {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let path = join(root, &key);
                out.insert(key, redact_document(policy, &path, value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| redact_document(policy, &join(root, &i.to_string()), item))
                .collect(),
        ),
        scalar => policy.redact(root, scalar),
    }
}

fn join(root: &str, key: &str) -> String {
    if root.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", root, key)
    }
}

fn key_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if !c.is_alphabetic() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_words() {
        assert_eq!(key_words("apiKey"), vec!["api", "key"]);
        assert_eq!(key_words("api_key"), vec!["api", "key"]);
        assert_eq!(key_words("X-Api-Key"), vec!["x", "api", "key"]);
        assert_eq!(key_words("HTTPHeader"), vec!["httpheader"]);
        assert_eq!(key_words("password2"), vec!["password"]);
    }

    #[test]
    fn test_sensitive_keys() {
        let policy = KeywordRedactionPolicy::new();
        assert!(policy.is_sensitive("password"));
        assert!(policy.is_sensitive("apiKey"));
        assert!(policy.is_sensitive("client_secret"));
        assert!(policy.is_sensitive("Authorization"));
        assert!(policy.is_sensitive("accessToken"));
        assert!(!policy.is_sensitive("keyboard"));
        assert!(!policy.is_sensitive("email"));
        assert!(!policy.is_sensitive("id"));
    }

    #[test]
    fn test_masks_strings_preserving_length() {
        let policy = KeywordRedactionPolicy::new();
        assert_eq!(policy.redact("sender.password", json!("hunter2")), json!("•••••••"));
        assert_eq!(policy.redact("sender.email", json!("a@b.com")), json!("a@b.com"));
        // Non-string leaves pass through.
        assert_eq!(policy.redact("sender.tokenCount", json!(3)), json!(3));
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let policy = KeywordRedactionPolicy::new();
        for (path, value) in [
            ("password", json!("hunter2")),
            ("a.b.apiKey", json!("k-123")),
            ("token", json!("")),
            ("secret", json!(null)),
        ] {
            let once = policy.redact(path, value);
            let twice = policy.redact(path, once.clone());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_redact_document_walks_nested_paths() {
        let policy = KeywordRedactionPolicy::new().mask('*');
        let doc = json!({
            "id": 1,
            "profile": {"apiKey": "abc", "name": "Ann"},
            "sessions": [{"token": "xy"}, {"token": "z"}]
        });

        let redacted = redact_document(&policy, "sender", doc);
        assert_eq!(
            redacted,
            json!({
                "id": 1,
                "profile": {"apiKey": "***", "name": "Ann"},
                "sessions": [{"token": "**"}, {"token": "*"}]
            })
        );
    }

    #[test]
    fn test_scalar_root_uses_root_path() {
        let policy = KeywordRedactionPolicy::new();
        assert_eq!(redact_document(&policy, "event.apiToken", json!("t")), json!("•"));
        assert_eq!(redact_document(&policy, "", json!("t")), json!("t"));
    }

    #[test]
    fn test_custom_keywords() {
        let policy = KeywordRedactionPolicy::with_keywords(["ssn"]);
        assert!(policy.is_sensitive("ssn"));
        assert!(!policy.is_sensitive("password"));
    }
}
