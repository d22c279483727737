//! Typed `key:value` tags
//!
//! Tags are identified by their key alone. Reconciling with [`Tag::by_key`]
//! turns a value change into a single update instead of a delete followed
//! by an add.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator between tag key and value in the string encoding
pub const SEPARATOR: char = ':';

/// Errors from parsing the `key:value` encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagParseError {
    /// No `:` in the input
    #[error("invalid tag '{0}': expected key:value")]
    MissingSeparator(String),

    /// Nothing before the `:`
    #[error("invalid tag '{0}': key is empty")]
    EmptyKey(String),
}

/// A tag attached to a parent resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Identity ordering: compare tag keys only, ignoring values
    pub fn by_key(a: &Self, b: &Self) -> Ordering {
        a.key.cmp(&b.key)
    }
}

impl FromStr for Tag {
    type Err = TagParseError;

    /// Split on the first `:`; the value may itself contain `:`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| TagParseError::MissingSeparator(s.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(TagParseError::EmptyKey(s.to_string()));
        }
        Ok(Self::new(key, value.trim()))
    }
}

impl TryFrom<String> for Tag {
    type Error = TagParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.key, self.value)
    }
}

/// Parse a list of `key:value` strings, failing on the first invalid one
pub fn parse_tags<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Tag>, TagParseError> {
    raw.iter().map(|s| s.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::reconcile_by;
    use crate::handler::Callbacks;
    use crate::types::{Operation, ReconcileOptions};

    #[test]
    fn test_parse_tag() {
        assert_eq!("env:prod".parse::<Tag>().unwrap(), Tag::new("env", "prod"));
        assert_eq!(" team : core ".parse::<Tag>().unwrap(), Tag::new("team", "core"));
        assert_eq!("url:http://x".parse::<Tag>().unwrap(), Tag::new("url", "http://x"));
        assert_eq!("flag:".parse::<Tag>().unwrap(), Tag::new("flag", ""));
    }

    #[test]
    fn test_parse_tag_errors() {
        assert_eq!(
            "env".parse::<Tag>(),
            Err(TagParseError::MissingSeparator("env".to_string()))
        );
        assert_eq!(
            ":prod".parse::<Tag>(),
            Err(TagParseError::EmptyKey(":prod".to_string()))
        );
        assert!(parse_tags(&["a:1", "b"]).is_err());
    }

    #[test]
    fn test_display_roundtrips_encoding() {
        assert_eq!(Tag::new("y", "3").to_string(), "y:3");
    }

    #[test]
    fn test_serde_uses_string_encoding() {
        let json = serde_json::to_string(&Tag::new("env", "prod")).unwrap();
        assert_eq!(json, r#""env:prod""#);
        let tag: Tag = serde_json::from_str(r#""team:core""#).unwrap();
        assert_eq!(tag, Tag::new("team", "core"));
        assert!(serde_json::from_str::<Tag>(r#""broken""#).is_err());
    }

    #[test]
    fn test_by_key_ignores_value() {
        assert_eq!(
            Tag::by_key(&Tag::new("y", "2"), &Tag::new("y", "3")),
            Ordering::Equal
        );
        assert_eq!(
            Tag::by_key(&Tag::new("x", "9"), &Tag::new("y", "1")),
            Ordering::Less
        );
    }

    #[test]
    fn test_value_change_is_update() {
        let current = parse_tags(&["x:1", "y:2"]).unwrap();
        let desired = parse_tags(&["y:3", "z:4"]).unwrap();

        let options = ReconcileOptions::new().dry_run(true);
        let mut callbacks = Callbacks::new()
            .on_add(|_: &Tag| Ok(()))
            .on_update(|_: &Tag, _: &Tag| Ok(()))
            .on_delete(|_: &Tag| Ok(()));
        let report = reconcile_by(current, desired, Tag::by_key, &mut callbacks, &options).unwrap();

        assert_eq!(
            report.operations,
            vec![
                Operation::Delete {
                    key: Tag::new("x", "1")
                },
                Operation::Update {
                    old: Tag::new("y", "2"),
                    new: Tag::new("y", "3"),
                },
                Operation::Add {
                    key: Tag::new("z", "4")
                },
            ]
        );
    }
}
