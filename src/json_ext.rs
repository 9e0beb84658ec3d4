//! JSON aliases and the response path type used by located errors.

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

/// A JSON object as returned in GraphQL responses.
pub type Object = serde_json_bytes::Map<ByteString, Value>;

/// One segment of a [`Path`] into response data.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum PathElement {
    /// An index into a JSON array.
    Index(usize),
    /// A key within a JSON object.
    Key(String),
}

/// A path into the `data` tree of a response, as carried by field errors.
///
/// Serialized as a JSON array mixing strings and integers, per the GraphQL
/// spec's error `path` member.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| match segment.parse::<usize>() {
                    Ok(index) => PathElement::Index(index),
                    Err(_) => PathElement::Key(segment.to_string()),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.0 {
            write!(f, "/")?;
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => write!(f, "{key}")?,
            }
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|element| match element {
            PathElement::Index(index) => Value::from(*index),
            PathElement::Key(key) => Value::String(key.as_str().into()),
        }))
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let elements = Vec::<Value>::deserialize(deserializer)?;
        elements
            .into_iter()
            .map(|value| match value {
                Value::String(key) => Ok(PathElement::Key(key.as_str().to_string())),
                Value::Number(n) => n
                    .as_u64()
                    .map(|index| PathElement::Index(index as usize))
                    .ok_or_else(|| de::Error::custom("path index must be a positive integer")),
                _ => Err(de::Error::custom("path element must be a string or integer")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Path)
    }
}
