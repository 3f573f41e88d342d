use std::{error::Error, fmt, ops::Deref};

use serde::{Deserialize, Serialize};

/// An opaque identifier handed out by the blob store for a stored payload.
///
/// It can never be empty or whitespace only, the check happens on construction and
/// on deserialization so an invalid reference never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentRef(String);

impl ContentRef {
    /// Validates `raw` as a content reference.
    ///
    /// # Arguments
    /// * `raw` - The textual reference.
    ///
    /// # Returns
    /// The reference or `InvalidRef` if it's empty or blank.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidRef> {
        let raw = raw.into();

        if raw.trim().is_empty() {
            return Err(InvalidRef(raw));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ContentRef {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ContentRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContentRef {
    type Error = InvalidRef;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ContentRef> for String {
    fn from(value: ContentRef) -> Self {
        value.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string can't be used as a `ContentRef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRef(String);

impl InvalidRef {
    /// The rejected input.
    pub fn raw(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvalidRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid content reference {:?}", self.0)
    }
}

impl Error for InvalidRef {}
