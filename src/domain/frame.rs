//! Serialized outbound frames shared between recipients.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::HubError;

/// An immutable, already-serialized JSON message.
///
/// A broadcast serializes its payload once into a `Frame`; every recipient
/// queue receives a reference-counted clone of the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Serializes `payload` to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] if the payload cannot be
    /// represented as JSON.
    pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Self, HubError> {
        let json = serde_json::to_string(payload)?;
        Ok(Self(Arc::from(json)))
    }

    /// Returns the JSON text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
