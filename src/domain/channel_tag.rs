//! Channel tags naming the broadcast group a connection belongs to.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

/// Name of a logical broadcast group (an "instance").
///
/// A connection picks exactly one tag when it registers. Channel broadcasts
/// match tags by exact string equality; [`ChannelTag::global`] is only a
/// naming convention for gateway-wide notifications, not a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelTag(Arc<str>);

impl ChannelTag {
    /// Tag used for notifications that are not scoped to one instance.
    pub const GLOBAL: &'static str = "global";

    /// Creates a tag from any string-like value.
    #[must_use]
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(Arc::from(tag.as_ref()))
    }

    /// The gateway-wide `"global"` tag.
    #[must_use]
    pub fn global() -> Self {
        Self::new(Self::GLOBAL)
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the `"global"` tag.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.as_str() == Self::GLOBAL
    }
}

impl fmt::Display for ChannelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for ChannelTag {
    fn from(tag: String) -> Self {
        Self(Arc::from(tag))
    }
}

impl Serialize for ChannelTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
