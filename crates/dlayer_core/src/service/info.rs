//! Service descriptor.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Describes a running service. `Display` renders JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Short name of the service.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Brief description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short: String,
    /// Full description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long: String,
    /// Semantic version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        short: impl Into<String>,
        long: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short: short.into(),
            long: long.into(),
            version: version.into(),
        }
    }

    /// Descriptor of this crate.
    pub fn current() -> Self {
        Self::new(
            "dlayer",
            "Asynchronous document data-access layer",
            "Repositories that stream results from pluggable storage drivers.",
            crate::core_version(),
        )
    }
}

impl Display for ServiceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serde_json::to_string(self).unwrap_or_default())
    }
}
