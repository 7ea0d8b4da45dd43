use std::collections::BTreeSet;

pub const DEFAULT_API_VERSION: &str = "2024-06-10-preview";

/// API versions this frontend accepts. Constructed once at startup and
/// handed to whatever needs to check a version.
#[derive(Debug, Clone)]
pub struct ApiVersionRegistry {
    versions: BTreeSet<String>,
}

impl ApiVersionRegistry {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_supported(&self, version: &str) -> bool {
        self.versions.contains(version)
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(String::as_str)
    }
}

impl Default for ApiVersionRegistry {
    fn default() -> Self {
        Self::new([DEFAULT_API_VERSION])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_preview_version() {
        let registry = ApiVersionRegistry::default();
        assert!(registry.is_supported(DEFAULT_API_VERSION));
        assert!(!registry.is_supported("2020-01-01"));
        assert_eq!(registry.versions().count(), 1);
    }
}
