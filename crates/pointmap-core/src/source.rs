//! Model source locators and their validation

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("not a GLB file: {0}")]
    UnsupportedFormat(String),
    #[error("empty model source")]
    Empty,
}

/// How the locator was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Url,
}

/// A validated, fetchable locator for a binary model asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSource {
    kind: SourceKind,
    locator: String,
}

impl ModelSource {
    /// Accept a local file path. Anything without a `.glb` extension is
    /// rejected here so the loader never sees an invalid source.
    pub fn from_file(path: impl Into<String>) -> Result<Self, SourceError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(SourceError::Empty);
        }
        let extension = Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        if extension.as_deref() != Some("glb") {
            return Err(SourceError::UnsupportedFormat(path));
        }
        Ok(Self {
            kind: SourceKind::File,
            locator: path,
        })
    }

    /// Accept a URL. The transfer target is not inspected beyond being
    /// non-empty; an unreachable or unparsable URL surfaces as a load failure.
    pub fn from_url(url: impl Into<String>) -> Result<Self, SourceError> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(Self {
            kind: SourceKind::Url,
            locator: url,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

impl std::fmt::Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glb_file_accepted() {
        let source = ModelSource::from_file("/models/chassis.glb").unwrap();
        assert_eq!(source.kind(), SourceKind::File);
        assert_eq!(source.locator(), "/models/chassis.glb");
    }

    #[test]
    fn test_extension_check_is_case_insensitive() {
        assert!(ModelSource::from_file("part.GLB").is_ok());
    }

    #[test]
    fn test_wrong_extension_rejected() {
        assert!(matches!(
            ModelSource::from_file("scene.gltf"),
            Err(SourceError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ModelSource::from_file("notes.txt"),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_url_trimmed_and_required_non_empty() {
        let source = ModelSource::from_url("  https://example.com/m.glb  ").unwrap();
        assert_eq!(source.locator(), "https://example.com/m.glb");
        assert!(matches!(
            ModelSource::from_url("   "),
            Err(SourceError::Empty)
        ));
    }
}
