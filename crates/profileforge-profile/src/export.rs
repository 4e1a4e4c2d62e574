//! On-disk export.

use crate::document::{Document, Encoding};
use crate::error::{Error, Result};
use crate::validator::validate;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Validates `document` and writes it to `dir` as `<name>.mobileconfig`.
///
/// An existing file with the same name is overwritten. Returns the path
/// written.
///
/// # Errors
///
/// Returns [`Error::Validation`] if validation reports any error, or an
/// encoding or I/O error if writing fails.
pub fn export_document(document: &Document, dir: &Path, encoding: Encoding) -> Result<PathBuf> {
    let report = validate(document);
    if !report.is_valid() {
        warn!(
            "Refusing to export '{}': {} validation error(s)",
            document.name,
            report.errors.len()
        );
        return Err(Error::Validation(Box::new(report)));
    }

    let bytes = document.to_bytes(encoding)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(document.file_name());
    std::fs::write(&path, bytes)?;

    info!("Exported '{}' to {}", document.name, path.display());
    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ProfileComposer;
    use crate::unit::ConfigUnit;

    fn composer() -> ProfileComposer {
        ProfileComposer::new("Acme: Wi-Fi", "com.acme.wifi").with_organization("Acme")
    }

    #[test]
    fn test_export_writes_sanitized_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Office").with_setting("SSID_STR", "acme"));
        let document = c.build();

        let path = export_document(&document, dir.path(), Encoding::Binary).unwrap();
        assert_eq!(path, dir.path().join("Acme_ Wi-Fi.mobileconfig"));

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"bplist00"));
        assert_eq!(Document::from_plist_bytes(&bytes).unwrap(), document);
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("profiles").join("acme");
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Office").with_setting("SSID_STR", "acme"));

        let path = export_document(&c.build(), &nested, Encoding::Xml).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("<plist"));
    }

    #[test]
    fn test_export_refuses_invalid_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = composer();
        c.add_unit(ConfigUnit::new("com.apple.wifi.managed", "Office"));

        let err = export_document(&c.build(), dir.path(), Encoding::Xml).unwrap_err();
        match err {
            Error::Validation(report) => assert_eq!(report.errors.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
