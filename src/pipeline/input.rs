//! Input resolution: validate a user-supplied path before pdfium sees it.
//!
//! The `%PDF` magic-byte check runs first so callers get a meaningful error
//! instead of an opaque pdfium load failure.

use crate::error::Pdf2CardsError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve `input` to a readable local PDF path.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<PathBuf, Pdf2CardsError> {
    let path = input.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Pdf2CardsError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(Pdf2CardsError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2CardsError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2CardsError::FileNotFound { path }),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Normalise a path typed at a prompt: trims whitespace and the quotes a
/// terminal adds when a file is dragged in.
pub fn clean_prompted_path(line: &str) -> PathBuf {
    PathBuf::from(line.trim().trim_matches(|c| c == '"' || c == '\''))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Pdf2CardsError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, Pdf2CardsError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04 zip archive").unwrap();
        match resolve_input(f.path()).unwrap_err() {
            Pdf2CardsError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_input(f.path()).unwrap_err(),
            Pdf2CardsError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").unwrap();
        assert_eq!(resolve_input(f.path()).unwrap(), f.path());
    }

    #[test]
    fn prompted_path_is_cleaned() {
        assert_eq!(clean_prompted_path("  'book.pdf' \n"), PathBuf::from("book.pdf"));
        assert_eq!(clean_prompted_path("\"a b.pdf\""), PathBuf::from("a b.pdf"));
    }
}
