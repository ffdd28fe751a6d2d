//! Installing generated figure images into Anki.
//!
//! Anki resolves `<img src="…">` against the profile's `collection.media`
//! folder, so figure cards only render after their PNGs are moved there.
//! The folder lives under the platform data directory:
//!
//! | OS      | Location                                                   |
//! |---------|------------------------------------------------------------|
//! | Linux   | `~/.local/share/Anki2/<profile>/collection.media`          |
//! | macOS   | `~/Library/Application Support/Anki2/<profile>/collection.media` |
//! | Windows | `%APPDATA%\Anki2\<profile>\collection.media`               |

use crate::error::Pdf2CardsError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Anki's default first profile name.
pub const DEFAULT_PROFILE: &str = "User 1";

/// `collection.media` path for `profile` under the platform data directory.
pub fn anki_media_dir(profile: &str) -> Result<PathBuf, Pdf2CardsError> {
    let base = dirs::data_dir().ok_or_else(|| {
        Pdf2CardsError::Internal("could not determine the user data directory".into())
    })?;
    Ok(media_dir_under(&base, profile))
}

fn media_dir_under(base: &Path, profile: &str) -> PathBuf {
    base.join("Anki2").join(profile).join("collection.media")
}

/// Move every `*.png` from `source` into `dest`. Returns the number moved.
///
/// Existing files in `dest` with the same name are replaced.
pub fn install_media(source: &Path, dest: &Path) -> Result<usize, Pdf2CardsError> {
    if !dest.is_dir() {
        return Err(Pdf2CardsError::AnkiMediaNotFound {
            path: dest.to_path_buf(),
        });
    }
    if !source.is_dir() {
        return Err(Pdf2CardsError::FileNotFound {
            path: source.to_path_buf(),
        });
    }

    let mut moved = 0;
    for entry in fs::read_dir(source).map_err(media_err(source))? {
        let from = entry.map_err(media_err(source))?.path();
        let is_png = from
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("png"));
        if !from.is_file() || !is_png {
            continue;
        }
        let Some(name) = from.file_name() else { continue };
        let to = dest.join(name);
        move_file(&from, &to).map_err(media_err(&from))?;
        debug!("Moved {} → {}", from.display(), to.display());
        moved += 1;
    }

    info!("Installed {} images into {}", moved, dest.display());
    Ok(moved)
}

fn media_err(path: &Path) -> impl FnOnce(io::Error) -> Pdf2CardsError {
    let path = path.to_path_buf();
    move |source| Pdf2CardsError::MediaIo { path, source }
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_dir_layout() {
        let dir = media_dir_under(Path::new("/data"), DEFAULT_PROFILE);
        assert_eq!(dir, Path::new("/data/Anki2/User 1/collection.media"));
    }

    #[test]
    fn moves_only_png_files() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("page_1_figure.png"), b"png").unwrap();
        fs::write(src.path().join("page_2_figure.PNG"), b"png").unwrap();
        fs::write(src.path().join("notes.txt"), b"txt").unwrap();

        let moved = install_media(src.path(), dest.path()).unwrap();
        assert_eq!(moved, 2);
        assert!(dest.path().join("page_1_figure.png").exists());
        assert!(dest.path().join("page_2_figure.PNG").exists());
        assert!(!src.path().join("page_1_figure.png").exists());
        assert!(src.path().join("notes.txt").exists());
    }

    #[test]
    fn existing_target_is_replaced() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.png"), b"new").unwrap();
        fs::write(dest.path().join("a.png"), b"old").unwrap();
        install_media(src.path(), dest.path()).unwrap();
        assert_eq!(fs::read(dest.path().join("a.png")).unwrap(), b"new");
    }

    #[test]
    fn missing_anki_folder_is_an_error() {
        let src = tempfile::tempdir().unwrap();
        let err = install_media(src.path(), Path::new("/no/such/collection.media")).unwrap_err();
        assert!(matches!(err, Pdf2CardsError::AnkiMediaNotFound { .. }));
    }

    #[test]
    fn missing_source_is_an_error() {
        let dest = tempfile::tempdir().unwrap();
        let err = install_media(Path::new("/no/such/anki_media"), dest.path()).unwrap_err();
        assert!(matches!(err, Pdf2CardsError::FileNotFound { .. }));
    }
}
