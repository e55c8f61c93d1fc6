//! Path classification by file extension

use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::models::MediaKind;

/// Result of classifying a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub supported: bool,
    pub kind: Option<MediaKind>,
}

impl Classification {
    const UNSUPPORTED: Self = Self {
        supported: false,
        kind: None,
    };
}

/// Classify a path by its lowercased extension. Pure, no I/O.
pub fn classify(path: &Path) -> Classification {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(MediaKind::from_extension)
    {
        Some(kind) => Classification {
            supported: true,
            kind: Some(kind),
        },
        None => Classification::UNSUPPORTED,
    }
}

/// Classify a path, failing loudly when it is not an image or video
pub fn require_kind(path: &Path) -> Result<MediaKind, ScanError> {
    classify(path)
        .kind
        .ok_or_else(|| ScanError::unsupported(path.to_path_buf()))
}

/// Library-relative path with `/` separators
pub fn relative_path(path: &Path, library_root: &Path) -> Result<String, ScanError> {
    let rel = path.strip_prefix(library_root).map_err(|_| {
        ScanError::invalid_path(
            path.to_path_buf(),
            format!("Path is outside the library root {:?}", library_root),
        )
    })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| {
            ScanError::invalid_path(path.to_path_buf(), "Path is not valid UTF-8")
        })?;
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(ScanError::invalid_path(
            path.to_path_buf(),
            "Path is the library root itself",
        ));
    }
    Ok(parts.join("/"))
}

/// Resolve a stored relative path against the library root
pub fn resolve(library_root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|part| !part.is_empty())
        .fold(library_root.to_path_buf(), |acc, part| acc.join(part))
}

/// File name shown to users
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScanErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_classify_supported() {
        let c = classify(Path::new("/lib/a/photo.JPG"));
        assert!(c.supported);
        assert_eq!(c.kind, Some(MediaKind::Image));

        let c = classify(Path::new("/lib/clip.webm"));
        assert_eq!(c.kind, Some(MediaKind::Video));
    }

    #[test]
    fn test_classify_unsupported() {
        assert_eq!(classify(Path::new("/lib/notes.txt")), Classification::UNSUPPORTED);
        assert_eq!(classify(Path::new("/lib/README")), Classification::UNSUPPORTED);
        assert_eq!(classify(Path::new("/lib/.jpg")), Classification::UNSUPPORTED);
    }

    #[test]
    fn test_require_kind_fails_loudly() {
        let err = require_kind(Path::new("/lib/song.mp3")).unwrap_err();
        assert_eq!(err.kind, ScanErrorKind::UnsupportedFileType);
        assert_eq!(require_kind(Path::new("/lib/a.gif")).unwrap(), MediaKind::Image);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/library");
        assert_eq!(
            relative_path(Path::new("/library/2024/trip/a.jpg"), root).unwrap(),
            "2024/trip/a.jpg"
        );
        assert_eq!(
            relative_path(Path::new("/elsewhere/a.jpg"), root).unwrap_err().kind,
            ScanErrorKind::InvalidPath
        );
        assert!(relative_path(Path::new("/library"), root).is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(
            resolve(Path::new("/library"), "2024/trip/a.jpg"),
            PathBuf::from("/library/2024/trip/a.jpg")
        );
    }

    proptest! {
        #[test]
        fn classification_ignores_extension_case(stem in "[a-z0-9_]{1,12}", upper in any::<bool>()) {
            for ext in ["jpg", "jpeg", "png", "gif", "webp", "avif", "mp4", "webm", "mov", "avi", "mkv"] {
                let ext = if upper { ext.to_uppercase() } else { ext.to_string() };
                let path = PathBuf::from(format!("/lib/{}.{}", stem, ext));
                prop_assert!(classify(&path).supported);
            }
        }

        #[test]
        fn relative_path_resolves_back(parts in prop::collection::vec("[a-zA-Z0-9 _-]{1,8}", 1..5)) {
            let root = Path::new("/library");
            let rel = parts.join("/");
            let abs = resolve(root, &rel);
            prop_assert_eq!(relative_path(&abs, root).unwrap(), rel);
        }
    }
}
