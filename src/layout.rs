//! Output Layout
//!
//! `<root>/<theme>/colouring_<theme>_<timestamp>_<n>.png` plus one
//! `colouring_<theme>_<timestamp>.pdf`. Files are created exclusively, so a
//! run never overwrites an earlier one.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

pub const MAX_THEME_SLUG: usize = 16;
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Refusing to overwrite existing file {0}")]
    AlreadyExists(PathBuf),

    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn transliterate(c: char) -> Option<&'static str> {
    let ascii = match c {
        'ą' | 'à' | 'á' | 'â' | 'ä' | 'ã' => "a",
        'ć' | 'ç' | 'č' => "c",
        'ę' | 'è' | 'é' | 'ê' | 'ë' | 'ě' => "e",
        'ł' => "l",
        'ń' | 'ñ' => "n",
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => "o",
        'ś' | 'š' => "s",
        'ź' | 'ż' | 'ž' => "z",
        'ü' | 'ù' | 'ú' | 'û' => "u",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ß' => "ss",
        'Ą' | 'À' | 'Á' | 'Â' | 'Ä' | 'Ã' => "A",
        'Ć' | 'Ç' | 'Č' => "C",
        'Ę' | 'È' | 'É' | 'Ê' | 'Ë' | 'Ě' => "E",
        'Ł' => "L",
        'Ń' | 'Ñ' => "N",
        'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => "O",
        'Ś' | 'Š' => "S",
        'Ź' | 'Ż' | 'Ž' => "Z",
        'Ü' | 'Ù' | 'Ú' | 'Û' => "U",
        'Í' | 'Ì' | 'Î' | 'Ï' => "I",
        _ => return None,
    };
    Some(ascii)
}

/// Short filesystem-safe identifier for a theme: `[A-Za-z0-9_]`, at most
/// [`MAX_THEME_SLUG`] characters. Falls back to `theme` when nothing survives.
pub fn theme_slug(theme: &str) -> String {
    let mut slug = String::new();
    for c in theme.chars() {
        if c == ' ' {
            slug.push('_');
        } else if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if let Some(ascii) = transliterate(c) {
            slug.push_str(ascii);
        }
    }
    slug.truncate(MAX_THEME_SLUG);

    if slug.is_empty() {
        "theme".to_string()
    } else {
        slug
    }
}

#[derive(Debug, Clone)]
pub struct OutputLayout {
    dir: PathBuf,
    slug: String,
    timestamp: String,
}

impl OutputLayout {
    pub fn new(root: &Path, theme: &str, at: DateTime<Local>) -> Self {
        let slug = theme_slug(theme);
        Self {
            dir: root.join(&slug),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            slug,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `number` is 1-based.
    pub fn image_path(&self, number: usize) -> PathBuf {
        self.dir
            .join(format!("colouring_{}_{}_{}.png", self.slug, self.timestamp, number))
    }

    pub fn document_path(&self) -> PathBuf {
        self.dir
            .join(format!("colouring_{}_{}.pdf", self.slug, self.timestamp))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir
            .join(format!("colouring_{}_{}.manifest.json", self.slug, self.timestamp))
    }

    pub fn ensure_dir(&self) -> Result<(), LayoutError> {
        fs::create_dir_all(&self.dir).map_err(|source| LayoutError::CreateDir {
            path: self.dir.clone(),
            source,
        })
    }

    /// Fail if this run's document or manifest is already on disk.
    pub fn ensure_unclaimed(&self) -> Result<(), LayoutError> {
        for path in [self.document_path(), self.manifest_path()] {
            if path.exists() {
                return Err(LayoutError::AlreadyExists(path));
            }
        }
        Ok(())
    }
}

/// Create `path` and write `bytes`, failing if it already exists.
pub fn write_new(path: &Path, bytes: &[u8]) -> Result<(), LayoutError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            io::ErrorKind::AlreadyExists => LayoutError::AlreadyExists(path.to_path_buf()),
            _ => LayoutError::Write { path: path.to_path_buf(), source },
        })?;

    file.write_all(bytes).map_err(|source| LayoutError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slug_basic() {
        assert_eq!(theme_slug("dinosaurs"), "dinosaurs");
        assert_eq!(theme_slug("space cats!"), "space_cats");
    }

    #[test]
    fn test_slug_transliterates_polish() {
        assert_eq!(theme_slug("żółw łąka"), "zolw_laka");
        assert_eq!(theme_slug("Śnieżka"), "Sniezka");
    }

    #[test]
    fn test_slug_strips_unknown_and_truncates() {
        assert_eq!(theme_slug("恐竜"), "theme");
        assert_eq!(theme_slug("a very long theme name indeed"), "a_very_long_them");
        assert_eq!(theme_slug("a very long theme name indeed").len(), MAX_THEME_SLUG);
    }

    #[test]
    fn test_paths_share_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap();
        let layout = OutputLayout::new(Path::new("out"), "sea life", at);
        assert_eq!(layout.dir(), Path::new("out/sea_life"));
        assert_eq!(
            layout.image_path(2),
            Path::new("out/sea_life/colouring_sea_life_20240517_093005_2.png")
        );
        assert_eq!(
            layout.document_path(),
            Path::new("out/sea_life/colouring_sea_life_20240517_093005.pdf")
        );
    }

    #[test]
    fn test_write_new_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_new(&path, b"first").unwrap();

        let err = write_new(&path, b"second").unwrap_err();
        assert!(matches!(err, LayoutError::AlreadyExists(_)));
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[test]
    fn test_unclaimed_until_manifest_written() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap();
        let layout = OutputLayout::new(dir.path(), "cats", at);
        layout.ensure_dir().unwrap();
        assert!(layout.ensure_unclaimed().is_ok());

        write_new(&layout.manifest_path(), b"{}").unwrap();
        match layout.ensure_unclaimed() {
            Err(LayoutError::AlreadyExists(path)) => assert_eq!(path, layout.manifest_path()),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }
}
