//! Asset manifest: the immutable set of paths precached at install time.
//!
//! ### Sources
//! - `build`: files emitted by the bundler, taken verbatim.
//! - `files`: files copied from the static directory, with OS metadata
//!   files (`.DS_Store` and friends) dropped.
//!
//! Both lists are concatenated (build first) and deduplicated. Insertion
//! order is kept so install populates in a stable order.
//!
//! Entries are stored as request paths, percent-encoded the way `Url`
//! encodes them, so `/my logo.png` is kept as `/my%20logo.png`.

use std::path::Path;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use url::Url;
use walkdir::WalkDir;

use crate::Error;

/// Filenames produced by operating systems, never part of a deploy.
pub const NOISE_FILENAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Deduplicated, ordered set of request paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    paths: IndexSet<String>,
}

impl AssetManifest {
    /// Build a manifest from the bundler output and the static files list.
    pub fn new<B, F>(build: B, files: F) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        let statics = files.into_iter().map(Into::into).filter(|path: &String| !is_noise(path));

        let paths = build
            .into_iter()
            .map(Into::into)
            .chain(statics)
            .map(|path| request_path(&path))
            .collect();

        Self { paths }
    }

    /// Whether `path` is a precached asset.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// `path` as it appears in `Url::path()` for a request to that file.
fn request_path(path: &str) -> String {
    let rooted = if path.starts_with('/') { path.to_string() } else { format!("/{path}") };
    match Url::parse("http://localhost/").and_then(|base| base.join(&rooted)) {
        Ok(url) => url.path().to_string(),
        Err(_) => rooted,
    }
}

fn is_noise(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    NOISE_FILENAMES.contains(&name)
}

/// On-disk manifest written by the build step.
///
/// ```json
/// { "version": "1700000000000", "build": ["/_app/start.js"], "files": ["/favicon.png"] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl ManifestFile {
    /// Read a JSON manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Manifest(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| Error::Manifest(format!("failed to parse {}: {e}", path.display())))
    }
}

/// List every file below `dir` as a `/`-rooted request path.
///
/// Entries are sorted so repeated walks of the same tree agree. Noise files
/// are returned as-is; [`AssetManifest::new`] is responsible for dropping them.
pub fn walk_static_dir(dir: impl AsRef<Path>) -> Result<Vec<String>, Error> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Manifest(format!("failed to walk {}: {e}", dir.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::Manifest(e.to_string()))?;

        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(format!("/{}", segments.join("/")));
    }

    tracing::debug!(dir = %dir.display(), count = files.len(), "walked static directory");

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenates_build_then_files() {
        let manifest = AssetManifest::new(["/app.js", "/app.css"], ["/favicon.png"]);
        let paths: Vec<&str> = manifest.iter().collect();
        assert_eq!(paths, vec!["/app.js", "/app.css", "/favicon.png"]);
    }

    #[test]
    fn test_filters_noise_from_static_files() {
        let manifest = AssetManifest::new(
            Vec::<String>::new(),
            ["/.DS_Store", "/images/.DS_Store", "/images/logo.png", "/Thumbs.db"],
        );
        assert_eq!(manifest.len(), 1);
        assert!(manifest.contains("/images/logo.png"));
        assert!(!manifest.contains("/images/.DS_Store"));
    }

    #[test]
    fn test_noise_match_is_on_filename_only() {
        let manifest = AssetManifest::new(Vec::<String>::new(), ["/.DS_Store.bak", "/docs/desktop.ini.txt"]);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_entries_are_percent_encoded_request_paths() {
        let manifest = AssetManifest::new(["/app.js"], ["/my logo.png", "/fonts/café.woff2"]);

        assert!(manifest.contains("/my%20logo.png"));
        assert!(manifest.contains("/fonts/caf%C3%A9.woff2"));
        assert!(!manifest.contains("/my logo.png"));
    }

    #[test]
    fn test_encoded_and_raw_forms_deduplicate() {
        let manifest = AssetManifest::new(["/my%20logo.png"], ["/my logo.png"]);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_deduplicates() {
        let manifest = AssetManifest::new(["/app.js", "/app.js"], ["/app.js", "/robots.txt"]);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = AssetManifest::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(manifest.is_empty());
        assert!(!manifest.contains("/"));
    }

    #[test]
    fn test_manifest_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"version":"7","build":["/app.js"],"files":["/a.png"]}"#).unwrap();

        let file = ManifestFile::load(&path).unwrap();
        assert_eq!(file.version.as_deref(), Some("7"));
        assert_eq!(file.build, vec!["/app.js"]);
        assert_eq!(file.files, vec!["/a.png"]);
    }

    #[test]
    fn test_manifest_file_missing() {
        let result = ManifestFile::load("/definitely/not/here.json");
        assert!(matches!(result, Err(Error::Manifest(_))));
    }

    #[test]
    fn test_walk_static_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        std::fs::write(dir.path().join("favicon.png"), b"png").unwrap();
        std::fs::write(dir.path().join("images/logo.svg"), b"svg").unwrap();
        std::fs::write(dir.path().join("images/.DS_Store"), b"").unwrap();

        let files = walk_static_dir(dir.path()).unwrap();
        assert_eq!(files, vec!["/favicon.png", "/images/.DS_Store", "/images/logo.svg"]);

        let manifest = AssetManifest::new(Vec::<String>::new(), files);
        assert_eq!(manifest.len(), 2);
    }
}
