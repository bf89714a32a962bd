//! Bundle sizes, recorded before any network activity

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use bp_core::UploadError;

/// A bundle file and the URL path it is served under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Path as given by the operator
    pub path: PathBuf,
    /// Path relative to the serving root, `/`-separated
    pub url_path: String,
    /// Size in bytes at the time of stat
    pub size: u64,
}

/// Bundles in install order plus a size lookup by URL path
#[derive(Debug, Clone, Default)]
pub struct BundleSizeTable {
    bundles: Vec<Bundle>,
    sizes: HashMap<String, u64>,
}

impl BundleSizeTable {
    /// Stat every bundle, failing on the first missing or unusable one.
    ///
    /// Relative paths are resolved against `serve_root`; absolute paths must
    /// lie below it, since the device can only fetch what the file server
    /// exposes.
    pub async fn stat(paths: &[PathBuf], serve_root: &Path) -> Result<Self, UploadError> {
        let mut table = Self::default();

        for path in paths {
            let on_disk = serve_root.join(path);
            let metadata =
                tokio::fs::metadata(&on_disk)
                    .await
                    .map_err(|source| UploadError::BundleUnreadable {
                        path: path.clone(),
                        source,
                    })?;

            if !metadata.is_file() {
                return Err(UploadError::NotAFile(path.clone()));
            }

            let url_path = url_path_for(path, serve_root).await?;
            table.sizes.insert(url_path.clone(), metadata.len());
            table.bundles.push(Bundle {
                path: path.clone(),
                url_path,
                size: metadata.len(),
            });
        }

        Ok(table)
    }

    /// Bundles in install order
    pub fn iter(&self) -> impl Iterator<Item = &Bundle> {
        self.bundles.iter()
    }

    /// Recorded size for a URL path
    pub fn size_of(&self, url_path: &str) -> Option<u64> {
        self.sizes.get(url_path).copied()
    }

    /// Whether the URL path belongs to a bundle
    pub fn contains(&self, url_path: &str) -> bool {
        self.sizes.contains_key(url_path)
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}

async fn url_path_for(path: &Path, serve_root: &Path) -> Result<String, UploadError> {
    let outside = || UploadError::OutsideServeRoot {
        path: path.to_path_buf(),
        root: serve_root.to_path_buf(),
    };

    let relative = if path.is_absolute() {
        let root = tokio::fs::canonicalize(serve_root)
            .await
            .map_err(|_| outside())?;
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|_| outside())?;
        absolute
            .strip_prefix(&root)
            .map_err(|_| outside())?
            .to_path_buf()
    } else {
        path.to_path_buf()
    };

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(outside());
            }
        }
    }

    if segments.is_empty() {
        return Err(outside());
    }

    Ok(segments.join("/"))
}
