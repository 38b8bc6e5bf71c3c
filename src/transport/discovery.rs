//! Backing Location Discovery
//!
//! Enumerates the immediate subdirectories of an autodetect root. Each one
//! becomes a filesystem backing location; the daemon's own bookkeeping
//! directories are skipped.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::BackingLocation;
use crate::error::{Error, Result};

/// Entries under an autodetect root that never become backing locations.
pub const RESERVED_ENTRIES: [&str; 2] = [".state", ".etc"];

/// Placeholder locations created when an autodetect root is empty.
pub const DEFAULT_MIN_BACKING_LOCATIONS: usize = 4;

/// Scan `root` for backing locations, ordered by name.
#[instrument(skip_all, fields(root = %root.display()))]
pub async fn discover_backing_locations(root: &Path) -> Result<Vec<BackingLocation>> {
    match tokio::fs::metadata(root).await {
        Ok(meta) if meta.is_dir() => {}
        _ => {
            return Err(Error::DirectoryInvalid {
                path: root.to_path_buf(),
            })
        }
    }

    let mut entries = tokio::fs::read_dir(root).await.map_err(|e| {
        warn!("Can't read autodetect root: {}", e);
        Error::DirectoryInvalid {
            path: root.to_path_buf(),
        }
    })?;

    let mut locations = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if RESERVED_ENTRIES.contains(&name.as_str()) {
            debug!(entry = %name, "Skipping reserved entry");
            continue;
        }

        let path = root.join(&name).display().to_string();
        locations.push(BackingLocation::discovered(name, path));
    }

    locations.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = locations.len(), "Discovered backing locations");
    Ok(locations)
}

/// Discover backing locations, creating `device-0 .. device-<min_count-1>`
/// and scanning once more if the root holds none.
#[instrument(skip_all, fields(root = %root.display(), min_count = min_count))]
pub async fn ensure_minimum_backing_locations(
    root: &Path,
    min_count: usize,
) -> Result<Vec<BackingLocation>> {
    let locations = discover_backing_locations(root).await?;
    if !locations.is_empty() {
        return Ok(locations);
    }

    info!("No backing locations found, creating {} placeholders", min_count);
    for i in 0..min_count {
        let dir = root.join(format!("device-{}", i));
        if let Err(source) = tokio::fs::create_dir_all(&dir).await {
            return Err(Error::DeviceCreationFailed { path: dir, source });
        }
    }

    discover_backing_locations(root).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_skips_reserved_entries_and_files() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["disk-b", ".state", "disk-a", ".etc", ".hidden"] {
            tokio::fs::create_dir(root.path().join(dir)).await.unwrap();
        }
        tokio::fs::write(root.path().join("README"), "not a device")
            .await
            .unwrap();

        let locations = discover_backing_locations(root.path()).await.unwrap();
        let names: Vec<_> = locations.iter().map(|l| l.name.as_str()).collect();

        assert_eq!(names, vec![".hidden", "disk-a", "disk-b"]);
        assert_eq!(
            locations[1].path,
            root.path().join("disk-a").display().to_string()
        );
        assert!(locations.iter().all(|l| l.sync && !l.check_mountpoint));
    }

    #[tokio::test]
    async fn test_empty_root_gets_placeholders() {
        let root = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(root.path().join(".state")).await.unwrap();

        assert!(discover_backing_locations(root.path()).await.unwrap().is_empty());

        let locations = ensure_minimum_backing_locations(root.path(), DEFAULT_MIN_BACKING_LOCATIONS)
            .await
            .unwrap();
        let names: Vec<_> = locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["device-0", "device-1", "device-2", "device-3"]);
        assert!(root.path().join("device-3").is_dir());
    }

    #[tokio::test]
    async fn test_existing_locations_are_not_padded() {
        let root = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("ssd0")).await.unwrap();

        let locations = ensure_minimum_backing_locations(root.path(), 4).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert!(!root.path().join("device-0").exists());
    }

    #[tokio::test]
    async fn test_root_must_be_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("plain-file");
        tokio::fs::write(&file, "x").await.unwrap();

        assert_matches!(
            discover_backing_locations(&file).await,
            Err(Error::DirectoryInvalid { .. })
        );
        assert_matches!(
            discover_backing_locations(&root.path().join("missing")).await,
            Err(Error::DirectoryInvalid { .. })
        );
    }

    #[tokio::test]
    async fn test_placeholder_creation_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        // A regular file is not a backing location, but it blocks the
        // first placeholder directory.
        tokio::fs::write(root.path().join("device-0"), "occupied")
            .await
            .unwrap();

        assert_matches!(
            ensure_minimum_backing_locations(root.path(), 4).await,
            Err(Error::DeviceCreationFailed { path, .. }) if path.ends_with("device-0")
        );
        assert!(!root.path().join("device-1").exists());
    }
}
