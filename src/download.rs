//! Package download and on-disk organization.
//!
//! For each active listing: fetch the archive through the authenticated
//! session, extract it in a scratch directory, then land its files under
//! `root/<car>/[team/]<track>/<package>`. Failures here are per-listing —
//! the caller records them and keeps going.

use crate::browser::Session;
use crate::config::Timeouts;
use crate::error::ProcessError;
use crate::layout::{resolve_target, team_folder_segment};
use crate::scrape::{ListingStatus, SetupListing};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How a package landed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// The package directory did not exist before.
    Fresh,
    /// Existing contents differed and were replaced wholesale.
    Replaced,
    /// Existing contents were identical; nothing was touched.
    Unchanged,
}

/// Outcome of successfully processing one listing.
#[derive(Debug, Clone)]
pub struct Placement {
    pub path: PathBuf,
    pub kind: PlacementKind,
}

/// Downloads archives and organizes their contents under the download root.
///
/// The team-folder branch is resolved once at construction, not per
/// listing.
pub struct Organizer {
    root: PathBuf,
    team_folder: Option<String>,
    fetch_timeout: Duration,
}

impl Organizer {
    pub fn new(root: PathBuf, team_label: Option<&str>, timeouts: &Timeouts) -> Self {
        Self {
            root,
            team_folder: team_label.map(team_folder_segment),
            fetch_timeout: timeouts.fetch,
        }
    }

    /// Fetch, extract, and place one listing's package.
    pub async fn process(
        &self,
        session: &Session,
        listing: &SetupListing,
    ) -> Result<Placement, ProcessError> {
        debug_assert_eq!(listing.status, ListingStatus::Active);
        info!("downloading {}", listing.package_name);

        let bytes = session
            .fetch_authenticated(&listing.download_url, self.fetch_timeout)
            .await
            .map_err(|e| ProcessError::Download(format!("{e:#}")))?;
        debug!("fetched {} bytes for {}", bytes.len(), listing.package_name);

        let root = self.root.clone();
        let team = self.team_folder.clone();
        let listing = listing.clone();
        tokio::task::spawn_blocking(move || place_archive(&bytes, &root, team.as_deref(), &listing))
            .await
            .map_err(|e| ProcessError::Extraction(format!("blocking task failed: {e}")))?
    }
}

/// Extract an archive and move its payload into the listing's target
/// directory. Blocking; run on a blocking thread.
pub(crate) fn place_archive(
    bytes: &[u8],
    root: &Path,
    team_folder: Option<&str>,
    listing: &SetupListing,
) -> Result<Placement, ProcessError> {
    let scratch = tempfile::tempdir()
        .map_err(|e| ProcessError::fs(Path::new("<scratch>"), e))?;

    extract_zip(bytes, scratch.path())?;

    let payload = payload_root(scratch.path()).ok_or_else(|| {
        ProcessError::Extraction(format!(
            "archive for {} contains no files",
            listing.package_name
        ))
    })?;

    let target = resolve_target(
        root,
        &listing.car_name,
        &listing.track_name,
        &listing.package_name,
        team_folder,
    );

    let kind = if target.exists() {
        if dirs_identical(&payload, &target)? {
            debug!("{} unchanged, leaving as-is", target.display());
            PlacementKind::Unchanged
        } else {
            // Replace wholesale so stale files never linger beside new ones.
            std::fs::remove_dir_all(&target).map_err(|e| ProcessError::fs(&target, e))?;
            copy_tree(&payload, &target)?;
            PlacementKind::Replaced
        }
    } else {
        copy_tree(&payload, &target)?;
        PlacementKind::Fresh
    };

    Ok(Placement { path: target, kind })
}

/// Extract a zip archive into `dest`, skipping entries whose names would
/// escape it.
fn extract_zip(bytes: &[u8], dest: &Path) -> Result<(), ProcessError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ProcessError::Extraction(format!("unreadable archive: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ProcessError::Extraction(format!("bad archive entry {i}: {e}")))?;
        let Some(rel) = file.enclosed_name() else {
            debug!("skipping archive entry with unsafe name: {}", file.name());
            continue;
        };
        let out = dest.join(rel);

        if file.is_dir() {
            std::fs::create_dir_all(&out).map_err(|e| ProcessError::fs(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProcessError::fs(parent, e))?;
        }
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| ProcessError::Extraction(format!("corrupt archive entry {i}: {e}")))?;
        let mut outfile =
            std::fs::File::create(&out).map_err(|e| ProcessError::fs(&out, e))?;
        outfile
            .write_all(&data)
            .map_err(|e| ProcessError::fs(&out, e))?;
    }

    Ok(())
}

/// The directory whose contents are the actual setup files.
///
/// Archives usually wrap their files in `car/track/` directories; landing
/// those wrappers under the target would duplicate the car/track segments
/// already in the path. Taking the parent of the first setup file (`.sto`
/// preferred) unwraps any nesting depth.
fn payload_root(extracted: &Path) -> Option<PathBuf> {
    let files = collect_files(extracted);
    let chosen = files
        .iter()
        .find(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("sto")))
        .or_else(|| files.first())?;
    chosen.parent().map(Path::to_path_buf)
}

/// All files under `dir`, depth-first with sorted entries for determinism.
fn collect_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut dirs = vec![dir.to_path_buf()];
    while let Some(current) = dirs.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths.into_iter().rev() {
            if path.is_dir() {
                dirs.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Whether two directories hold the same relative files with the same bytes.
fn dirs_identical(a: &Path, b: &Path) -> Result<bool, ProcessError> {
    let rel = |base: &Path, files: &[PathBuf]| -> Vec<PathBuf> {
        files
            .iter()
            .filter_map(|f| f.strip_prefix(base).ok().map(Path::to_path_buf))
            .collect()
    };

    let files_a = collect_files(a);
    let files_b = collect_files(b);
    if rel(a, &files_a) != rel(b, &files_b) {
        return Ok(false);
    }

    for file_a in &files_a {
        let relative = file_a.strip_prefix(a).unwrap_or(file_a);
        let file_b = b.join(relative);
        let bytes_a = std::fs::read(file_a).map_err(|e| ProcessError::fs(file_a, e))?;
        let bytes_b = std::fs::read(&file_b).map_err(|e| ProcessError::fs(&file_b, e))?;
        if bytes_a != bytes_b {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Recursively copy the contents of `src` into `dst`, creating `dst`.
fn copy_tree(src: &Path, dst: &Path) -> Result<(), ProcessError> {
    std::fs::create_dir_all(dst).map_err(|e| ProcessError::fs(dst, e))?;
    let entries = std::fs::read_dir(src).map_err(|e| ProcessError::fs(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ProcessError::fs(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| ProcessError::fs(&to, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(package: &str) -> SetupListing {
        SetupListing {
            package_name: package.to_string(),
            car_name: "ferrari296gt3".to_string(),
            track_name: "daytonaroad".to_string(),
            download_url: "https://app.tracktitan.io/setups/x".to_string(),
            status: ListingStatus::Active,
        }
    }

    fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_place_unwraps_car_track_wrapper_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("ferrari296gt3/daytonaroad/pkg_sR.sto", b"sto data"),
            ("ferrari296gt3/daytonaroad/pkg_sR.rpy", b"rpy data"),
        ]);

        let placement = place_archive(&bytes, dir.path(), None, &listing("pkg_sR")).unwrap();
        assert_eq!(placement.kind, PlacementKind::Fresh);

        let expected = dir.path().join("ferrari296gt3/daytonaroad/pkg_sR");
        assert_eq!(placement.path, expected);
        assert!(expected.join("pkg_sR.sto").is_file());
        assert!(expected.join("pkg_sR.rpy").is_file());
        // Wrapper dirs from the archive must not be nested inside the target.
        assert!(!expected.join("ferrari296gt3").exists());
    }

    #[test]
    fn test_place_with_team_folder_between_car_and_track() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("pkg.sto", b"data")]);
        let team = team_folder_segment("TeamA");

        let placement =
            place_archive(&bytes, dir.path(), Some(&team), &listing("pkg")).unwrap();
        assert_eq!(
            placement.path,
            dir.path()
                .join("ferrari296gt3/Garage 61 - TeamA/daytonaroad/pkg")
        );
        assert!(placement.path.join("pkg.sto").is_file());
    }

    #[test]
    fn test_rerun_with_identical_archive_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("pkg.sto", b"same data")]);

        let first = place_archive(&bytes, dir.path(), None, &listing("pkg")).unwrap();
        assert_eq!(first.kind, PlacementKind::Fresh);

        let second = place_archive(&bytes, dir.path(), None, &listing("pkg")).unwrap();
        assert_eq!(second.kind, PlacementKind::Unchanged);
        assert_eq!(
            std::fs::read(second.path.join("pkg.sto")).unwrap(),
            b"same data"
        );
    }

    #[test]
    fn test_differing_contents_are_replaced_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let old = build_zip(&[("pkg.sto", b"old"), ("stale.rpy", b"stale")]);
        let new = build_zip(&[("pkg.sto", b"new")]);

        place_archive(&old, dir.path(), None, &listing("pkg")).unwrap();
        let placement = place_archive(&new, dir.path(), None, &listing("pkg")).unwrap();
        assert_eq!(placement.kind, PlacementKind::Replaced);

        assert_eq!(std::fs::read(placement.path.join("pkg.sto")).unwrap(), b"new");
        // Wholesale replacement: the stale sibling must be gone.
        assert!(!placement.path.join("stale.rpy").exists());
    }

    #[test]
    fn test_listing_names_are_sanitized_into_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("pkg.sto", b"data")]);
        let mut bad = listing("pkg?*");
        bad.car_name = "car/name".to_string();
        bad.track_name = "  track.  ".to_string();

        let placement = place_archive(&bytes, dir.path(), None, &bad).unwrap();
        assert!(placement.path.starts_with(dir.path()));
        assert_eq!(
            placement.path,
            dir.path().join("car_name/track/pkg__")
        );
    }

    #[test]
    fn test_empty_archive_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[]);
        let err = place_archive(&bytes, dir.path(), None, &listing("pkg")).unwrap_err();
        assert!(matches!(err, ProcessError::Extraction(_)));
    }

    #[test]
    fn test_garbage_bytes_are_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let err =
            place_archive(b"not a zip at all", dir.path(), None, &listing("pkg")).unwrap_err();
        assert!(matches!(err, ProcessError::Extraction(_)));
    }

    #[test]
    fn test_payload_root_prefers_sto_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/readme.txt"), "hi").unwrap();
        std::fs::create_dir_all(dir.path().join("car/track")).unwrap();
        std::fs::write(dir.path().join("car/track/setup.sto"), "s").unwrap();

        let payload = payload_root(dir.path()).unwrap();
        assert_eq!(payload, dir.path().join("car/track"));
    }
}
