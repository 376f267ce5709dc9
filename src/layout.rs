//! On-disk layout rules: path-safe names, team-folder discovery, and
//! final package destinations.
//!
//! Every path segment written under the download root passes through
//! [`sanitize`], so a listing name can never introduce separators or
//! traversal sequences into the tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Characters that are invalid in a path segment on at least one supported
/// platform. Each is replaced with `_`.
const RESERVED: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum byte length of a single sanitized segment.
pub const MAX_SEGMENT_BYTES: usize = 200;

/// Segment used when sanitization leaves nothing behind.
pub const PLACEHOLDER_SEGMENT: &str = "unnamed";

/// Literal prefix that marks a team folder under a car directory.
pub const TEAM_FOLDER_PREFIX: &str = "Garage 61";

/// Turn arbitrary display text into a filesystem-safe path segment.
///
/// Replaces reserved characters with `_`, trims surrounding whitespace and
/// trailing dots, and truncates to [`MAX_SEGMENT_BYTES`] without splitting a
/// multi-byte character. Never returns an empty string; pure and total.
pub fn sanitize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();

    let mut out = trim_segment(&replaced);

    if out.len() > MAX_SEGMENT_BYTES {
        let mut cut = MAX_SEGMENT_BYTES;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        // The cut may expose a new trailing dot or space.
        out = trim_segment(&out);
    }

    if out.is_empty() {
        PLACEHOLDER_SEGMENT.to_string()
    } else {
        out
    }
}

/// Trim surrounding whitespace, then trailing dots and any whitespace they
/// expose (Windows rejects segments ending in either).
fn trim_segment(s: &str) -> String {
    s.trim()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Normalize a caller-supplied team label into a full team-folder segment.
///
/// `"My Team"` becomes `"Garage 61 - My Team"`; labels that already carry
/// the prefix (e.g. picked from [`scan_team_folders`]) pass through as-is.
pub fn team_folder_segment(label: &str) -> String {
    let label = label.trim();
    if label.starts_with(TEAM_FOLDER_PREFIX) {
        sanitize(label)
    } else {
        sanitize(&format!("{TEAM_FOLDER_PREFIX} - {label}"))
    }
}

/// Resolve the destination directory for one package.
///
/// `root/<car>/[team/]<track>/<package>`, every segment sanitized. The team
/// segment, when present, is already normalized by [`team_folder_segment`].
pub fn resolve_target(
    root: &Path,
    car: &str,
    track: &str,
    package: &str,
    team_folder: Option<&str>,
) -> PathBuf {
    let mut path = root.join(sanitize(car));
    if let Some(team) = team_folder {
        path.push(team);
    }
    path.push(sanitize(track));
    path.push(sanitize(package));
    path
}

/// Scan an existing download root for team folders.
///
/// Looks at the immediate subdirectories of `root` and at each car
/// directory's immediate subdirectories for names starting with
/// `"Garage 61"`. Duplicates across cars collapse to one entry. A missing
/// or unreadable root yields an empty set rather than an error.
pub fn scan_team_folders(root: &Path) -> BTreeSet<String> {
    let mut found = BTreeSet::new();

    let Ok(entries) = std::fs::read_dir(root) else {
        return found;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        collect_if_team_folder(&path, &mut found);

        if let Ok(children) = std::fs::read_dir(&path) {
            for child in children.flatten() {
                let child_path = child.path();
                if child_path.is_dir() {
                    collect_if_team_folder(&child_path, &mut found);
                }
            }
        }
    }

    found
}

fn collect_if_team_folder(path: &Path, found: &mut BTreeSet<String>) {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.starts_with(TEAM_FOLDER_PREFIX) {
            found.insert(name.to_string());
        }
    }
}
