//! Turning releases into installable candidates and picking versions

use std::cmp::Ordering;
use std::path::Path;

use plugdock_core::config::PluginRecord;
use plugdock_core::error::{Error, Result};
use plugdock_core::source::Release;

/// Extension of artifacts that are unpacked instead of copied
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Asset extensions recognised as plugins: archive, libraries, executable,
/// installer
pub const INSTALLABLE_EXTENSIONS: &[&str] = &["zip", "dll", "so", "dylib", "exe", "msi"];

/// Plugin name for an asset file name, `None` if the type is not installable
pub fn installable_stem(file_name: &str) -> Option<&str> {
    let path = Path::new(file_name);
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    if !INSTALLABLE_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }
    path.file_stem()?.to_str().filter(|stem| !stem.is_empty())
}

/// True if the artifact is unpacked rather than copied
pub fn is_archive(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// Flatten release assets into candidate records
///
/// Notes become the description; releases without notes fall back to their
/// title.
pub fn candidates_from_releases(releases: &[Release], author: &str) -> Vec<PluginRecord> {
    releases
        .iter()
        .flat_map(|release| {
            let description = if release.notes.trim().is_empty() {
                release.title.as_str()
            } else {
                release.notes.as_str()
            };
            release.assets.iter().filter_map(move |asset| {
                let name = installable_stem(&asset.name)?;
                Some(
                    PluginRecord::new(name, release.tag.as_str())
                        .with_description(description)
                        .with_author(author)
                        .with_artifact(asset.url.as_str(), asset.name.as_str(), asset.size),
                )
            })
        })
        .collect()
}

/// Case-insensitive plugin name comparison used for catalog lookups
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Compare version strings in natural order
///
/// Runs of digits compare numerically and everything else compares as
/// text, so `v10.0 > v9.2` and `1.0.1 > 1.0`. Versions that are equal under
/// that ordering fall back to plain string comparison. No semver parsing.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (is_numeric(x), is_numeric(y)) {
            (true, true) => compare_numeric(x, y),
            (false, false) => x.cmp(y),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len().cmp(&right.len()).then_with(|| a.cmp(b))
}

/// Newest candidate whose name matches case-insensitively
pub fn select_latest<'a>(candidates: &'a [PluginRecord], name: &str) -> Option<&'a PluginRecord> {
    candidates
        .iter()
        .filter(|c| same_name(&c.name, name))
        .max_by(|a, b| compare_versions(&a.version, &b.version))
}

/// Candidate for `name`, at `version` if given, else the newest
pub fn find_candidate<'a>(
    candidates: &'a [PluginRecord],
    name: &str,
    version: Option<&str>,
) -> Result<&'a PluginRecord> {
    match version {
        Some(version) => candidates
            .iter()
            .find(|c| same_name(&c.name, name) && c.version == version)
            .ok_or_else(|| Error::NotFound(format!("{}@{}", name, version))),
        None => select_latest(candidates, name).ok_or_else(|| Error::NotFound(name.to_string())),
    }
}

/// Split into maximal runs of ASCII digits and non-digits
fn chunks(version: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_digits = None;

    for (i, c) in version.char_indices() {
        let digit = c.is_ascii_digit();
        if in_digits.is_some_and(|d| d != digit) {
            out.push(&version[start..i]);
            start = i;
        }
        in_digits = Some(digit);
    }
    if start < version.len() {
        out.push(&version[start..]);
    }
    out
}

fn is_numeric(chunk: &str) -> bool {
    chunk.bytes().all(|b| b.is_ascii_digit())
}

/// Compare digit strings of any length without parsing
fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugdock_core::source::Asset;

    fn release(tag: &str, notes: &str, assets: &[&str]) -> Release {
        Release {
            tag: tag.to_string(),
            title: format!("Release {}", tag),
            notes: notes.to_string(),
            assets: assets
                .iter()
                .map(|name| Asset {
                    name: name.to_string(),
                    url: format!("https://example.com/{}/{}", tag, name),
                    size: 10,
                })
                .collect(),
        }
    }

    #[test]
    fn test_installable_stem_allow_list() {
        assert_eq!(installable_stem("Formatter.zip"), Some("Formatter"));
        assert_eq!(installable_stem("Linter.DLL"), Some("Linter"));
        assert_eq!(installable_stem("tool.exe"), Some("tool"));
        assert_eq!(installable_stem("setup.msi"), Some("setup"));
        assert_eq!(installable_stem("libfoo.so"), Some("libfoo"));
        assert_eq!(installable_stem("checksums.txt"), None);
        assert_eq!(installable_stem("source.tar.gz"), None);
        assert_eq!(installable_stem("README"), None);
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive("Formatter.zip"));
        assert!(is_archive("Formatter.ZIP"));
        assert!(!is_archive("Formatter.dll"));
        assert!(!is_archive("zip"));
    }

    #[test]
    fn test_candidates_from_releases() {
        let releases = vec![
            release("v2.0", "Faster", &["Formatter.zip", "notes.txt", "Linter.dll"]),
            release("v1.0", "  ", &["Formatter.zip"]),
        ];

        let candidates = candidates_from_releases(&releases, "acme");

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].name, "Formatter");
        assert_eq!(candidates[0].version, "v2.0");
        assert_eq!(candidates[0].description, "Faster");
        assert_eq!(candidates[0].author, "acme");
        assert_eq!(candidates[0].file_name, "Formatter.zip");
        assert_eq!(candidates[0].download_url, "https://example.com/v2.0/Formatter.zip");
        assert!(!candidates[0].is_installed());
        assert_eq!(candidates[1].name, "Linter");
        assert_eq!(candidates[2].description, "Release v1.0");
    }

    #[test]
    fn test_compare_versions_natural_order() {
        assert_eq!(compare_versions("v2.0", "v1.0"), Ordering::Greater);
        assert_eq!(compare_versions("v10.0", "v9.2"), Ordering::Greater);
        assert_eq!(compare_versions("v9.10", "v9.2"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.01", "1.1"), Ordering::Less);
        assert_eq!(compare_versions("alpha", "beta"), Ordering::Less);
    }

    #[test]
    fn test_select_latest_is_case_insensitive() {
        let releases = vec![
            release("v1.0", "", &["formatter.zip"]),
            release("v10.0", "", &["Formatter.zip"]),
            release("v9.0", "", &["FORMATTER.zip", "Other.zip"]),
        ];
        let candidates = candidates_from_releases(&releases, "acme");

        let latest = select_latest(&candidates, "Formatter").unwrap();
        assert_eq!(latest.version, "v10.0");
        assert!(select_latest(&candidates, "Missing").is_none());
    }

    #[test]
    fn test_find_candidate_with_version() {
        let releases = vec![
            release("v1.0", "", &["Formatter.zip"]),
            release("v2.0", "", &["Formatter.zip"]),
        ];
        let candidates = candidates_from_releases(&releases, "acme");

        assert_eq!(
            find_candidate(&candidates, "formatter", Some("v1.0"))
                .unwrap()
                .version,
            "v1.0"
        );
        assert_eq!(
            find_candidate(&candidates, "Formatter", None).unwrap().version,
            "v2.0"
        );

        let err = find_candidate(&candidates, "Formatter", Some("v3.0")).unwrap_err();
        assert!(err.to_string().contains("Formatter@v3.0"));
    }
}
