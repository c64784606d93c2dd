//! Corpus discovery: locating family descriptors under the license
//! subtrees.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Serialize;
use walkdir::WalkDir;

/// File name of the per-family descriptor.
pub const DESCRIPTOR_FILE: &str = "METADATA.pb";

/// The closed set of license categories a family can belong to, derived
/// from the corpus subtree its descriptor lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseCategory {
    Ofl,
    Apache,
    Ufl,
}

impl LicenseCategory {
    pub const ALL: [LicenseCategory; 3] =
        [LicenseCategory::Ofl, LicenseCategory::Apache, LicenseCategory::Ufl];

    /// Directory name of this category's subtree, also used in
    /// synthesized file URLs.
    pub fn dir_name(self) -> &'static str {
        match self {
            LicenseCategory::Ofl => "ofl",
            LicenseCategory::Apache => "apache",
            LicenseCategory::Ufl => "ufl",
        }
    }
}

/// Path to one family descriptor plus the license subtree it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorRef {
    pub path: PathBuf,
    pub license: LicenseCategory,
}

impl DescriptorRef {
    /// Name of the family directory containing the descriptor.
    pub fn family_dir(&self) -> Option<&str> {
        self.path
            .parent()
            .and_then(|dir| dir.file_name())
            .and_then(|name| name.to_str())
    }
}

/// Collect every family descriptor under the corpus root. Missing
/// license subtrees are skipped; a missing root is an error. Results are
/// sorted by path so downstream id assignment never depends on directory
/// enumeration order.
pub fn discover_descriptors(root: &Path) -> Result<Vec<DescriptorRef>> {
    if !root.exists() {
        return Err(anyhow!("corpus root does not exist: {}", root.display()));
    }

    let mut found = Vec::new();

    for license in LicenseCategory::ALL {
        let subtree = root.join(license.dir_name());
        if !subtree.exists() {
            continue;
        }

        for entry in WalkDir::new(&subtree).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let descriptor = entry.path().join(DESCRIPTOR_FILE);
            if descriptor.is_file() {
                found.push(DescriptorRef { path: descriptor, license });
            }
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn seed_family(root: &Path, license: &str, family: &str) {
        let dir = root.join(license).join(family);
        fs::create_dir_all(&dir).expect("mkdir family");
        fs::write(dir.join(DESCRIPTOR_FILE), "name: \"x\"\n").expect("write descriptor");
    }

    #[test]
    fn finds_descriptors_across_license_subtrees() {
        let tmp = tempdir().expect("tempdir");
        seed_family(tmp.path(), "ofl", "zeta");
        seed_family(tmp.path(), "apache", "alpha");
        // A family directory without a descriptor is ignored.
        fs::create_dir_all(tmp.path().join("ofl/empty")).expect("mkdir");

        let found = discover_descriptors(tmp.path()).expect("discover");

        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .any(|d| d.license == LicenseCategory::Apache && d.family_dir() == Some("alpha")));
        assert!(found
            .iter()
            .any(|d| d.license == LicenseCategory::Ofl && d.family_dir() == Some("zeta")));
    }

    #[test]
    fn missing_subtrees_are_skipped() {
        let tmp = tempdir().expect("tempdir");
        seed_family(tmp.path(), "ufl", "solo");

        let found = discover_descriptors(tmp.path()).expect("discover");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].license, LicenseCategory::Ufl);
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let gone = tmp.path().join("nope");
        assert!(discover_descriptors(&gone).is_err());
    }

    #[test]
    fn results_are_sorted_by_path() {
        let tmp = tempdir().expect("tempdir");
        seed_family(tmp.path(), "ofl", "bbb");
        seed_family(tmp.path(), "ofl", "aaa");

        let found = discover_descriptors(tmp.path()).expect("discover");
        let dirs: Vec<&str> = found.iter().filter_map(|d| d.family_dir()).collect();
        assert_eq!(dirs, vec!["aaa", "bbb"]);
    }
}
