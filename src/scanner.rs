use crate::action_id::extract_action_id;
use crate::error::{Error, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Package scanner for an API source tree.
///
/// Every immediate subdirectory of the root is a package, and the `.rs` files directly
/// inside it are its candidate declaration files. Nothing deeper is visited. Hidden
/// directories (those starting with `.`) and `target` are skipped.
///
/// # Example
///
/// ```no_run
/// use apidoc_from_source::scanner::PackageScanner;
/// use std::path::PathBuf;
///
/// let scanner = PackageScanner::new(PathBuf::from("./api"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} packages", result.packages.len());
/// ```
pub struct PackageScanner {
    root_path: PathBuf,
}

/// One package directory and its candidate files, sorted by file name.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageSource {
    /// Directory name, also the name of the generated document
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<SourceFile>,
}

/// A candidate declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Set when the file name qualifies the file as an action source
    pub action_id: Option<String>,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        let action_id = file_action_id(&path);
        Self { path, action_id }
    }

    pub fn is_action_source(&self) -> bool {
        self.action_id.is_some()
    }
}

impl PackageSource {
    /// Files whose names carry an action id.
    pub fn action_sources(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.iter().filter(|f| f.is_action_source())
    }
}

/// Result of the scan.
///
/// Contains the discovered packages and any warnings encountered while listing them.
pub struct ScanResult {
    /// Packages sorted by name
    pub packages: Vec<PackageSource>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl PackageScanner {
    /// Creates a new `PackageScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Lists the packages under the root and the candidate files of each.
    ///
    /// Entries that cannot be read are recorded as warnings and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "not a directory: {}",
                self.root_path.display()
            )));
        }

        let mut packages = Vec::new();
        let mut warnings = Vec::new();

        for dir in list_dir(&self.root_path, true, &mut warnings) {
            let name = dir.file_name().to_string_lossy().to_string();
            let files: Vec<SourceFile> = list_dir(dir.path(), false, &mut warnings)
                .into_iter()
                .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
                .map(|entry| SourceFile::new(entry.into_path()))
                .collect();

            debug!(
                "Package {}: {} files, {} action sources",
                name,
                files.len(),
                files.iter().filter(|f| f.is_action_source()).count()
            );
            packages.push(PackageSource {
                name,
                path: dir.into_path(),
                files,
            });
        }

        Ok(ScanResult { packages, warnings })
    }
}

/// Lists the immediate children of `path` that are directories (`dirs = true`) or
/// files, sorted by name.
fn list_dir(path: &Path, dirs: bool, warnings: &mut Vec<String>) -> Vec<DirEntry> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let file_name = e.file_name().to_string_lossy();
            let is_hidden = file_name.starts_with('.');
            let is_target = file_name == "target";

            !is_hidden && !is_target
        })
    {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_dir() == dirs {
                    entries.push(entry);
                }
            }
            Err(e) => {
                let warning = format!("Failed to access path: {}", e);
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    entries
}

/// The action id carried by a file name: the stem (without `.rs`) must hold exactly one
/// numeric run, and test files (`demo_1999_test.rs`) never qualify.
pub fn file_action_id(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix(".rs").unwrap_or(file_name);

    let last_segment = stem
        .rsplit(|c: char| matches!(c, '_' | '.' | '-'))
        .next()
        .unwrap_or(stem);
    if last_segment == "test" {
        return None;
    }

    extract_action_id(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_action_id() {
        assert_eq!(file_action_id(Path::new("pkg/demo_10002.rs")), Some("10002".to_string()));
        assert_eq!(file_action_id(Path::new("demo.rs")), None);
        assert_eq!(file_action_id(Path::new("demo_1_2.rs")), None);
        assert_eq!(file_action_id(Path::new("demo_1999_test.rs")), None);
        assert_eq!(file_action_id(Path::new("demo_1999_test")), None);
        assert_eq!(file_action_id(Path::new("demo_1999")), Some("1999".to_string()));
    }

    #[test]
    fn test_scan_packages_one_level() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("pkg2/nested")).unwrap();
        fs::create_dir(root.join("pkg3")).unwrap();
        fs::write(root.join("top_1.rs"), "").unwrap();
        fs::write(root.join("pkg2/demo.rs"), "").unwrap();
        fs::write(root.join("pkg2/demo_9999.rs"), "").unwrap();
        fs::write(root.join("pkg2/readme_1.md"), "").unwrap();
        fs::write(root.join("pkg2/nested/deep_5.rs"), "").unwrap();
        fs::write(root.join("pkg3/demo_10002.rs"), "").unwrap();

        let result = PackageScanner::new(root.to_path_buf()).scan().unwrap();

        assert!(result.warnings.is_empty());
        let names: Vec<&str> = result.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["pkg2", "pkg3"]);

        let pkg2 = &result.packages[0];
        assert_eq!(pkg2.files.len(), 2);
        let sources: Vec<_> = pkg2.action_sources().collect();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].action_id.as_deref(), Some("9999"));
    }

    #[test]
    fn test_scan_skips_hidden_and_target() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join(".git")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::create_dir(root.join("api")).unwrap();

        let result = PackageScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.packages.len(), 1);
        assert_eq!(result.packages[0].name, "api");
        assert!(result.packages[0].files.is_empty());
    }

    #[test]
    fn test_scan_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let result = PackageScanner::new(temp_dir.path().join("missing")).scan();

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
