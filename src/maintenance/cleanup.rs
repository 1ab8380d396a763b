//! Filesystem cleanup.
//!
//! Each root is walked bottom-up: files first, then the directories they
//! leave empty. The roots themselves are kept.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use walkdir::WalkDir;

use super::report::CleanupTally;
use crate::error::MaintError;
use crate::log_sink::Level;

/// OS error codes meaning "held open by another process".
#[cfg(windows)]
const IN_USE_CODES: &[i32] = &[32, 33]; // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
#[cfg(unix)]
const IN_USE_CODES: &[i32] = &[16, 26]; // EBUSY, ETXTBSY
#[cfg(not(any(unix, windows)))]
const IN_USE_CODES: &[i32] = &[];

/// The error a remover reports for an entry that is in use elsewhere.
pub fn in_use_error() -> io::Error {
    match IN_USE_CODES.first() {
        Some(&code) => io::Error::from_raw_os_error(code),
        None => io::Error::new(io::ErrorKind::Other, "in use by another program"),
    }
}

/// Deletes single filesystem entries.
pub trait EntryRemover: Send + Sync {
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Remover backed by `std::fs`, with a lock probe before each file on Windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl EntryRemover for FsRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if is_path_locked(path) {
            return Err(in_use_error());
        }
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }
}

/// Check if a file is held open without delete sharing (Windows-specific)
#[cfg(windows)]
fn is_path_locked(path: &Path) -> bool {
    use std::fs::OpenOptions;
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x00000001;
    const FILE_SHARE_WRITE: u32 = 0x00000002;
    const FILE_SHARE_DELETE: u32 = 0x00000004;
    const DELETE: u32 = 0x00010000;

    let mut options = OpenOptions::new();
    options
        .access_mode(DELETE)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE);

    match options.open(path) {
        Ok(_) => false,
        Err(e) => matches!(e.raw_os_error(), Some(code) if IN_USE_CODES.contains(&code)),
    }
}

#[cfg(not(windows))]
fn is_path_locked(_path: &Path) -> bool {
    // Unix locks are advisory and don't block unlink
    false
}

#[derive(Debug)]
enum Failure {
    InUse,
    Denied,
    Other(io::Error),
}

fn classify(err: io::Error) -> Failure {
    match err.raw_os_error() {
        Some(code) if IN_USE_CODES.contains(&code) => Failure::InUse,
        _ if err.kind() == io::ErrorKind::PermissionDenied => Failure::Denied,
        _ => Failure::Other(err),
    }
}

/// Remove the contents of every root, reporting each entry through `report`.
pub(crate) fn clean_roots(
    roots: &[PathBuf],
    exclude: &GlobSet,
    remover: &dyn EntryRemover,
    report: &mut dyn FnMut(Level, String),
) -> CleanupTally {
    let mut tally = CleanupTally::default();
    for root in roots {
        if !root.is_dir() {
            report(
                Level::Warning,
                format!("Path not found or invalid: {}", root.display()),
            );
            continue;
        }
        clean_root(root, exclude, remover, report, &mut tally);
    }
    tally
}

fn clean_root(
    root: &Path,
    exclude: &GlobSet,
    remover: &dyn EntryRemover,
    report: &mut dyn FnMut(Level, String),
    tally: &mut CleanupTally,
) {
    // Directories that still hold something we did not delete.
    let mut kept: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                keep_ancestors(root, &path, &mut kept);
                kept.insert(path.clone());
                match err.into_io_error() {
                    Some(io_err) => record_failure(&path, io_err, report, tally),
                    None => {
                        tally.errors += 1;
                        report(
                            Level::Error,
                            format!("Error deleting {}: filesystem loop", path.display()),
                        );
                    }
                }
                continue;
            }
        };

        let path = entry.path();
        if exclude.is_match(path) {
            report(Level::Debug, format!("Skipped excluded path: {}", path.display()));
            keep_ancestors(root, path, &mut kept);
            continue;
        }

        if entry.file_type().is_dir() {
            if kept.contains(path) {
                continue;
            }
            match remover.remove_dir(path) {
                Ok(()) => {
                    tally.deleted += 1;
                    report(Level::Info, format!("Deleted directory: {}", path.display()));
                }
                Err(err) => {
                    keep_ancestors(root, path, &mut kept);
                    record_failure(path, err, report, tally);
                }
            }
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            match remover.remove_file(path) {
                Ok(()) => {
                    tally.deleted += 1;
                    tally.bytes_freed += size;
                    report(Level::Info, format!("Deleted file: {}", path.display()));
                }
                Err(err) => {
                    keep_ancestors(root, path, &mut kept);
                    record_failure(path, err, report, tally);
                }
            }
        }
    }
}

fn keep_ancestors(root: &Path, path: &Path, kept: &mut HashSet<PathBuf>) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor == root || !kept.insert(ancestor.to_path_buf()) {
            break;
        }
    }
}

fn record_failure(
    path: &Path,
    err: io::Error,
    report: &mut dyn FnMut(Level, String),
    tally: &mut CleanupTally,
) {
    let path = path.to_path_buf();
    match classify(err) {
        Failure::InUse => {
            tally.in_use += 1;
            report(Level::Warning, MaintError::FilesystemInUse { path }.to_string());
        }
        Failure::Denied => {
            tally.permission_denied += 1;
            report(
                Level::Error,
                MaintError::FilesystemAccessDenied { path }.to_string(),
            );
        }
        Failure::Other(err) => {
            tally.errors += 1;
            report(Level::Error, format!("Error deleting {}: {err}", path.display()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use globset::{Glob, GlobSetBuilder};
    use tempfile::TempDir;

    /// Fails files by name, deletes everything else for real.
    struct Scripted {
        in_use: Vec<&'static str>,
        denied: Vec<&'static str>,
    }

    impl Scripted {
        fn fail(&self, path: &Path) -> Option<io::Error> {
            let name = path.file_name()?.to_str()?;
            if self.in_use.contains(&name) {
                Some(in_use_error())
            } else if self.denied.contains(&name) {
                Some(io::Error::from(io::ErrorKind::PermissionDenied))
            } else {
                None
            }
        }
    }

    impl EntryRemover for Scripted {
        fn remove_file(&self, path: &Path) -> io::Result<()> {
            match self.fail(path) {
                Some(err) => Err(err),
                None => fs::remove_file(path),
            }
        }

        fn remove_dir(&self, path: &Path) -> io::Result<()> {
            match self.fail(path) {
                Some(err) => Err(err),
                None => fs::remove_dir(path),
            }
        }
    }

    fn create_test_dir() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn collect(
        roots: &[PathBuf],
        exclude: &GlobSet,
        remover: &dyn EntryRemover,
    ) -> (CleanupTally, Vec<(Level, String)>) {
        let mut lines = Vec::new();
        let tally = clean_roots(roots, exclude, remover, &mut |level: Level, msg: String| {
            lines.push((level, msg))
        });
        (tally, lines)
    }

    #[test]
    fn test_tallies_each_entry_once() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();
        for name in ["a.tmp", "b.tmp", "c.tmp", "locked.tmp", "denied.tmp"] {
            fs::write(root.join(name), "data").unwrap();
        }
        let remover = Scripted {
            in_use: vec!["locked.tmp"],
            denied: vec!["denied.tmp"],
        };

        let (tally, lines) = collect(&[root.to_path_buf()], &GlobSet::empty(), &remover);

        assert_eq!(tally.summary(), "Deleted: 3, In Use: 1, Permission Denied: 1");
        assert_eq!(tally.bytes_freed, 12);
        assert_eq!(lines.len(), 5);
        assert!(lines
            .iter()
            .any(|(l, m)| *l == Level::Warning && m.starts_with("In use by another program: ")));
        assert!(lines
            .iter()
            .any(|(l, m)| *l == Level::Error && m.starts_with("Permission denied for ")));
        assert!(root.exists());
        assert!(root.join("locked.tmp").exists());
    }

    #[test]
    fn test_directories_removed_after_their_files() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("nested/deeper")).unwrap();
        fs::write(root.join("nested/deeper/file.log"), "x").unwrap();

        let (tally, lines) = collect(&[root.to_path_buf()], &GlobSet::empty(), &FsRemover);

        assert_eq!(tally.deleted, 3);
        let messages: Vec<&str> = lines.iter().map(|(_, m)| m.as_str()).collect();
        assert!(messages[0].starts_with("Deleted file: "));
        assert!(messages[1].starts_with("Deleted directory: ") && messages[1].ends_with("deeper"));
        assert!(messages[2].starts_with("Deleted directory: ") && messages[2].ends_with("nested"));
        assert!(!root.join("nested").exists());
    }

    #[test]
    fn test_directory_with_kept_file_is_left_alone() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("holder")).unwrap();
        fs::write(root.join("holder/busy.dat"), "x").unwrap();
        let remover = Scripted {
            in_use: vec!["busy.dat"],
            denied: vec![],
        };

        let (tally, lines) = collect(&[root.to_path_buf()], &GlobSet::empty(), &remover);

        assert_eq!(tally.in_use, 1);
        assert_eq!(tally.errors, 0);
        assert_eq!(lines.len(), 1);
        assert!(root.join("holder").exists());
    }

    #[test]
    fn test_missing_root_is_reported() {
        let temp_dir = create_test_dir();
        let missing = temp_dir.path().join("gone");

        let (tally, lines) = collect(&[missing], &GlobSet::empty(), &FsRemover);

        assert_eq!(tally, CleanupTally::default());
        assert_eq!(lines[0].0, Level::Warning);
        assert!(lines[0].1.starts_with("Path not found or invalid: "));
    }

    #[test]
    fn test_excluded_entries_survive() {
        let temp_dir = create_test_dir();
        let root = temp_dir.path();
        fs::write(root.join("keep.keep"), "x").unwrap();
        fs::write(root.join("drop.tmp"), "x").unwrap();
        let mut builder = GlobSetBuilder::new();
        builder.add(Glob::new("**/*.keep").unwrap());
        let exclude = builder.build().unwrap();

        let (tally, lines) = collect(&[root.to_path_buf()], &exclude, &FsRemover);

        assert_eq!(tally.deleted, 1);
        assert!(root.join("keep.keep").exists());
        assert!(lines.iter().any(|(l, _)| *l == Level::Debug));
    }

    #[test]
    fn test_in_use_error_classifies_as_in_use() {
        assert!(matches!(classify(in_use_error()), Failure::InUse));
        assert!(matches!(
            classify(io::Error::from(io::ErrorKind::PermissionDenied)),
            Failure::Denied
        ));
        assert!(matches!(
            classify(io::Error::from(io::ErrorKind::NotFound)),
            Failure::Other(_)
        ));
    }
}
