//! Physical tree scanning.
//!
//! A scan walks the directory through `cap-std`, sorting entries by name and
//! feeding the same records an expected tree would. Entries removed by a
//! concurrent writer end the scan without a digest rather than failing it.

use std::collections::BTreeSet;
use std::io;

use camino::Utf8Path;
use cap_std::fs::FileType;
use cap_std::{ambient_authority, fs_utf8::Dir};
use tracing::debug;

use super::digest::{TreeDigest, TreeHasher, child_path};
use super::{DirTreeError, MAX_LEAF_BYTES};

#[derive(Debug)]
enum Failure {
    Vanished,
    Fatal(DirTreeError),
}

type Step = Result<(), Failure>;

type Listing = Vec<(String, FileType)>;

/// Digests the physical tree rooted at `path` using the same rules as
/// [`DirTree`](super::DirTree).
///
/// Returns `Ok(None)` when the root, or anything below it, disappears during
/// the scan.
///
/// # Errors
///
/// Returns [`DirTreeError::LeafTooLarge`] for oversized files whose content
/// counts, and [`DirTreeError::Io`] for any other filesystem failure.
pub fn physical_digest(
    path: &Utf8Path,
    ignore_content: &BTreeSet<String>,
) -> Result<Option<TreeDigest>, DirTreeError> {
    let mut hasher = TreeHasher::default();
    let outcome = Dir::open_ambient_dir(path, ambient_authority())
        .map_err(|err| classify(path.as_str(), &err))
        .and_then(|root| walk(&root, path, "", ignore_content, &mut hasher));
    match outcome {
        Ok(()) => Ok(Some(hasher.finish())),
        Err(Failure::Vanished) => {
            debug!(path = %path, "entry vanished during scan");
            Ok(None)
        }
        Err(Failure::Fatal(err)) => Err(err),
    }
}

fn walk(
    dir: &Dir,
    root: &Utf8Path,
    prefix: &str,
    ignore_content: &BTreeSet<String>,
    hasher: &mut TreeHasher,
) -> Step {
    let listing = list(dir, root, prefix)?;
    visit(dir, root, prefix, listing, ignore_content, hasher)
}

/// Lists the entries of `dir` sorted by name.
fn list(dir: &Dir, root: &Utf8Path, prefix: &str) -> Result<Listing, Failure> {
    let location = |relative: &str| root.join(relative).into_string();
    let mut names = Vec::new();
    for listed in dir.entries().map_err(|err| classify(&location(prefix), &err))? {
        let entry = listed.map_err(|err| classify(&location(prefix), &err))?;
        let name = entry
            .file_name()
            .map_err(|err| classify(&location(prefix), &err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| classify(&location(&child_path(prefix, &name)), &err))?;
        names.push((name, file_type));
    }
    names.sort_by(|left, right| left.0.cmp(&right.0));
    Ok(names)
}

fn visit(
    dir: &Dir,
    root: &Utf8Path,
    prefix: &str,
    listing: Listing,
    ignore_content: &BTreeSet<String>,
    hasher: &mut TreeHasher,
) -> Step {
    let location = |relative: &str| root.join(relative).into_string();
    for (name, file_type) in listing {
        let relative = child_path(prefix, &name);
        if file_type.is_dir() {
            hasher.dir(&relative);
            let child = dir
                .open_dir(&name)
                .map_err(|err| classify(&location(&relative), &err))?;
            walk(&child, root, &relative, ignore_content, hasher)?;
        } else if file_type.is_file() && ignore_content.contains(&name) {
            hasher.file(&relative, None);
        } else if file_type.is_file() {
            let bytes = dir
                .read(&name)
                .map_err(|err| classify(&location(&relative), &err))?;
            if bytes.len() > MAX_LEAF_BYTES {
                return Err(Failure::Fatal(DirTreeError::LeafTooLarge {
                    path: location(&relative),
                    size: bytes.len(),
                }));
            }
            hasher.file(&relative, Some(bytes.as_slice()));
        } else {
            hasher.other(&relative);
        }
    }
    Ok(())
}

fn classify(path: &str, err: &io::Error) -> Failure {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::IsADirectory => {
            Failure::Vanished
        }
        _ => Failure::Fatal(DirTreeError::Io {
            path: path.to_owned(),
            message: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;
    use crate::test_support::utf8_path;

    #[rstest]
    #[case::directory("sub")]
    #[case::file("later.txt")]
    fn entry_removed_after_listing_ends_the_scan(#[case] removed: &str) {
        let tmp = TempDir::new().expect("tempdir");
        let root = utf8_path(tmp.path());
        let dir = Dir::open_ambient_dir(&root, ambient_authority()).expect("open root");
        dir.create_dir_all("sub/inner").expect("mkdir");
        dir.write("sub/inner/deep.txt", "deep").expect("write deep");
        dir.write("later.txt", "later").expect("write later");

        let listing = list(&dir, &root, "").expect("listing");
        if removed == "sub" {
            dir.remove_dir_all(removed).expect("remove dir");
        } else {
            dir.remove_file(removed).expect("remove file");
        }

        let mut hasher = TreeHasher::default();
        let outcome = visit(&dir, &root, "", listing, &BTreeSet::new(), &mut hasher);
        assert!(matches!(outcome, Err(Failure::Vanished)));
    }

    #[test]
    fn ignored_files_are_not_read() {
        let tmp = TempDir::new().expect("tempdir");
        let root = utf8_path(tmp.path());
        Dir::open_ambient_dir(&root, ambient_authority())
            .expect("open root")
            .write("daemon.log", vec![b'x'; MAX_LEAF_BYTES + 1])
            .expect("write log");
        let ignored = BTreeSet::from([String::from("daemon.log")]);

        let digest = physical_digest(&root, &ignored).expect("oversized ignored file is fine");
        assert!(digest.is_some());
    }
}
