//! Content-addressed links.
//!
//! An installed file is reached through two symlink hops:
//!
//! ```text
//! links/…/bin/go                 -> go:sha256:<hex>          (canonical)
//! links/…/bin/go:sha256:<hex>    -> ../../../downloads/…/go  (content-addressed)
//! platforms/<platform>/bin/go    -> ../../../links/…/bin/go  (destination)
//! ```
//!
//! The canonical link always names a sibling whose file name embeds the
//! digest of the file it resolves to, so an installation can be validated by
//! rehashing the target. Every symlink is written under a temporary name and
//! renamed into place; concurrent writers race on the rename and whichever
//! lands last wins with a complete, consistent link.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::checksum::{file_digest, parse_digest};
use crate::{Error, Result};

/// State of a canonical link as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Nothing at the canonical path.
    Missing,
    /// Something is there but it is not a valid link chain.
    Broken {
        /// Why the chain is unusable.
        reason: String,
    },
    /// The chain resolves but the target's digest differs from the embedded one.
    Corrupt {
        /// Digest embedded in the content-addressed name.
        expected: String,
        /// Digest of the resolved file.
        actual: String,
    },
    /// The target matches but cannot be executed.
    NotExecutable,
    /// The chain is complete and verified.
    Installed {
        /// The verified digest.
        digest: String,
    },
}

impl LinkState {
    /// Whether the tool must be acquired again.
    #[must_use]
    pub fn needs_install(&self) -> bool {
        !matches!(self, Self::Installed { .. })
    }
}

/// Path of the content-addressed sibling of `canonical` for `digest`.
#[must_use]
pub fn content_addressed_path(canonical: &Path, digest: &str) -> PathBuf {
    let mut name = canonical
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(":");
    name.push(digest);
    canonical.with_file_name(name)
}

/// Inspect the canonical link at `canonical`.
///
/// # Errors
///
/// Returns an error only if the resolved target exists but cannot be hashed.
pub fn inspect(canonical: &Path) -> Result<LinkState> {
    let target = match fs::read_link(canonical) {
        Ok(target) => target,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LinkState::Missing),
        Err(e) => {
            return Ok(LinkState::Broken {
                reason: format!("not a symlink: {e}"),
            });
        }
    };

    let Some(digest) = embedded_digest(canonical, &target) else {
        return Ok(LinkState::Broken {
            reason: format!("unexpected link target {}", target.display()),
        });
    };
    let Ok((algorithm, _)) = parse_digest(&digest) else {
        return Ok(LinkState::Broken {
            reason: format!("invalid embedded digest {digest}"),
        });
    };

    let resolved = match fs::canonicalize(canonical) {
        Ok(resolved) => resolved,
        Err(e) => {
            return Ok(LinkState::Broken {
                reason: format!("does not resolve: {e}"),
            });
        }
    };
    let metadata = match fs::metadata(&resolved) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => {
            return Ok(LinkState::Broken {
                reason: format!("{} is not a regular file", resolved.display()),
            });
        }
        Err(e) => {
            return Ok(LinkState::Broken {
                reason: format!("cannot stat {}: {e}", resolved.display()),
            });
        }
    };

    let actual = file_digest(&resolved, algorithm)?;
    if actual != digest {
        return Ok(LinkState::Corrupt {
            expected: digest,
            actual,
        });
    }

    if metadata.permissions().mode() & 0o111 == 0 {
        return Ok(LinkState::NotExecutable);
    }

    Ok(LinkState::Installed { digest })
}

/// The digest embedded in the canonical link's target, which must be the
/// basename of the canonical path followed by `:<digest>`.
fn embedded_digest(canonical: &Path, target: &Path) -> Option<String> {
    if target.components().count() != 1 {
        return None;
    }
    let name = canonical.file_name()?.to_str()?;
    let target = target.to_str()?;
    target
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(String::from)
}

/// Remove the canonical link and its content-addressed sibling for `digest`.
///
/// # Errors
///
/// Returns [`Error::Invariant`] if an existing entry cannot be removed.
pub fn remove_stale(canonical: &Path, digest: Option<&str>) -> Result<()> {
    remove_entry(canonical)?;
    if let Some(digest) = digest {
        remove_entry(&content_addressed_path(canonical, digest))?;
    }
    Ok(())
}

/// Link a freshly acquired file into the cache under `canonical`.
///
/// Creates `canonical:<digest> -> file` and `canonical -> canonical:<digest>`,
/// then checks that the chain resolves. Existing entries are replaced by
/// rename rather than removed first, so a concurrent reader or writer never
/// observes a missing hop.
///
/// # Errors
///
/// Returns [`Error::Invariant`] if an existing entry cannot be replaced and
/// an I/O error for any other filesystem failure.
pub fn link_content_addressed(file: &Path, digest: &str, canonical: &Path) -> Result<()> {
    let addressed = content_addressed_path(canonical, digest);

    let dir = parent_of(canonical)?;
    fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))?;
    fs::set_permissions(file, fs::Permissions::from_mode(0o755))
        .map_err(|e| Error::io(e, file, "set_permissions"))?;

    replace_symlink(&relative_path(dir, file), &addressed)?;

    let addressed_name = addressed
        .file_name()
        .ok_or_else(|| Error::configuration(format!("Invalid link path {}", addressed.display())))?;
    replace_symlink(Path::new(addressed_name), canonical)?;

    fs::canonicalize(canonical).map_err(|e| Error::io(e, canonical, "resolve link"))?;
    debug!(?canonical, %digest, "Linked content-addressed file");
    Ok(())
}

/// Point the destination link `dest` at `target` using a relative path.
///
/// # Errors
///
/// Returns an error if the link cannot be created or does not resolve.
pub fn link_destination(dest: &Path, target: &Path) -> Result<()> {
    let dir = parent_of(dest)?;
    fs::create_dir_all(dir).map_err(|e| Error::io(e, dir, "create_dir_all"))?;

    replace_symlink(&relative_path(dir, target), dest)?;
    fs::canonicalize(dest).map_err(|e| Error::io(e, dest, "resolve link"))?;
    Ok(())
}

/// Remove a file or symlink, treating "already gone" as success.
fn remove_entry(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(?path, "Removed cache entry");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(?path, error = %e, "Cannot remove cache entry");
            Err(Error::invariant(e, path))
        }
    }
}

/// Atomically make `link` a symlink with value `target`.
fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    let mut tmp_name = OsString::from(".");
    tmp_name.push(link.file_name().unwrap_or_default());
    tmp_name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
    let tmp = link.with_file_name(tmp_name);

    symlink(target, &tmp).map_err(|e| Error::io(e, &tmp, "symlink"))?;
    if let Err(e) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        warn!(?link, error = %e, "Cannot replace cache entry");
        return Err(Error::invariant(e, link));
    }
    Ok(())
}

fn parent_of(path: &Path) -> Result<&Path> {
    path.parent()
        .ok_or_else(|| Error::configuration(format!("Path {} has no parent", path.display())))
}

/// Express `to` relative to the directory `from_dir`.
///
/// Both paths must share the same base (both absolute, or both relative to
/// the same directory); otherwise `to` is returned unchanged.
#[must_use]
pub fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    fn normalize(p: &Path) -> Vec<Component<'_>> {
        p.components().filter(|c| *c != Component::CurDir).collect()
    }

    let from = normalize(from_dir);
    let target = normalize(to);

    if from_dir.has_root() != to.has_root() || from.contains(&Component::ParentDir) {
        return to.to_path_buf();
    }

    let common = from
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::checksum::file_sha256;
    use tempfile::TempDir;

    fn scratch_file(root: &Path, content: &[u8]) -> PathBuf {
        let file = root.join("downloads/linux-x86_64/go-1.0/scratch/go/bin/go");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, content).unwrap();
        file
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/cache/links/a/bin"), Path::new("/cache/downloads/a/x/go")),
            PathBuf::from("../../../downloads/a/x/go")
        );
        assert_eq!(
            relative_path(Path::new("/cache/bin"), Path::new("/cache/bin/go")),
            PathBuf::from("go")
        );
        assert_eq!(
            relative_path(Path::new("cache/bin"), Path::new("cache/lib/x")),
            PathBuf::from("../lib/x")
        );
        assert_eq!(
            relative_path(Path::new("/cache/./bin"), Path::new("/cache/lib/./x")),
            PathBuf::from("../lib/x")
        );
        // Mixed bases fall back to the target
        assert_eq!(
            relative_path(Path::new("/cache/bin"), Path::new("cache/lib/x")),
            PathBuf::from("cache/lib/x")
        );
    }

    #[test]
    fn test_content_addressed_path() {
        assert_eq!(
            content_addressed_path(Path::new("/links/bin/go"), "sha256:ab"),
            PathBuf::from("/links/bin/go:sha256:ab")
        );
    }

    #[test]
    fn test_link_and_inspect() {
        let temp = TempDir::new().unwrap();
        let file = scratch_file(temp.path(), b"go binary");
        let digest = file_sha256(&file).unwrap();
        let canonical = temp.path().join("links/linux-x86_64/go-1.0/bin/go");

        assert_eq!(inspect(&canonical).unwrap(), LinkState::Missing);

        link_content_addressed(&file, &digest, &canonical).unwrap();

        let target = fs::read_link(&canonical).unwrap();
        assert_eq!(target, PathBuf::from(format!("go:{digest}")));
        let addressed = fs::read_link(content_addressed_path(&canonical, &digest)).unwrap();
        assert!(addressed.is_relative());

        assert_eq!(
            inspect(&canonical).unwrap(),
            LinkState::Installed { digest: digest.clone() }
        );
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_inspect_detects_corruption() {
        let temp = TempDir::new().unwrap();
        let file = scratch_file(temp.path(), b"go binary");
        let digest = file_sha256(&file).unwrap();
        let canonical = temp.path().join("links/bin/go");
        link_content_addressed(&file, &digest, &canonical).unwrap();

        fs::write(&file, b"tampered").unwrap();

        let state = inspect(&canonical).unwrap();
        assert!(matches!(state, LinkState::Corrupt { ref expected, .. } if *expected == digest));
        assert!(state.needs_install());
    }

    #[test]
    fn test_inspect_detects_deleted_target() {
        let temp = TempDir::new().unwrap();
        let file = scratch_file(temp.path(), b"go binary");
        let digest = file_sha256(&file).unwrap();
        let canonical = temp.path().join("links/bin/go");
        link_content_addressed(&file, &digest, &canonical).unwrap();

        fs::remove_file(&file).unwrap();

        assert!(matches!(inspect(&canonical).unwrap(), LinkState::Broken { .. }));
    }

    #[test]
    fn test_inspect_rejects_plain_file_and_foreign_link() {
        let temp = TempDir::new().unwrap();
        let canonical = temp.path().join("go");
        fs::write(&canonical, b"not a link").unwrap();
        assert!(matches!(inspect(&canonical).unwrap(), LinkState::Broken { .. }));

        fs::remove_file(&canonical).unwrap();
        symlink("/usr/bin/env", &canonical).unwrap();
        assert!(matches!(inspect(&canonical).unwrap(), LinkState::Broken { .. }));
    }

    #[test]
    fn test_inspect_not_executable() {
        let temp = TempDir::new().unwrap();
        let file = scratch_file(temp.path(), b"go binary");
        let digest = file_sha256(&file).unwrap();
        let canonical = temp.path().join("links/bin/go");
        link_content_addressed(&file, &digest, &canonical).unwrap();

        fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(inspect(&canonical).unwrap(), LinkState::NotExecutable);
    }

    #[test]
    fn test_relink_replaces_previous_chain() {
        let temp = TempDir::new().unwrap();
        let canonical = temp.path().join("links/bin/go");

        let first = scratch_file(temp.path(), b"v1");
        let first_digest = file_sha256(&first).unwrap();
        link_content_addressed(&first, &first_digest, &canonical).unwrap();

        let second = temp.path().join("other/go");
        fs::create_dir_all(second.parent().unwrap()).unwrap();
        fs::write(&second, b"v2").unwrap();
        let second_digest = file_sha256(&second).unwrap();
        link_content_addressed(&second, &second_digest, &canonical).unwrap();

        assert_eq!(
            inspect(&canonical).unwrap(),
            LinkState::Installed { digest: second_digest }
        );
        assert_eq!(fs::read(&canonical).unwrap(), b"v2");
    }

    #[test]
    fn test_remove_stale_tolerates_missing_entries() {
        let temp = TempDir::new().unwrap();
        let canonical = temp.path().join("links/bin/go");
        remove_stale(&canonical, Some("sha256:00")).unwrap();
    }

    #[test]
    fn test_remove_entry_directory_is_invariant_error() {
        let temp = TempDir::new().unwrap();
        let canonical = temp.path().join("bin/go");
        fs::create_dir_all(&canonical).unwrap();

        let err = remove_stale(&canonical, None).unwrap_err();
        assert!(matches!(err, Error::Invariant { .. }));
    }

    #[test]
    fn test_link_over_directory_is_invariant_error() {
        let temp = TempDir::new().unwrap();
        let file = scratch_file(temp.path(), b"go binary");
        let digest = file_sha256(&file).unwrap();
        let canonical = temp.path().join("links/bin/go");
        fs::create_dir_all(canonical.join("occupied")).unwrap();

        let err = link_content_addressed(&file, &digest, &canonical).unwrap_err();
        assert!(matches!(err, Error::Invariant { .. }));
    }

    #[test]
    fn test_link_destination() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("links/bin/go");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"go").unwrap();
        let dest = temp.path().join("platforms/linux-x86_64/bin/go");

        link_destination(&dest, &target).unwrap();
        link_destination(&dest, &target).unwrap();

        assert_eq!(
            fs::read_link(&dest).unwrap(),
            PathBuf::from("../../../links/bin/go")
        );
        assert_eq!(fs::read(&dest).unwrap(), b"go");
    }
}
