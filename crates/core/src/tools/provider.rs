//! Acquisition collaborators.
//!
//! The installation pipeline does not download or compile anything itself.
//! It drives an [`ArchiveFetcher`] for binary tools and a [`PackageBuilder`]
//! per toolchain for package tools.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::platform::Platform;
use crate::Result;

/// Downloads hash-pinned archives and unpacks them.
///
/// # Example
///
/// ```ignore
/// pub struct HttpArchiveFetcher { /* ... */ }
///
/// #[async_trait]
/// impl ArchiveFetcher for HttpArchiveFetcher {
///     async fn download_and_extract(&self, url: &str, hash: &str, dest: &Path) -> Result<()> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url`, check it against `expected_hash` and extract it into `dest`.
    ///
    /// Nothing may be extracted when the digest does not match.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DigestMismatch`] on a digest mismatch and a
    /// download or extraction error otherwise.
    async fn download_and_extract(&self, url: &str, expected_hash: &str, dest: &Path) -> Result<()>;
}

/// Parameters of one package build.
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Path of the already installed toolchain binary.
    pub toolchain_binary: &'a Path,
    /// Package coordinate.
    pub package: &'a str,
    /// Exact version.
    pub version: &'a str,
    /// Name of the binary the build must produce.
    pub binary_name: &'a str,
    /// Scratch directory receiving the produced binary.
    pub output_dir: &'a Path,
    /// Persistent work directory for toolchain caches.
    pub work_dir: &'a Path,
    /// Target platform.
    pub platform: &'a Platform,
}

/// Builds packages with a toolchain, e.g. `go install pkg@version`.
#[async_trait]
pub trait PackageBuilder: Send + Sync {
    /// Name of the registered toolchain tool this builder drives (e.g. "go").
    fn toolchain(&self) -> &str;

    /// Path of the toolchain binary relative to the platform directory (e.g. "bin/go").
    fn toolchain_binary(&self) -> &str;

    /// Build the package and return the path of the produced binary.
    ///
    /// # Errors
    ///
    /// Returns a build error if the toolchain exits unsuccessfully or the
    /// expected binary is missing.
    async fn build(&self, request: &BuildRequest<'_>) -> Result<PathBuf>;
}
