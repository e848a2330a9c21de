//! Installation pipeline.
//!
//! [`Installer::ensure`] guarantees that a registered tool is installed for a
//! platform and reachable under `platforms/<platform>/`:
//!
//! 1. look the tool up and check platform compatibility (no I/O yet),
//! 2. inspect the canonical links and decide whether to reinstall,
//! 3. acquire the tool (download or build) into a fresh scratch directory,
//! 4. link every produced file under its content-addressed name,
//! 5. (re)create the destination links.
//!
//! Concurrent calls for the same tool are safe: every acquisition gets its own
//! scratch directory and links are swapped in by atomic rename.

use async_recursion::async_recursion;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::checksum::file_sha256;
use super::links::{self, LinkState};
use super::platform::Platform;
use super::provider::{ArchiveFetcher, BuildRequest, PackageBuilder};
use super::registry::ToolRegistry;
use super::tool::{BinaryTool, PackageTool, Source, Tool};
use crate::paths::{self, Layout};
use crate::{Error, Result};

/// Options for constructing an [`Installer`].
#[derive(Debug, Clone, Default)]
pub struct InstallerOptions {
    /// Custom cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl InstallerOptions {
    /// Create options using the default cache directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// The cache directory, defaulting to [`paths::cache_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if no default cache directory can be determined.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::cache_dir(),
        }
    }
}

/// One failed integrity check reported by [`Installer::verify`].
#[derive(Debug)]
pub struct VerificationFailure {
    /// Tool whose source failed.
    pub tool: String,
    /// Platform of the failing source.
    pub platform: Platform,
    /// What went wrong.
    pub error: Error,
}

/// Installs registered tools into a cache root.
pub struct Installer {
    registry: Arc<ToolRegistry>,
    layout: Layout,
    fetcher: Arc<dyn ArchiveFetcher>,
    builders: HashMap<String, Arc<dyn PackageBuilder>>,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("tools", &self.registry.len())
            .field("layout", &self.layout)
            .field("builders", &self.builders.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Create an installer over `registry`.
    ///
    /// The cache root is made absolute so relative link targets stay valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined.
    pub fn new(
        registry: Arc<ToolRegistry>,
        fetcher: Arc<dyn ArchiveFetcher>,
        options: &InstallerOptions,
    ) -> Result<Self> {
        let root = options.cache_dir()?;
        let root = std::path::absolute(&root).map_err(|e| Error::io(e, &root, "absolute"))?;
        Ok(Self {
            registry,
            layout: Layout::new(root),
            fetcher,
            builders: HashMap::new(),
        })
    }

    /// Register the builder for package tools of its toolchain.
    #[must_use]
    pub fn with_builder(mut self, builder: Arc<dyn PackageBuilder>) -> Self {
        self.builders.insert(builder.toolchain().to_string(), builder);
        self
    }

    /// The registry this installer serves.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The cache layout.
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Stable path of an installed binary, e.g. `bin(&platform, "bin/go")`.
    #[must_use]
    pub fn bin(&self, platform: &Platform, relative: impl AsRef<Path>) -> PathBuf {
        self.layout.bin(platform, relative)
    }

    /// Ensure the tool `name` is installed for `platform`.
    ///
    /// A package tool's toolchain is ensured first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTool`] or [`Error::IncompatiblePlatform`]
    /// before touching the filesystem, and acquisition, integrity or
    /// filesystem errors afterwards.
    #[async_recursion]
    pub async fn ensure(
        &self,
        cancel: &CancellationToken,
        name: &str,
        platform: &Platform,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!("ensure {name}")));
        }

        let tool = self.registry.get(name)?;
        if !tool.is_compatible(&self.registry, platform)? {
            return Err(Error::incompatible_platform(name, platform));
        }

        let links_dir = self.layout.links_dir(platform, tool.name(), tool.version());
        let destinations = tool.destinations(platform)?;

        if Self::needs_install(&links_dir, &destinations)? {
            info!(
                tool = name,
                version = tool.version(),
                %platform,
                "Installing tool"
            );
            match tool {
                Tool::Binary(t) => self.acquire_binary(cancel, t, platform, &links_dir).await?,
                Tool::Package(t) => self.acquire_package(cancel, t, platform, &links_dir).await?,
            }
        } else {
            debug!(tool = name, %platform, "Tool already installed");
        }

        self.materialize(platform, &links_dir, &destinations)
    }

    /// Ensure every tool compatible with `platform`, in name order.
    ///
    /// Returns the names of the tools that were ensured.
    ///
    /// # Errors
    ///
    /// Stops at the first tool that fails.
    pub async fn ensure_all(
        &self,
        cancel: &CancellationToken,
        platform: &Platform,
    ) -> Result<Vec<String>> {
        let mut ensured = Vec::new();
        for tool in self.registry.iter() {
            if !tool.is_compatible(&self.registry, platform)? {
                debug!(tool = tool.name(), %platform, "Skipping incompatible tool");
                continue;
            }
            self.ensure(cancel, tool.name(), platform).await?;
            ensured.push(tool.name().to_string());
        }
        Ok(ensured)
    }

    /// Download every declared source of `name` and check its digest.
    ///
    /// Failures are collected rather than returned. Package tools declare no
    /// digest and always verify clean.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown tool, on cancellation, or if no
    /// temporary directory can be created.
    pub async fn verify(
        &self,
        cancel: &CancellationToken,
        name: &str,
    ) -> Result<Vec<VerificationFailure>> {
        let Tool::Binary(tool) = self.registry.get(name)? else {
            return Ok(Vec::new());
        };

        let mut failures = Vec::new();
        for (platform, source) in &tool.sources {
            let scratch = tempfile::Builder::new()
                .prefix("toolpin-verify-")
                .tempdir()
                .map_err(|e| Error::io(e, std::env::temp_dir(), "create temp dir"))?;

            let fetch = self
                .fetcher
                .download_and_extract(&source.url, &source.hash, scratch.path());
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Error::cancelled(format!("verify {name}"))),
                result = fetch => result,
            };

            match result {
                Ok(()) => debug!(tool = name, %platform, "Source verified"),
                Err(error) => {
                    warn!(tool = name, %platform, %error, "Source failed verification");
                    failures.push(VerificationFailure {
                        tool: name.to_string(),
                        platform: *platform,
                        error,
                    });
                }
            }
        }
        Ok(failures)
    }

    /// Run [`Installer::verify`] over every registered tool.
    ///
    /// # Errors
    ///
    /// See [`Installer::verify`].
    pub async fn verify_all(&self, cancel: &CancellationToken) -> Result<Vec<VerificationFailure>> {
        let mut failures = Vec::new();
        for name in self.registry.names() {
            failures.extend(self.verify(cancel, name).await?);
        }
        Ok(failures)
    }

    /// Whether any canonical link of the tool is missing or invalid.
    ///
    /// Corrupt entries are removed so the next link starts clean.
    fn needs_install(links_dir: &Path, destinations: &[String]) -> Result<bool> {
        for dest in destinations {
            let canonical = links_dir.join(dest);
            match links::inspect(&canonical)? {
                LinkState::Installed { .. } => {}
                LinkState::Missing => {
                    debug!(?canonical, "Not installed");
                    return Ok(true);
                }
                LinkState::Broken { reason } => {
                    debug!(?canonical, %reason, "Invalid install");
                    return Ok(true);
                }
                LinkState::NotExecutable => {
                    debug!(?canonical, "Installed file is not executable");
                    return Ok(true);
                }
                LinkState::Corrupt { expected, actual } => {
                    warn!(?canonical, %expected, %actual, "Installed file is corrupt, removing");
                    links::remove_stale(&canonical, Some(&expected))?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn acquire_binary(
        &self,
        cancel: &CancellationToken,
        tool: &BinaryTool,
        platform: &Platform,
        links_dir: &Path,
    ) -> Result<()> {
        let source = tool.source(platform)?;
        let scratch = self.scratch_dir(platform, &tool.name, &tool.version)?;

        let fetch = self
            .fetcher
            .download_and_extract(&source.url, &source.hash, &scratch);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled(format!("download {}", source.url))),
            result = fetch => result,
        };
        if let Err(e) = result {
            discard_scratch(&scratch);
            return Err(e);
        }

        // Nothing is linked until every entry is present and hashed.
        let files = match Self::collect_links(source, &scratch) {
            Ok(files) => files,
            Err(e) => {
                discard_scratch(&scratch);
                return Err(e);
            }
        };
        for (dest, file, digest) in files {
            links::link_content_addressed(&file, &digest, &links_dir.join(dest))?;
            info!(tool = %tool.name, %dest, %digest, "Linked");
        }
        Ok(())
    }

    fn collect_links<'a>(
        source: &'a Source,
        scratch: &Path,
    ) -> Result<Vec<(&'a str, PathBuf, String)>> {
        let mut files = Vec::with_capacity(source.links.len());
        for (dest, src) in &source.links {
            let file = scratch.join(src);
            if !file.is_file() {
                return Err(Error::extraction(
                    &source.url,
                    format!("archive does not contain '{src}'"),
                ));
            }
            let digest = file_sha256(&file)?;
            files.push((dest.as_str(), file, digest));
        }
        Ok(files)
    }

    async fn acquire_package(
        &self,
        cancel: &CancellationToken,
        tool: &PackageTool,
        platform: &Platform,
        links_dir: &Path,
    ) -> Result<()> {
        let builder = self.builders.get(&tool.toolchain).ok_or_else(|| {
            Error::configuration(format!(
                "No builder registered for toolchain '{}'",
                tool.toolchain
            ))
        })?;

        self.ensure(cancel, &tool.toolchain, platform).await?;
        let toolchain_binary = self.layout.bin(platform, builder.toolchain_binary());

        let scratch = self.scratch_dir(platform, &tool.name, &tool.version)?;
        let work_dir = self.layout.build_dir(&tool.toolchain);
        fs::create_dir_all(&work_dir).map_err(|e| Error::io(e, &work_dir, "create_dir_all"))?;

        let request = BuildRequest {
            toolchain_binary: &toolchain_binary,
            package: &tool.package,
            version: &tool.version,
            binary_name: tool.binary_name(),
            output_dir: &scratch,
            work_dir: &work_dir,
            platform,
        };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::cancelled(format!("build {}", tool.package))),
            result = builder.build(&request) => result,
        };
        let built = match result {
            Ok(path) => path,
            Err(e) => {
                discard_scratch(&scratch);
                return Err(e);
            }
        };

        if !built.is_file() {
            discard_scratch(&scratch);
            return Err(Error::build(
                &tool.package,
                format!("expected binary {} was not produced", built.display()),
            ));
        }

        let digest = file_sha256(&built)?;
        let dest = tool.destination();
        links::link_content_addressed(&built, &digest, &links_dir.join(&dest))?;
        info!(tool = %tool.name, %dest, %digest, "Linked");
        Ok(())
    }

    fn materialize(&self, platform: &Platform, links_dir: &Path, destinations: &[String]) -> Result<()> {
        for dest in destinations {
            let link = self.layout.bin(platform, dest);
            links::link_destination(&link, &links_dir.join(dest))?;
            debug!(?link, "Materialized");
        }
        Ok(())
    }

    fn scratch_dir(&self, platform: &Platform, tool: &str, version: &str) -> Result<PathBuf> {
        let dir = self
            .layout
            .download_dir(platform, tool, version)
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).map_err(|e| Error::io(e, &dir, "create_dir_all"))?;
        Ok(dir)
    }
}

/// Best-effort removal of a scratch directory whose acquisition failed.
fn discard_scratch(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        debug!(?dir, error = %e, "Could not remove scratch directory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CACHE_DIR_ENV;

    #[test]
    fn test_options_cache_dir_override() {
        let options = InstallerOptions::new().with_cache_dir("/tmp/toolpin-test");
        assert_eq!(options.cache_dir().unwrap(), PathBuf::from("/tmp/toolpin-test"));
    }

    #[test]
    fn test_options_cache_dir_from_env() {
        temp_env::with_var(CACHE_DIR_ENV, Some("/tmp/toolpin-env"), || {
            let options = InstallerOptions::new();
            assert_eq!(options.cache_dir().unwrap(), PathBuf::from("/tmp/toolpin-env"));
        });
    }
}
