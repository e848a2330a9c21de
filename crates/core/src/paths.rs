//! Path management for the toolpin cache.
//!
//! The cache root follows OS conventions:
//!
//! | Platform | Cache Dir |
//! |----------|-----------|
//! | **macOS** | `~/Library/Caches/toolpin` |
//! | **Linux** | `~/.cache/toolpin` (XDG_CACHE_HOME) |
//!
//! `TOOLPIN_CACHE_DIR` overrides the default for testing and CI.
//!
//! Inside the root, [`Layout`] arranges:
//!
//! ```text
//! <root>/
//! ├── downloads/<platform>/<tool>-<version>/<scratch>/   acquisitions
//! ├── links/<platform>/<tool>-<version>/bin/go           canonical symlink
//! ├── links/<platform>/<tool>-<version>/bin/go:sha256:…  content-addressed symlink
//! ├── build/<toolchain>/                                 toolchain caches
//! └── platforms/<platform>/bin/go                        destination link
//! ```

use crate::tools::Platform;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "TOOLPIN_CACHE_DIR";

/// Get the cache directory for toolpin.
///
/// Resolution order:
/// 1. `TOOLPIN_CACHE_DIR` environment variable
/// 2. Platform cache directory + `/toolpin`
///
/// # Errors
///
/// Returns an error if the cache directory cannot be determined.
pub fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| Error::configuration("Could not determine cache directory"))?;

    Ok(base.join("toolpin"))
}

/// Directory layout of one cache root.
///
/// The root is shared by every tool and every concurrent `ensure` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the scratch acquisitions of one tool version.
    #[must_use]
    pub fn download_dir(&self, platform: &Platform, tool: &str, version: &str) -> PathBuf {
        self.root
            .join("downloads")
            .join(platform.to_string())
            .join(tool_dir_name(tool, version))
    }

    /// Directory holding the canonical and content-addressed links of one tool version.
    #[must_use]
    pub fn links_dir(&self, platform: &Platform, tool: &str, version: &str) -> PathBuf {
        self.root
            .join("links")
            .join(platform.to_string())
            .join(tool_dir_name(tool, version))
    }

    /// Work directory handed to a toolchain building packages (module caches etc.).
    #[must_use]
    pub fn build_dir(&self, toolchain: &str) -> PathBuf {
        self.root.join("build").join(toolchain)
    }

    /// Root of the destination links for a platform.
    #[must_use]
    pub fn platform_dir(&self, platform: &Platform) -> PathBuf {
        self.root.join("platforms").join(platform.to_string())
    }

    /// Stable path of an installed binary, e.g. `bin/go`.
    #[must_use]
    pub fn bin(&self, platform: &Platform, relative: impl AsRef<Path>) -> PathBuf {
        self.platform_dir(platform).join(relative)
    }
}

fn tool_dir_name(tool: &str, version: &str) -> String {
    format!("{tool}-{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_dir_default() {
        temp_env::with_var_unset(CACHE_DIR_ENV, || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert!(dir.ends_with("toolpin"), "Should end with toolpin: {:?}", dir);
        });
    }

    #[test]
    fn test_cache_dir_override() {
        let test_dir = "/tmp/toolpin-test-cache";
        temp_env::with_var(CACHE_DIR_ENV, Some(test_dir), || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert_eq!(dir, PathBuf::from(test_dir));
        });
    }

    #[test]
    fn test_cache_dir_empty_override_is_ignored() {
        temp_env::with_var(CACHE_DIR_ENV, Some(""), || {
            let dir = cache_dir().expect("cache_dir should succeed");
            assert!(dir.ends_with("toolpin"));
        });
    }

    #[test]
    fn test_layout_paths() {
        let layout = Layout::new("/cache");
        let platform = Platform::LINUX_AMD64;

        assert_eq!(
            layout.download_dir(&platform, "go", "1.24.2"),
            PathBuf::from("/cache/downloads/linux-x86_64/go-1.24.2")
        );
        assert_eq!(
            layout.links_dir(&platform, "go", "1.24.2"),
            PathBuf::from("/cache/links/linux-x86_64/go-1.24.2")
        );
        assert_eq!(
            layout.bin(&platform, "bin/go"),
            PathBuf::from("/cache/platforms/linux-x86_64/bin/go")
        );
        assert_eq!(layout.build_dir("go"), PathBuf::from("/cache/build/go"));
    }

    #[test]
    fn test_layout_separates_docker_platform() {
        let layout = Layout::new("/cache");
        assert_eq!(
            layout.links_dir(&Platform::DOCKER_AMD64, "libevmone", "0.12.0"),
            PathBuf::from("/cache/links/docker-linux-x86_64/libevmone-0.12.0")
        );
    }
}
