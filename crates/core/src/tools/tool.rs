//! Tool descriptors.
//!
//! A [`Tool`] says how to obtain one pinned binary: either a pre-built archive
//! per platform ([`BinaryTool`]) or a package built on demand by another,
//! already registered toolchain ([`PackageTool`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};

use super::platform::Platform;
use super::registry::ToolRegistry;
use crate::{Error, Result};

/// Where a pre-built archive for one platform comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Archive URL.
    pub url: String,
    /// Algorithm-prefixed digest of the archive, e.g. `sha256:…`.
    pub hash: String,
    /// Destination path (e.g. `bin/go`) to path inside the extracted archive.
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

impl Source {
    /// Create a source without links.
    #[must_use]
    pub fn new(url: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hash: hash.into(),
            links: BTreeMap::new(),
        }
    }

    /// Add a link from `dest` to `src` inside the archive.
    #[must_use]
    pub fn with_link(mut self, dest: impl Into<String>, src: impl Into<String>) -> Self {
        self.links.insert(dest.into(), src.into());
        self
    }

    /// Check that every link stays inside its directory.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an absolute path, or one with `..`
    /// or `.` components, on either side of a link.
    pub fn validate(&self, tool: &str) -> Result<()> {
        for (dest, src) in &self.links {
            for path in [dest, src] {
                if !is_plain_relative(path) {
                    return Err(Error::configuration(format!(
                        "Tool '{tool}' links '{dest}' = '{src}': '{path}' must be a relative path of plain names"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Whether `path` is non-empty, relative and made only of plain names.
fn is_plain_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Sources of a binary tool, one per supported platform.
pub type Sources = BTreeMap<Platform, Source>;

/// A tool distributed as pre-built, hash-pinned archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryTool {
    /// Registry name.
    pub name: String,
    /// Exact pinned version.
    pub version: String,
    /// Archive per supported platform.
    pub sources: Sources,
}

impl BinaryTool {
    /// Create a binary tool without sources.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            sources: Sources::new(),
        }
    }

    /// Declare the source for a platform.
    #[must_use]
    pub fn with_source(mut self, platform: Platform, source: Source) -> Self {
        self.sources.insert(platform, source);
        self
    }

    /// The source declared for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatiblePlatform`] if there is none.
    pub fn source(&self, platform: &Platform) -> Result<&Source> {
        self.sources
            .get(platform)
            .ok_or_else(|| Error::incompatible_platform(&self.name, platform))
    }
}

/// A tool built on demand from a package coordinate by a toolchain tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageTool {
    /// Registry name.
    pub name: String,
    /// Exact version passed to the builder, e.g. `v0.31.0`.
    pub version: String,
    /// Package coordinate, e.g. `golang.org/x/tools/cmd/goimports`.
    pub package: String,
    /// Name of the registered tool whose builder performs the install.
    pub toolchain: String,
}

impl PackageTool {
    /// Create a package tool.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        package: impl Into<String>,
        toolchain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            package: package.into(),
            toolchain: toolchain.into(),
        }
    }

    /// Name of the produced binary: the last package path element,
    /// skipping a trailing major-version suffix such as `/v2`.
    #[must_use]
    pub fn binary_name(&self) -> &str {
        let mut elements = self.package.trim_end_matches('/').rsplit('/');
        let last = elements.next().unwrap_or(&self.package);
        if is_major_version(last) {
            elements.next().unwrap_or(last)
        } else {
            last
        }
    }

    /// Check that the produced binary name is a plain file name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error otherwise.
    pub fn validate(&self) -> Result<()> {
        let binary = self.binary_name();
        if !is_plain_relative(binary) {
            return Err(Error::configuration(format!(
                "Tool '{}' package '{}' does not name a binary",
                self.name, self.package
            )));
        }
        Ok(())
    }

    /// Destination path of the produced binary, e.g. `bin/goimports`.
    #[must_use]
    pub fn destination(&self) -> String {
        Path::new("bin")
            .join(self.binary_name())
            .to_string_lossy()
            .into_owned()
    }
}

fn is_major_version(element: &str) -> bool {
    element
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// A registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Tool {
    /// Pre-built archive per platform.
    Binary(BinaryTool),
    /// Package compiled by a toolchain.
    Package(PackageTool),
}

impl Tool {
    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Binary(t) => &t.name,
            Self::Package(t) => &t.name,
        }
    }

    /// Pinned version.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Binary(t) => &t.version,
            Self::Package(t) => &t.version,
        }
    }

    /// Short label of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Binary(_) => "binary",
            Self::Package(_) => "package",
        }
    }

    /// Whether the tool can be installed for `platform`.
    ///
    /// A package tool supports exactly the platforms of its toolchain.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a package tool's toolchain chain has
    /// an unregistered tool or a cycle.
    pub fn is_compatible(&self, registry: &ToolRegistry, platform: &Platform) -> Result<bool> {
        match self {
            Self::Binary(t) => Ok(t.sources.contains_key(platform)),
            Self::Package(t) => registry.toolchain_of(t)?.is_compatible(registry, platform),
        }
    }

    /// Check every path the tool declares, for all platforms.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a link or package that would resolve
    /// outside its directory.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Binary(t) => t
                .sources
                .values()
                .try_for_each(|source| source.validate(&t.name)),
            Self::Package(t) => t.validate(),
        }
    }

    /// Destination paths this tool materializes for `platform`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatiblePlatform`] for a binary tool without a
    /// source, and a configuration error for paths that fail [`Self::validate`].
    pub fn destinations(&self, platform: &Platform) -> Result<Vec<String>> {
        match self {
            Self::Binary(t) => {
                let source = t.source(platform)?;
                source.validate(&t.name)?;
                Ok(source.links.keys().cloned().collect())
            }
            Self::Package(t) => {
                t.validate()?;
                Ok(vec![t.destination()])
            }
        }
    }
}

impl From<BinaryTool> for Tool {
    fn from(tool: BinaryTool) -> Self {
        Self::Binary(tool)
    }
}

impl From<PackageTool> for Tool {
    fn from(tool: PackageTool) -> Self {
        Self::Package(tool)
    }
}
