//! Tool registry and installation pipeline.
//!
//! # Architecture
//!
//! - [`Platform`], [`Os`], [`Arch`], [`Environment`] - closed set of install targets
//! - [`Tool`] - a pinned binary, either [`BinaryTool`] or [`PackageTool`]
//! - [`ToolRegistry`] - tools by name, populated once and shared read-only
//! - [`Catalog`] - tool declarations loaded from TOML
//! - [`ArchiveFetcher`], [`PackageBuilder`] - acquisition collaborators
//! - [`Installer`] - decides, acquires, verifies and links
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use toolpin_core::tools::{Installer, InstallerOptions, Platform, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.add(toolpin_tools_go::tools())?;
//!
//! let installer = Installer::new(
//!     Arc::new(registry),
//!     Arc::new(HttpArchiveFetcher::new()),
//!     &InstallerOptions::default(),
//! )?;
//! installer.ensure(&cancel, "go", &Platform::local()).await?;
//! let go = installer.bin(&Platform::local(), "bin/go");
//! ```

mod catalog;
pub mod checksum;
mod install;
pub mod links;
mod platform;
mod provider;
mod registry;
mod tool;

pub use catalog::Catalog;
pub use install::{Installer, InstallerOptions, VerificationFailure};
pub use platform::{Arch, Environment, Os, Platform};
pub use provider::{ArchiveFetcher, BuildRequest, PackageBuilder};
pub use registry::ToolRegistry;
pub use tool::{BinaryTool, PackageTool, Source, Sources, Tool};
