//! Core types for toolpin.
//!
//! toolpin guarantees that pinned versions of external binaries (compilers,
//! linters, shared libraries, tools built from source) are present on disk for
//! a target platform, verified against known digests and reachable through
//! stable paths that build steps invoke directly.
//!
//! The crate is organised around:
//!
//! - [`tools::ToolRegistry`] - the table of declared tools, built once at startup
//! - [`tools::Tool`] - how one tool is obtained (pre-built archive or package build)
//! - [`tools::Installer`] - the reinstall decision, acquisition and linking pipeline
//! - [`paths::Layout`] - where downloads, links and destination paths live

pub mod error;
pub mod paths;
pub mod tools;

pub use error::{Error, ErrorKind, Result};
