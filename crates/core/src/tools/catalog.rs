//! Tool declarations loaded from TOML.
//!
//! ```toml
//! [[tools]]
//! kind = "binary"
//! name = "jq"
//! version = "1.7.1"
//!
//! [tools.sources.linux-x86_64]
//! url = "https://github.com/jqlang/jq/releases/download/jq-1.7.1/jq-linux-amd64"
//! hash = "sha256:5942c9b0934e510ee61eb3e30273f1b3fe2590df93933a93d7c58b81d19c8ff5"
//! links = { "bin/jq" = "jq-linux-amd64" }
//!
//! [[tools]]
//! kind = "package"
//! name = "goimports"
//! version = "v0.31.0"
//! package = "golang.org/x/tools/cmd/goimports"
//! toolchain = "go"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::tool::Tool;
use crate::{Error, Result};

/// A set of tool declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Declared tools, in file order.
    #[serde(default)]
    pub tools: Vec<Tool>,
}

impl Catalog {
    /// Parse a catalog from TOML text. `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`] if the text is not a valid catalog.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Catalog {
            path: origin.into(),
            message: e.to_string(),
        })
    }

    /// Load a catalog file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read catalog"))?;
        Self::from_toml_str(&text, path)
    }
}
