//! Tool registry.
//!
//! The registry maps tool names to their declarations. It is populated once
//! during startup and shared read-only (usually behind an `Arc`) afterwards.

use std::collections::BTreeMap;

use super::tool::{PackageTool, Tool};
use crate::{Error, Result};

/// Registry of declared tools.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    /// Tools indexed by name.
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register tools.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTool`] if a name is already registered, or a
    /// configuration error if a tool declares paths outside its directories.
    /// Tools preceding the failing one in `tools` stay registered.
    pub fn add(&mut self, tools: impl IntoIterator<Item = Tool>) -> Result<()> {
        for tool in tools {
            tool.validate()?;
            let name = tool.name().to_string();
            if self.tools.contains_key(&name) {
                return Err(Error::DuplicateTool { name });
            }
            self.tools.insert(name, tool);
        }
        Ok(())
    }

    /// Get a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTool`] if no such tool is registered.
    pub fn get(&self, name: &str) -> Result<&Tool> {
        self.tools.get(name).ok_or_else(|| Error::unknown_tool(name))
    }

    /// Resolve the toolchain a package tool is built with.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if any toolchain along the chain is
    /// unregistered, or if the chain leads back to a tool already on it.
    pub fn toolchain_of(&self, tool: &PackageTool) -> Result<&Tool> {
        let mut chain = vec![tool.name.as_str()];
        let mut current = tool;
        loop {
            let cycle = chain.contains(&current.toolchain.as_str());
            chain.push(&current.toolchain);
            if cycle {
                return Err(Error::configuration(format!(
                    "Toolchain cycle: {}",
                    chain.join(" -> ")
                )));
            }
            match self.direct_toolchain(current)? {
                Tool::Package(package) => current = package,
                Tool::Binary(_) => break,
            }
        }
        self.direct_toolchain(tool)
    }

    fn direct_toolchain(&self, tool: &PackageTool) -> Result<&Tool> {
        self.tools.get(&tool.toolchain).ok_or_else(|| {
            Error::configuration(format!(
                "Toolchain '{}' required by '{}' is not registered",
                tool.toolchain, tool.name
            ))
        })
    }

    /// Iterate over all registered tools in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// Get the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}
