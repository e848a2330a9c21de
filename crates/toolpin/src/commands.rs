//! Command implementations.
//!
//! Commands write their results to the given writer (stdout in `main`) and
//! leave logging to tracing.

use miette::{IntoDiagnostic, Result};
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use toolpin_core::tools::{Catalog, Installer, Platform, Tool, ToolRegistry};
use tracing::info;

/// Build the registry from the bundled catalogs plus `catalogs`.
pub fn create_registry(catalogs: &[PathBuf]) -> toolpin_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    toolpin_tools_go::register(&mut registry)?;
    toolpin_tools_zig::register(&mut registry)?;

    for path in catalogs {
        let catalog = Catalog::load(path)?;
        info!(catalog = %path.display(), tools = catalog.tools.len(), "Loaded catalog");
        registry.add(catalog.tools)?;
    }
    Ok(registry)
}

/// `toolpin ensure`
pub async fn ensure(
    installer: &Installer,
    cancel: &CancellationToken,
    tools: &[String],
    platform: &Platform,
    out: &mut impl Write,
) -> Result<()> {
    for name in tools {
        installer.ensure(cancel, name, platform).await?;
        print_paths(installer, name, platform, out)?;
    }
    Ok(())
}

/// `toolpin install-all`
pub async fn install_all(
    installer: &Installer,
    cancel: &CancellationToken,
    platform: &Platform,
    out: &mut impl Write,
) -> Result<()> {
    let ensured = installer.ensure_all(cancel, platform).await?;
    for name in &ensured {
        writeln!(out, "{name}").into_diagnostic()?;
    }
    info!(count = ensured.len(), %platform, "Installed tools");
    Ok(())
}

/// `toolpin verify`
pub async fn verify(
    installer: &Installer,
    cancel: &CancellationToken,
    tools: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let failures = if tools.is_empty() {
        installer.verify_all(cancel).await?
    } else {
        let mut failures = Vec::new();
        for name in tools {
            failures.extend(installer.verify(cancel, name).await?);
        }
        failures
    };

    for failure in &failures {
        writeln!(out, "FAIL {} {}: {}", failure.tool, failure.platform, failure.error)
            .into_diagnostic()?;
    }
    if !failures.is_empty() {
        return Err(miette::miette!(
            "{} source(s) failed verification",
            failures.len()
        ));
    }
    writeln!(out, "ok").into_diagnostic()?;
    Ok(())
}

/// `toolpin list`
pub fn list(registry: &ToolRegistry, platform: Option<&Platform>, out: &mut impl Write) -> Result<()> {
    for tool in registry.iter() {
        if let Some(platform) = platform
            && !tool.is_compatible(registry, platform)?
        {
            continue;
        }
        let availability = match tool {
            Tool::Binary(t) => t
                .sources
                .keys()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            Tool::Package(t) => format!("via {}", t.toolchain),
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            tool.name(),
            tool.version(),
            tool.kind(),
            availability
        )
        .into_diagnostic()?;
    }
    Ok(())
}

/// `toolpin which`
pub fn which(installer: &Installer, name: &str, platform: &Platform, out: &mut impl Write) -> Result<()> {
    let tool = installer.registry().get(name)?;
    for dest in tool.destinations(platform)? {
        let path = installer.bin(platform, &dest);
        if !path.exists() {
            return Err(miette::miette!(
                help = format!("Run `toolpin ensure {name} --platform {platform}` first"),
                "{name} is not installed at {}",
                path.display()
            ));
        }
    }
    print_paths(installer, name, platform, out)
}

fn print_paths(installer: &Installer, name: &str, platform: &Platform, out: &mut impl Write) -> Result<()> {
    let tool = installer.registry().get(name)?;
    for dest in tool.destinations(platform)? {
        writeln!(out, "{}", installer.bin(platform, &dest).display()).into_diagnostic()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use toolpin_core::tools::InstallerOptions;
    use toolpin_tools_url::HttpArchiveFetcher;

    fn installer(cache: &std::path::Path) -> Installer {
        Installer::new(
            Arc::new(create_registry(&[]).unwrap()),
            Arc::new(HttpArchiveFetcher::new().unwrap()),
            &InstallerOptions::new().with_cache_dir(cache),
        )
        .unwrap()
    }

    #[test]
    fn test_create_registry_has_bundled_tools() {
        let registry = create_registry(&[]).unwrap();
        assert_eq!(
            registry.names(),
            vec!["go", "goimports", "golangci", "libevmone", "zig"]
        );
    }

    #[test]
    fn test_create_registry_with_catalog() {
        let temp = tempfile::TempDir::new().unwrap();
        let catalog = temp.path().join("tools.toml");
        std::fs::write(
            &catalog,
            r#"
[[tools]]
kind = "package"
name = "gotestsum"
version = "v1.12.0"
package = "gotest.tools/gotestsum"
toolchain = "go"
"#,
        )
        .unwrap();

        let registry = create_registry(&[catalog]).unwrap();
        assert!(registry.get("gotestsum").is_ok());
    }

    #[test]
    fn test_create_registry_rejects_duplicate_from_catalog() {
        let temp = tempfile::TempDir::new().unwrap();
        let catalog = temp.path().join("tools.toml");
        std::fs::write(
            &catalog,
            r#"
[[tools]]
kind = "package"
name = "go"
version = "v1"
package = "example.com/go"
toolchain = "zig"
"#,
        )
        .unwrap();

        assert!(matches!(
            create_registry(&[catalog]),
            Err(toolpin_core::Error::DuplicateTool { .. })
        ));
    }

    #[test]
    fn test_list_filters_by_platform() {
        let registry = create_registry(&[]).unwrap();
        let mut out = Vec::new();
        list(&registry, Some(&Platform::DOCKER_AMD64), &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("libevmone\t0.12.0\tbinary\tdocker-linux-x86_64"));
    }

    #[test]
    fn test_list_shows_package_toolchain() {
        let registry = create_registry(&[]).unwrap();
        let mut out = Vec::new();
        list(&registry, None, &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("goimports\tv0.31.0\tpackage\tvia go"));
        assert_eq!(out.lines().count(), 5);
    }

    #[test]
    fn test_which_not_installed() {
        let temp = tempfile::TempDir::new().unwrap();
        let installer = installer(temp.path());
        let mut out = Vec::new();

        let err = which(&installer, "zig", &Platform::LINUX_AMD64, &mut out).unwrap_err();
        assert!(err.to_string().contains("not installed"));
        assert!(out.is_empty());
    }
}
