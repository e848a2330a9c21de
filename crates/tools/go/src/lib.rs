//! Go tools for toolpin.
//!
//! Provides the pinned Go toolchain and related binaries ([`tools`]) and the
//! [`GoBuilder`] that installs package tools with `go install pkg@version`.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;
use toolpin_core::tools::{
    BinaryTool, BuildRequest, PackageBuilder, PackageTool, Platform, Source, Tool, ToolRegistry,
};
use toolpin_core::{Error, Result};
use tracing::{debug, info};

/// Go toolchain.
pub const GO: &str = "go";
/// golangci-lint.
pub const GOLANGCI: &str = "golangci";
/// evmone shared library, shipped into docker images.
pub const LIBEVMONE: &str = "libevmone";
/// goimports, built from source.
pub const GOIMPORTS: &str = "goimports";

const GOLANGCI_VERSION: &str = "2.0.2";

/// Path of the go binary inside a platform directory.
pub const GO_BINARY: &str = "bin/go";

fn go_source(url: &str, hash: &str) -> Source {
    Source::new(url, hash)
        .with_link("bin/go", "go/bin/go")
        .with_link("bin/gofmt", "go/bin/gofmt")
}

fn golangci_source(target: &str, hash: &str) -> Source {
    let dir = format!("golangci-lint-{GOLANGCI_VERSION}-{target}");
    Source::new(
        format!(
            "https://github.com/golangci/golangci-lint/releases/download/v{GOLANGCI_VERSION}/{dir}.tar.gz"
        ),
        hash,
    )
    .with_link("bin/golangci-lint", format!("{dir}/golangci-lint"))
}

/// The Go tool catalog.
#[must_use]
pub fn tools() -> Vec<Tool> {
    vec![
        // https://go.dev/dl/
        BinaryTool::new(GO, "1.24.2")
            .with_source(
                Platform::LINUX_AMD64,
                go_source(
                    "https://go.dev/dl/go1.24.2.linux-amd64.tar.gz",
                    "sha256:68097bd680839cbc9d464a0edce4f7c333975e27a90246890e9f1078c7e702ad",
                ),
            )
            .with_source(
                Platform::DARWIN_AMD64,
                go_source(
                    "https://go.dev/dl/go1.24.2.darwin-amd64.tar.gz",
                    "sha256:238d9c065d09ff6af229d2e3b8b5e85e688318d69f4006fb85a96e41c216ea83",
                ),
            )
            .with_source(
                Platform::DARWIN_ARM64,
                go_source(
                    "https://go.dev/dl/go1.24.2.darwin-arm64.tar.gz",
                    "sha256:b70f8b3c5b4ccb0ad4ffa5ee91cd38075df20fdbd953a1daedd47f50fbcff47a",
                ),
            )
            .into(),
        // https://github.com/golangci/golangci-lint/releases/
        BinaryTool::new(GOLANGCI, GOLANGCI_VERSION)
            .with_source(
                Platform::LINUX_AMD64,
                golangci_source(
                    "linux-amd64",
                    "sha256:89cc8a7810dc63b9a37900da03e37c3601caf46d42265d774e0f1a5d883d53e2",
                ),
            )
            .with_source(
                Platform::DARWIN_AMD64,
                golangci_source(
                    "darwin-amd64",
                    "sha256:a88cbdc86b483fe44e90bf2dcc3fec2af8c754116e6edf0aa6592cac5baa7a0e",
                ),
            )
            .with_source(
                Platform::DARWIN_ARM64,
                golangci_source(
                    "darwin-arm64",
                    "sha256:664550e7954f5f4451aae99b4f7382c1a47039c66f39ca605f5d9af1a0d32b49",
                ),
            )
            .into(),
        // https://github.com/ethereum/evmone/releases
        BinaryTool::new(LIBEVMONE, "0.12.0")
            .with_source(
                Platform::DOCKER_AMD64,
                Source::new(
                    "https://github.com/ethereum/evmone/releases/download/v0.12.0/evmone-0.12.0-linux-x86_64.tar.gz",
                    "sha256:1c7b5eba0c8c3b3b2a7a05101e2d01a13a2f84b323989a29be66285dba4136ce",
                )
                .with_link("lib/libevmone.so", "lib/libevmone.so"),
            )
            .into(),
        PackageTool::new(GOIMPORTS, "v0.31.0", "golang.org/x/tools/cmd/goimports", GO).into(),
    ]
}

/// Register the Go catalog.
///
/// # Errors
///
/// Returns an error if any of the names is already registered.
pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.add(tools())
}

/// Installs Go packages with `go install`.
///
/// Builds are isolated from the user's Go environment: module and build
/// caches live in the toolchain's work directory, toolchain switching is
/// disabled and cgo is off so the produced binaries are static.
#[derive(Debug, Clone, Default)]
pub struct GoBuilder;

impl GoBuilder {
    /// Create a builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Environment overrides for one `go install` run.
    #[must_use]
    pub fn build_env(request: &BuildRequest<'_>) -> Vec<(&'static str, OsString)> {
        let mut path = Vec::new();
        if let Some(dir) = request.toolchain_binary.parent() {
            path.push(dir.to_path_buf());
        }
        if let Some(current) = std::env::var_os("PATH") {
            path.extend(std::env::split_paths(&current));
        }
        let path = std::env::join_paths(path).unwrap_or_default();

        vec![
            ("GOBIN", request.output_dir.as_os_str().to_owned()),
            ("GOPATH", request.work_dir.join("gopath").into_os_string()),
            ("GOCACHE", request.work_dir.join("cache").into_os_string()),
            ("GOTOOLCHAIN", OsString::from("local")),
            ("CGO_ENABLED", OsString::from("0")),
            ("PATH", path),
        ]
    }

    fn output_path(request: &BuildRequest<'_>) -> PathBuf {
        request.output_dir.join(request.binary_name)
    }
}

#[async_trait]
impl PackageBuilder for GoBuilder {
    fn toolchain(&self) -> &str {
        GO
    }

    fn toolchain_binary(&self) -> &str {
        GO_BINARY
    }

    async fn build(&self, request: &BuildRequest<'_>) -> Result<PathBuf> {
        let target = format!("{}@{}", request.package, request.version);
        info!(package = %target, platform = %request.platform, "Running go install");

        let output = Command::new(request.toolchain_binary)
            .arg("install")
            .arg(&target)
            .envs(Self::build_env(request))
            .current_dir(request.work_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::build(&target, format!("Failed to run go: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::build(
                &target,
                format!("go install failed ({}): {}", output.status, stderr.trim()),
            ));
        }

        let binary = Self::output_path(request);
        debug!(binary = %binary.display(), "go install finished");
        Ok(binary)
    }
}
