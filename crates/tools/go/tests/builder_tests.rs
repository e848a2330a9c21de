//! `go install` builder tests using a stand-in `go` script.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use toolpin_core::tools::checksum::{DigestAlgorithm, bytes_digest};
use toolpin_core::tools::{
    ArchiveFetcher, BinaryTool, BuildRequest, Installer, InstallerOptions, PackageBuilder,
    PackageTool, Platform, Source, ToolRegistry,
};
use toolpin_core::{Error, Result};
use toolpin_tools_go::{GO, GoBuilder};

/// Mimics `go install pkg@version` by writing `$GOBIN/<last path element>`.
const FAKE_GO: &str = r#"#!/bin/sh
set -e
[ "$1" = "install" ] || { echo "unexpected command $1" >&2; exit 2; }
[ "$GOTOOLCHAIN" = "local" ] || { echo "GOTOOLCHAIN not local" >&2; exit 3; }
pkg="${2%@*}"
name="${pkg##*/}"
mkdir -p "$GOBIN"
printf '%s\n' "$2" > "$GOBIN/$name"
"#;

const FAILING_GO: &str = "#!/bin/sh\necho 'module not found' >&2\nexit 1\n";

fn write_script(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

fn request<'a>(
    go: &'a Path,
    out: &'a Path,
    work: &'a Path,
    platform: &'a Platform,
) -> BuildRequest<'a> {
    BuildRequest {
        toolchain_binary: go,
        package: "golang.org/x/tools/cmd/goimports",
        version: "v0.31.0",
        binary_name: "goimports",
        output_dir: out,
        work_dir: work,
        platform,
    }
}

#[tokio::test]
async fn test_build_runs_go_install() {
    let temp = TempDir::new().unwrap();
    let go = temp.path().join("go/bin/go");
    write_script(&go, FAKE_GO);
    let out = temp.path().join("out");
    let work = temp.path().join("work");
    fs::create_dir_all(&out).unwrap();
    fs::create_dir_all(&work).unwrap();
    let platform = Platform::local();

    let binary = GoBuilder::new()
        .build(&request(&go, &out, &work, &platform))
        .await
        .unwrap();

    assert_eq!(binary, out.join("goimports"));
    assert_eq!(
        fs::read_to_string(binary).unwrap(),
        "golang.org/x/tools/cmd/goimports@v0.31.0\n"
    );
}

#[tokio::test]
async fn test_failed_build_reports_stderr() {
    let temp = TempDir::new().unwrap();
    let go = temp.path().join("go/bin/go");
    write_script(&go, FAILING_GO);
    let out = temp.path().join("out");
    let work = temp.path().join("work");
    fs::create_dir_all(&work).unwrap();
    let platform = Platform::local();

    let err = GoBuilder::new()
        .build(&request(&go, &out, &work, &platform))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Build { .. }));
    assert!(err.to_string().contains("module not found"));
}

#[tokio::test]
async fn test_missing_toolchain_is_build_error() {
    let temp = TempDir::new().unwrap();
    let go = temp.path().join("missing/go");
    let platform = Platform::local();

    let err = GoBuilder::new()
        .build(&request(&go, temp.path(), temp.path(), &platform))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Build { .. }));
}

/// Serves a single in-memory tarball regardless of URL.
struct TarballFetcher(Vec<u8>);

#[async_trait]
impl ArchiveFetcher for TarballFetcher {
    async fn download_and_extract(&self, url: &str, expected_hash: &str, dest: &Path) -> Result<()> {
        let actual = bytes_digest(&self.0, DigestAlgorithm::Sha256);
        if actual != expected_hash {
            return Err(Error::digest_mismatch(url, expected_hash, actual));
        }
        let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(self.0.as_slice()));
        archive.set_preserve_permissions(true);
        archive.unpack(dest).map_err(|e| Error::extraction(url, e))
    }
}

fn go_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in [("go/bin/go", FAKE_GO), ("go/bin/gofmt", "#!/bin/sh\n")] {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

#[tokio::test]
async fn test_installer_builds_package_with_installed_go() {
    let archive = go_tarball();
    let hash = bytes_digest(&archive, DigestAlgorithm::Sha256);
    let platform = Platform::local();

    let mut registry = ToolRegistry::new();
    registry
        .add([
            BinaryTool::new(GO, "1.25.5")
                .with_source(
                    platform,
                    Source::new("https://go.dev/dl/go1.25.5.tar.gz", hash)
                        .with_link("bin/go", "go/bin/go")
                        .with_link("bin/gofmt", "go/bin/gofmt"),
                )
                .into(),
            PackageTool::new("goimports", "v0.31.0", "golang.org/x/tools/cmd/goimports", GO)
                .into(),
        ])
        .unwrap();

    let cache = TempDir::new().unwrap();
    let installer = Installer::new(
        Arc::new(registry),
        Arc::new(TarballFetcher(archive)),
        &InstallerOptions::new().with_cache_dir(cache.path()),
    )
    .unwrap()
    .with_builder(Arc::new(GoBuilder::new()));

    installer
        .ensure(&CancellationToken::new(), "goimports", &platform)
        .await
        .unwrap();

    let goimports: PathBuf = installer.bin(&platform, "bin/goimports");
    assert_eq!(
        fs::read_to_string(goimports).unwrap(),
        "golang.org/x/tools/cmd/goimports@v0.31.0\n"
    );
    assert!(installer.bin(&platform, "bin/go").is_file());
    assert!(installer.layout().build_dir(GO).is_dir());
}
