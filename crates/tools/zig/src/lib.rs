//! Zig toolchain catalog for toolpin.

use toolpin_core::Result;
use toolpin_core::tools::{BinaryTool, Platform, Source, Tool, ToolRegistry};

/// Zig compiler.
pub const ZIG: &str = "zig";

const VERSION: &str = "0.15.2";

fn source(target: &str, hash: &str) -> Source {
    let dir = format!("zig-{target}-{VERSION}");
    Source::new(
        format!("https://ziglang.org/download/{VERSION}/{dir}.tar.xz"),
        hash,
    )
    .with_link("bin/zig", format!("{dir}/zig"))
}

/// The Zig tool catalog.
#[must_use]
pub fn tools() -> Vec<Tool> {
    // https://ziglang.org/download/
    vec![
        BinaryTool::new(ZIG, VERSION)
            .with_source(
                Platform::LINUX_AMD64,
                source(
                    "x86_64-linux",
                    "sha256:02aa270f183da276e5b5920b1dac44a63f1a49e55050ebde3aecc9eb82f93239",
                ),
            )
            .with_source(
                Platform::DARWIN_AMD64,
                source(
                    "x86_64-macos",
                    "sha256:375b6909fc1495d16fc2c7db9538f707456bfc3373b14ee83fdd3e22b3d43f7f",
                ),
            )
            .with_source(
                Platform::DARWIN_ARM64,
                source(
                    "aarch64-macos",
                    "sha256:3cc2bab367e185cdfb27501c4b30b1b0653c28d9f73df8dc91488e66ece5fa6b",
                ),
            )
            .into(),
    ]
}

/// Register the Zig catalog.
///
/// # Errors
///
/// Returns an error if `zig` is already registered.
pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.add(tools())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources() {
        let mut registry = ToolRegistry::new();
        register(&mut registry).unwrap();

        let Tool::Binary(zig) = registry.get(ZIG).unwrap() else {
            panic!("zig must be a binary tool");
        };
        let linux = zig.source(&Platform::LINUX_AMD64).unwrap();
        assert_eq!(
            linux.url,
            "https://ziglang.org/download/0.15.2/zig-x86_64-linux-0.15.2.tar.xz"
        );
        assert_eq!(
            linux.links.get("bin/zig").map(String::as_str),
            Some("zig-x86_64-linux-0.15.2/zig")
        );

        let mac = zig.source(&Platform::DARWIN_ARM64).unwrap();
        assert_eq!(
            mac.links.get("bin/zig").map(String::as_str),
            Some("zig-aarch64-macos-0.15.2/zig")
        );
        assert!(zig.source(&Platform::DOCKER_AMD64).is_err());
    }

    #[test]
    fn test_hashes_parse() {
        for tool in tools() {
            let Tool::Binary(tool) = tool else { continue };
            for source in tool.sources.values() {
                toolpin_core::tools::checksum::parse_digest(&source.hash).unwrap();
            }
        }
    }
}
