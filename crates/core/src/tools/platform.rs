//! Platform identification.
//!
//! A [`Platform`] is an (OS, architecture, environment) triple. Native
//! platforms run binaries directly on the host; the `docker` environment
//! stands for execution inside a container image, used for tools that only
//! ship binaries for one OS but must be usable from any host.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// Platform identifier combining OS, architecture and execution environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
    /// Where the binaries run.
    pub environment: Environment,
}

impl Platform {
    /// Native Linux on x86_64.
    pub const LINUX_AMD64: Self = Self::native(Os::Linux, Arch::X86_64);
    /// Native macOS on x86_64.
    pub const DARWIN_AMD64: Self = Self::native(Os::Darwin, Arch::X86_64);
    /// Native macOS on Apple silicon.
    pub const DARWIN_ARM64: Self = Self::native(Os::Darwin, Arch::Arm64);
    /// Linux x86_64 container image.
    pub const DOCKER_AMD64: Self = Self::docker(Os::Linux, Arch::X86_64);

    /// Create a native platform.
    #[must_use]
    pub const fn native(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            environment: Environment::Native,
        }
    }

    /// Create a container platform.
    #[must_use]
    pub const fn docker(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            environment: Environment::Docker,
        }
    }

    /// The host platform.
    #[must_use]
    pub fn local() -> Self {
        Self::native(Os::current(), Arch::current())
    }

    /// Parse from strings like `darwin-arm64`, `docker-linux-x86_64` or `local`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("local") {
            return Some(Self::local());
        }

        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            [os, arch] => Some(Self::native(Os::parse(os)?, Arch::parse(arch)?)),
            [env, os, arch] => {
                let environment = Environment::parse(env)?;
                Some(Self {
                    os: Os::parse(os)?,
                    arch: Arch::parse(arch)?,
                    environment,
                })
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.environment {
            Environment::Native => write!(f, "{}-{}", self.os, self.arch),
            Environment::Docker => write!(f, "{}-{}-{}", self.environment, self.os, self.arch),
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::configuration(format!("Unknown platform '{s}'")))
    }
}

impl TryFrom<String> for Platform {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.to_string()
    }
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// macOS.
    Darwin,
    /// Linux.
    Linux,
}

impl Os {
    /// Get the current OS.
    #[must_use]
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Self::Darwin;
        #[cfg(target_os = "linux")]
        return Self::Linux;
        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        compile_error!("Unsupported OS");
    }

    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "darwin" | "macos" => Some(Self::Darwin),
            "linux" => Some(Self::Linux),
            _ => None,
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Darwin => write!(f, "darwin"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (aarch64).
    Arm64,
    /// 64-bit x86 (amd64).
    X86_64,
}

impl Arch {
    /// Get the current architecture.
    #[must_use]
    pub fn current() -> Self {
        #[cfg(target_arch = "aarch64")]
        return Self::Arm64;
        #[cfg(target_arch = "x86_64")]
        return Self::X86_64;
        #[cfg(not(any(target_arch = "aarch64", target_arch = "x86_64")))]
        compile_error!("Unsupported architecture");
    }

    /// Parse from string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Some(Self::Arm64),
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            _ => None,
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Arm64 => write!(f, "arm64"),
            Self::X86_64 => write!(f, "x86_64"),
        }
    }
}

/// Where binaries for a platform are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Directly on the host.
    Native,
    /// Inside a container image.
    Docker,
}

impl Environment {
    /// Parse from string. Only `docker` may appear as an explicit prefix.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "docker" => Some(Self::Docker),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Docker => write!(f, "docker"),
        }
    }
}
