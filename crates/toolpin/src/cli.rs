use crate::logging::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use toolpin_core::paths::CACHE_DIR_ENV;
use toolpin_core::tools::Platform;

#[derive(Parser, Debug)]
#[command(name = "toolpin")]
#[command(about = "Install hash-pinned build tools into a content-addressed cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = CACHE_DIR_ENV,
        help = "Cache root (defaults to the platform cache directory)"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(
        long = "catalog",
        global = true,
        value_name = "FILE",
        help = "Register extra tools from a TOML catalog (repeatable)"
    )]
    pub catalogs: Vec<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        help = "Cancel the operation after this many seconds"
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Install tools and print their stable paths")]
    Ensure {
        #[arg(required = true, help = "Tool names")]
        tools: Vec<String>,
        #[arg(
            long,
            short = 'p',
            default_value = "local",
            help = "Target platform, e.g. linux-x86_64 or docker-linux-x86_64"
        )]
        platform: Platform,
    },
    #[command(about = "Install every tool available for a platform")]
    InstallAll {
        #[arg(long, short = 'p', default_value = "local", help = "Target platform")]
        platform: Platform,
    },
    #[command(about = "Download every declared source and check its digest")]
    Verify {
        #[arg(help = "Tool names (all tools when omitted)")]
        tools: Vec<String>,
    },
    #[command(about = "List registered tools")]
    List {
        #[arg(long, short = 'p', help = "Only show tools available for this platform")]
        platform: Option<Platform>,
    },
    #[command(about = "Print the stable paths of an installed tool")]
    Which {
        #[arg(help = "Tool name")]
        tool: String,
        #[arg(long, short = 'p', default_value = "local", help = "Target platform")]
        platform: Platform,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["toolpin", "list"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.log_format, TracingFormat::Compact);
        assert!(cli.catalogs.is_empty());
        assert!(cli.timeout.is_none());
        assert!(matches!(cli.command, Commands::List { platform: None }));
    }

    #[test]
    fn test_ensure_defaults_to_local_platform() {
        let cli = Cli::try_parse_from(["toolpin", "ensure", "go", "zig"]).unwrap();
        let Commands::Ensure { tools, platform } = cli.command else {
            panic!("expected ensure");
        };
        assert_eq!(tools, vec!["go", "zig"]);
        assert_eq!(platform, Platform::local());
    }

    #[test]
    fn test_ensure_requires_tool() {
        assert!(Cli::try_parse_from(["toolpin", "ensure"]).is_err());
    }

    #[test]
    fn test_platform_parsing() {
        let cli = Cli::try_parse_from([
            "toolpin",
            "install-all",
            "--platform",
            "docker-linux-x86_64",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::InstallAll { platform } if platform == Platform::DOCKER_AMD64
        ));

        assert!(Cli::try_parse_from(["toolpin", "which", "go", "-p", "windows-x86_64"]).is_err());
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "toolpin",
            "verify",
            "--catalog",
            "a.toml",
            "--catalog",
            "b.toml",
            "--timeout",
            "30",
            "--cache-dir",
            "/tmp/cache",
            "--level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.catalogs, vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]);
        assert_eq!(cli.timeout, Some(30));
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(cli.level, LogLevel::Debug);
        assert_eq!(cli.log_format, TracingFormat::Json);
        assert!(matches!(cli.command, Commands::Verify { ref tools } if tools.is_empty()));
    }
}
