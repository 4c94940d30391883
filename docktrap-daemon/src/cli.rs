//! CLI argument definitions for docktrap-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Docktrap deception sensor daemon.
///
/// Serves the emulated Docker Engine API, records every inbound request,
/// classifies them into security events, and optionally exports extracted
/// IOCs on a schedule.
#[derive(Parser, Debug)]
#[command(name = "docktrap-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to docktrap.toml configuration file.
    #[arg(short, long, default_value = "/etc/docktrap/docktrap.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_etc_config() {
        let cli = DaemonCli::try_parse_from(["docktrap-daemon"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/docktrap/docktrap.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides_parse() {
        let cli = DaemonCli::try_parse_from([
            "docktrap-daemon",
            "--config",
            "/tmp/custom.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/tmp/custom.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }
}
