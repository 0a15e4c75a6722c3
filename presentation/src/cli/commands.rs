//! CLI command definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for tradehub
#[derive(Parser, Debug)]
#[command(name = "tradehub")]
#[command(author, version, about = "Terminal client for a shared feed of trading ideas")]
#[command(long_about = r#"
TradeHub shows the newest trading ideas posted by the community and keeps the
feed current as others post. Sign in with an emailed one-time code to post.

Configuration files are loaded from (in priority order):
1. --config <path>                 Explicit config file
2. ./tradehub.toml                 Project-level config
3. ~/.config/tradehub/config.toml  Global config

Environment variables with the TRADEHUB_ prefix override files, using `__`
between section and key (e.g. TRADEHUB_BACKEND__ANON_KEY).

Example:
  tradehub
  tradehub --memory
  tradehub --config ./staging.toml -vv --log-stderr
"#)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and the effective configuration, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Use the in-process backend instead of the hosted one
    #[arg(long)]
    pub memory: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to stderr instead of the log file
    #[arg(long)]
    pub log_stderr: bool,

    /// Do not clear the screen between renders
    #[arg(long)]
    pub no_clear: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["tradehub"]);
        assert!(cli.config.is_none());
        assert!(!cli.memory);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "tradehub",
            "--config",
            "alt.toml",
            "--memory",
            "-vv",
            "--log-stderr",
            "--no-clear",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        assert!(cli.memory);
        assert_eq!(cli.verbose, 2);
        assert!(cli.log_stderr);
        assert!(cli.no_clear);
    }
}
