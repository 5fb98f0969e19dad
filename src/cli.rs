//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use sigmirror_core::config::{
    DEFAULT_DNS_TIMEOUT_SECS, DEFAULT_HOSTNAME, DEFAULT_LOCK_DIR, DEFAULT_LOOKUP_ATTEMPTS,
    DEFAULT_MIRROR_DIR, DEFAULT_TEXT_RECORD, DEFAULT_WORK_DIR, MirrorConfig,
};
use sigmirror_core::directory::DEFAULT_HTTP_PORT;
use sigmirror_core::download::DEFAULT_MAX_RETRIES;
use sigmirror_core::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};

/// Mirror ClamAV signature databases.
///
/// Sigmirror reads the advertised database versions from a DNS TXT record,
/// downloads every outdated database from the source servers, validates it,
/// and atomically publishes it into a local mirror directory.
#[derive(Parser, Debug)]
#[command(name = "sigmirror")]
#[command(author, version, about)]
#[allow(clippy::struct_excessive_bools)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Source hostname to download from
    #[arg(short = 'a', long, default_value = DEFAULT_HOSTNAME)]
    pub hostname: String,

    /// DNS TXT record advertising the current versions
    #[arg(short = 'r', long, default_value = DEFAULT_TEXT_RECORD)]
    pub text_record: String,

    /// Working directory for downloads in progress
    #[arg(short = 'w', long, default_value = DEFAULT_WORK_DIR)]
    pub work_directory: PathBuf,

    /// Mirror directory served to clients
    #[arg(short = 'd', long, default_value = DEFAULT_MIRROR_DIR)]
    pub mirror_directory: PathBuf,

    /// Owner of published files (name or uid)
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Group of published files (name or gid)
    #[arg(short = 'g', long)]
    pub group: Option<String>,

    /// Directory holding the single-instance lock file
    #[arg(short = 'l', long, default_value = DEFAULT_LOCK_DIR)]
    pub locks_directory: PathBuf,

    /// Database to mirror (repeatable; default: main daily bytecode safebrowsing)
    #[arg(long = "artifact", value_name = "NAME")]
    pub artifacts: Vec<String>,

    /// Extra source tried after the resolved servers, as host[:port] (repeatable)
    #[arg(long = "fallback-mirror", value_name = "HOST[:PORT]")]
    pub fallback_mirrors: Vec<String>,

    /// HTTP port of the resolved source servers
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Download attempts per source server (1-10)
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// Base delay between attempts in milliseconds (0 to disable, max 60000)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub retry_delay_ms: u64,

    /// HTTP connect timeout in seconds
    #[arg(long, default_value_t = CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = READ_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: u64,

    /// DNS query timeout in seconds
    #[arg(long, default_value_t = DEFAULT_DNS_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub dns_timeout: u64,

    /// Directory lookup passes before giving up (1-10)
    #[arg(long, default_value_t = DEFAULT_LOOKUP_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub lookup_attempts: u8,

    /// Pause between directory lookup passes in milliseconds (max 60000)
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub lookup_pause_ms: u64,

    /// Accept databases older than the mirrored copy
    #[arg(long)]
    pub allow_downgrade: bool,

    /// Fail a database when ownership cannot be applied
    #[arg(long)]
    pub require_ownership: bool,

    /// Do not publish the directory record as dns.txt
    #[arg(long)]
    pub no_dns_file: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Builds the run configuration. Values are validated by the coordinator.
    pub fn into_config(self) -> MirrorConfig {
        let mut config = MirrorConfig::new(
            self.work_directory,
            self.mirror_directory,
            self.locks_directory,
        );
        config.hostname = self.hostname;
        config.text_record = self.text_record;
        config.port = self.port;
        config.fallback_mirrors = self.fallback_mirrors;
        if !self.artifacts.is_empty() {
            config.artifacts = self.artifacts;
        }
        config.user = self.user;
        config.group = self.group;
        config.require_ownership = self.require_ownership;
        config.max_attempts = u32::from(self.max_attempts);
        config.retry_base_delay = Duration::from_millis(self.retry_delay_ms);
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.read_timeout = Duration::from_secs(self.read_timeout);
        config.dns_timeout = Duration::from_secs(self.dns_timeout);
        config.lookup_attempts = u32::from(self.lookup_attempts);
        config.lookup_pause = Duration::from_millis(self.lookup_pause_ms);
        config.allow_downgrade = self.allow_downgrade;
        config.write_dns_file = !self.no_dns_file;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["sigmirror"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.hostname, "database.clamav.net");
        assert_eq!(args.text_record, "current.cvd.clamav.net");
        assert_eq!(args.max_attempts, 3); // DEFAULT_MAX_RETRIES
        assert_eq!(args.port, 80);
        assert!(args.artifacts.is_empty());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["sigmirror", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["sigmirror", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["sigmirror", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["sigmirror", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["sigmirror", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["sigmirror", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_short_flags_match_long_flags() {
        let args = Args::try_parse_from([
            "sigmirror", "-a", "db.local.net", "-r", "txt.local.net", "-w", "/tmp/w", "-d",
            "/tmp/d", "-u", "clamav", "-g", "www", "-l", "/tmp/l",
        ])
        .unwrap();
        assert_eq!(args.hostname, "db.local.net");
        assert_eq!(args.text_record, "txt.local.net");
        assert_eq!(args.work_directory, PathBuf::from("/tmp/w"));
        assert_eq!(args.mirror_directory, PathBuf::from("/tmp/d"));
        assert_eq!(args.user.as_deref(), Some("clamav"));
        assert_eq!(args.group.as_deref(), Some("www"));
        assert_eq!(args.locks_directory, PathBuf::from("/tmp/l"));
    }

    // ==================== Retry Tests ====================

    #[test]
    fn test_cli_max_attempts_zero_rejected() {
        let err = Args::try_parse_from(["sigmirror", "--max-attempts", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_max_attempts_over_max_rejected() {
        let err = Args::try_parse_from(["sigmirror", "--max-attempts", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retry_delay_zero_allowed() {
        let args = Args::try_parse_from(["sigmirror", "--retry-delay-ms", "0"]).unwrap();
        assert_eq!(args.retry_delay_ms, 0);
    }

    // ==================== Config Conversion Tests ====================

    #[test]
    fn test_into_config_defaults() {
        let config = Args::try_parse_from(["sigmirror"]).unwrap().into_config();
        assert_eq!(config.artifacts, ["main", "daily", "bytecode", "safebrowsing"]);
        assert_eq!(config.work_dir, PathBuf::from("/var/spool/sigmirror"));
        assert_eq!(config.lookup_attempts, 4);
        assert_eq!(config.lookup_pause, Duration::from_secs(5));
        assert!(config.write_dns_file);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_into_config_repeatable_flags() {
        let config = Args::try_parse_from([
            "sigmirror",
            "--artifact",
            "daily",
            "--artifact",
            "main",
            "--fallback-mirror",
            "mirror.example.org:8080",
            "--no-dns-file",
            "--allow-downgrade",
            "--retry-delay-ms",
            "250",
        ])
        .unwrap()
        .into_config();
        assert_eq!(config.artifacts, ["daily", "main"]);
        assert_eq!(config.fallback_mirrors, ["mirror.example.org:8080"]);
        assert!(!config.write_dns_file);
        assert!(config.allow_downgrade);
        assert_eq!(config.retry_base_delay, Duration::from_millis(250));
    }
}
