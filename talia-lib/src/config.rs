//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files, `TALIA_*`
//! environment variables and `.env` files, and merging configurations with
//! proper precedence rules.

use crate::error::TaliaError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Default values for check options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// Output destinations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default values that map to CLI options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// WHOIS server as `host:port`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois: Option<String>,

    /// Pause between sequential lookups (e.g. "2s", "500ms")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep: Option<String>,

    /// 0 = sequential, N = worker pool, negative = one worker per domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<i64>,

    /// Connect timeout (e.g. "10s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Keep WHOIS logs for successful checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbose: Option<bool>,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Write grouped output instead of updating flat records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped_output: Option<bool>,

    /// Grouped store to merge into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,

    /// Plain-text list of available domains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_available: Option<String>,
}

/// Configuration discovery and loading functionality.
#[derive(Debug)]
pub struct ConfigManager {
    /// Whether to log which files were picked up
    pub verbose: bool,
}

impl ConfigManager {
    /// Create a new configuration manager.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load configuration from a specific file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, TaliaError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TaliaError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TaliaError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| TaliaError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is the lowest precedence, then the home directory, then the
    /// current directory.
    pub fn discover_and_load(&self) -> Result<FileConfig, TaliaError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping config file"),
            }
        }

        if self.verbose {
            for path in &loaded_files {
                info!(path = %path.display(), "loaded config file");
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./talia.toml", "./.talia.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".talia.toml", "talia.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("talia").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations; values from `higher` win.
    pub fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: match (lower.defaults, higher.defaults) {
                (Some(lower), Some(higher)) => Some(DefaultsConfig {
                    whois: higher.whois.or(lower.whois),
                    sleep: higher.sleep.or(lower.sleep),
                    concurrency: higher.concurrency.or(lower.concurrency),
                    timeout: higher.timeout.or(lower.timeout),
                    verbose: higher.verbose.or(lower.verbose),
                }),
                (lower, higher) => higher.or(lower),
            },
            output: match (lower.output, higher.output) {
                (Some(lower), Some(higher)) => Some(OutputConfig {
                    grouped_output: higher.grouped_output.or(lower.grouped_output),
                    output_file: higher.output_file.or(lower.output_file),
                    export_available: higher.export_available.or(lower.export_available),
                }),
                (lower, higher) => higher.or(lower),
            },
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), TaliaError> {
        if let Some(defaults) = &config.defaults {
            if let Some(whois) = &defaults.whois {
                validate_server_address(whois)?;
            }

            for (name, value) in [("sleep", &defaults.sleep), ("timeout", &defaults.timeout)] {
                if let Some(text) = value {
                    if parse_duration_string(text).is_none() {
                        return Err(TaliaError::config(format!(
                            "Invalid {} '{}'. Use a format like '500ms', '2s', '1m'",
                            name, text
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Check that a server address looks like `host:port`.
pub fn validate_server_address(server: &str) -> Result<(), TaliaError> {
    let valid = server
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(TaliaError::config(format!(
            "Invalid WHOIS server '{}': expected host:port",
            server
        )))
    }
}

/// Environment variable configuration that mirrors CLI options.
///
/// This represents configuration values that can be set via `TALIA_*`
/// environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub whois: Option<String>,
    pub sleep: Option<Duration>,
    pub concurrency: Option<i64>,
    pub timeout: Option<Duration>,
    pub verbose: Option<bool>,
    pub grouped_output: Option<bool>,
    pub output_file: Option<String>,
    pub export_available: Option<String>,
    pub config: Option<String>,
}

/// Load configuration from `TALIA_*` environment variables.
///
/// Invalid values are logged as warnings and ignored.
pub fn load_env_config(verbose: bool) -> EnvConfig {
    let mut env_config = EnvConfig::default();

    // TALIA_WHOIS - server address
    if let Some(server) = non_empty_var("TALIA_WHOIS") {
        match validate_server_address(&server) {
            Ok(()) => env_config.whois = Some(server),
            Err(e) => warn!(error = %e, "ignoring TALIA_WHOIS"),
        }
    }

    // TALIA_SLEEP / TALIA_TIMEOUT - durations
    if let Some(text) = non_empty_var("TALIA_SLEEP") {
        env_config.sleep = parse_duration_string(&text);
        if env_config.sleep.is_none() {
            warn!(value = %text, "ignoring invalid TALIA_SLEEP");
        }
    }
    if let Some(text) = non_empty_var("TALIA_TIMEOUT") {
        env_config.timeout = parse_duration_string(&text);
        if env_config.timeout.is_none() {
            warn!(value = %text, "ignoring invalid TALIA_TIMEOUT");
        }
    }

    // TALIA_CONCURRENCY - 0, N, or a negative value / "unbounded"
    if let Some(text) = non_empty_var("TALIA_CONCURRENCY") {
        if text.eq_ignore_ascii_case("unbounded") {
            env_config.concurrency = Some(-1);
        } else {
            match text.parse::<i64>() {
                Ok(n) => env_config.concurrency = Some(n),
                Err(_) => warn!(value = %text, "ignoring invalid TALIA_CONCURRENCY"),
            }
        }
    }

    env_config.verbose = bool_var("TALIA_VERBOSE");
    env_config.grouped_output = bool_var("TALIA_GROUPED_OUTPUT");
    env_config.output_file = non_empty_var("TALIA_OUTPUT_FILE");
    env_config.export_available = non_empty_var("TALIA_EXPORT_AVAILABLE");
    env_config.config = non_empty_var("TALIA_CONFIG");

    if verbose {
        info!(?env_config, "environment configuration");
    }

    env_config
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &str) -> Option<bool> {
    let val = non_empty_var(name)?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!(variable = name, value = %val, "ignoring invalid boolean, use true/false");
            None
        }
    }
}

/// Load `KEY=VALUE` lines from a `.env` file into the process environment.
///
/// Blank lines and `#` comments are skipped, surrounding quotes are removed
/// and variables that already exist (even if empty) are left alone. Returns
/// the number of variables that were set.
pub fn load_env_file<P: AsRef<Path>>(path: P) -> Result<usize, TaliaError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| TaliaError::file_error(path.to_string_lossy(), e.to_string()))?;

    let mut applied = 0;
    for (key, value) in parse_env_lines(&content) {
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
            applied += 1;
        }
    }
    Ok(applied)
}

fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let unquoted = [('"', '"'), ('\'', '\'')]
                .iter()
                .find_map(|(open, close)| {
                    value
                        .strip_prefix(*open)
                        .and_then(|v| v.strip_suffix(*close))
                })
                .unwrap_or(value);
            (key.trim().to_string(), unquoted.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Parse a duration string like "500ms", "2s", "1m" or "3" (seconds).
pub fn parse_duration_string(text: &str) -> Option<Duration> {
    let text = text.trim().to_lowercase();

    if let Some(ms) = text.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = text.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = text.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        // Assume seconds if no unit
        text.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_duration_string() {
        assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration_string("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration_string("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration_string("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("soon"), None);
    }

    #[test]
    fn test_validate_server_address() {
        assert!(validate_server_address("whois.verisign-grs.com:43").is_ok());
        assert!(validate_server_address("127.0.0.1:4343").is_ok());
        assert!(validate_server_address("whois.verisign-grs.com").is_err());
        assert!(validate_server_address(":43").is_err());
        assert!(validate_server_address("host:http").is_err());
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[defaults]
whois = "whois.verisign-grs.com:43"
sleep = "1s"
concurrency = 4

[output]
grouped_output = true
output_file = "grouped.json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        let config = manager.load_file(temp_file.path()).unwrap();

        let defaults = config.defaults.unwrap();
        assert_eq!(defaults.whois.as_deref(), Some("whois.verisign-grs.com:43"));
        assert_eq!(defaults.concurrency, Some(4));
        let output = config.output.unwrap();
        assert_eq!(output.grouped_output, Some(true));
        assert_eq!(output.output_file.as_deref(), Some("grouped.json"));
    }

    #[test]
    fn test_invalid_sleep_is_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[defaults]\nsleep = \"forever\"\n")
            .unwrap();
        temp_file.flush().unwrap();

        let manager = ConfigManager::new(false);
        assert!(manager.load_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_merge_configs() {
        let manager = ConfigManager::new(false);

        let lower = FileConfig {
            defaults: Some(DefaultsConfig {
                whois: Some("low.example:43".to_string()),
                concurrency: Some(2),
                ..Default::default()
            }),
            output: Some(OutputConfig {
                output_file: Some("low.json".to_string()),
                ..Default::default()
            }),
        };

        let higher = FileConfig {
            defaults: Some(DefaultsConfig {
                concurrency: Some(8),
                verbose: Some(true),
                ..Default::default()
            }),
            output: None,
        };

        let merged = manager.merge_configs(lower, higher);
        let defaults = merged.defaults.unwrap();

        assert_eq!(defaults.concurrency, Some(8)); // Higher wins
        assert_eq!(defaults.whois.as_deref(), Some("low.example:43")); // Lower preserved
        assert_eq!(defaults.verbose, Some(true));
        assert_eq!(merged.output.unwrap().output_file.as_deref(), Some("low.json"));
    }

    #[test]
    fn test_parse_env_lines() {
        let parsed = parse_env_lines(
            "# comment\n\nTALIA_WHOIS=\"whois.example:43\"\nTALIA_SLEEP='1s'\nNOEQUALS\n  SPACED = value  \n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TALIA_WHOIS".to_string(), "whois.example:43".to_string()),
                ("TALIA_SLEEP".to_string(), "1s".to_string()),
                ("SPACED".to_string(), "value".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_env_file_does_not_override() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"TALIA_TEST_ENV_NEW=fresh\nTALIA_TEST_ENV_KEEP=replaced\n")
            .unwrap();
        temp_file.flush().unwrap();

        env::set_var("TALIA_TEST_ENV_KEEP", "");
        let applied = load_env_file(temp_file.path()).unwrap();

        assert_eq!(applied, 1);
        assert_eq!(env::var("TALIA_TEST_ENV_NEW").unwrap(), "fresh");
        assert_eq!(env::var("TALIA_TEST_ENV_KEEP").unwrap(), "");
    }
}
