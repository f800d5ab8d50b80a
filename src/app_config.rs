//! Application configuration: config file, environment and CLI precedence.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use parkmenu_core::estimate::{DEFAULT_K, DEFAULT_MIN_SIMILARITY};
use parkmenu_core::matching::{ITEM_MATCH_THRESHOLD, RESTAURANT_MATCH_THRESHOLD};
use parkmenu_core::{
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_MS, EstimatorConfig, MergeThresholds, RetryPolicy,
};

/// Catalog database used when neither `--db` nor `db_path` is set.
pub const DEFAULT_DB_PATH: &str = "parkmenu.db";

const ENV_SUPABASE_URL: &str = "PARKMENU_SUPABASE_URL";
const ENV_SUPABASE_KEY: &str = "PARKMENU_SUPABASE_KEY";

/// Values read from the config file. Unset keys stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    /// Per-domain scrape delay in milliseconds.
    pub rate_limit: Option<u64>,
    pub max_retries: Option<u32>,
    pub item_match_threshold: Option<f64>,
    pub restaurant_match_threshold: Option<f64>,
    pub estimate_k: Option<usize>,
    pub min_similarity: Option<f64>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl FileConfig {
    /// Validates config values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(rate_limit) = self.rate_limit
            && rate_limit > 60_000
        {
            bail!("Invalid config value for `rate_limit`: {rate_limit}. Expected range: 0..=60000");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        if let Some(k) = self.estimate_k
            && !(1..=50).contains(&k)
        {
            bail!("Invalid config value for `estimate_k`: {k}. Expected range: 1..=50");
        }
        validate_unit_interval("item_match_threshold", self.item_match_threshold)?;
        validate_unit_interval("restaurant_match_threshold", self.restaurant_match_threshold)?;
        validate_unit_interval("min_similarity", self.min_similarity)?;
        Ok(())
    }
}

fn validate_unit_interval(field: &str, value: Option<f64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(0.0..=1.0).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 0..=1");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/parkmenu/config.toml`
/// 2. `$HOME/.config/parkmenu/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("parkmenu")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("parkmenu")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

fn env_var_non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "db_path" => {
                cfg.db_path = Some(PathBuf::from(
                    parse_string_literal(value).with_context(context)?,
                ));
            }
            "rate_limit" => {
                cfg.rate_limit = Some(parse_integer_u64(value).with_context(context)?);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_retries out of range for u32"))?;
                cfg.max_retries = Some(n);
            }
            "item_match_threshold" => {
                cfg.item_match_threshold = Some(parse_float(value).with_context(context)?);
            }
            "restaurant_match_threshold" => {
                cfg.restaurant_match_threshold = Some(parse_float(value).with_context(context)?);
            }
            "estimate_k" => {
                let parsed = parse_integer_u64(value).with_context(context)?;
                let n = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("estimate_k out of range for usize"))?;
                cfg.estimate_k = Some(n);
            }
            "min_similarity" => {
                cfg.min_similarity = Some(parse_float(value).with_context(context)?);
            }
            "supabase_url" => {
                cfg.supabase_url = Some(parse_string_literal(value).with_context(context)?);
            }
            "supabase_key" => {
                cfg.supabase_key = Some(parse_string_literal(value).with_context(context)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected numeric value");
    }
    let value = token.parse::<f64>()?;
    if !value.is_finite() {
        bail!("Expected finite number");
    }
    Ok(value)
}

/// Hosted catalog credentials from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl EnvOverrides {
    /// Reads `PARKMENU_SUPABASE_URL` and `PARKMENU_SUPABASE_KEY`. Blank values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            supabase_url: env_var_non_empty(ENV_SUPABASE_URL),
            supabase_key: env_var_non_empty(ENV_SUPABASE_KEY),
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub db_path: Option<PathBuf>,
    pub rate_limit: Option<u64>,
    pub max_retries: Option<u32>,
    pub estimate_k: Option<usize>,
    pub min_similarity: Option<f64>,
}

/// Settings after applying CLI > env > file > default.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub db_path: PathBuf,
    pub rate_limit: u64,
    pub max_retries: u32,
    pub thresholds: MergeThresholds,
    pub estimator: EstimatorConfig,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

impl EffectiveConfig {
    /// Resolves every setting from its highest-precedence source.
    #[must_use]
    pub fn resolve(cli: &CliOverrides, env: &EnvOverrides, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            db_path: cli
                .db_path
                .clone()
                .or(file.db_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            rate_limit: cli
                .rate_limit
                .or(file.rate_limit)
                .unwrap_or(DEFAULT_RATE_LIMIT_MS),
            max_retries: cli
                .max_retries
                .or(file.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            thresholds: MergeThresholds {
                restaurant: file
                    .restaurant_match_threshold
                    .unwrap_or(RESTAURANT_MATCH_THRESHOLD),
                item: file.item_match_threshold.unwrap_or(ITEM_MATCH_THRESHOLD),
            },
            estimator: EstimatorConfig {
                k: cli.estimate_k.or(file.estimate_k).unwrap_or(DEFAULT_K),
                min_similarity: cli
                    .min_similarity
                    .or(file.min_similarity)
                    .unwrap_or(DEFAULT_MIN_SIMILARITY),
            },
            supabase_url: env.supabase_url.clone().or(file.supabase_url),
            supabase_key: env.supabase_key.clone().or(file.supabase_key),
        }
    }

    /// Per-domain scrape delay.
    #[must_use]
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Hosted catalog URL and key, or an error naming what is missing.
    pub fn supabase_credentials(&self) -> Result<(&str, &str)> {
        let Some(url) = self.supabase_url.as_deref() else {
            bail!("No hosted catalog URL configured. Set `supabase_url` or {ENV_SUPABASE_URL}");
        };
        let Some(key) = self.supabase_key.as_deref() else {
            bail!("No hosted catalog key configured. Set `supabase_key` or {ENV_SUPABASE_KEY}");
        };
        Ok((url, key))
    }
}

/// Masks a secret for display, keeping its last four characters.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}
