use anyhow::Context;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DbConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens. Without it only oauth2-proxy headers are accepted.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Users allowed to trigger administrative jobs.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Currency per kWh, applied to readings and summaries.
    #[serde(default = "default_rate_per_kwh")]
    pub rate_per_kwh: f64,
    /// Days after the end of the billing month before payment is due.
    #[serde(default = "default_due_days")]
    pub due_days: i64,
    /// Offset of local time from UTC used for calendar bucketing.
    #[serde(default)]
    pub timezone_offset_hours: i32,
    /// Local hour of day at which the reminder check runs.
    #[serde(default = "default_run_at_hour")]
    pub run_at_hour: u32,
    #[serde(default = "default_scheduler_enabled")]
    pub scheduler_enabled: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            rate_per_kwh: default_rate_per_kwh(),
            due_days: default_due_days(),
            timezone_offset_hours: 0,
            run_at_hour: default_run_at_hour(),
            scheduler_enabled: default_scheduler_enabled(),
        }
    }
}

impl BillingConfig {
    pub fn local_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset_hours * 3600).with_context(|| {
            format!(
                "billing.timezone_offset_hours out of range: {}",
                self.timezone_offset_hours
            )
        })
    }
}

fn default_rate_per_kwh() -> f64 {
    10.0
}

const MAX_DUE_DAYS: i64 = 365;

fn default_due_days() -> i64 {
    15
}

fn default_run_at_hour() -> u32 {
    8
}

fn default_scheduler_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_max_batch_size() -> usize {
    500
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut cfg = Self::from_yaml(&raw)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }

        if let Ok(jwt_secret) = std::env::var("JWT_SECRET") {
            cfg.auth.jwt_secret = Some(jwt_secret);
        }

        Ok(cfg)
    }

    /// Parse a YAML document after placeholder expansion and validate it.
    pub fn from_yaml(raw: &str) -> Result<Self, anyhow::Error> {
        let expanded = expand_env_placeholders(raw)?;
        let cfg: Self = serde_yaml::from_str(&expanded).context("Failed to parse config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.billing.rate_per_kwh.is_finite() || self.billing.rate_per_kwh < 0.0 {
            anyhow::bail!("billing.rate_per_kwh must be a non-negative number");
        }
        if !(0..=MAX_DUE_DAYS).contains(&self.billing.due_days) {
            anyhow::bail!("billing.due_days must be between 0 and {}", MAX_DUE_DAYS);
        }
        if self.billing.run_at_hour > 23 {
            anyhow::bail!("billing.run_at_hour must be between 0 and 23");
        }
        if self.ingest.max_batch_size == 0 {
            anyhow::bail!("ingest.max_batch_size must be at least 1");
        }
        self.billing.local_offset()?;
        Ok(())
    }

    pub fn api_bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                // "$$" -> "$"
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}
