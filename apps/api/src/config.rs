use anyhow::{bail, Context, Result};

use crate::generation::evaluator::MAX_SCORE;
use crate::generation::pipeline::LoopConfig;

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Application configuration loaded from environment variables.
/// Built once at startup and passed by reference; nothing reads the environment later.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_api_url: String,
    pub llm_max_tokens: u32,
    pub llm_timeout_secs: u64,
    pub prompts_path: String,
    pub score_threshold: u32,
    pub max_attempts: u32,
    pub extract_key_points: bool,
    /// Whole-invocation deadline. `None` = no deadline.
    pub loop_deadline_secs: Option<u64>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        // Threshold and attempt defaults follow the chosen loop variant.
        let extract_key_points = parse_env("EXTRACT_KEY_POINTS", true)?;
        let preset = LoopConfig::preset(extract_key_points);

        let config = Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: env_or("LLM_MODEL", DEFAULT_MODEL),
            llm_api_url: env_or("LLM_API_URL", DEFAULT_API_URL),
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", 4096)?,
            llm_timeout_secs: parse_env("LLM_TIMEOUT_SECS", 120)?,
            prompts_path: env_or("PROMPTS_PATH", "prompts/agents.yaml"),
            score_threshold: parse_env("SCORE_THRESHOLD", preset.score_threshold)?,
            max_attempts: parse_env("MAX_ATTEMPTS", preset.max_attempts)?,
            extract_key_points,
            loop_deadline_secs: match std::env::var("LOOP_DEADLINE_SECS") {
                Ok(raw) => Some(
                    raw.parse::<u64>()
                        .context("LOOP_DEADLINE_SECS must be a whole number of seconds")?,
                ),
                Err(_) => None,
            },
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.score_threshold > MAX_SCORE {
            bail!(
                "SCORE_THRESHOLD must be between 0 and {MAX_SCORE}, got {}",
                self.score_threshold
            );
        }
        if self.llm_timeout_secs == 0 {
            bail!("LLM_TIMEOUT_SECS must be greater than 0");
        }
        if self.loop_deadline_secs == Some(0) {
            bail!("LOOP_DEADLINE_SECS must be greater than 0 when set");
        }
        Ok(())
    }

    /// The control-loop settings carried by this configuration.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            score_threshold: self.score_threshold,
            max_attempts: self.max_attempts,
            extract_key_points: self.extract_key_points,
            deadline: self.loop_deadline_secs.map(std::time::Duration::from_secs),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
