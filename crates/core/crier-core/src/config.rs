//! Runtime configuration, read from the environment

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CrierError, Result};

/// Everything the bot needs to run. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct CrierConfig {
    /// Discord bot token
    pub discord_token: String,
    /// sqlx database URL for the profile store
    pub database_url: String,
    /// Base URL of the TTS server
    pub tts_endpoint: String,
    /// Language passed to the synthesizer
    pub language: String,
    /// Directory of reference voice samples
    pub voices_dir: PathBuf,
    /// Sample used for users without a registered voice
    pub default_voice: String,
    /// Usernames allowed to use `!quit`
    pub admins: Vec<String>,
    /// Upper bound on a single synthesis call
    pub synthesis_timeout: Duration,
    /// Per-guild playback queue bound
    pub queue_capacity: usize,
}

impl CrierConfig {
    /// Read the configuration from the environment. Only the Discord token
    /// is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        let discord_token = env::var("DISCORD_TOKEN")
            .map_err(|_| CrierError::config("DISCORD_TOKEN is not set"))?;

        Ok(Self {
            discord_token,
            database_url: env_or("DATABASE_URL", "sqlite://crier.sqlite3"),
            tts_endpoint: env_or("TTS_ENDPOINT", "http://127.0.0.1:5002"),
            language: env_or("TTS_LANGUAGE", "en"),
            voices_dir: PathBuf::from(env_or("VOICES_DIR", "voices")),
            default_voice: env_or("DEFAULT_VOICE", "narrator.wav"),
            admins: parse_admins(&env::var("BOT_ADMINS").unwrap_or_default()),
            synthesis_timeout: Duration::from_secs(env_u64("SYNTHESIS_TIMEOUT_SECS", 30)),
            queue_capacity: env_u64("QUEUE_CAPACITY", 16) as usize,
        })
    }

    /// Whether `username` may use admin commands
    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.iter().any(|admin| admin == username)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn parse_admins(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
