use std::{path::PathBuf, time::Duration};

use clap::Parser;
use serde::Deserialize;
use teloxide::types::UserId;

use crate::{distributor::DistributionOptions, error::ConfigError};

pub const PREDEFINED_BOT_TOKEN: Option<&str> = option_env!("PREDEFINED_BOT_TOKEN");
pub const DEFAULT_BOT_TOKEN_ENV: &str = "BOT_TOKEN";
pub const BOT_TOKEN_HELP: &str = if PREDEFINED_BOT_TOKEN.is_some() {
    "Environment variable name containing the bot token. If not set, uses precompiled token"
} else {
    "Environment variable name containing the bot token [default: BOT_TOKEN]"
};

pub const DEFAULT_INTERVAL_MINUTES: u64 = 180;
pub const DEFAULT_FIRST_POST_DELAY_SECS: u64 = 10;
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;

/// A Telegram bot that periodically posts stored images to channels and subscribers
#[derive(Parser, Debug)]
#[command(name = "photocast")]
#[command(about = "A Telegram bot that posts stored images on a schedule", long_about = None)]
pub struct Args {
    #[arg(long, help = BOT_TOKEN_HELP)]
    pub bot_token_env: Option<String>,

    /// Telegram user id of the administrator
    #[arg(long, env = "ADMIN_USER_ID")]
    pub admin_id: Option<u64>,

    /// YAML file with default settings, command line options take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for bot state and images. Everything is kept in memory if not set
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Folder inside the image storage holding the images to post
    #[arg(long)]
    pub images_folder: Option<String>,

    /// Minutes between scheduled posts
    #[arg(long)]
    pub interval_minutes: Option<u64>,

    /// Seconds to wait after startup before the first scheduled post
    #[arg(long)]
    pub first_post_delay_secs: Option<u64>,

    /// Public base URL for receiving updates by webhook instead of long polling
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Port the webhook listener binds to
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
}

/// Optional YAML configuration file, every key is optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub admin_id: Option<u64>,
    pub data_dir: Option<PathBuf>,
    pub images_folder: Option<String>,
    pub interval_minutes: Option<u64>,
    pub first_post_delay_secs: Option<u64>,
    pub send_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub delete_batch_size: Option<usize>,
    pub webhook_url: Option<String>,
    pub port: Option<u16>,
}

impl FileConfig {
    pub fn from_yaml(path: &str, content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::ParseFile {
            path: path.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSettings {
    pub url: String,
    pub port: u16,
}

/// Fully resolved bot configuration
#[derive(Clone)]
pub struct Settings {
    pub bot_token: String,
    pub admin_id: UserId,
    pub data_dir: Option<PathBuf>,
    pub distribution: DistributionOptions,
    pub post_interval: Duration,
    pub first_post_delay: Duration,
    pub webhook: Option<WebhookSettings>,
}

// The token stays out of logs
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("admin_id", &self.admin_id)
            .field("data_dir", &self.data_dir)
            .field("distribution", &self.distribution)
            .field("post_interval", &self.post_interval)
            .field("first_post_delay", &self.first_post_delay)
            .field("webhook", &self.webhook)
            .finish_non_exhaustive()
    }
}

impl Args {
    /// Get the bot token from the configured environment variable or the precompiled token
    pub fn get_token(&self) -> Result<String, ConfigError> {
        let env_name = self
            .bot_token_env
            .as_deref()
            .unwrap_or(DEFAULT_BOT_TOKEN_ENV);
        match std::env::var(env_name) {
            Ok(token) => Ok(token),
            Err(_) => PREDEFINED_BOT_TOKEN
                .map(str::to_string)
                .ok_or_else(|| ConfigError::MissingEnv(env_name.to_string())),
        }
    }

    /// Read the YAML file given by `--config`, if any
    pub fn load_file_config(&self) -> Result<FileConfig, ConfigError> {
        let Some(path) = &self.config else {
            return Ok(FileConfig::default());
        };
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: display.clone(),
            source,
        })?;
        FileConfig::from_yaml(&display, &content)
    }

    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let file = self.load_file_config()?;
        let token = self.get_token()?;
        Settings::resolve(self, file, token)
    }
}

impl Settings {
    /// Merge command line, file configuration and defaults, in this order of precedence
    pub fn resolve(args: &Args, file: FileConfig, bot_token: String) -> Result<Self, ConfigError> {
        let admin_id = args
            .admin_id
            .or(file.admin_id)
            .ok_or(ConfigError::MissingAdmin)?;

        let interval_minutes = args
            .interval_minutes
            .or(file.interval_minutes)
            .unwrap_or(DEFAULT_INTERVAL_MINUTES);
        if interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                name: "interval_minutes",
                reason: "must be greater than zero".to_string(),
            });
        }

        let defaults = DistributionOptions::default();
        let delete_batch_size = file.delete_batch_size.unwrap_or(defaults.delete_batch_size);
        if delete_batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "delete_batch_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        let distribution = DistributionOptions {
            folder: args
                .images_folder
                .clone()
                .or(file.images_folder)
                .unwrap_or(defaults.folder),
            send_delay: file
                .send_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.send_delay),
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            delete_batch_size,
        };

        let webhook = args
            .webhook_url
            .clone()
            .or(file.webhook_url)
            .map(|url| WebhookSettings {
                url: url.trim_end_matches('/').to_string(),
                port: args.port.or(file.port).unwrap_or(DEFAULT_WEBHOOK_PORT),
            });

        Ok(Settings {
            bot_token,
            admin_id: UserId(admin_id),
            data_dir: args.data_dir.clone().or(file.data_dir),
            distribution,
            post_interval: Duration::from_secs(interval_minutes * 60),
            first_post_delay: Duration::from_secs(
                args.first_post_delay_secs
                    .or(file.first_post_delay_secs)
                    .unwrap_or(DEFAULT_FIRST_POST_DELAY_SECS),
            ),
            webhook,
        })
    }
}
