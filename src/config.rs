//! Pipeline Configuration
//!
//! Model identifiers, image parameters and output location are configuration,
//! not separate code paths.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4.1-nano";
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1536";
pub const DEFAULT_IMAGE_QUALITY: &str = "auto";
pub const DEFAULT_OUTPUT_DIR: &str = "colourings";
pub const DEFAULT_SIGNATURE: &str = "Pablo Mano";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub api_key: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub image_quality: String,
    pub output_dir: PathBuf,
    pub signature: String,
    /// `None` means outbound calls block until the backend answers.
    pub request_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            image_quality: DEFAULT_IMAGE_QUALITY.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            signature: DEFAULT_SIGNATURE.to_string(),
            request_timeout: None,
        }
    }

    /// Load from the process environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let mut config = Self::new(api_key);
        let text = |key: &str, target: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = value.trim().to_string();
            }
        };

        text("COLORBOOK_API_BASE", &mut config.api_base);
        text("COLORBOOK_TEXT_MODEL", &mut config.text_model);
        text("COLORBOOK_IMAGE_MODEL", &mut config.image_model);
        text("COLORBOOK_IMAGE_SIZE", &mut config.image_size);
        text("COLORBOOK_IMAGE_QUALITY", &mut config.image_quality);
        text("COLORBOOK_SIGNATURE", &mut config.signature);

        if let Some(dir) = lookup("COLORBOOK_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            config.output_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup("COLORBOOK_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "COLORBOOK_REQUEST_TIMEOUT_SECS".to_string(),
                value: raw.clone(),
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        validate_image_size(&config.image_size)?;
        config.api_base = config.api_base.trim_end_matches('/').to_string();

        Ok(config)
    }
}

fn validate_image_size(size: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Invalid {
        key: "COLORBOOK_IMAGE_SIZE".to_string(),
        value: size.to_string(),
    };
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    match (w.parse::<u32>(), h.parse::<u32>()) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(()),
        _ => Err(invalid()),
    }
}
