use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://classroom.db";
pub const DEFAULT_JWT_SECRET: &str = "changeme123";
pub const DEFAULT_SMTP_RELAY: &str = "smtp.gmail.com";
pub const DEFAULT_GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Process settings, read once at startup. `.env` is honoured.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub smtp: Option<SmtpConfig>,
    pub gemini_api_key: Option<String>,
    pub gemini_endpoint: String,
    pub public_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub ffmpeg: PathBuf,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub relay: String,
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let port = match var("PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("PORT must be a port number, got {port:?}"))?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET is not set, signing tokens with the built-in default");
            DEFAULT_JWT_SECRET.to_owned()
        });

        let smtp = match (var("SMTP_EMAIL"), var("SMTP_PASS")) {
            (Some(email), Some(password)) => Some(SmtpConfig {
                relay: var("SMTP_RELAY").unwrap_or_else(|| DEFAULT_SMTP_RELAY.to_owned()),
                email,
                password,
            }),
            _ => None,
        };

        let public_dir = PathBuf::from(var("PUBLIC_DIR").unwrap_or_else(|| "public".to_owned()));
        let upload_dir = var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| public_dir.join("uploads"));

        Ok(Config {
            port,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            jwt_secret,
            smtp,
            gemini_api_key: var("GEMINI_API_KEY"),
            gemini_endpoint: var("GEMINI_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_GEMINI_ENDPOINT.to_owned()),
            public_dir,
            upload_dir,
            ffmpeg: PathBuf::from(var("FFMPEG").unwrap_or_else(|| "ffmpeg".to_owned())),
        })
    }
}

// empty values count as unset
fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|value| !value.trim().is_empty())
}
