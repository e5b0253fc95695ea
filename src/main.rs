use anyhow::{Context, Result};
use classmeet::{
    auth::Keys,
    chatbot::Chatbot,
    config::Config,
    db,
    mail::{Mail, SmtpMailer},
    uploads::{Ffmpeg, UploadStore},
    AppState,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("classmeet=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating {}", config.upload_dir.display()))?;

    let db_pool = db::connect(&config.database_url)
        .await
        .with_context(|| format!("opening {}", config.database_url))?;

    let mail = match &config.smtp {
        Some(smtp) => Mail::new(SmtpMailer::new(smtp)?),
        None => {
            tracing::warn!("SMTP_EMAIL/SMTP_PASS not set, mail is disabled");
            Mail::disabled()
        }
    };

    let app_state = AppState::new(
        db_pool,
        Keys::new(config.jwt_secret.as_bytes()),
        UploadStore::new(&config.upload_dir, Ffmpeg::new(&config.ffmpeg)),
        mail,
        Chatbot::new(&config.gemini_endpoint, config.gemini_api_key.clone()),
    );
    let app = classmeet::app(app_state, &config.public_dir);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
