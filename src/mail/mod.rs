//! Outbound mail: private messages between users and classroom-wide notices.

mod private;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::{routing::post, Router};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use sqlx::SqlitePool;

use crate::{config::SmtpConfig, AppState};

pub const CLASSROOM_UPDATE_SUBJECT: &str = "Classroom Update";
pub const PRIVATE_MESSAGE_SUBJECT: &str = "Private Message from Classroom";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/privateMessage", post(private::private_message))
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Plain-text mail through an authenticated SMTP relay.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let from = config
            .email
            .parse()
            .with_context(|| format!("SMTP_EMAIL is not an address: {:?}", config.email))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay)
            .with_context(|| format!("bad SMTP relay {:?}", config.relay))?
            .credentials(Credentials::new(config.email.clone(), config.password.clone()))
            .build();

        Ok(SmtpMailer { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        let to: Mailbox = to.parse().with_context(|| format!("bad recipient {to:?}"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_owned())?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// The configured mailer, if any. Mail is optional: without SMTP
/// credentials notifications are skipped and private messages fail.
#[derive(Clone, Default)]
pub struct Mail(Option<Arc<dyn Mailer>>);

impl Mail {
    pub fn new(mailer: impl Mailer + 'static) -> Self {
        Mail(Some(Arc::new(mailer)))
    }

    pub fn disabled() -> Self {
        Mail(None)
    }

    pub fn mailer(&self) -> Option<Arc<dyn Mailer>> {
        self.0.clone()
    }
}

/// Mails every member of the classroom that has an address. Individual
/// failures are logged and skipped; returns how many went out.
pub async fn notify_classroom(
    db_pool: &SqlitePool,
    mailer: &dyn Mailer,
    classroom_id: i64,
    text: &str,
) -> Result<usize, sqlx::Error> {
    let recipients: Vec<(String,)> = sqlx::query_as(
        "SELECT u.email FROM classroom_members m
         JOIN users u ON u.id=m.user_id
         WHERE m.classroom_id=? AND u.email IS NOT NULL AND u.email<>''",
    )
    .bind(classroom_id)
    .fetch_all(db_pool)
    .await?;

    let mut sent = 0;
    for (email,) in recipients {
        match mailer.send(&email, CLASSROOM_UPDATE_SUBJECT, text).await {
            Ok(()) => sent += 1,
            Err(err) => tracing::warn!(classroom = classroom_id, to = %email, "notification failed: {err:#}"),
        }
    }

    tracing::info!(classroom = classroom_id, sent, "classroom notified");
    Ok(sent)
}


#[cfg(test)]
mod tests {
    use super::{test_support::RecordingMailer, *};
    use crate::{
        classrooms::ensure_member,
        db::{connect_in_memory, test_support::*, Role},
    };

    #[tokio::test]
    async fn notices_reach_members_only_and_survive_failures() {
        let db_pool = connect_in_memory().await.unwrap();
        let teacher = seed_user(&db_pool, "Tess", Role::Teacher).await;
        let sam = seed_user(&db_pool, "Sam", Role::Student).await;
        let ada = seed_user(&db_pool, "Ada", Role::Student).await;
        let _outsider = seed_user(&db_pool, "Olly", Role::Student).await;
        let room = seed_classroom(&db_pool, teacher, "ROOM01").await;
        ensure_member(&db_pool, room, sam).await.unwrap();
        ensure_member(&db_pool, room, ada).await.unwrap();

        let mailer = RecordingMailer {
            fail_for: vec!["ada@example.com".into()],
            ..Default::default()
        };
        let sent = notify_classroom(&db_pool, &mailer, room, "new quiz").await.unwrap();

        assert_eq!(sent, 1);
        let outbox = mailer.sent.lock().unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].to, "sam@example.com");
        assert_eq!(outbox[0].subject, CLASSROOM_UPDATE_SUBJECT);
        assert_eq!(outbox[0].body, "new quiz");
    }

    #[test]
    fn disabled_mail_has_no_mailer() {
        assert!(Mail::disabled().mailer().is_none());
        assert!(Mail::new(RecordingMailer::default()).mailer().is_some());
    }
}
