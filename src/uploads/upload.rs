use std::path::Path;

use axum::{
    debug_handler,
    http::StatusCode,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, State,
    },
    Json,
};
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{auth::AuthUser, classrooms, db::Upload, mail::{self, Mail}, AppError, AppResult};

use super::{policy, UploadKind, UploadStore, MAX_VIDEO_BYTES};

/// A file written to the upload dir but not yet accepted.
#[derive(Debug)]
struct Staged {
    filename: String,
    original_name: String,
    mime: String,
    size: u64,
}

#[derive(Default)]
struct UploadForm {
    file: Option<Staged>,
    class_id: Option<String>,
    kind: Option<String>,
}

impl UploadForm {
    async fn read(&mut self, store: &UploadStore, mut multipart: Multipart) -> AppResult<()> {
        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "file" => self.stage(store, field).await?,
                "classId" => self.class_id = Some(field.text().await.map_err(malformed)?),
                "type" => self.kind = Some(field.text().await.map_err(malformed)?),
                other => tracing::debug!(field = other, "ignoring upload field"),
            }
        }
        Ok(())
    }

    /// Streams the file part to disk. Registered before the first chunk so a
    /// failed stream still gets cleaned up.
    async fn stage(&mut self, store: &UploadStore, mut field: Field<'_>) -> AppResult<()> {
        if self.file.is_some() {
            return Err(AppError::BadRequest("Only one file per upload".into()));
        }

        let original_name = field.file_name().unwrap_or("upload").to_owned();
        let mime = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_owned();
        let filename = format!("{}-{}", Uuid::now_v7().simple(), sanitize(&original_name));

        let mut out = tokio::fs::File::create(store.path_of(&filename)).await?;
        let staged = self.file.insert(Staged { filename, original_name, mime, size: 0 });

        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            staged.size += chunk.len() as u64;
            if staged.size > MAX_VIDEO_BYTES {
                let kind = self.kind.as_deref().and_then(|kind| kind.trim().parse().ok());
                return Err(policy::oversized(kind, &staged.mime));
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        Ok(())
    }

    async fn check(&self, db_pool: &SqlitePool) -> AppResult<(i64, UploadKind)> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
        let classroom_id = self
            .class_id
            .as_deref()
            .and_then(|id| id.trim().parse::<i64>().ok())
            .ok_or_else(|| AppError::BadRequest("Missing or invalid classId".into()))?;
        let kind = self
            .kind
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("Missing type".into()))?
            .trim()
            .parse::<UploadKind>()?;

        if classrooms::find(db_pool, classroom_id).await?.is_none() {
            return Err(AppError::NotFound("Classroom not found".into()));
        }
        policy::check(kind, &file.mime, file.size)?;

        Ok((classroom_id, kind))
    }
}

/// The file as it will be recorded.
struct Stored {
    filename: String,
    mimetype: String,
    size: u64,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn upload(
    user: AuthUser,
    State(db_pool): State<SqlitePool>,
    State(store): State<UploadStore>,
    State(mail): State<Mail>,
    multipart: Multipart,
) -> AppResult<Json<Upload>> {
    user.require_teacher("Only teachers can upload")?;
    let AuthUser(claims) = user;

    let mut form = UploadForm::default();
    let checked = match form.read(&store, multipart).await {
        Ok(()) => form.check(&db_pool).await,
        Err(err) => Err(err),
    };

    let (classroom_id, kind, staged) = match (checked, form.file) {
        (Ok((classroom_id, kind)), Some(staged)) => (classroom_id, kind, staged),
        (result, staged) => {
            if let Some(staged) = staged {
                store.discard(&staged.filename).await;
            }
            return Err(result.err().unwrap_or_else(|| AppError::BadRequest("No file uploaded".into())));
        }
    };

    let original_name = staged.original_name.clone();
    let stored = store_file(&store, staged).await?;

    let inserted = sqlx::query_as::<_, Upload>(
        "INSERT INTO uploads (classroom_id,teacher_id,filename,original_name,mimetype,size,url)
         VALUES (?,?,?,?,?,?,?)
         RETURNING *",
    )
    .bind(classroom_id)
    .bind(claims.id)
    .bind(&stored.filename)
    .bind(&original_name)
    .bind(&stored.mimetype)
    .bind(stored.size as i64)
    .bind(format!("/uploads/{}", stored.filename))
    .fetch_one(&db_pool)
    .await;

    let upload = match inserted {
        Ok(upload) => upload,
        Err(err) => {
            store.discard(&stored.filename).await;
            return Err(err.into());
        }
    };

    tracing::info!(
        upload = upload.id,
        classroom = classroom_id,
        filename = %upload.filename,
        size = upload.size,
        "stored upload"
    );

    if let Some(mailer) = mail.mailer() {
        let text = format!("{} uploaded a new {}: {}", claims.name, kind.as_str(), original_name);
        tokio::spawn(async move {
            if let Err(err) = mail::notify_classroom(&db_pool, mailer.as_ref(), classroom_id, &text).await {
                tracing::warn!(classroom = classroom_id, "upload notification failed: {err}");
            }
        });
    }

    Ok(Json(upload))
}

/// Videos are re-encoded and the original dropped; everything else is kept as is.
/// The recorded size is always that of the file as uploaded.
async fn store_file(store: &UploadStore, staged: Staged) -> AppResult<Stored> {
    if !policy::is_video(&staged.mime) {
        return Ok(Stored {
            filename: staged.filename,
            mimetype: staged.mime,
            size: staged.size,
        });
    }

    let stem = Path::new(&staged.filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(&staged.filename);
    let output = format!("compressed-{stem}.mp4");

    let transcoded = store
        .transcoder()
        .transcode(&store.path_of(&staged.filename), &store.path_of(&output))
        .await;
    store.discard(&staged.filename).await;

    match transcoded {
        Ok(()) => Ok(Stored {
            filename: output,
            mimetype: "video/mp4".into(),
            size: staged.size,
        }),
        Err(err) => {
            store.discard(&output).await;
            Err(AppError::internal("Transcoding failed", err))
        }
    }
}

fn malformed(err: MultipartError) -> AppError {
    tracing::debug!("bad multipart body: {err}");
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge(err.body_text()),
        _ => AppError::BadRequest(err.body_text()),
    }
}

/// Keeps the last path segment, with anything unusual replaced by `_`.
fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let clean = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>();

    match clean.trim_start_matches('.') {
        "" => "upload".to_owned(),
        clean => clean.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_names_stay_inside_the_upload_dir() {
        assert_eq!(sanitize("notes.pdf"), "notes.pdf");
        assert_eq!(sanitize("../../etc/passwd"), "passwd");
        assert_eq!(sanitize("C:\\Users\\t\\week 1.mp4"), "week_1.mp4");
        assert_eq!(sanitize(".."), "upload");
        assert_eq!(sanitize(""), "upload");
    }
}
