mod delete;
mod list;
mod policy;
mod transcode;
mod upload;

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get},
    Router,
};

use crate::AppState;

pub use policy::{check, UploadKind, MAX_FILE_BYTES, MAX_VIDEO_BYTES, MB};
pub use transcode::{Ffmpeg, Transcoder};

/// Transport cap for an upload request. Oversized files are stopped while
/// staging, well below this, so they get a policy message instead of a 413.
pub const MAX_BODY_BYTES: u64 = MAX_VIDEO_BYTES + 64 * MB;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/uploads",
            get(list::list_uploads)
                .post(upload::upload)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES as usize)),
        )
        .route("/uploads/{id}", delete(delete::delete_upload))
}

/// Where uploaded files live and how videos get re-encoded.
#[derive(Clone)]
pub struct UploadStore {
    dir: PathBuf,
    transcoder: Arc<dyn Transcoder>,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, transcoder: impl Transcoder + 'static) -> Self {
        UploadStore {
            dir: dir.into(),
            transcoder: Arc::new(transcoder),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn transcoder(&self) -> &dyn Transcoder {
        self.transcoder.as_ref()
    }

    pub fn path_of(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// A file that is already gone counts as removed.
    pub async fn remove(&self, filename: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_of(filename)).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    /// Best-effort cleanup for error paths.
    pub(crate) async fn discard(&self, filename: &str) {
        if let Err(err) = self.remove(filename).await {
            tracing::warn!(filename, "could not remove upload: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removing_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path(), Ffmpeg::new("ffmpeg"));
        tokio::fs::write(store.path_of("a.pdf"), b"%PDF").await.unwrap();

        store.remove("a.pdf").await.unwrap();
        assert!(!store.path_of("a.pdf").exists());
        store.remove("a.pdf").await.unwrap();
    }
}
