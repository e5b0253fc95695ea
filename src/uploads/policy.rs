use std::str::FromStr;

use crate::{AppError, AppResult};

pub const MB: u64 = 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 200 * MB;
pub const MAX_FILE_BYTES: u64 = 20 * MB;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Lecture,
    Quiz,
}

impl UploadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadKind::Lecture => "lecture",
            UploadKind::Quiz => "quiz",
        }
    }
}

impl FromStr for UploadKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lecture" => Ok(UploadKind::Lecture),
            "quiz" => Ok(UploadKind::Quiz),
            other => Err(AppError::BadRequest(format!("Unknown upload type {other:?}"))),
        }
    }
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Limits are inclusive.
pub fn check(kind: UploadKind, mime: &str, size: u64) -> AppResult<()> {
    let violation = match kind {
        UploadKind::Lecture if is_video(mime) => (size > MAX_VIDEO_BYTES).then_some("Video exceeds 200MB limit"),
        UploadKind::Lecture => (size > MAX_FILE_BYTES).then_some("File exceeds 20MB limit"),
        UploadKind::Quiz => (mime != "application/pdf" || size > MAX_FILE_BYTES).then_some("Only PDFs ≤20MB allowed"),
    };

    match violation {
        Some(msg) => Err(AppError::BadRequest(msg.into())),
        None => Ok(()),
    }
}

/// Rejection for a file whose stream ran past [`MAX_VIDEO_BYTES`]. The form's
/// `type` may not have been read yet, in which case it counts as a lecture.
pub fn oversized(kind: Option<UploadKind>, mime: &str) -> AppError {
    match check(kind.unwrap_or(UploadKind::Lecture), mime, MAX_VIDEO_BYTES + 1) {
        Err(err) => err,
        Ok(()) => AppError::BadRequest("File exceeds 200MB limit".into()),
    }
}
