use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;

/// Re-encodes a video to H.264, at most 720 px tall.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> anyhow::Result<()>;
}

/// Shells out to an `ffmpeg` binary.
pub struct Ffmpeg {
    program: PathBuf,
}

impl Ffmpeg {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Ffmpeg { program: program.into() }
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, input: &Path, output: &Path) -> anyhow::Result<()> {
        tracing::info!(input = %input.display(), output = %output.display(), "transcoding");

        let out = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-c:v", "libx264", "-vf", "scale=-2:'min(720,ih)'", "-c:a", "aac"])
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawning {}", self.program.display()))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let tail = stderr.lines().rev().take(5).collect::<Vec<_>>();
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            );
        }

        Ok(())
    }
}
