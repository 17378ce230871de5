//! Derived-artifact generation through an external ffmpeg process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Length of the preview clip, in seconds.
pub const PREVIEW_SECONDS: u32 = 5;
/// Frame rate of the preview clip.
pub const PREVIEW_FPS: u32 = 10;
/// Width of both artifacts; height follows the aspect ratio.
pub const SCALE_WIDTH: u32 = 320;
/// Offset of the thumbnail frame.
pub const THUMBNAIL_TIMESTAMP: &str = "00:00:01";

/// Keep at most this much of ffmpeg's stderr in an error.
const STDERR_TAIL: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Preview,
    Thumbnail,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Preview => f.write_str("preview"),
            Step::Thumbnail => f.write_str("thumbnail"),
        }
    }
}

/// The opaque transcoder: one input file in, one output file out.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn preview(&self, input: &Path, output: &Path) -> MediaResult<()>;

    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Argument builder for a single ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    output_args: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add an output argument (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn duration(self, seconds: u32) -> Self {
        self.output_arg("-t").output_arg(seconds.to_string())
    }

    pub fn seek(self, timestamp: impl Into<String>) -> Self {
        self.output_arg("-ss").output_arg(timestamp)
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn single_frame(self) -> Self {
        self.output_arg("-vframes").output_arg("1")
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// 5 second clip at 10 fps, scaled to 320px wide.
pub fn preview_command(input: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .duration(PREVIEW_SECONDS)
        .video_filter(format!("fps={PREVIEW_FPS},scale={SCALE_WIDTH}:-1"))
}

/// Single frame at the one second mark, scaled to 320px wide.
pub fn thumbnail_command(input: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .seek(THUMBNAIL_TIMESTAMP)
        .single_frame()
        .video_filter(format!("scale={SCALE_WIDTH}:-1"))
}

/// [`Transcoder`] backed by an ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Resolves the executable on `PATH`, if it can be found.
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    async fn run(&self, step: Step, cmd: &FfmpegCommand) -> MediaResult<()> {
        let args = cmd.build_args();
        debug!("Running {} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| MediaError::Spawn { step, source })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let start = stderr
            .char_indices()
            .rev()
            .nth(STDERR_TAIL - 1)
            .map_or(0, |(i, _)| i);

        Err(MediaError::Failed {
            step,
            exit_code: output.status.code(),
            stderr: stderr[start..].to_string(),
        })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn preview(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.run(Step::Preview, &preview_command(input, output)).await
    }

    async fn thumbnail(&self, input: &Path, output: &Path) -> MediaResult<()> {
        self.run(Step::Thumbnail, &thumbnail_command(input, output))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_arguments() {
        let args = preview_command(
            Path::new("uploads/video_a.mp4"),
            Path::new("uploads/video_a.mp4_preview.gif"),
        )
        .build_args();

        assert_eq!(
            args,
            [
                "-y",
                "-v",
                "error",
                "-i",
                "uploads/video_a.mp4",
                "-t",
                "5",
                "-vf",
                "fps=10,scale=320:-1",
                "uploads/video_a.mp4_preview.gif",
            ]
        );
    }

    #[test]
    fn thumbnail_arguments() {
        let args = thumbnail_command(
            Path::new("uploads/video_a.mp4"),
            Path::new("uploads/video_a.mp4_thumbnail.jpg"),
        )
        .build_args();

        assert_eq!(
            args,
            [
                "-y",
                "-v",
                "error",
                "-i",
                "uploads/video_a.mp4",
                "-ss",
                "00:00:01",
                "-vframes",
                "1",
                "-vf",
                "scale=320:-1",
                "uploads/video_a.mp4_thumbnail.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let transcoder = FfmpegTranscoder::new("/nonexistent/ffmpeg-for-tests");
        assert!(transcoder.locate().is_none());

        let err = transcoder
            .preview(Path::new("in.mp4"), Path::new("out.gif"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Spawn { step: Step::Preview, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_failure() {
        // `false` ignores its arguments and exits with 1.
        let transcoder = FfmpegTranscoder::new("false");

        let err = transcoder
            .thumbnail(Path::new("in.mp4"), Path::new("out.jpg"))
            .await
            .unwrap_err();
        match err {
            MediaError::Failed {
                step, exit_code, ..
            } => {
                assert_eq!(step, Step::Thumbnail);
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
