//! FFmpeg command builder and blocking runners.
//!
//! Generation runs on a blocking thread, so commands here use
//! `std::process` and pipe raw `rgb24` frames through stdin/stdout.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStdin, Command, Stdio};
use std::thread;
use std::time::Instant;
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::FrameRate;

/// Pixel format exchanged with FFmpeg over pipes.
pub const RAW_PIXEL_FORMAT: &str = "rgb24";

/// One side of an FFmpeg invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    File(PathBuf),
    Pipe,
}

impl Endpoint {
    fn as_arg(&self, pipe: &str) -> String {
        match self {
            Endpoint::File(path) => path.to_string_lossy().to_string(),
            Endpoint::Pipe => pipe.to_string(),
        }
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: Endpoint,
    output: Endpoint,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a file-to-file command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: Endpoint::File(input.as_ref().to_path_buf()),
            output: Endpoint::File(output.as_ref().to_path_buf()),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Decode `input` into raw `rgb24` frames on stdout.
    pub fn raw_frames_from(input: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new(input, "-");
        cmd.output = Endpoint::Pipe;
        cmd.output_args(["-f", "rawvideo", "-pix_fmt", RAW_PIXEL_FORMAT])
    }

    /// Encode raw `rgb24` frames read from stdin into `output`.
    pub fn raw_frames_to(
        output: impl AsRef<Path>,
        width: u32,
        height: u32,
        rate: FrameRate,
    ) -> Self {
        let mut cmd = Self::new("-", output);
        cmd.input = Endpoint::Pipe;
        cmd.input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            RAW_PIXEL_FORMAT.to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            rate.as_ffmpeg_arg(),
        ])
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());
        args.push("-nostdin".to_string());

        args.extend(self.input_args.clone());
        args.push("-i".to_string());
        args.push(self.input.as_arg("pipe:0"));

        args.extend(self.output_args.clone());
        args.push(self.output.as_arg("pipe:1"));

        args
    }

    /// Whether this command reads frames from stdin.
    fn reads_stdin(&self) -> bool {
        self.input == Endpoint::Pipe
    }
}

/// Captured result of a finished FFmpeg process.
#[derive(Debug)]
pub struct FfmpegOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Run a command to completion and capture stdout.
///
/// A non-zero exit is returned in [`FfmpegOutput`] rather than as an error,
/// so callers can keep whatever was decoded before a corrupt tail.
pub fn run_capture(cmd: &FfmpegCommand) -> MediaResult<FfmpegOutput> {
    check_ffmpeg()?;

    let args = cmd.build_args();
    debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

    let start = Instant::now();
    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;
    metrics::record_ffmpeg_duration("decode", start.elapsed().as_secs_f64());

    Ok(FfmpegOutput {
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code(),
        success: output.status.success(),
    })
}

/// Run a command that consumes stdin, feeding it through `feed`.
pub fn run_with_stdin<F>(cmd: &FfmpegCommand, feed: F) -> MediaResult<()>
where
    F: FnOnce(&mut ChildStdin) -> std::io::Result<()>,
{
    check_ffmpeg()?;
    if !cmd.reads_stdin() {
        return Err(MediaError::internal("FFmpeg command does not read stdin"));
    }

    let args = cmd.build_args();
    debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

    let start = Instant::now();
    let mut child = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain stderr on its own thread so a chatty encoder cannot block stdin.
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;
    let stderr_reader = thread::spawn(move || {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf);
        buf
    });

    let feed_result = {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdin not captured"))?;
        let result = feed(&mut stdin).and_then(|_| stdin.flush());
        drop(stdin);
        result
    };

    let status = child.wait()?;
    let stderr = stderr_reader.join().unwrap_or_default();
    metrics::record_ffmpeg_duration("encode", start.elapsed().as_secs_f64());

    if !status.success() {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some(stderr),
            status.code(),
        ));
    }
    feed_result?;
    Ok(())
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
