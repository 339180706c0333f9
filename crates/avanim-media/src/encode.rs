//! Output video encoding.

use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::command::{run_with_stdin, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::probe::FrameRate;

/// Output container family, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// H.264 in mp4/mov/mkv/avi
    H264,
    /// VP9 in webm
    Vp9,
    Gif,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("webm") => OutputFormat::Vp9,
            Some("gif") => OutputFormat::Gif,
            _ => OutputFormat::H264,
        }
    }

    fn apply(self, cmd: FfmpegCommand) -> FfmpegCommand {
        match self {
            OutputFormat::H264 => cmd
                .video_codec("libx264")
                .pixel_format("yuv420p")
                .crf(18)
                .output_args(["-movflags", "+faststart"]),
            OutputFormat::Vp9 => cmd
                .video_codec("libvpx-vp9")
                .pixel_format("yuv420p")
                .crf(32)
                .output_args(["-b:v", "0"]),
            OutputFormat::Gif => cmd.output_args(["-f", "gif"]),
        }
    }
}

/// Encode `frames` to `output_path` at `rate`.
pub fn encode_frames(output_path: &Path, frames: &[Frame], rate: FrameRate) -> MediaResult<()> {
    let first = frames
        .first()
        .ok_or_else(|| MediaError::internal("no frames to encode"))?;
    let (width, height) = (first.width(), first.height());
    if frames
        .iter()
        .any(|f| f.width() != width || f.height() != height)
    {
        return Err(MediaError::internal("frames differ in size"));
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let format = OutputFormat::from_path(output_path);
    let cmd = format.apply(FfmpegCommand::raw_frames_to(output_path, width, height, rate));

    run_with_stdin(&cmd, |stdin| {
        for frame in frames {
            stdin.write_all(frame.as_bytes())?;
        }
        Ok(())
    })?;

    info!(
        output = %output_path.display(),
        frames = frames.len(),
        frame_rate = %rate,
        format = ?format,
        "Encoded animation"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("a.mp4")), OutputFormat::H264);
        assert_eq!(OutputFormat::from_path(Path::new("a.MOV")), OutputFormat::H264);
        assert_eq!(OutputFormat::from_path(Path::new("a.webm")), OutputFormat::Vp9);
        assert_eq!(OutputFormat::from_path(Path::new("a.gif")), OutputFormat::Gif);
        assert_eq!(OutputFormat::from_path(Path::new("noext")), OutputFormat::H264);
    }

    #[test]
    fn test_h264_args() {
        let cmd = OutputFormat::H264.apply(FfmpegCommand::raw_frames_to(
            "out.mp4",
            256,
            256,
            FrameRate::new(25, 1),
        ));
        let args = cmd.build_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
    }

    #[test]
    fn test_encode_rejects_empty() {
        let dir = tempfile::tempdir().unwrap();
        let err = encode_frames(&dir.path().join("out.mp4"), &[], FrameRate::default());
        assert!(err.is_err());
    }
}
