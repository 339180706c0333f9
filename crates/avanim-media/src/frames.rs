//! Driving video decoding.

use std::path::Path;
use tracing::{debug, warn};

use crate::command::{run_capture, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::frame::Frame;
use crate::probe::{probe_video, FrameRate};

/// Decoded driving sequence with the container's original rate.
#[derive(Debug, Clone)]
pub struct DrivingVideo {
    pub frames: Vec<Frame>,
    pub frame_rate: FrameRate,
}

/// Decode every readable frame of `path` at `size`x`size` RGB.
///
/// A truncated or corrupt tail ends extraction without an error as long as
/// at least one whole frame came out.
pub fn decode_driving_video(path: &Path, size: u32) -> MediaResult<DrivingVideo> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let info = probe_video(path)?;
    debug!(
        path = %path.display(),
        width = info.width,
        height = info.height,
        frame_rate = %info.frame_rate,
        "Probed driving video"
    );

    let cmd = FfmpegCommand::raw_frames_from(path).video_filter(format!("scale={size}:{size}"));
    let output = run_capture(&cmd)?;

    let frames = split_frames(&output.stdout, size)?;

    if !output.success {
        if frames.is_empty() {
            return Err(MediaError::ffmpeg_failed(
                format!("could not decode {}", path.display()),
                Some(output.stderr),
                output.exit_code,
            ));
        }
        warn!(
            path = %path.display(),
            frames = frames.len(),
            exit_code = ?output.exit_code,
            "Decoder stopped early; keeping frames read so far"
        );
    }

    if frames.is_empty() {
        return Err(MediaError::invalid_video(format!(
            "no frames decoded from {}",
            path.display()
        )));
    }

    Ok(DrivingVideo {
        frames,
        frame_rate: info.frame_rate,
    })
}

/// Cut a raw rgb24 byte stream into frames, discarding a partial last frame.
fn split_frames(raw: &[u8], size: u32) -> MediaResult<Vec<Frame>> {
    let frame_len = Frame::byte_len(size, size);
    if frame_len == 0 {
        return Err(MediaError::internal("frame size must be non-zero"));
    }

    let chunks = raw.chunks_exact(frame_len);
    let trailing = chunks.remainder().len();
    if trailing > 0 {
        debug!(bytes = trailing, "Dropping partial trailing frame");
    }

    chunks
        .map(|chunk| Frame::from_rgb(size, size, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_frames_drops_partial_tail() {
        let frame_len = Frame::byte_len(4, 4);
        let mut raw = vec![7u8; frame_len * 2];
        raw.extend(vec![1u8; frame_len / 2]);

        let frames = split_frames(&raw, 4).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.width() == 4 && f.height() == 4));
    }

    #[test]
    fn test_split_frames_empty() {
        assert!(split_frames(&[], 4).unwrap().is_empty());
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_driving_video(Path::new("/nonexistent/drive.mp4"), 256).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
