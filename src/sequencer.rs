use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;

use crate::capture::CaptureDriver;
use crate::payload::RenderRequest;
use crate::scenes::SceneConfig;

/// Animations below this frame count loop too harshly to read.
pub const MIN_FRAMES: u32 = 8;

/// Captures one still per frame index into `frames_dir`, strictly in order.
/// Filenames are zero-padded so the lexicographic order is the frame order
/// and the encoder can consume the directory without a separate index.
pub async fn capture_frames(
    driver: &CaptureDriver,
    scenes: &SceneConfig,
    base: &RenderRequest,
    frame_count: u32,
    settle: Duration,
    frames_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let frame_count = frame_count.max(MIN_FRAMES);
    let mut frame_paths = Vec::with_capacity(frame_count as usize);

    for frame in 0..frame_count {
        let request = base.clone().with_frame(frame, frame_count);
        let frame_path = frames_dir.join(frame_file_name(frame));
        driver
            .capture_png(scenes, &request, settle, &frame_path)
            .await?;
        eprintln!(
            "rendered frame {}/{} for scene '{}'",
            frame + 1,
            frame_count,
            base.scene
        );
        frame_paths.push(frame_path);
    }

    Ok(frame_paths)
}

pub fn frame_file_name(frame: u32) -> String {
    format!("frame-{frame:03}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_names_are_zero_padded_and_sortable() {
        assert_eq!(frame_file_name(0), "frame-000.png");
        assert_eq!(frame_file_name(7), "frame-007.png");
        assert_eq!(frame_file_name(123), "frame-123.png");

        let mut names = vec![frame_file_name(10), frame_file_name(2), frame_file_name(0)];
        names.sort();
        assert_eq!(names, vec!["frame-000.png", "frame-002.png", "frame-010.png"]);
    }

    #[test]
    fn per_frame_requests_carry_index_and_total() {
        let base = RenderRequest::new("gitops-loop", "industrial-control");
        let request = base.clone().with_frame(5, 24);
        assert_eq!(request.frame, 5);
        assert_eq!(request.total_frames, 24);
        assert_eq!(request.scene, base.scene);
    }
}
