use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, bail, Result};

/// GIFs below this rate stutter instead of animating.
pub const MIN_FPS: u32 = 4;

/// Two-pass palette chain tuned for flat illustrative frames: a bounded
/// palette keeps the file small, ordered dithering keeps gradients stable
/// across frames.
const PALETTE_FILTER: &str =
    "split[s0][s1];[s0]palettegen=max_colors=128[p];[s1][p]paletteuse=dither=bayer:bayer_scale=3";

/// Encodes a captured frame sequence into an infinitely looping GIF by
/// invoking ffmpeg over the `frame-%03d.png` pattern in `frames_dir`.
pub fn encode_gif(frames_dir: &Path, fps: u32, output_path: &Path) -> Result<()> {
    let ffmpeg_path = resolve_ffmpeg_path()?;

    let path_str = output_path.to_string_lossy();
    if path_str.chars().any(|c| c.is_control()) {
        bail!("output path contains invalid control characters");
    }

    let args = gif_args(frames_dir, fps, output_path);
    let output = Command::new(&ffmpeg_path)
        .args(args.iter().map(String::as_str))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                anyhow!(
                    "ffmpeg executable not found (resolved_path={}). Install ffmpeg, or build with `--features sidecar_ffmpeg` for an auto-downloaded binary.",
                    ffmpeg_path.display()
                )
            } else {
                anyhow!(
                    "failed to spawn ffmpeg (resolved_path={}, args='{}'): {error}",
                    ffmpeg_path.display(),
                    args.join(" ")
                )
            }
        })?;

    if !output.status.success() {
        let stderr_tail = last_n_chars(&String::from_utf8_lossy(&output.stderr), 500);
        bail!(
            "ffmpeg failed with status {} encoding {} (args='{}', stderr_tail='{}')",
            output.status,
            output_path.display(),
            args.join(" "),
            stderr_tail
        );
    }

    Ok(())
}

fn gif_args(frames_dir: &Path, fps: u32, output_path: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-framerate".to_owned(),
        fps.max(MIN_FPS).to_string(),
        "-i".to_owned(),
        frames_dir
            .join("frame-%03d.png")
            .to_string_lossy()
            .into_owned(),
        "-vf".to_owned(),
        PALETTE_FILTER.to_owned(),
        "-loop".to_owned(),
        "0".to_owned(),
        output_path.to_string_lossy().into_owned(),
    ]
}

#[cfg(not(feature = "sidecar_ffmpeg"))]
fn resolve_ffmpeg_path() -> Result<PathBuf> {
    Ok(PathBuf::from("ffmpeg"))
}

#[cfg(feature = "sidecar_ffmpeg")]
fn resolve_ffmpeg_path() -> Result<PathBuf> {
    use anyhow::Context;

    let path = ffmpeg_sidecar::paths::ffmpeg_path();
    if !path.exists() {
        ffmpeg_sidecar::download::auto_download()
            .context("failed to auto-download ffmpeg sidecar binary")?;
    }
    Ok(path)
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars().collect::<Vec<_>>();
    if chars.len() > max_chars {
        chars = chars[chars.len().saturating_sub(max_chars)..].to_vec();
    }
    chars.into_iter().collect::<String>().trim().to_owned()
}
