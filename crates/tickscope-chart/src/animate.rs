//! GIF assembly from rendered bar-chart frames.
//!
//! Collects `liquidity_bar_chart_<ts>.png` files, sorts them by embedded
//! timestamp and encodes an animated GIF at a fixed frame duration. Frames
//! that fail to decode are skipped with a warning so one corrupt file cannot
//! sink the whole animation.

use eyre::{eyre, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Prefix of bar-chart frame file names.
const FRAME_PREFIX: &str = "liquidity_bar_chart_";

/// Lists bar-chart frames in `dir`, ascending by embedded timestamp.
///
/// # Errors
/// Returns error if the directory cannot be read.
pub fn collect_bar_frames(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .wrap_err_with(|| format!("failed to list chart directory {}", dir.display()))?;

    let mut frames = Vec::new();
    for entry in entries {
        let entry = entry.wrap_err("failed to read directory entry")?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(ts) = name
            .strip_prefix(FRAME_PREFIX)
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|ts| ts.parse::<u64>().ok())
        else {
            continue;
        };
        frames.push((ts, entry.path()));
    }

    frames.sort();
    Ok(frames)
}

/// Assembles the frames in `bar_dir` into an animated GIF at `output`.
///
/// # Errors
/// Returns error if no frame decodes, or if encoding/writing fails.
pub fn assemble_gif(bar_dir: &Path, output: &Path, frame_ms: u32) -> Result<PathBuf> {
    let frames = collect_bar_frames(bar_dir)?;
    if frames.is_empty() {
        return Err(eyre!("no bar-chart frames in {}", bar_dir.display()));
    }

    let file = std::fs::File::create(output)
        .wrap_err_with(|| format!("failed to create {}", output.display()))?;
    let mut encoder = GifEncoder::new(file);
    encoder
        .set_repeat(Repeat::Infinite)
        .wrap_err("failed to configure GIF looping")?;

    let mut encoded = 0usize;
    for (ts, path) in &frames {
        let rgba = match image::open(path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping undecodable frame");
                continue;
            }
        };
        let frame = Frame::from_parts(rgba, 0, 0, Delay::from_numer_denom_ms(frame_ms, 1));
        encoder
            .encode_frame(frame)
            .wrap_err_with(|| format!("failed to encode frame {ts}"))?;
        encoded += 1;
    }

    if encoded == 0 {
        return Err(eyre!("no frame could be decoded from {}", bar_dir.display()));
    }

    info!(
        path = %output.display(),
        frames = encoded,
        skipped = frames.len() - encoded,
        "animation saved"
    );
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_sort_by_timestamp_and_ignore_strangers() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "liquidity_bar_chart_300.png",
            "liquidity_bar_chart_100.png",
            "liquidity_bar_chart_200.png",
            "liquidity_line_chart_50.png",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }

        let frames = collect_bar_frames(dir.path()).expect("collect");
        let timestamps: Vec<u64> = frames.iter().map(|(ts, _)| *ts).collect();
        assert_eq!(timestamps, vec![100, 200, 300]);
    }

    #[test]
    fn empty_directory_yields_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.gif");
        assert!(assemble_gif(dir.path(), &out, 1000).is_err());
    }

    #[test]
    fn undecodable_frames_alone_yield_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("liquidity_bar_chart_1.png"), b"not a png")
            .expect("write");
        let out = dir.path().join("out.gif");
        assert!(assemble_gif(dir.path(), &out, 1000).is_err());
    }
}
