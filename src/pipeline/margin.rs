//! Whitespace-margin detection for figure crops.
//!
//! A provisional figure crop is deliberately oversized: it runs hundreds of
//! points below the label. The figure's visual content ends where a band of
//! blank rows begins, and [`detect_margin`] finds that band.
//!
//! ## Offset convention
//!
//! The returned row is the one that *confirmed* the white run, i.e.
//! `run_start + min_run - 1`. The crop therefore keeps `min_run - 1` rows of
//! whitespace below the figure, which pads the card image slightly and makes
//! a second pass over the cropped image find no further run.

use image::RgbImage;

/// Find the first band of `min_run` consecutive white rows.
///
/// A row is white iff every channel of every pixel is `>= tolerance`.
/// Returns the index of the row that completed the run, or the image height
/// when no such band exists (nothing to trim). `min_run == 0` behaves as 1.
pub fn detect_margin(image: &RgbImage, tolerance: u8, min_run: u32) -> u32 {
    let min_run = min_run.max(1);
    let mut run = 0u32;

    for (y, row) in image.enumerate_rows() {
        let white = row
            .into_iter()
            .all(|(_, _, px)| px.0.iter().all(|&c| c >= tolerance));
        if white {
            run += 1;
            if run == min_run {
                return y;
            }
        } else {
            run = 0;
        }
    }

    image.height()
}
