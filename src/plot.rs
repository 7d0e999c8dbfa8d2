use std::path::Path;

use image::{ImageBuffer, ImageResult, Rgb, RgbImage};

use crate::swr::SwrPair;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;

/// SWR values at or above this sit on the top edge of the plot.
pub const MAX_SWR: f64 = 10.0;

/// Vertical position of an SWR value on a log scale, 0.0 at SWR 1 and 1.0 at
/// [`MAX_SWR`].
pub fn swr_scale(swr: f64) -> f64 {
    (swr.max(1.0).ln() / MAX_SWR.ln()).clamp(0.0, 1.0)
}

/// Draw the SWR curve against frequency, colored by how bad the match is.
/// Gaps in frequency coverage stay visible as gaps in the curve.
pub fn render_swr(pairs: &[SwrPair]) -> RgbImage {
    let mut imgbuf: RgbImage = ImageBuffer::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));
    if pairs.is_empty() {
        return imgbuf;
    }

    let gradient = colorous::TURBO;
    let min_freq = pairs.iter().map(|p| p.frequency).fold(f64::INFINITY, f64::min);
    let max_freq = pairs.iter().map(|p| p.frequency).fold(f64::NEG_INFINITY, f64::max);
    let span = max_freq - min_freq;

    let mut previous: Option<(u32, u32)> = None;
    for pair in pairs {
        let level = swr_scale(pair.swr);
        let position = if span > 0.0 {
            (pair.frequency - min_freq) / span
        } else {
            0.0
        };
        let x = (position * (WIDTH - 1) as f64).round() as u32;
        let y = ((1.0 - level) * (HEIGHT - 1) as f64).round() as u32;
        let color = gradient.eval_continuous(level);
        let pixel = Rgb([color.r, color.g, color.b]);

        // join consecutive points with a vertical run so the curve stays connected
        let (from, to) = match previous {
            Some((px, py)) if x <= px + 1 && px <= x + 1 => (py.min(y), py.max(y)),
            _ => (y, y),
        };
        for row in from..=to {
            imgbuf.put_pixel(x, row, pixel);
        }
        previous = Some((x, y));
    }

    imgbuf
}

pub fn save_swr_image(pairs: &[SwrPair], path: &Path) -> ImageResult<()> {
    render_swr(pairs).save(path)
}
