//! Template matching and coordinate helpers.
//!
//! Scores are zero-mean normalized cross-correlation (`TM_CCOEFF_NORMED`):
//! 1.0 is a perfect match, 0.0 no correlation. Windows with no contrast score 0.

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use crate::config::HsvRange;
use crate::error::VisionError;
use maple_state::Position;

/// Pre-processed grayscale template
#[derive(Debug, Clone)]
pub struct Template {
    width: u32,
    height: u32,
    /// Pixel values minus the template mean, row-major
    centered: Vec<f64>,
    /// sqrt of the sum of squared centered values
    norm: f64,
}

impl Template {
    pub fn new(gray: &GrayImage) -> Result<Self, VisionError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(VisionError::EmptyTemplate);
        }

        let n = (width * height) as f64;
        let mean = gray.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        let centered: Vec<f64> = gray.pixels().map(|p| p[0] as f64 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < 1e-6 {
            return Err(VisionError::FlatTemplate);
        }

        Ok(Self {
            width,
            height,
            centered,
            norm,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Match scores for every placement of a template's top-left corner
#[derive(Debug, Clone)]
pub struct ScoreMap {
    pub width: u32,
    pub height: u32,
    scores: Vec<f32>,
}

impl ScoreMap {
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.scores[(y * self.width + x) as usize]
    }
}

/// Summed-area table of values and squared values, (w+1) x (h+1)
struct Integral {
    stride: usize,
    sum: Vec<f64>,
    sq: Vec<f64>,
}

impl Integral {
    fn new(frame: &GrayImage) -> Self {
        let (w, h) = (frame.width() as usize, frame.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sq = vec![0.0; stride * (h + 1)];
        let raw = frame.as_raw();

        for y in 0..h {
            let mut row_sum = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = raw[y * w + x] as f64;
                row_sum += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row_sum;
                sq[(y + 1) * stride + x + 1] = sq[y * stride + x + 1] + row_sq;
            }
        }

        Self { stride, sum, sq }
    }

    fn window(table: &[f64], stride: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
        table[(y + h) * stride + x + w] - table[y * stride + x + w] - table[(y + h) * stride + x]
            + table[y * stride + x]
    }
}

/// Score every placement of `template` inside `frame`
pub fn correlate(frame: &GrayImage, template: &Template) -> Result<ScoreMap, VisionError> {
    let (fw, fh) = frame.dimensions();
    let (tw, th) = template.dimensions();
    if tw > fw || th > fh {
        return Err(VisionError::TemplateTooLarge {
            template: (tw, th),
            frame: (fw, fh),
        });
    }

    let out_w = (fw - tw + 1) as usize;
    let out_h = (fh - th + 1) as usize;
    let (fw, tw, th) = (fw as usize, tw as usize, th as usize);
    let n = (tw * th) as f64;
    let integral = Integral::new(frame);
    let raw = frame.as_raw();

    let mut scores = vec![0.0f32; out_w * out_h];
    scores
        .par_chunks_mut(out_w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, score) in row.iter_mut().enumerate() {
                let s = Integral::window(&integral.sum, integral.stride, x, y, tw, th);
                let sq = Integral::window(&integral.sq, integral.stride, x, y, tw, th);
                let variance = sq - s * s / n;
                if variance <= 1e-6 {
                    continue;
                }

                let mut cross = 0.0;
                for j in 0..th {
                    let frame_row = &raw[(y + j) * fw + x..(y + j) * fw + x + tw];
                    let tmpl_row = &template.centered[j * tw..(j + 1) * tw];
                    for (p, t) in frame_row.iter().zip(tmpl_row) {
                        cross += *p as f64 * t;
                    }
                }

                *score = (cross / (template.norm * variance.sqrt())).clamp(-1.0, 1.0) as f32;
            }
        });

    Ok(ScoreMap {
        width: out_w as u32,
        height: out_h as u32,
        scores,
    })
}

/// Highest-scoring placement: `(score, top_left)`. Ties keep the first in
/// row-major order.
pub fn match_best(frame: &GrayImage, template: &Template) -> Result<(f64, (u32, u32)), VisionError> {
    let map = correlate(frame, template)?;
    let mut best = (f64::NEG_INFINITY, (0, 0));
    for y in 0..map.height {
        for x in 0..map.width {
            let score = map.get(x, y) as f64;
            if score > best.0 {
                best = (score, (x, y));
            }
        }
    }
    Ok(best)
}

/// Centers of every placement scoring at least `threshold`, best first.
///
/// Placements closer than half a template to a better one on both axes are
/// treated as the same occurrence and dropped.
pub fn match_all(
    frame: &GrayImage,
    template: &Template,
    threshold: f64,
) -> Result<Vec<(u32, u32)>, VisionError> {
    let map = correlate(frame, template)?;
    let mut candidates: Vec<(f32, u32, u32)> = Vec::new();
    for y in 0..map.height {
        for x in 0..map.width {
            let score = map.get(x, y);
            if score as f64 >= threshold {
                candidates.push((score, x, y));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let (tw, th) = template.dimensions();
    let min_dx = (tw / 2).max(1);
    let min_dy = (th / 2).max(1);
    let mut accepted: Vec<(u32, u32)> = Vec::new();
    for (_, x, y) in candidates {
        let overlaps = accepted
            .iter()
            .any(|&(ax, ay)| ax.abs_diff(x) < min_dx && ay.abs_diff(y) < min_dy);
        if !overlaps {
            accepted.push((x, y));
        }
    }

    Ok(accepted
        .into_iter()
        .map(|(x, y)| (x + tw / 2, y + th / 2))
        .collect())
}

/// Convert an RGB pixel to HSV on OpenCV's 8-bit scale
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [(h / 2.0).round() as u8, s.round() as u8, max as u8]
}

/// Black out every pixel whose HSV value falls outside all `ranges`
pub fn filter_color(frame: &RgbaImage, ranges: &[HsvRange]) -> RgbaImage {
    let mut out = frame.clone();
    for pixel in out.pixels_mut() {
        let hsv = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let keep = ranges.iter().any(|(lo, hi)| {
            (0..3).all(|c| hsv[c] >= lo[c] && hsv[c] <= hi[c])
        });
        if !keep {
            *pixel = image::Rgba([0, 0, 0, pixel[3]]);
        }
    }
    out
}

/// Pixel position as a fraction of a region's width and height
pub fn to_relative(pixel: (u32, u32), dimensions: (u32, u32)) -> Position {
    Position::new(
        pixel.0 as f64 / dimensions.0 as f64,
        pixel.1 as f64 / dimensions.1 as f64,
    )
}

/// Inverse of [`to_relative`]
pub fn to_pixel(position: Position, dimensions: (u32, u32)) -> (f64, f64) {
    (
        position.x * dimensions.0 as f64,
        position.y * dimensions.1 as f64,
    )
}

pub fn distance(a: &Position, b: &Position) -> f64 {
    a.distance(b)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Deterministic high-entropy pattern so shifted copies do not correlate
    pub(crate) fn noise(seed: u32) -> impl Fn(u32, u32) -> image::Luma<u8> {
        move |x, y| {
            let mut v = x
                .wrapping_mul(73_856_093)
                ^ y.wrapping_mul(19_349_663)
                ^ seed.wrapping_mul(83_492_791);
            v ^= v >> 13;
            v = v.wrapping_mul(0x5bd1_e995);
            v ^= v >> 15;
            image::Luma([(v % 251) as u8])
        }
    }

    fn paste(frame: &mut GrayImage, patch: &GrayImage, at: (u32, u32)) {
        image::imageops::replace(frame, patch, at.0 as i64, at.1 as i64);
    }

    #[test]
    fn test_match_best_finds_exact_location() {
        let patch = GrayImage::from_fn(12, 9, noise(1));
        let mut frame = GrayImage::from_pixel(80, 60, image::Luma([40]));
        paste(&mut frame, &patch, (31, 17));

        let template = Template::new(&patch).unwrap();
        let (score, top_left) = match_best(&frame, &template).unwrap();
        assert_eq!(top_left, (31, 17));
        assert!((score - 1.0).abs() < 1e-4, "score {}", score);
    }

    #[test]
    fn test_match_all_no_occurrence_is_empty() {
        let patch = GrayImage::from_fn(8, 8, noise(2));
        let frame = GrayImage::from_pixel(50, 50, image::Luma([90]));
        let template = Template::new(&patch).unwrap();
        let matches = match_all(&frame, &template, 0.8).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_match_all_suppresses_duplicates() {
        let patch = GrayImage::from_fn(10, 10, noise(3));
        let mut frame = GrayImage::from_pixel(100, 40, image::Luma([20]));
        paste(&mut frame, &patch, (5, 5));
        paste(&mut frame, &patch, (60, 20));

        let template = Template::new(&patch).unwrap();
        // Low threshold lets neighbouring partial overlaps through
        let matches = match_all(&frame, &template, 0.5).unwrap();
        assert_eq!(matches.len(), 2, "{:?}", matches);
        assert!(matches.contains(&(10, 10)));
        assert!(matches.contains(&(65, 25)));
    }

    #[test]
    fn test_template_larger_than_frame() {
        let patch = GrayImage::from_fn(30, 30, noise(4));
        let frame = GrayImage::from_fn(20, 40, noise(5));
        let template = Template::new(&patch).unwrap();
        assert_eq!(
            match_all(&frame, &template, 0.9),
            Err(VisionError::TemplateTooLarge {
                template: (30, 30),
                frame: (20, 40)
            })
        );
    }

    #[test]
    fn test_flat_and_empty_templates_rejected() {
        let flat = GrayImage::from_pixel(5, 5, image::Luma([7]));
        assert_eq!(Template::new(&flat).unwrap_err(), VisionError::FlatTemplate);
        let empty = GrayImage::new(0, 3);
        assert_eq!(Template::new(&empty).unwrap_err(), VisionError::EmptyTemplate);
    }

    #[test]
    fn test_relative_round_trip() {
        let dims = (173, 91);
        for pixel in [(0, 0), (172, 90), (57, 13), (100, 45)] {
            let rel = to_relative(pixel, dims);
            let (x, y) = to_pixel(rel, dims);
            assert!((x - pixel.0 as f64).abs() < 1e-9);
            assert!((y - pixel.1 as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_hsv_conversion() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_filter_color_keeps_only_in_range() {
        // HSV (143, 153, 250) is a light magenta
        let rune = image::Rgba([232, 100, 250, 255]);
        let hsv = rgb_to_hsv(232, 100, 250);
        assert!((141..=146).contains(&hsv[0]), "{:?}", hsv);
        assert!((148..=158).contains(&hsv[1]), "{:?}", hsv);

        let frame = RgbaImage::from_fn(4, 1, |x, _| {
            if x == 2 {
                rune
            } else {
                image::Rgba([30, 200, 40, 255])
            }
        });
        let ranges = vec![([141, 148, 245], [146, 158, 255])];
        let filtered = filter_color(&frame, &ranges);
        assert_eq!(*filtered.get_pixel(2, 0), rune);
        assert_eq!(*filtered.get_pixel(0, 0), image::Rgba([0, 0, 0, 255]));
        assert_eq!(*filtered.get_pixel(3, 0), image::Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_distance() {
        let d = distance(&Position::new(0.4, 0.6), &Position::new(0.5, 0.5));
        assert!((d - 0.141_421).abs() < 1e-5);
    }
}
