//! Greyscale image primitives used by the obstacle detector.
//!
//! Each stage takes and returns an [`image::GrayImage`]:
//!
//! ```text
//! CameraFrame ──to_gray──▶ gaussian_blur ──▶ canny ──▶ dilate ──▶ erode ──▶ mask
//! ```
//!
//! The numerics follow the conventional definitions: a separable Gaussian
//! with reflect-101 borders, Sobel gradients with L1 magnitude, 4-sector
//! non-maximum suppression and 8-connected hysteresis, and rectangular
//! morphology that ignores out-of-bounds pixels.

use std::collections::VecDeque;

use image::GrayImage;
use rover_hal::{CameraFrame, PixelFormat};

/// Luma value written for foreground pixels in binary masks.
pub const FOREGROUND: u8 = 255;

// ────────────────────────────────────────────────────────────────────────────
// Colour conversion
// ────────────────────────────────────────────────────────────────────────────

/// Convert a raw camera frame to single-channel intensity.
///
/// Returns `None` for an incomplete buffer.
pub fn to_gray(frame: &CameraFrame) -> Option<GrayImage> {
    if !frame.is_complete() {
        return None;
    }
    let pixels = frame.width as usize * frame.height as usize;
    let data: Vec<u8> = match frame.format {
        PixelFormat::Gray8 => frame.data[..pixels].to_vec(),
        PixelFormat::Rgb8 => frame
            .data
            .chunks_exact(3)
            .take(pixels)
            .map(|p| luma(p[0], p[1], p[2]))
            .collect(),
        PixelFormat::Bgr8 => frame
            .data
            .chunks_exact(3)
            .take(pixels)
            .map(|p| luma(p[2], p[1], p[0]))
            .collect(),
    };
    GrayImage::from_raw(frame.width, frame.height, data)
}

/// ITU-R BT.601 luma.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

// ────────────────────────────────────────────────────────────────────────────
// Gaussian smoothing
// ────────────────────────────────────────────────────────────────────────────

/// Sigma implied by a kernel size when none is given explicitly.
pub fn default_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    let sigma = default_sigma(kernel_size);
    let center = (kernel_size / 2) as f32;
    let raw: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|k| k / sum).collect()
}

/// `gfedcb|abcdefgh|gfedcba`
fn reflect_101(index: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = index;
    while i < 0 || i >= len {
        i = if i < 0 { -i } else { 2 * (len - 1) - i };
    }
    i as usize
}

/// Separable `kernel_size × kernel_size` Gaussian blur. Even sizes are
/// rounded up to the next odd size.
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    let kernel_size = kernel_size.max(1) | 1;
    let kernel = gaussian_kernel(kernel_size);
    let radius = (kernel_size / 2) as i64;
    let (w, h) = (image.width() as usize, image.height() as usize);
    let src = image.as_raw();

    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            horizontal[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sx = reflect_101(x as i64 + k as i64 - radius, w as i64);
                    weight * f32::from(row[sx])
                })
                .sum();
        }
    }

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let v: f32 = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    let sy = reflect_101(y as i64 + k as i64 - radius, h as i64);
                    weight * horizontal[sy * w + x]
                })
                .sum();
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    from_vec(image.width(), image.height(), out)
}

// ────────────────────────────────────────────────────────────────────────────
// Canny edge detection
// ────────────────────────────────────────────────────────────────────────────

const TAN_22_5: f32 = 0.414_213_56;
const TAN_67_5: f32 = 2.414_213_6;

/// Canny edge detector with hysteresis thresholds `low < high`.
///
/// Edge pixels are [`FOREGROUND`], everything else zero. The one-pixel image
/// border never carries an edge.
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut edges = vec![0u8; w * h];
    if w < 3 || h < 3 {
        return from_vec(image.width(), image.height(), edges);
    }

    let (gx, gy) = sobel(image);
    let magnitude: Vec<i32> = gx.iter().zip(&gy).map(|(x, y)| x.abs() + y.abs()).collect();
    let at = |x: usize, y: usize| magnitude[y * w + x];

    // 0 = suppressed, 1 = weak candidate, 2 = strong edge
    let mut class = vec![0u8; w * h];
    let mut strong = VecDeque::new();
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = magnitude[i];
            if m as f32 <= low {
                continue;
            }
            let ax = gx[i].abs() as f32;
            let ay = gy[i].abs() as f32;
            let is_max = if ay < ax * TAN_22_5 {
                m > at(x - 1, y) && m >= at(x + 1, y)
            } else if ay > ax * TAN_67_5 {
                m > at(x, y - 1) && m >= at(x, y + 1)
            } else if (gx[i] < 0) == (gy[i] < 0) {
                m > at(x - 1, y - 1) && m > at(x + 1, y + 1)
            } else {
                m > at(x + 1, y - 1) && m > at(x - 1, y + 1)
            };
            if !is_max {
                continue;
            }
            if m as f32 > high {
                class[i] = 2;
                strong.push_back((x, y));
            } else {
                class[i] = 1;
            }
        }
    }

    while let Some((x, y)) = strong.pop_front() {
        edges[y * w + x] = FOREGROUND;
        for (nx, ny) in neighbours8(x, y, w, h) {
            let j = ny * w + nx;
            if class[j] == 1 {
                class[j] = 2;
                strong.push_back((nx, ny));
            }
        }
    }
    from_vec(image.width(), image.height(), edges)
}

/// 3×3 Sobel derivatives with replicated borders.
fn sobel(image: &GrayImage) -> (Vec<i32>, Vec<i32>) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let src = image.as_raw();
    let px = |x: i64, y: i64| {
        let cx = x.clamp(0, w - 1) as usize;
        let cy = y.clamp(0, h - 1) as usize;
        i32::from(src[cy * w as usize + cx])
    };
    let mut gx = Vec::with_capacity((w * h) as usize);
    let mut gy = Vec::with_capacity((w * h) as usize);
    for y in 0..h {
        for x in 0..w {
            gx.push(
                px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x - 1, y)
                    - px(x - 1, y + 1),
            );
            gy.push(
                px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                    - px(x - 1, y - 1)
                    - 2 * px(x, y - 1)
                    - px(x + 1, y - 1),
            );
        }
    }
    (gx, gy)
}

fn neighbours8(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    let (x, y) = (x as i64, y as i64);
    (-1..=1)
        .flat_map(move |dy| (-1..=1).map(move |dx| (x + dx, y + dy)))
        .filter(move |&(nx, ny)| {
            (nx, ny) != (x, y) && nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64
        })
        .map(|(nx, ny)| (nx as usize, ny as usize))
}

// ────────────────────────────────────────────────────────────────────────────
// Morphology
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Morph {
    Dilate,
    Erode,
}

/// Grow bright regions with a `kernel_size × kernel_size` rectangle.
pub fn dilate(image: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    morph(image, kernel_size, iterations, Morph::Dilate)
}

/// Shrink bright regions with a `kernel_size × kernel_size` rectangle.
pub fn erode(image: &GrayImage, kernel_size: u32, iterations: u32) -> GrayImage {
    morph(image, kernel_size, iterations, Morph::Erode)
}

fn morph(image: &GrayImage, kernel_size: u32, iterations: u32, op: Morph) -> GrayImage {
    let mut current = image.clone();
    for _ in 0..iterations {
        current = morph_once(&current, kernel_size, op);
    }
    current
}

fn morph_once(image: &GrayImage, kernel_size: u32, op: Morph) -> GrayImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let before = (kernel_size.saturating_sub(1) / 2) as usize;
    let after = (kernel_size / 2) as usize;
    let pick = |window: &mut dyn Iterator<Item = u8>| match op {
        Morph::Dilate => window.max().unwrap_or(0),
        Morph::Erode => window.min().unwrap_or(0),
    };
    let src = image.as_raw();

    let mut rows = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(before);
            let hi = (x + after).min(w - 1);
            rows[y * w + x] = pick(&mut src[y * w + lo..=y * w + hi].iter().copied());
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        let lo = y.saturating_sub(before);
        let hi = (y + after).min(h - 1);
        for x in 0..w {
            out[y * w + x] = pick(&mut (lo..=hi).map(|sy| rows[sy * w + x]));
        }
    }
    from_vec(image.width(), image.height(), out)
}

fn from_vec(width: u32, height: u32, data: Vec<u8>) -> GrayImage {
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn step_image() -> GrayImage {
        GrayImage::from_fn(40, 40, |x, _| if x < 20 { Luma([0]) } else { Luma([255]) })
    }

    #[test]
    fn bgr_and_rgb_convert_to_the_same_luma() {
        let rgb = CameraFrame {
            width: 1,
            height: 1,
            format: PixelFormat::Rgb8,
            data: vec![200, 100, 50],
        };
        let bgr = CameraFrame {
            width: 1,
            height: 1,
            format: PixelFormat::Bgr8,
            data: vec![50, 100, 200],
        };
        let a = to_gray(&rgb).unwrap();
        let b = to_gray(&bgr).unwrap();
        assert_eq!(a.get_pixel(0, 0), b.get_pixel(0, 0));
        assert_eq!(a.get_pixel(0, 0).0[0], 124);
    }

    #[test]
    fn incomplete_frame_has_no_gray_image() {
        let frame = CameraFrame::gray(4, 4, vec![0; 10]);
        assert!(to_gray(&frame).is_none());
    }

    #[test]
    fn default_sigma_for_15_tap_kernel() {
        assert!((default_sigma(15) - 2.6).abs() < 1e-6);
    }

    #[test]
    fn reflect_101_mirrors_without_repeating_edge() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn blur_preserves_uniform_image() {
        let flat = GrayImage::from_pixel(20, 20, Luma([128]));
        let blurred = gaussian_blur(&flat, 15);
        assert!(blurred.pixels().all(|p| p.0[0] == 128));
    }

    #[test]
    fn canny_finds_vertical_step_edge() {
        let edges = canny(&gaussian_blur(&step_image(), 15), 50.0, 150.0);
        let row: Vec<u32> = (0..40)
            .filter(|&x| edges.get_pixel(x, 20).0[0] == FOREGROUND)
            .collect();
        assert!(!row.is_empty());
        assert!(row.iter().all(|&x| (18..=21).contains(&x)), "edge columns {row:?}");
    }

    #[test]
    fn canny_ignores_flat_image() {
        let flat = GrayImage::from_pixel(20, 20, Luma([90]));
        let edges = canny(&flat, 50.0, 150.0);
        assert!(edges.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn dilate_then_erode_closes_single_pixel_gap() {
        let mut line = GrayImage::new(20, 5);
        for x in 2..18 {
            if x != 10 {
                line.put_pixel(x, 2, Luma([FOREGROUND]));
            }
        }
        let closed = erode(&dilate(&line, 5, 1), 5, 1);
        assert_eq!(closed.get_pixel(10, 2).0[0], FOREGROUND);
    }

    #[test]
    fn dilate_grows_point_to_kernel_square() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, Luma([FOREGROUND]));
        let grown = dilate(&img, 5, 1);
        let count = grown.pixels().filter(|p| p.0[0] == FOREGROUND).count();
        assert_eq!(count, 25);
        let twice = dilate(&img, 5, 2);
        assert_eq!(twice.pixels().filter(|p| p.0[0] == FOREGROUND).count(), 81);
    }
}
