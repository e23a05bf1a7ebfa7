//! External contour extraction from binary masks.
//!
//! Only the outer border of each outermost foreground region is reported;
//! holes and anything nested inside them are folded into the enclosing
//! region. Foreground is 8-connected, background 4-connected, and the area
//! outside the image counts as background.

use std::collections::VecDeque;

use image::GrayImage;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One external border, as an ordered closed polygon of pixel centres.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
    pub bounding_box: BoundingBox,
}

impl Contour {
    /// Polygon area enclosed by the border points (shoelace formula).
    ///
    /// A solid `w × h` block has area `(w - 1) × (h - 1)`; a single pixel or
    /// a one-pixel-wide line has area zero.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                i64::from(x0) * i64::from(y1) - i64::from(x1) * i64::from(y0)
            })
            .sum();
        twice.abs() as f64 / 2.0
    }
}

/// Clockwise neighbour offsets in image coordinates (y grows downward),
/// starting east.
const OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

/// Find the external contours of every non-zero region in `mask`, in raster
/// order of their topmost-leftmost pixel.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let filled = fill_holes(mask);
    let mut labelled = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if !filled[i] || labelled[i] {
                continue;
            }
            let bounding_box = label_component(&filled, &mut labelled, w, h, x, y);
            let points = trace_outer_border(&filled, w, h, (x as i32, y as i32));
            contours.push(Contour {
                points,
                bounding_box,
            });
        }
    }
    contours
}

/// Foreground plus every background pixel not 4-connected to the outside.
fn fill_holes(mask: &GrayImage) -> Vec<bool> {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let foreground: Vec<bool> = mask.as_raw().iter().map(|&v| v != 0).collect();
    let mut exterior = vec![false; w * h];
    let mut queue = VecDeque::new();

    let seed = |x: usize, y: usize, exterior: &mut [bool], queue: &mut VecDeque<(usize, usize)>| {
        let i = y * w + x;
        if !foreground[i] && !exterior[i] {
            exterior[i] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut exterior, &mut queue);
        seed(x, h - 1, &mut exterior, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut exterior, &mut queue);
        seed(w - 1, y, &mut exterior, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        let mut visit = |nx: usize, ny: usize| {
            let j = ny * w + nx;
            if !foreground[j] && !exterior[j] {
                exterior[j] = true;
                queue.push_back((nx, ny));
            }
        };
        if x > 0 {
            visit(x - 1, y);
        }
        if x + 1 < w {
            visit(x + 1, y);
        }
        if y > 0 {
            visit(x, y - 1);
        }
        if y + 1 < h {
            visit(x, y + 1);
        }
    }

    exterior.into_iter().map(|e| !e).collect()
}

/// Flood-label the 8-connected component at `(x0, y0)` and return its extent.
fn label_component(
    filled: &[bool],
    labelled: &mut [bool],
    w: usize,
    h: usize,
    x0: usize,
    y0: usize,
) -> BoundingBox {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
    let mut queue = VecDeque::from([(x0, y0)]);
    labelled[y0 * w + x0] = true;

    while let Some((x, y)) = queue.pop_front() {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
        for (dx, dy) in OFFSETS {
            let (nx, ny) = (x as i64 + i64::from(dx), y as i64 + i64::from(dy));
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            let j = ny as usize * w + nx as usize;
            if filled[j] && !labelled[j] {
                labelled[j] = true;
                queue.push_back((nx as usize, ny as usize));
            }
        }
    }

    BoundingBox {
        x: min_x as u32,
        y: min_y as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    }
}

/// Border following from the raster-first pixel of a component.
fn trace_outer_border(filled: &[bool], w: usize, h: usize, start: (i32, i32)) -> Vec<(i32, i32)> {
    let is_set = |(x, y): (i32, i32)| {
        x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h && filled[y as usize * w + x as usize]
    };
    let step = |(x, y): (i32, i32), dir: usize| (x + OFFSETS[dir].0, y + OFFSETS[dir].1);
    let direction_to = |from: (i32, i32), to: (i32, i32)| {
        let delta = (to.0 - from.0, to.1 - from.1);
        OFFSETS.iter().position(|&o| o == delta).unwrap_or(WEST)
    };

    // First neighbour clockwise from the west.
    let Some(first) = (0..8)
        .map(|k| step(start, (WEST + k) % 8))
        .find(|&p| is_set(p))
    else {
        return vec![start];
    };

    let mut points = vec![start];
    let mut previous = first;
    let mut current = start;
    loop {
        let back = direction_to(current, previous);
        // Counter-clockwise search starting just after `previous`.
        let next = (1..=8)
            .map(|k| step(current, (back + 8 - k) % 8))
            .find(|&p| is_set(p))
            .unwrap_or(previous);
        if next == start && current == first {
            break;
        }
        points.push(next);
        previous = current;
        current = next;
    }
    points
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
