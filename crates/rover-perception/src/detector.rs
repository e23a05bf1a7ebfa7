//! Per-direction obstacle detection from camera frames.
//!
//! [`ObstacleDetector::detect`] runs a fixed pipeline over one greyscale
//! frame:
//!
//! 1. 15×15 Gaussian blur.
//! 2. Canny edges with hysteresis thresholds 50 / 150.
//! 3. 5×5 dilation (2 iterations) then erosion (1 iteration).
//! 4. External contours only.
//! 5. Contours with area ≤ `min_obstacle_area` are discarded; the rest become
//!    [`Obstacle`]s positioned relative to the image centre.
//! 6. An obstacle is *in path* when its horizontal offset lies inside the
//!    central `safe_zone_width` fraction of the frame.
//!
//! [`ObstacleDetector::analyze_direction`] wraps this with a frame read and
//! reduces the result to a [`DirectionReading`].
//!
//! # Example
//!
//! ```rust
//! use rover_hal::sim::{scene_frame, SceneBox, SimFrameSource};
//! use rover_perception::detector::{DetectorConfig, ObstacleDetector};
//! use rover_types::Direction;
//!
//! let frame = scene_frame(320, 240, &[SceneBox { x: 120, y: 80, width: 80, height: 80 }]);
//! let (mut camera, _handle) = SimFrameSource::new("camera/front", frame);
//!
//! let detector = ObstacleDetector::new(DetectorConfig::default());
//! let reading = detector.analyze_direction(Direction::Front, Some(&mut camera));
//! assert!(reading.available);
//! assert!(!reading.clear);
//! assert_eq!(reading.path_obstacle_count, 1);
//! ```

use image::GrayImage;
use rover_hal::{CameraBank, CameraFrame, FrameSource};
use rover_types::{Direction, DirectionMap, DirectionReading};
use tracing::{debug, instrument, warn};

use crate::contour::{BoundingBox, find_external_contours};
use crate::imaging;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tuning knobs for [`ObstacleDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Gaussian kernel edge length in pixels (odd).
    pub blur_kernel: u32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Rectangular structuring element edge length in pixels.
    pub morph_kernel: u32,
    pub dilate_iterations: u32,
    pub erode_iterations: u32,
    /// Contours with area at or below this (px²) are noise.
    pub min_obstacle_area: f64,
    /// Fraction of the frame width, centred, treated as the navigable
    /// corridor.
    pub safe_zone_width: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 15,
            canny_low: 50.0,
            canny_high: 150.0,
            morph_kernel: 5,
            dilate_iterations: 2,
            erode_iterations: 1,
            min_obstacle_area: 1500.0,
            safe_zone_width: 0.4,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

/// One detected obstacle. Valid for a single detection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub bounding_box: BoundingBox,
    /// Bounding-box centre in pixels.
    pub center: (u32, u32),
    /// Contour area in px².
    pub area: f64,
    /// Centre offset from the image centre, normalised by the half-width and
    /// half-height. Both components lie in `[-1, 1]`.
    pub relative_position: (f64, f64),
    pub in_path: bool,
}

/// Result of [`ObstacleDetector::detect`].
#[derive(Debug, Clone)]
pub struct Detection {
    pub obstacles: Vec<Obstacle>,
    /// Post-morphology edge mask, for visualisation.
    pub mask: GrayImage,
}

impl Detection {
    pub fn path_obstacle_count(&self) -> usize {
        self.obstacles.iter().filter(|o| o.in_path).count()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ObstacleDetector
// ────────────────────────────────────────────────────────────────────────────

/// Stateless image-to-obstacle converter. Each direction is analysed
/// independently.
#[derive(Debug, Clone, Default)]
pub struct ObstacleDetector {
    config: DetectorConfig,
}

impl ObstacleDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run the detection pipeline over one greyscale image.
    #[instrument(level = "debug", skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &GrayImage) -> Detection {
        let c = &self.config;
        let blurred = imaging::gaussian_blur(image, c.blur_kernel);
        let edges = imaging::canny(&blurred, c.canny_low, c.canny_high);
        let dilated = imaging::dilate(&edges, c.morph_kernel, c.dilate_iterations);
        let mask = imaging::erode(&dilated, c.morph_kernel, c.erode_iterations);

        let obstacles = self.obstacles_in_mask(&mask);
        debug!(obstacles = obstacles.len(), "detection complete");
        Detection { obstacles, mask }
    }

    /// Obstacles from a binary edge mask: external contours whose area is
    /// strictly above `min_obstacle_area`.
    pub fn obstacles_in_mask(&self, mask: &GrayImage) -> Vec<Obstacle> {
        let (w, h) = mask.dimensions();
        find_external_contours(mask)
            .into_iter()
            .filter_map(|contour| {
                let area = contour.area();
                (area > self.config.min_obstacle_area)
                    .then(|| self.obstacle(contour.bounding_box, area, w, h))
            })
            .collect()
    }

    /// Convert a raw frame and detect. `None` when the frame is incomplete.
    pub fn detect_frame(&self, frame: &CameraFrame) -> Option<Detection> {
        imaging::to_gray(frame).map(|gray| self.detect(&gray))
    }

    fn obstacle(&self, bounding_box: BoundingBox, area: f64, width: u32, height: u32) -> Obstacle {
        let cx = bounding_box.x + bounding_box.width / 2;
        let cy = bounding_box.y + bounding_box.height / 2;
        let relative_position = (relative(cx, width), relative(cy, height));
        Obstacle {
            bounding_box,
            center: (cx, cy),
            area,
            relative_position,
            in_path: relative_position.0.abs() < self.config.safe_zone_width / 2.0,
        }
    }

    /// Pixel columns `[left, right)` of the navigable corridor.
    pub fn safe_zone_bounds(&self, width: u32) -> (u32, u32) {
        let zone = self.config.safe_zone_width.clamp(0.0, 1.0);
        let w = f64::from(width);
        let left = (w * (1.0 - zone) / 2.0) as u32;
        let right = (w * (1.0 + zone) / 2.0) as u32;
        (left, right)
    }

    /// Read one frame for `direction` and reduce it to a [`DirectionReading`].
    ///
    /// A missing camera, a failed read, or an incomplete frame yields an
    /// unavailable reading. This never fails.
    pub fn analyze_direction(
        &self,
        direction: Direction,
        source: Option<&mut dyn FrameSource>,
    ) -> DirectionReading {
        let Some(source) = source else {
            return DirectionReading::unavailable(direction);
        };
        let frame = match source.read() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(%direction, camera = source.id(), error = %e, "frame unavailable");
                return DirectionReading::unavailable(direction);
            }
        };
        let Some(detection) = self.detect_frame(&frame) else {
            warn!(%direction, camera = source.id(), "incomplete frame discarded");
            return DirectionReading::unavailable(direction);
        };

        let path_obstacle_count = detection.path_obstacle_count();
        DirectionReading {
            direction,
            available: true,
            clear: path_obstacle_count == 0,
            obstacle_count: detection.obstacles.len(),
            path_obstacle_count,
        }
    }

    /// Analyse every direction of `cameras` in turn.
    #[instrument(level = "debug", skip_all)]
    pub fn analyze_all(&self, cameras: &mut CameraBank) -> DirectionMap<DirectionReading> {
        let mut readings = DirectionMap::from_fn(DirectionReading::unavailable);
        for (direction, slot) in cameras.iter_mut() {
            let source = slot.as_deref_mut().map(|camera| camera as &mut dyn FrameSource);
            readings.set(direction, self.analyze_direction(direction, source));
        }
        readings
    }
}

/// `(c - half) / half`, clamped to `[-1, 1]`.
fn relative(coordinate: u32, extent: u32) -> f64 {
    let half = f64::from(extent / 2);
    if half == 0.0 {
        return 0.0;
    }
    ((f64::from(coordinate) - half) / half).clamp(-1.0, 1.0)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
