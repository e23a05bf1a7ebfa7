//! Generic `FrameSource` trait and supporting types for image-capture hardware.

use rover_types::RoverError;

/// Pixel layout of a [`CameraFrame`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel, intensity.
    Gray8,
    /// Three bytes per pixel, red-green-blue.
    Rgb8,
    /// Three bytes per pixel, blue-green-red (the usual webcam layout).
    Bgr8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// A raw image frame returned by a camera driver.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    pub format: PixelFormat,
    /// Raw pixel data, row-major, `width * height * format.channels()` bytes.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// Convenience constructor for a greyscale frame.
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::Gray8,
            data,
        }
    }

    /// `true` when the buffer holds at least one full frame of pixels.
    pub fn is_complete(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.format.channels();
        self.width > 0 && self.height > 0 && self.data.len() >= expected
    }
}

/// A camera or image-capture device bound to one sensing direction.
///
/// Implementations must never block indefinitely: a timeout or a
/// disconnected device is reported as [`RoverError::SensorUnavailable`].
pub trait FrameSource: Send {
    /// Stable identifier for this camera, e.g. `"camera/front"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::SensorUnavailable`] if the frame cannot be
    /// captured (e.g. the device is disconnected or the read timed out).
    fn read(&mut self) -> Result<CameraFrame, RoverError>;

    /// Release the underlying device. Called once on shutdown.
    fn release(&mut self) {}
}
