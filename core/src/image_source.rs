use std::fmt;
use std::path::Path;

use crate::error::HarnessError;

/// Smallest accepted width and height.
pub const MIN_DIMENSION: u32 = 5;

/// A 24-bit RGB pixel, red in bits 23..16, green in 15..8, blue in 7..0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel(u32);

impl Pixel {
    pub const MASK: u32 = 0x00ff_ffff;

    pub const fn new(rgb: u32) -> Self {
        Self(rgb & Self::MASK)
    }

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn rgb(self) -> u32 {
        self.0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }
    pub const fn b(self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for Pixel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

/// Random access to a `width x height` grid of pixels.
pub trait ImageSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Callers keep `x < width` and `y < height`.
    fn pixel(&self, x: u32, y: u32) -> Pixel;
}

/// An owned, immutable RGB frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl Frame {
    /// Builds a frame from row-major pixels. Rejects frames smaller than
    /// [`MIN_DIMENSION`] in either direction.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self, HarnessError> {
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(HarnessError::ImageTooSmall { width, height });
        }
        if pixels.len() as u64 != width as u64 * height as u64 {
            return Err(HarnessError::Config(format!(
                "{} pixels supplied for a {width}x{height} frame",
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, HarnessError>
    where
        F: FnMut(u32, u32) -> Pixel,
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::from_pixels(width, height, pixels)
    }

    /// Decodes an image file. The format is sniffed from the content, not the
    /// extension. Alpha is accepted only when every pixel is fully opaque, and
    /// is stripped; 16-bit channels are reduced to 8 bits.
    pub fn open(path: &Path) -> Result<Self, HarnessError> {
        let bytes = std::fs::read(path).map_err(|source| HarnessError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Opened {} for reading", path.display());
        let format = image::guess_format(&bytes).map_err(|_| HarnessError::NotAnImage {
            path: path.to_path_buf(),
        })?;
        let decoded = image::load_from_memory_with_format(&bytes, format)?;
        Self::from_dynamic(&decoded)
    }

    pub fn from_dynamic(img: &image::DynamicImage) -> Result<Self, HarnessError> {
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            if let Some((x, y, px)) = rgba.enumerate_pixels().find(|(_, _, px)| px.0[3] != 0xff) {
                return Err(HarnessError::TranslucentPixel { x, y, alpha: px.0[3] });
            }
        }
        let rgb = img.to_rgb8();
        let pixels = rgb
            .pixels()
            .map(|px| Pixel::from_rgb(px.0[0], px.0[1], px.0[2]))
            .collect();
        Self::from_pixels(rgb.width(), rgb.height(), pixels)
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }
}

impl ImageSource for Frame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Pixel {
        debug_assert!(x < self.width && y < self.height, "pixel[{x},{y}] out of bounds");
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}
