//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image used for camera frames and the overlay surface.
//! - [`Color`], an 8-bit sRGB color with straight alpha.
//! - [`Resolution`] and [`Rect`] for describing image sizes and regions.
//! - A handful of [`draw`] functions for status text and simple shapes.

mod blend;
pub mod draw;
mod rect;
mod resolution;

use std::{fmt, ops::Index};

use embedded_graphics::{
    pixelcolor::raw::RawU32,
    prelude::{Dimensions, DrawTarget, PixelColor, Point, Size},
    primitives::Rectangle,
    Pixel,
};
use image::{imageops::FilterType, ImageBuffer, Rgba, RgbaImage};

pub use blend::BlendMode;
pub use rect::Rect;
pub use resolution::{AspectRatio, Resolution};

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone, PartialEq)]
pub struct Image {
    // RGBA8 so that the GUI can upload the data without conversion.
    pub(crate) buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG frame.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering this image, positioned at `(0, 0)`.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width() as f32, self.height() as f32)
    }

    /// Gets the color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Sets the pixel at `(x, y)` if it lies inside the image; out-of-bounds writes are ignored.
    #[inline]
    pub(crate) fn set_clipped(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height() {
            self.set(x as u32, y as u32, color);
        }
    }

    /// Clears the image, setting every pixel value to `color`.
    pub fn clear(&mut self, color: Color) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = color.0);
    }

    /// Returns `true` if every pixel of the image has the given color.
    pub fn is_filled_with(&self, color: Color) -> bool {
        self.buf.pixels().all(|pix| pix.0 == color.0)
    }

    /// Copies the area covered by `rect` into a new image of the given resolution.
    ///
    /// Parts of `rect` outside of the image are clamped away before sampling, so the result is
    /// always fully covered by image data.
    pub fn crop_resized(&self, rect: Rect, target: Resolution) -> Image {
        let rect = rect.clamp_to(self.rect());
        let x = (rect.x().floor() as u32).min(self.width().saturating_sub(1));
        let y = (rect.y().floor() as u32).min(self.height().saturating_sub(1));
        let w = (rect.width().round() as u32).clamp(1, self.width() - x);
        let h = (rect.height().round() as u32).clamp(1, self.height() - y);
        let cropped = image::imageops::crop_imm(&self.buf, x, y, w, h).to_image();
        let buf = image::imageops::resize(
            &cropped,
            target.width(),
            target.height(),
            FilterType::Triangle,
        );
        Image { buf }
    }

    /// Blends `src` on top of `self`.
    ///
    /// `src` is stretched or shrunk to cover all of `self`.
    pub fn blend_from(&mut self, src: &Image, mode: BlendMode) {
        blend::blend(self, src, mode);
    }

    /// Returns the raw RGBA8 pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

impl Dimensions for Image {
    fn bounding_box(&self) -> Rectangle {
        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size {
                width: self.width(),
                height: self.height(),
            },
        }
    }
}

impl DrawTarget for Image {
    type Color = Color;

    type Error = std::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set_clipped(point.x, point.y, color);
        }

        Ok(())
    }
}

/// An 8-bit RGBA color.
///
/// Colors are always in the non-linear sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NONE: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const GREY: Self = Self([128, 128, 128, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const YELLOW: Self = Self([255, 255, 0, 255]);

    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

impl Index<usize> for Color {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_image_is_transparent() {
        let image = Image::new(4, 3);
        assert_eq!(image.resolution(), Resolution::new(4, 3));
        assert!(image.is_filled_with(Color::NONE));
    }

    #[test]
    fn clipped_writes_ignore_out_of_bounds() {
        let mut image = Image::new(2, 2);
        image.set_clipped(-1, 0, Color::RED);
        image.set_clipped(0, 2, Color::RED);
        image.set_clipped(1, 1, Color::RED);
        assert_eq!(image.get(1, 1), Color::RED);
        assert_eq!(image.get(0, 0), Color::NONE);
    }

    #[test]
    fn crop_resized_has_target_resolution() {
        let mut image = Image::new(20, 10);
        image.clear(Color::WHITE);
        let out = image.crop_resized(
            Rect::from_top_left(-5.0, -5.0, 40.0, 40.0),
            Resolution::new(8, 8),
        );
        assert_eq!(out.resolution(), Resolution::new(8, 8));
        assert!(out.get(4, 4).r() > 250);
    }

    #[test]
    fn color_debug_is_hex() {
        assert_eq!(format!("{:?}", Color::from_rgba8(1, 2, 255, 16)), "#0102ff10");
    }
}
