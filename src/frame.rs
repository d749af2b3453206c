//! The image data model shared by every component: a channel-tagged raw
//! frame and its 16-bit LBSP descriptor counterpart.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

/// A single video frame, grayscale or 3-channel, 8 bits per channel.
///
/// Mirrors `image::DynamicImage`'s tagged-enum design, narrowed to the two
/// pixel formats this model supports.
#[derive(Debug, Clone)]
pub enum Frame {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Frame {
    pub fn width(&self) -> u32 {
        match self {
            Frame::Gray(img) => img.width(),
            Frame::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Frame::Gray(img) => img.height(),
            Frame::Rgb(img) => img.height(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Frame::Gray(_) => 1,
            Frame::Rgb(_) => 3,
        }
    }

    /// Returns the pixel channels at `(x, y)` as a fixed-size slice-like
    /// array, padded with zeroes beyond `channels()`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        match self {
            Frame::Gray(img) => {
                let p = img.get_pixel(x, y).0[0];
                [p, p, p]
            }
            Frame::Rgb(img) => img.get_pixel(x, y).0,
        }
    }

    /// Same shape as `pixel` but for a single channel, used by the
    /// per-channel matcher loop.
    #[inline]
    pub fn channel(&self, x: u32, y: u32, c: u8) -> u8 {
        match self {
            Frame::Gray(img) => img.get_pixel(x, y).0[0],
            Frame::Rgb(img) => img.get_pixel(x, y).0[c as usize],
        }
    }

    pub fn same_shape_as(&self, other: &Frame) -> bool {
        self.width() == other.width()
            && self.height() == other.height()
            && self.channels() == other.channels()
    }

    /// Allocates a new, zero-filled frame with the same shape as `self`.
    pub fn blank_like(&self) -> Frame {
        match self {
            Frame::Gray(img) => Frame::Gray(GrayImage::new(img.width(), img.height())),
            Frame::Rgb(img) => Frame::Rgb(RgbImage::new(img.width(), img.height())),
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: &[u8]) {
        match self {
            Frame::Gray(img) => img.put_pixel(x, y, Luma([value[0]])),
            Frame::Rgb(img) => img.put_pixel(x, y, Rgb([value[0], value[1], value[2]])),
        }
    }
}

/// 16-bit descriptor image, one value per channel per pixel.
#[derive(Debug, Clone)]
pub enum DescImage {
    Gray(ImageBuffer<Luma<u16>, Vec<u16>>),
    Rgb(ImageBuffer<Rgb<u16>, Vec<u16>>),
}

impl DescImage {
    pub fn blank_like(frame: &Frame) -> DescImage {
        match frame {
            Frame::Gray(img) => {
                DescImage::Gray(ImageBuffer::new(img.width(), img.height()))
            }
            Frame::Rgb(img) => DescImage::Rgb(ImageBuffer::new(img.width(), img.height())),
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [u16; 3] {
        match self {
            DescImage::Gray(img) => {
                let v = img.get_pixel(x, y).0[0];
                [v, 0, 0]
            }
            DescImage::Rgb(img) => img.get_pixel(x, y).0,
        }
    }

    #[inline]
    pub fn channel(&self, x: u32, y: u32, c: u8) -> u16 {
        match self {
            DescImage::Gray(img) => img.get_pixel(x, y).0[0],
            DescImage::Rgb(img) => img.get_pixel(x, y).0[c as usize],
        }
    }

    pub fn set(&mut self, x: u32, y: u32, value: &[u16]) {
        match self {
            DescImage::Gray(img) => img.put_pixel(x, y, Luma([value[0]])),
            DescImage::Rgb(img) => img.put_pixel(x, y, Rgb([value[0], value[1], value[2]])),
        }
    }
}
