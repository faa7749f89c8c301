// src/services/collage.rs

//! Thumbnail collage composition and JPEG encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

use crate::error::Result;
use crate::models::IngestConfig;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Grid geometry for a collage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollageLayout {
    pub tile_size: u32,
    pub padding: u32,
    pub tiles_per_row: u32,
    pub max_images: usize,
}

impl Default for CollageLayout {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for CollageLayout {
    fn from(config: &IngestConfig) -> Self {
        Self {
            tile_size: config.tile_size,
            padding: config.tile_padding,
            tiles_per_row: config.tiles_per_row,
            max_images: config.max_collage_images,
        }
    }
}

impl CollageLayout {
    /// Canvas size for `count` images.
    pub fn canvas_size(&self, count: usize) -> (u32, u32) {
        let count = count.min(self.max_images) as u32;
        let cols = self.tiles_per_row;
        let rows = count.div_ceil(cols);
        (self.tile_size * cols, self.tile_size * rows)
    }

    /// Largest edge an image may occupy inside a tile.
    fn inner_size(&self) -> u32 {
        self.tile_size.saturating_sub(self.padding).max(1)
    }
}

/// Tile up to `layout.max_images` images on a white grid.
///
/// Each image is shrunk to fit its tile (never enlarged) and centred in it.
/// Returns `None` when there is nothing to place.
pub fn create_collage(images: &[&RgbImage], layout: &CollageLayout) -> Option<RgbImage> {
    if images.is_empty() || layout.tiles_per_row == 0 || layout.max_images == 0 {
        return None;
    }

    let images = &images[..images.len().min(layout.max_images)];
    let (width, height) = layout.canvas_size(images.len());
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);
    let inner = layout.inner_size();
    let tile = layout.tile_size;

    for (idx, img) in images.iter().enumerate() {
        let thumb = thumbnail(img, inner, inner);
        let col = idx as u32 % layout.tiles_per_row;
        let row = idx as u32 / layout.tiles_per_row;
        let x = col * tile + (tile - thumb.width()) / 2;
        let y = row * tile + (tile - thumb.height()) / 2;
        imageops::overlay(&mut canvas, &thumb, i64::from(x), i64::from(y));
    }

    Some(canvas)
}

/// Target size that fits `(width, height)` inside `(max_w, max_h)` keeping
/// the aspect ratio. Images that already fit are left alone.
pub fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width <= max_w && height <= max_h {
        return (width, height);
    }
    let scale = f64::min(
        f64::from(max_w) / f64::from(width),
        f64::from(max_h) / f64::from(height),
    );
    let w = ((f64::from(width) * scale).round() as u32).clamp(1, max_w);
    let h = ((f64::from(height) * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

/// Downscale with Lanczos3 so the image fits in the given box.
pub fn thumbnail(img: &RgbImage, max_w: u32, max_h: u32) -> RgbImage {
    let (w, h) = fit_within(img.width(), img.height(), max_w, max_h);
    if (w, h) == img.dimensions() {
        return img.clone();
    }
    imageops::resize(img, w, h, FilterType::Lanczos3)
}

/// Composite an RGBA image onto a white background.
pub fn flatten_alpha(img: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let a = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a)) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode an RGB image as JPEG.
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(img)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba};

    fn solid(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([10, 20, 30]))
    }

    #[test]
    fn empty_input_yields_none() {
        assert!(create_collage(&[], &CollageLayout::default()).is_none());
    }

    #[test]
    fn canvas_grows_by_rows_of_three() {
        let layout = CollageLayout::default();
        assert_eq!(layout.canvas_size(1), (1260, 420));
        assert_eq!(layout.canvas_size(3), (1260, 420));
        assert_eq!(layout.canvas_size(4), (1260, 840));
        assert_eq!(layout.canvas_size(9), (1260, 840));
    }

    #[test]
    fn collage_uses_at_most_six_images() {
        let imgs: Vec<RgbImage> = (0..8).map(|_| solid(500, 500)).collect();
        let refs: Vec<&RgbImage> = imgs.iter().collect();
        let collage = create_collage(&refs, &CollageLayout::default()).unwrap();
        assert_eq!(collage.dimensions(), (1260, 840));
    }

    #[test]
    fn images_are_centred_in_tiles() {
        // 800x400 shrinks to 400x200, leaving 110px white above and below.
        let imgs = [solid(800, 400), solid(300, 300)];
        let refs: Vec<&RgbImage> = imgs.iter().collect();
        let collage = create_collage(&refs, &CollageLayout::default()).unwrap();

        assert_eq!(collage.get_pixel(210, 100).0, [255, 255, 255]);
        assert_eq!(collage.get_pixel(210, 210).0, [10, 20, 30]);
        assert_eq!(collage.get_pixel(5, 210).0, [255, 255, 255]);

        // Second tile: 300x300 is not enlarged, offset (60, 60) within the tile.
        assert_eq!(collage.get_pixel(420 + 59, 210).0, [255, 255, 255]);
        assert_eq!(collage.get_pixel(420 + 61, 210).0, [10, 20, 30]);

        // Third tile stays empty.
        assert_eq!(collage.get_pixel(1050, 210).0, [255, 255, 255]);
    }

    #[test]
    fn fit_within_never_upscales() {
        assert_eq!(fit_within(100, 50, 400, 400), (100, 50));
        assert_eq!(fit_within(800, 400, 400, 400), (400, 200));
        assert_eq!(fit_within(400, 1600, 400, 400), (100, 400));
        assert_eq!(fit_within(5000, 1, 400, 400), (400, 1));
    }

    #[test]
    fn flatten_alpha_blends_onto_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let flat = flatten_alpha(&img);
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn encode_jpeg_produces_decodable_output() {
        let bytes = encode_jpeg(&solid(32, 16), 95).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }
}
