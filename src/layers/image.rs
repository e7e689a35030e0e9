use crate::Result;
use image::RgbaImage;
use std::path::Path;

/// A decoded raster image destined for one layer of a flatmap.
///
/// The tiler only ever borrows the pixels; placement (scale and offset)
/// belongs to the map and lives in [`crate::TilingConfig`], since the same
/// image can be embedded differently in different maps.
#[derive(Debug, Clone)]
pub struct ImageSource {
    layer_name: String,
    image: RgbaImage,
}

impl ImageSource {
    pub fn new(layer_name: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            layer_name: layer_name.into(),
            image,
        }
    }

    /// Decodes an image file into RGBA
    pub fn from_file(path: impl AsRef<Path>, layer_name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?.into_rgba8();
        log::debug!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self::new(layer_name, image))
    }

    /// Makes every pixel within `tolerance` of `color` fully transparent
    pub fn with_transparent_color(mut self, color: [u8; 3], tolerance: u8) -> Self {
        let cleared = make_color_transparent(&mut self.image, color, tolerance);
        log::debug!(
            "layer '{}': {} pixels keyed out as transparent",
            self.layer_name,
            cleared
        );
        self
    }

    pub fn layer_name(&self) -> &str {
        &self.layer_name
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Colour-key transparency: clears the alpha of pixels whose RGB channels are
/// each within `tolerance` of `color`. Returns the number of pixels cleared.
pub fn make_color_transparent(image: &mut RgbaImage, color: [u8; 3], tolerance: u8) -> usize {
    let mut cleared = 0;
    for pixel in image.pixels_mut() {
        let matches = pixel.0[..3]
            .iter()
            .zip(color.iter())
            .all(|(&channel, &key)| channel.abs_diff(key) <= tolerance);
        if matches && pixel.0[3] != 0 {
            pixel.0[3] = 0;
            cleared += 1;
        }
    }
    cleared
}
