//! Downscaling collaborators.
//!
//! Every resize uses a single scale factor derived from the shorter edge:
//! `target / min(width, height)`. Both axes are multiplied by it, so the aspect
//! ratio is preserved and the shorter edge lands exactly on the target.

use crate::error::ResizeError;
use crate::model::Dimensions;
use camino::Utf8Path;
use image::imageops::FilterType;
use image::RgbaImage;
use image_dds::ddsfile::Dds;
use image_dds::{ImageFormat, Mipmaps, Quality, Surface, SurfaceRgba8};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Read, Write};

/// Compute the output dimensions and scale factor for a downscale.
///
/// Returns `None` when the shorter edge is already at or below `target`; the
/// pipeline never upscales.
pub fn scaled_dimensions(source: Dimensions, target: u32) -> Option<(Dimensions, f64)> {
    let shorter = source.shorter_edge();
    if target == 0 || shorter <= target {
        return None;
    }

    let scale = target as f64 / shorter as f64;
    let scale_axis = |edge: u32| {
        if edge == shorter {
            target
        } else {
            ((edge as f64 * scale).round() as u32).max(1)
        }
    };

    Some((
        Dimensions::new(scale_axis(source.width), scale_axis(source.height)),
        scale,
    ))
}

/// Produces the downscaled output file for one asset.
pub trait Resizer: Send + Sync {
    /// Read the full asset from `stream`, scale it so its shorter edge equals
    /// `target`, and write it to `output` (parent directories are created).
    ///
    /// Returns the dimensions that were written.
    fn resize(
        &self,
        stream: &mut dyn Read,
        source: Dimensions,
        target: u32,
        output: &Utf8Path,
    ) -> Result<Dimensions, ResizeError>;
}

/// Re-encodes DDS textures with `image_dds`.
///
/// Every array layer is scaled on its own, so cubemaps keep all six faces.
/// Opaque textures are written as BC1, textures with any transparency as BC3.
/// Mipmaps are regenerated for the new size. Volume textures are rejected.
#[derive(Debug, Clone, Copy)]
pub struct DdsResizer {
    quality: Quality,
}

impl Default for DdsResizer {
    fn default() -> Self {
        Self {
            quality: Quality::Normal,
        }
    }
}

impl DdsResizer {
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Decode the top mipmap of every layer.
    fn decode(bytes: &[u8]) -> Result<Vec<RgbaImage>, ResizeError> {
        let dds = Dds::read(&mut Cursor::new(bytes)).map_err(|e| ResizeError::Decode(e.to_string()))?;
        let surface = Surface::from_dds(&dds).map_err(|e| ResizeError::Decode(e.to_string()))?;
        if surface.depth > 1 {
            return Err(ResizeError::Decode(format!(
                "volume textures are not supported (depth {})",
                surface.depth
            )));
        }

        let layers = surface.layers;
        let rgba = surface
            .decode_layers_mipmaps_rgba8(0..layers, 0..1)
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        let layer_len = rgba.width as usize * rgba.height as usize * 4;
        rgba.data
            .chunks_exact(layer_len)
            .take(layers as usize)
            .map(|pixels| {
                RgbaImage::from_raw(rgba.width, rgba.height, pixels.to_vec())
                    .ok_or_else(|| ResizeError::Decode("truncated layer data".to_string()))
            })
            .collect()
    }

    fn encode(&self, layers: &[RgbaImage], size: Dimensions) -> Result<Dds, ResizeError> {
        let opaque = layers
            .iter()
            .all(|layer| layer.pixels().all(|p| p[3] == u8::MAX));
        let format = if opaque {
            ImageFormat::BC1RgbaUnorm
        } else {
            ImageFormat::BC3RgbaUnorm
        };

        let data: Vec<u8> = layers.iter().flat_map(|layer| layer.as_raw()).copied().collect();
        let surface = SurfaceRgba8 {
            width: size.width,
            height: size.height,
            depth: 1,
            layers: layers.len() as u32,
            mipmaps: 1,
            data: data.as_slice(),
        };
        let encoded = surface
            .encode(format, self.quality, Mipmaps::GeneratedAutomatic)
            .map_err(|e| ResizeError::Encode(e.to_string()))?;
        encoded
            .to_dds()
            .map_err(|e| ResizeError::Encode(e.to_string()))
    }
}

impl Resizer for DdsResizer {
    fn resize(
        &self,
        stream: &mut dyn Read,
        source: Dimensions,
        target: u32,
        output: &Utf8Path,
    ) -> Result<Dimensions, ResizeError> {
        let (scaled, _) = scaled_dimensions(source, target).ok_or(ResizeError::WouldUpscale {
            width: source.width,
            height: source.height,
            target,
        })?;

        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;

        let resized: Vec<RgbaImage> = Self::decode(&bytes)?
            .iter()
            .map(|layer| {
                image::imageops::resize(layer, scaled.width, scaled.height, FilterType::Lanczos3)
            })
            .collect();
        let dds = self.encode(&resized, scaled)?;

        write_atomically(output, |writer| {
            dds.write(writer)
                .map_err(|e| ResizeError::Encode(e.to_string()))
        })?;

        Ok(scaled)
    }
}

/// Write through a `.partial` sibling and rename it into place, so an
/// interrupted run never leaves a truncated file that resume mode would trust.
pub(crate) fn write_atomically<F>(output: &Utf8Path, write: F) -> Result<(), ResizeError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), ResizeError>,
{
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let partial = output.with_extension(match output.extension() {
        Some(ext) => format!("{ext}.partial"),
        None => "partial".to_string(),
    });

    let result = (|| {
        let mut writer = BufWriter::new(File::create(&partial)?);
        write(&mut writer)?;
        writer.flush()?;
        Ok::<_, ResizeError>(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&partial, output)?;
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}
