//! Decoded rasters: one explicit variant per color mode an embedded image
//! can arrive in.
//!
//! PDF images reach us in two shapes. Some streams are complete image files
//! (`/DCTDecode` is a JPEG), others are bare samples whose geometry and color
//! space live in the stream dictionary. [`RawImage`] carries either shape and
//! [`Raster::decode`] turns both into a [`Raster`], whose variants cover
//! every mode the compositor has a rule for. Conversions are exhaustive
//! `match`es, so adding a mode is a compile error everywhere it matters.

use crate::error::ImageError;
use image::{ColorType, DynamicImage, GrayAlphaImage, GrayImage, Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

// ── Raw input ────────────────────────────────────────────────────────────

/// Image bytes as handed out by the PDF layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub encoding: RawEncoding,
}

impl RawImage {
    /// A self-describing container (JPEG, PNG, …).
    pub fn encoded(data: Vec<u8>) -> Self {
        Self {
            data,
            encoding: RawEncoding::Encoded,
        }
    }

    /// Bare samples described by `layout`.
    pub fn samples(data: Vec<u8>, layout: SampleLayout) -> Self {
        Self {
            data,
            encoding: RawEncoding::Samples(layout),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEncoding {
    /// Format is sniffed from the magic bytes.
    Encoded,
    /// Unfiltered PDF sample data.
    Samples(SampleLayout),
}

/// Geometry and color interpretation of bare PDF samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleLayout {
    pub width: u32,
    pub height: u32,
    /// 1, 2, 4, 8 or 16.
    pub bits_per_component: u8,
    pub color: SampleColor,
    /// `/Decode [1 0]` on a gray image.
    pub invert: bool,
}

impl SampleLayout {
    pub fn new(width: u32, height: u32, bits_per_component: u8, color: SampleColor) -> Self {
        Self {
            width,
            height,
            bits_per_component,
            color,
            invert: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    fn components(&self) -> usize {
        match self.color {
            SampleColor::Gray | SampleColor::Indexed { .. } => 1,
            SampleColor::Rgb => 3,
            SampleColor::Cmyk => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleColor {
    Gray,
    Rgb,
    Cmyk,
    /// Palette already expanded to RGB. `color_key` is the range of indices
    /// that must come out fully transparent.
    Indexed {
        palette: Vec<[u8; 3]>,
        color_key: Option<RangeInclusive<u8>>,
    },
}

// ── Decoded raster ───────────────────────────────────────────────────────

/// The color mode of a decoded [`Raster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    Cmyk,
    Indexed,
}

/// Interleaved 8-bit CMYK, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmykRaster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CmykRaster {
    /// Returns `None` when `data` is not exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        let expected = pixel_count(width, height)?.checked_mul(4)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Naive device conversion: `(255 - c) * (255 - k) / 255`.
    pub fn to_rgb(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        for (px, cmyk) in out.pixels_mut().zip(self.data.chunks_exact(4)) {
            let k = 255 - cmyk[3] as u32;
            let ch = |v: u8| ((255 - v as u32) * k / 255) as u8;
            *px = Rgb([ch(cmyk[0]), ch(cmyk[1]), ch(cmyk[2])]);
        }
        out
    }
}

/// Palette-indexed pixels with an optional transparency color key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRaster {
    width: u32,
    height: u32,
    indices: Vec<u8>,
    palette: Vec<[u8; 3]>,
    transparent: Option<RangeInclusive<u8>>,
}

impl IndexedRaster {
    /// Returns `None` when `indices` is not exactly `width * height` bytes.
    pub fn new(width: u32, height: u32, indices: Vec<u8>, palette: Vec<[u8; 3]>) -> Option<Self> {
        (indices.len() == pixel_count(width, height)?).then_some(Self {
            width,
            height,
            indices,
            palette,
            transparent: None,
        })
    }

    pub fn with_transparency(mut self, key: RangeInclusive<u8>) -> Self {
        self.transparent = Some(key);
        self
    }

    fn color(&self, index: u8) -> [u8; 3] {
        // Out-of-range indices render black.
        self.palette
            .get(index as usize)
            .copied()
            .unwrap_or([0, 0, 0])
    }

    pub fn to_rgb(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        for (px, &idx) in out.pixels_mut().zip(&self.indices) {
            *px = Rgb(self.color(idx));
        }
        out
    }

    /// Alpha is 0 for keyed indices and 255 everywhere else.
    pub fn to_rgba(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        for (px, &idx) in out.pixels_mut().zip(&self.indices) {
            let [r, g, b] = self.color(idx);
            let a = match &self.transparent {
                Some(key) if key.contains(&idx) => 0,
                _ => 255,
            };
            *px = Rgba([r, g, b, a]);
        }
        out
    }
}

/// A decoded image in its source color mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Raster {
    Gray(GrayImage),
    GrayAlpha(GrayAlphaImage),
    Rgb(RgbImage),
    Rgba(RgbaImage),
    Cmyk(CmykRaster),
    Indexed(IndexedRaster),
}

impl Raster {
    /// Decode raw PDF image bytes.
    ///
    /// # Errors
    /// [`ImageError::Decode`] when an encoded container is not a format the
    /// `image` crate recognises, or when bare samples are malformed (short
    /// data, unsupported bit depth, zero-sized geometry).
    pub fn decode(raw: &RawImage) -> Result<Self, ImageError> {
        match &raw.encoding {
            RawEncoding::Encoded => Self::from_encoded(&raw.data),
            RawEncoding::Samples(layout) => Self::from_samples(&raw.data, layout),
        }
    }

    fn from_encoded(bytes: &[u8]) -> Result<Self, ImageError> {
        let format = image::guess_format(bytes)?;
        let img = image::load_from_memory_with_format(bytes, format)?;
        Ok(Raster::from(img))
    }

    fn from_samples(data: &[u8], layout: &SampleLayout) -> Result<Self, ImageError> {
        let (w, h) = (layout.width, layout.height);
        if w == 0 || h == 0 {
            return Err(ImageError::decode(format!("empty image geometry {w}x{h}")));
        }

        let mut samples = unpack_samples(data, layout)?;
        let short = || ImageError::decode("sample buffer does not match image geometry");

        match &layout.color {
            SampleColor::Gray => {
                if layout.invert {
                    samples.iter_mut().for_each(|v| *v = 255 - *v);
                }
                GrayImage::from_raw(w, h, samples)
                    .map(Raster::Gray)
                    .ok_or_else(short)
            }
            SampleColor::Rgb => RgbImage::from_raw(w, h, samples)
                .map(Raster::Rgb)
                .ok_or_else(short),
            SampleColor::Cmyk => CmykRaster::new(w, h, samples)
                .map(Raster::Cmyk)
                .ok_or_else(short),
            SampleColor::Indexed { palette, color_key } => {
                let raster =
                    IndexedRaster::new(w, h, samples, palette.clone()).ok_or_else(short)?;
                Ok(Raster::Indexed(match color_key {
                    Some(key) => raster.with_transparency(key.clone()),
                    None => raster,
                }))
            }
        }
    }

    pub fn mode(&self) -> ColorMode {
        match self {
            Raster::Gray(_) => ColorMode::Gray,
            Raster::GrayAlpha(_) => ColorMode::GrayAlpha,
            Raster::Rgb(_) => ColorMode::Rgb,
            Raster::Rgba(_) => ColorMode::Rgba,
            Raster::Cmyk(_) => ColorMode::Cmyk,
            Raster::Indexed(_) => ColorMode::Indexed,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Raster::Gray(i) => i.dimensions(),
            Raster::GrayAlpha(i) => i.dimensions(),
            Raster::Rgb(i) => i.dimensions(),
            Raster::Rgba(i) => i.dimensions(),
            Raster::Cmyk(c) => (c.width, c.height),
            Raster::Indexed(p) => (p.width, p.height),
        }
    }

    /// Normalise to RGBA. CMYK goes through RGB first; an RGBA raster is
    /// returned untouched.
    pub fn into_rgba(self) -> RgbaImage {
        match self {
            Raster::Gray(i) => DynamicImage::ImageLuma8(i).to_rgba8(),
            Raster::GrayAlpha(i) => DynamicImage::ImageLumaA8(i).to_rgba8(),
            Raster::Rgb(i) => DynamicImage::ImageRgb8(i).to_rgba8(),
            Raster::Rgba(i) => i,
            Raster::Cmyk(c) => DynamicImage::ImageRgb8(c.to_rgb()).to_rgba8(),
            Raster::Indexed(p) => p.to_rgba(),
        }
    }

    /// Collapse to a single luminance channel; any alpha is discarded.
    pub fn into_luma(self) -> GrayImage {
        match self {
            Raster::Gray(i) => i,
            Raster::GrayAlpha(i) => DynamicImage::ImageLumaA8(i).to_luma8(),
            Raster::Rgb(i) => DynamicImage::ImageRgb8(i).to_luma8(),
            Raster::Rgba(i) => DynamicImage::ImageRgba8(i).to_luma8(),
            Raster::Cmyk(c) => DynamicImage::ImageRgb8(c.to_rgb()).to_luma8(),
            Raster::Indexed(p) => DynamicImage::ImageRgb8(p.to_rgb()).to_luma8(),
        }
    }
}

impl From<DynamicImage> for Raster {
    fn from(img: DynamicImage) -> Self {
        let color = img.color();
        match img {
            DynamicImage::ImageLuma8(i) => Raster::Gray(i),
            DynamicImage::ImageLumaA8(i) => Raster::GrayAlpha(i),
            DynamicImage::ImageRgb8(i) => Raster::Rgb(i),
            DynamicImage::ImageRgba8(i) => Raster::Rgba(i),
            other => match color {
                ColorType::L16 => Raster::Gray(other.to_luma8()),
                ColorType::La16 => Raster::GrayAlpha(other.to_luma_alpha8()),
                c if c.has_alpha() => Raster::Rgba(other.to_rgba8()),
                _ => Raster::Rgb(other.to_rgb8()),
            },
        }
    }
}

/// `width * height`, or `None` if it does not fit in memory addressing.
fn pixel_count(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)
}

/// Unpack byte-aligned rows of 1/2/4/8/16-bit samples into one byte per
/// sample. Color samples are scaled to 0–255; palette indices are not.
fn unpack_samples(data: &[u8], layout: &SampleLayout) -> Result<Vec<u8>, ImageError> {
    let bpc = layout.bits_per_component as usize;
    let indexed = matches!(layout.color, SampleColor::Indexed { .. });
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) || (indexed && bpc == 16) {
        return Err(ImageError::decode(format!(
            "unsupported bits per component: {bpc}"
        )));
    }

    let overflow = || ImageError::decode("image geometry overflows");
    let per_row = (layout.width as usize)
        .checked_mul(layout.components())
        .ok_or_else(overflow)?;
    let row_bytes = per_row.checked_mul(bpc).ok_or_else(overflow)?.div_ceil(8);
    let rows = layout.height as usize;
    let needed = row_bytes.checked_mul(rows).ok_or_else(overflow)?;
    let unpacked = per_row.checked_mul(rows).ok_or_else(overflow)?;
    if data.len() < needed {
        return Err(ImageError::decode(format!(
            "sample data too short: got {} bytes, expected {needed}",
            data.len()
        )));
    }

    let mut out = Vec::with_capacity(unpacked);
    for row in data.chunks_exact(row_bytes).take(rows) {
        match bpc {
            8 => out.extend_from_slice(&row[..per_row]),
            16 => out.extend(row.chunks_exact(2).take(per_row).map(|be| be[0])),
            _ => {
                let max = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let bit = i * bpc;
                    let shift = 8 - bpc - (bit % 8);
                    let v = (row[bit / 8] >> shift) as u16 & max;
                    let v = if indexed { v } else { v * 255 / max };
                    out.push(v as u8);
                }
            }
        }
    }
    Ok(out)
}
