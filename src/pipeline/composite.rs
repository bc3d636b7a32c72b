//! Mask compositing: base image + optional soft mask → RGBA PNG.
//!
//! A PDF image with transparency is stored as two objects: the color image
//! and a separate single-channel `/SMask` image whose samples are per-pixel
//! opacity. Viewers combine them at render time; once the color image is
//! pulled out on its own that link is lost, and the result is the familiar
//! black box around every logo. This stage restores it.
//!
//! ## Rules
//!
//! With a mask, the (possibly resampled) mask samples **replace** the alpha
//! channel of the RGBA-normalised base. It is a direct copy, never a
//! multiply over alpha the base might already carry.
//!
//! Without a mask, the base keeps whatever transparency it has: RGBA passes
//! through untouched, gray+alpha keeps its alpha, a keyed palette yields
//! binary 0/255 alpha and everything else comes out fully opaque.
//!
//! A mask that is referenced but cannot be fetched or decoded is logged and
//! treated as absent. It never costs us the image itself.

use crate::config::ResampleFilter;
use crate::error::ImageError;
use crate::pipeline::raster::{ColorMode, RawImage, Raster};
use image::{imageops, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, warn};

/// Where the alpha channel of a [`Composited`] image came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaSource {
    /// Copied from the soft mask; `resampled` when the mask had to be
    /// scaled to the base image's size.
    SoftMask { resampled: bool },
    /// No mask referenced: the base image's own transparency, or opaque.
    Base,
    /// A mask was referenced but unusable; same alpha as [`AlphaSource::Base`].
    Fallback { reason: String },
}

/// A composited image ready to be written to disk.
#[derive(Debug, Clone)]
pub struct Composited {
    /// PNG bytes, always 8-bit RGBA.
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Color mode the base image was decoded in.
    pub base_mode: ColorMode,
    pub alpha: AlphaSource,
}

/// Composite an embedded image with its soft mask and encode it as PNG.
///
/// `mask_lookup` is only called once the base image has decoded. It returns
/// `None` when the image references no soft mask, `Some(Err(_))` when the
/// reference exists but cannot be resolved, and `Some(Ok(raw))` with the
/// mask's bytes otherwise.
///
/// # Errors
/// [`ImageError::Decode`] if the base bytes are not a decodable raster and
/// [`ImageError::Encode`] if PNG encoding fails. Mask problems are never
/// returned; they downgrade to [`AlphaSource::Fallback`].
pub fn composite<F>(
    base: &RawImage,
    mask_lookup: F,
    filter: ResampleFilter,
) -> Result<Composited, ImageError>
where
    F: FnOnce() -> Option<Result<RawImage, ImageError>>,
{
    let base = Raster::decode(base)?;
    let base_mode = base.mode();
    let (width, height) = base.dimensions();

    let (mask, alpha) = match mask_lookup() {
        None => (None, AlphaSource::Base),
        Some(lookup) => match lookup.and_then(|raw| Raster::decode(&raw)) {
            Ok(mask) => {
                let resampled = mask.dimensions() != (width, height);
                (Some(mask), AlphaSource::SoftMask { resampled })
            }
            Err(e) => {
                warn!("Could not apply soft mask, keeping image alpha: {}", e);
                (
                    None,
                    AlphaSource::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        },
    };

    let rgba = composite_raster(base, mask, filter);
    let png = encode_png(&rgba)?;
    debug!(
        "Composited {:?} image {}x{} ({:?}) → {} bytes PNG",
        base_mode,
        width,
        height,
        alpha,
        png.len()
    );

    Ok(Composited {
        png,
        width,
        height,
        base_mode,
        alpha,
    })
}

/// Pixel-level step of [`composite`]: normalise `base` to RGBA and, when a
/// mask is given, overwrite its alpha with the mask's luminance.
///
/// The mask is resampled with `filter` when its size differs from the base.
/// Output dimensions always equal the base dimensions.
pub fn composite_raster(base: Raster, mask: Option<Raster>, filter: ResampleFilter) -> RgbaImage {
    let (width, height) = base.dimensions();
    let mut rgba = base.into_rgba();

    if let Some(mask) = mask {
        let mut mask = mask.into_luma();
        if mask.dimensions() != (width, height) {
            debug!(
                "Resampling soft mask {}x{} → {}x{} ({:?})",
                mask.width(),
                mask.height(),
                width,
                height,
                filter
            );
            mask = imageops::resize(&mask, width, height, filter.into());
        }
        for (px, m) in rgba.pixels_mut().zip(mask.pixels()) {
            px[3] = m[0];
        }
    }

    rgba
}

/// Encode an RGBA image as PNG.
///
/// PNG is lossless and carries a full 8-bit alpha channel.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ImageError::Encode {
            detail: e.to_string(),
        })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::raster::{SampleColor, SampleLayout};
    use crate::pipeline::source::ObjectRef;
    use image::{DynamicImage, GrayAlphaImage, GrayImage, LumaA, Luma, Rgb, RgbImage, Rgba};

    const LANCZOS: ResampleFilter = ResampleFilter::Lanczos3;

    fn png_of(img: DynamicImage) -> RawImage {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        RawImage::encoded(buf)
    }

    fn gray_mask(w: u32, h: u32, f: impl Fn(u32, u32) -> u8) -> RawImage {
        let data = (0..h)
            .flat_map(|y| (0..w).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        RawImage::samples(data, SampleLayout::new(w, h, 8, SampleColor::Gray))
    }

    fn decode_output(out: &Composited) -> RgbaImage {
        let img = image::load_from_memory_with_format(&out.png, ImageFormat::Png).unwrap();
        assert!(
            matches!(img, DynamicImage::ImageRgba8(_)),
            "output PNG must be RGBA8"
        );
        img.to_rgba8()
    }

    fn no_mask() -> Option<Result<RawImage, ImageError>> {
        None
    }

    #[test]
    fn every_base_mode_comes_out_rgba_with_same_size() {
        let bases = vec![
            (
                ColorMode::Gray,
                RawImage::samples(vec![7; 15], SampleLayout::new(5, 3, 8, SampleColor::Gray)),
            ),
            (
                ColorMode::Rgb,
                RawImage::samples(vec![7; 45], SampleLayout::new(5, 3, 8, SampleColor::Rgb)),
            ),
            (
                ColorMode::Cmyk,
                RawImage::samples(vec![7; 60], SampleLayout::new(5, 3, 8, SampleColor::Cmyk)),
            ),
            (
                ColorMode::Indexed,
                RawImage::samples(
                    vec![0; 15],
                    SampleLayout::new(
                        5,
                        3,
                        8,
                        SampleColor::Indexed {
                            palette: vec![[1, 2, 3]],
                            color_key: None,
                        },
                    ),
                ),
            ),
            (
                ColorMode::GrayAlpha,
                png_of(DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(
                    5,
                    3,
                    LumaA([7, 9]),
                ))),
            ),
            (
                ColorMode::Rgba,
                png_of(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                    5,
                    3,
                    Rgba([1, 2, 3, 4]),
                ))),
            ),
        ];

        for (mode, raw) in bases {
            for with_mask in [false, true] {
                let out = composite(
                    &raw,
                    || with_mask.then(|| Ok(gray_mask(2, 2, |_, _| 40))),
                    LANCZOS,
                )
                .unwrap();
                assert_eq!(out.base_mode, mode);
                let img = decode_output(&out);
                assert_eq!(img.dimensions(), (5, 3), "{mode:?} mask={with_mask}");
                assert_eq!((out.width, out.height), (5, 3));
            }
        }
    }

    #[test]
    fn same_size_mask_survives_png_round_trip_exactly() {
        let base = png_of(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            7,
            4,
            Rgb([10, 20, 30]),
        )));
        let mask = gray_mask(7, 4, |x, y| (x * 37 + y * 11) as u8);
        let expected = mask.clone();

        let out = composite(&base, || Some(Ok(mask)), LANCZOS).unwrap();
        assert_eq!(out.alpha, AlphaSource::SoftMask { resampled: false });

        let alphas: Vec<u8> = decode_output(&out).pixels().map(|p| p[3]).collect();
        assert_eq!(alphas, expected.data);
    }

    #[test]
    fn mask_replaces_existing_alpha_instead_of_multiplying() {
        let base = png_of(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            2,
            2,
            Rgba([50, 60, 70, 100]),
        )));
        let out = composite(&base, || Some(Ok(gray_mask(2, 2, |_, _| 200))), LANCZOS).unwrap();
        assert!(decode_output(&out)
            .pixels()
            .all(|p| p.0 == [50, 60, 70, 200]));
    }

    #[test]
    fn upscaled_mask_keeps_corner_values() {
        // 12x12 mask of four uniform 6x6 quadrants, stretched to 24x24.
        let quadrant = |x: u32, y: u32| match (x < 6, y < 6) {
            (true, true) => 0,
            (false, true) => 255,
            (true, false) => 100,
            (false, false) => 180,
        };
        let base = RawImage::samples(vec![0; 24 * 24 * 3], SampleLayout::new(24, 24, 8, SampleColor::Rgb));
        let out = composite(&base, || Some(Ok(gray_mask(12, 12, quadrant))), LANCZOS).unwrap();
        assert_eq!(out.alpha, AlphaSource::SoftMask { resampled: true });

        let img = decode_output(&out);
        assert_eq!(img.dimensions(), (24, 24));
        for (x, y, want) in [(0, 0, 0), (23, 0, 255), (0, 23, 100), (23, 23, 180)] {
            let got = img.get_pixel(x, y)[3];
            assert!(got.abs_diff(want) <= 2, "corner ({x},{y}): {got} vs {want}");
        }
    }

    #[test]
    fn downscaled_mask_keeps_corner_values() {
        let quadrant = |x: u32, y: u32| if (x < 10) == (y < 10) { 30 } else { 220 };
        let base = RawImage::samples(vec![0; 100], SampleLayout::new(10, 10, 8, SampleColor::Gray));
        let out = composite(&base, || Some(Ok(gray_mask(20, 20, quadrant))), LANCZOS).unwrap();

        let img = decode_output(&out);
        assert_eq!(img.dimensions(), (10, 10));
        for (x, y, want) in [(0, 0, 30), (9, 0, 220), (0, 9, 220), (9, 9, 30)] {
            let got = img.get_pixel(x, y)[3];
            assert!(got.abs_diff(want) <= 2, "corner ({x},{y}): {got} vs {want}");
        }
    }

    #[test]
    fn rgba_without_mask_is_identity() {
        let mut src = RgbaImage::new(6, 5);
        for (x, y, px) in src.enumerate_pixels_mut() {
            *px = Rgba([x as u8, y as u8, 9, (x * 40 + y * 3) as u8]);
        }
        let out = composite(&png_of(DynamicImage::ImageRgba8(src.clone())), no_mask, LANCZOS).unwrap();
        assert_eq!(out.alpha, AlphaSource::Base);
        assert_eq!(decode_output(&out), src);
    }

    #[test]
    fn keyed_palette_without_mask_has_binary_alpha() {
        let layout = SampleLayout::new(
            4,
            4,
            8,
            SampleColor::Indexed {
                palette: vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]],
                color_key: Some(1..=1),
            },
        );
        let indices = (0..16).map(|i| (i % 3) as u8).collect();
        let out = composite(&RawImage::samples(indices, layout), no_mask, LANCZOS).unwrap();

        let img = decode_output(&out);
        assert!(img.pixels().all(|p| p[3] == 0 || p[3] == 255));
        assert!(img.pixels().any(|p| p[3] == 0));
        assert!(img.pixels().any(|p| p[3] == 255));
    }

    #[test]
    fn gray_alpha_without_mask_keeps_its_alpha() {
        let base = png_of(DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(
            3,
            3,
            LumaA([120, 77]),
        )));
        let out = composite(&base, no_mask, LANCZOS).unwrap();
        assert!(decode_output(&out).pixels().all(|p| p.0 == [120, 120, 120, 77]));
    }

    #[test]
    fn unresolvable_mask_falls_back_to_opaque() {
        let base = RawImage::samples(vec![5; 12], SampleLayout::new(2, 2, 8, SampleColor::Rgb));
        let out = composite(
            &base,
            || {
                Some(Err(ImageError::MaskResolution {
                    mask: ObjectRef::new(99, 0),
                    reason: "object not found".into(),
                }))
            },
            LANCZOS,
        )
        .unwrap();

        assert!(matches!(out.alpha, AlphaSource::Fallback { ref reason } if reason.contains("99 0 R")));
        assert!(decode_output(&out).pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn undecodable_mask_falls_back_to_base_alpha() {
        let base = png_of(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            2,
            2,
            Rgba([1, 1, 1, 33]),
        )));
        let out = composite(
            &base,
            || Some(Ok(RawImage::encoded(b"garbage".to_vec()))),
            LANCZOS,
        )
        .unwrap();
        assert!(matches!(out.alpha, AlphaSource::Fallback { .. }));
        assert!(decode_output(&out).pixels().all(|p| p[3] == 33));
    }

    #[test]
    fn undecodable_base_is_a_decode_error() {
        let err = composite(&RawImage::encoded(vec![0; 16]), no_mask, LANCZOS).unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }));
    }

    #[test]
    fn mask_lookup_not_called_when_base_fails() {
        let mut called = false;
        let _ = composite(
            &RawImage::encoded(vec![1, 2, 3]),
            || {
                called = true;
                None
            },
            LANCZOS,
        );
        assert!(!called);
    }

    #[test]
    fn uniform_half_mask_over_larger_rgb_base() {
        let base = RawImage::samples(
            vec![200; 10 * 10 * 3],
            SampleLayout::new(10, 10, 8, SampleColor::Rgb),
        );
        let out = composite(&base, || Some(Ok(gray_mask(5, 5, |_, _| 128))), LANCZOS).unwrap();

        let img = decode_output(&out);
        assert_eq!(img.dimensions(), (10, 10));
        assert!(img.pixels().all(|p| p[3] == 128));
    }

    #[test]
    fn rgb_mask_is_reduced_to_luminance() {
        let base = Raster::Gray(GrayImage::from_pixel(2, 1, Luma([0])));
        let mask = Raster::Rgb(RgbImage::from_pixel(2, 1, Rgb([255, 255, 255])));
        let out = composite_raster(base, Some(mask), ResampleFilter::Nearest);
        assert!(out.pixels().all(|p| p[3] == 255));
    }
}
