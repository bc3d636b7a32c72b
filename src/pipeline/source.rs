//! The PDF side of the pipeline: page text, image references and raw image
//! bytes.
//!
//! ## Why a trait?
//!
//! The compositor and the page loop only need four questions answered about
//! a document (what text is on page N, which images does it show, what does
//! image X's dictionary say, give me image X's bytes). [`PdfSource`] is that
//! contract. [`LopdfSource`] answers it from a real file; tests answer it
//! from a handful of `HashMap`s.
//!
//! ## Why lopdf?
//!
//! Soft masks are linked by object number (`/SMask 12 0 R`). Rendering
//! libraries flatten that away; lopdf hands us the object graph with every
//! reference intact, and its stream filters cover Flate, LZW and ASCII
//! encodings without any native library.

use crate::error::Pdf2MdError;
use crate::output::DocumentMetadata;
use crate::pipeline::raster::{RawImage, SampleColor, SampleLayout};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Nesting limit for Form XObjects inside Form XObjects.
const MAX_FORM_DEPTH: usize = 16;

// ── Types ────────────────────────────────────────────────────────────────

/// An indirect object reference (`12 0 R`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

impl ObjectRef {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

impl From<ObjectId> for ObjectRef {
    fn from((number, generation): ObjectId) -> Self {
        Self { number, generation }
    }
}

impl From<ObjectRef> for ObjectId {
    fn from(r: ObjectRef) -> Self {
        (r.number, r.generation)
    }
}

/// Typed view of an image XObject dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDict {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bits_per_component: Option<u8>,
    /// Family name of the color space (`DeviceRGB`, `Indexed`, `ICCBased`, …).
    pub color_space: Option<String>,
    pub filters: Vec<String>,
    /// The `/SMask` reference, if the image has one.
    pub soft_mask: Option<ObjectRef>,
    /// `/ImageMask true`: a 1-bit stencil rather than a color image.
    pub image_mask: bool,
}

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },

    #[error("object {id}: {detail}")]
    Object { id: ObjectRef, detail: String },

    #[error("object {id} is not an image XObject")]
    NotAnImage { id: ObjectRef },

    #[error("object {id}: unsupported {what}")]
    Unsupported { id: ObjectRef, what: String },
}

/// Everything the page loop needs from a PDF document.
///
/// Pages are 1-indexed throughout.
pub trait PdfSource {
    fn page_count(&self) -> usize;

    /// Plain text of a page; empty when the page has none.
    fn page_text(&self, page: usize) -> Result<String, SourceError>;

    /// Image references in the order the page's resources list them.
    fn list_images(&self, page: usize) -> Result<Vec<ObjectRef>, SourceError>;

    fn object_dict(&self, id: ObjectRef) -> Result<ImageDict, SourceError>;

    fn extract_raw_image(&self, id: ObjectRef) -> Result<RawImage, SourceError>;
}

// ── lopdf implementation ─────────────────────────────────────────────────

/// [`PdfSource`] backed by an in-memory [`lopdf::Document`].
pub struct LopdfSource {
    doc: Document,
    /// Page object ids, index 0 = page 1.
    pages: Vec<ObjectId>,
}

impl LopdfSource {
    /// Open a PDF file.
    pub fn open(path: &Path) -> Result<Self, Pdf2MdError> {
        let doc = Document::load(path).map_err(|e| Pdf2MdError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let source = Self::from_document(doc);
        info!("PDF loaded: {} ({} pages)", path.display(), source.pages.len());
        Ok(source)
    }

    /// Parse a PDF held in memory. `name` is only used in error messages.
    pub fn from_bytes(bytes: &[u8], name: &str) -> Result<Self, Pdf2MdError> {
        let doc = Document::load_mem(bytes).map_err(|e| Pdf2MdError::CorruptPdf {
            path: name.into(),
            detail: e.to_string(),
        })?;
        Ok(Self::from_document(doc))
    }

    fn from_document(doc: Document) -> Self {
        let pages = doc.get_pages().into_values().collect();
        Self { doc, pages }
    }

    fn page_id(&self, page: usize) -> Result<ObjectId, SourceError> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .copied()
            .ok_or_else(|| SourceError::Page {
                page,
                detail: format!("out of range (document has {} pages)", self.pages.len()),
            })
    }

    fn image_stream(&self, id: ObjectRef) -> Result<&Stream, SourceError> {
        let obj = self
            .doc
            .get_object(id.into())
            .map_err(|e| SourceError::Object {
                id,
                detail: e.to_string(),
            })?;
        let stream = obj.as_stream().map_err(|_| SourceError::NotAnImage { id })?;
        match stream.dict.get(b"Subtype") {
            Ok(Object::Name(n)) if n == b"Image" => Ok(stream),
            _ => Err(SourceError::NotAnImage { id }),
        }
    }

    /// Document-level facts plus image and soft-mask counts.
    pub fn metadata(&self) -> DocumentMetadata {
        let info = self
            .doc
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|o| self.resolve(o).as_dict().ok());
        let text = |key: &[u8]| info.and_then(|d| info_string(self.resolve(d.get(key).ok()?)));

        let mut images = HashSet::new();
        for page in 1..=self.pages.len() {
            match self.list_images(page) {
                Ok(refs) => images.extend(refs),
                Err(e) => warn!("Could not list images: {}", e),
            }
        }
        let soft_masks = images
            .iter()
            .filter_map(|&id| self.object_dict(id).ok()?.soft_mask)
            .collect::<HashSet<_>>()
            .len();

        DocumentMetadata {
            title: text(b"Title"),
            author: text(b"Author"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            page_count: self.pages.len(),
            pdf_version: self.doc.version.clone(),
            is_encrypted: self.doc.is_encrypted(),
            image_count: images.len(),
            soft_mask_count: soft_masks,
        }
    }

    /// Follow indirect references until a direct object is reached.
    fn resolve<'a>(&'a self, mut obj: &'a Object) -> &'a Object {
        // Bounded so a reference cycle cannot spin forever.
        for _ in 0..32 {
            match obj {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(next) => obj = next,
                    Err(_) => return obj,
                },
                _ => return obj,
            }
        }
        obj
    }

    /// `/Resources` of a page, inherited through `/Parent` when absent.
    fn page_resources(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let mut current = page_id;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            let dict = self.doc.get_object(current).ok()?.as_dict().ok()?;
            if let Ok(res) = dict.get(b"Resources") {
                return self.resolve(res).as_dict().ok();
            }
            current = dict.get(b"Parent").ok()?.as_reference().ok()?;
        }
        None
    }

    /// Collect image XObjects from a resource dictionary, descending into
    /// Form XObjects.
    fn collect_images(
        &self,
        resources: &Dictionary,
        depth: usize,
        visited_forms: &mut HashSet<ObjectId>,
        out: &mut Vec<ObjectRef>,
    ) {
        let Some(xobjects) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| self.resolve(o).as_dict().ok())
        else {
            return;
        };

        for (name, value) in xobjects.iter() {
            // Only indirect XObjects have an identity worth deduplicating on.
            let Object::Reference(id) = value else {
                debug!("Skipping direct XObject /{}", String::from_utf8_lossy(name));
                continue;
            };
            let Ok(stream) = self.doc.get_object(*id).and_then(Object::as_stream) else {
                continue;
            };
            match stream.dict.get(b"Subtype") {
                Ok(Object::Name(n)) if n == b"Image" => out.push(ObjectRef::from(*id)),
                Ok(Object::Name(n)) if n == b"Form" => {
                    if depth >= MAX_FORM_DEPTH || !visited_forms.insert(*id) {
                        continue;
                    }
                    if let Some(form_res) = stream
                        .dict
                        .get(b"Resources")
                        .ok()
                        .and_then(|o| self.resolve(o).as_dict().ok())
                    {
                        self.collect_images(form_res, depth + 1, visited_forms, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn sample_layout(&self, id: ObjectRef, dict: &Dictionary) -> Result<SampleLayout, SourceError> {
        let int = |key: &[u8]| dict.get(key).ok().and_then(|o| self.resolve(o).as_i64().ok());
        let dimension = |key: &[u8]| {
            int(key)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|&v| v > 0)
                .ok_or_else(|| SourceError::Object {
                    id,
                    detail: format!("missing or invalid /{}", String::from_utf8_lossy(key)),
                })
        };
        let width = dimension(b"Width")?;
        let height = dimension(b"Height")?;

        if is_true(dict.get(b"ImageMask").ok()) {
            // Stencil: sample 0 paints, which already reads as black on white.
            return Ok(SampleLayout::new(width, height, 1, SampleColor::Gray));
        }

        let bpc = int(b"BitsPerComponent").unwrap_or(8);
        let bpc = u8::try_from(bpc).map_err(|_| SourceError::Unsupported {
            id,
            what: format!("/BitsPerComponent {bpc}"),
        })?;

        let cs = dict
            .get(b"ColorSpace")
            .map_err(|_| SourceError::Object {
                id,
                detail: "missing /ColorSpace".into(),
            })?;
        let mut color = self.sample_color(id, cs, 0)?;

        if let SampleColor::Indexed { color_key, .. } = &mut color {
            *color_key = self.color_key(dict);
        }

        let mut layout = SampleLayout::new(width, height, bpc, color);
        if matches!(layout.color, SampleColor::Gray) && self.decode_inverted(dict) {
            layout = layout.inverted();
        }
        Ok(layout)
    }

    fn sample_color(&self, id: ObjectRef, cs: &Object, depth: usize) -> Result<SampleColor, SourceError> {
        let unsupported = |what: String| SourceError::Unsupported { id, what };
        if depth > 4 {
            return Err(unsupported("color space nesting".into()));
        }

        match self.resolve(cs) {
            Object::Name(name) => match name.as_slice() {
                b"DeviceGray" | b"CalGray" | b"G" => Ok(SampleColor::Gray),
                b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(SampleColor::Rgb),
                b"DeviceCMYK" | b"CMYK" => Ok(SampleColor::Cmyk),
                other => Err(unsupported(format!(
                    "color space /{}",
                    String::from_utf8_lossy(other)
                ))),
            },
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|o| self.resolve(o).as_name().ok())
                    .unwrap_or_default();
                match family {
                    b"ICCBased" => {
                        let n = items
                            .get(1)
                            .and_then(|o| self.resolve(o).as_stream().ok())
                            .and_then(|s| s.dict.get(b"N").ok()?.as_i64().ok());
                        match n {
                            Some(1) => Ok(SampleColor::Gray),
                            Some(3) => Ok(SampleColor::Rgb),
                            Some(4) => Ok(SampleColor::Cmyk),
                            _ => Err(unsupported(format!("ICCBased with /N {n:?}"))),
                        }
                    }
                    b"Indexed" | b"I" => {
                        let base = items
                            .get(1)
                            .ok_or_else(|| unsupported("Indexed without base".into()))?;
                        let base = self.sample_color(id, base, depth + 1)?;
                        let hival = items
                            .get(2)
                            .and_then(|o| self.resolve(o).as_i64().ok())
                            .unwrap_or(255)
                            .clamp(0, 255) as usize;
                        let lookup = items
                            .get(3)
                            .map(|o| self.lookup_bytes(o))
                            .unwrap_or_default();
                        Ok(SampleColor::Indexed {
                            palette: expand_palette(&base, &lookup, hival + 1),
                            color_key: None,
                        })
                    }
                    b"CalGray" | b"DeviceGray" => Ok(SampleColor::Gray),
                    b"CalRGB" | b"DeviceRGB" => Ok(SampleColor::Rgb),
                    other => Err(unsupported(format!(
                        "color space /{}",
                        String::from_utf8_lossy(other)
                    ))),
                }
            }
            other => Err(unsupported(format!("color space object {other:?}"))),
        }
    }

    /// Palette bytes of an `/Indexed` color space: a string or a stream.
    fn lookup_bytes(&self, obj: &Object) -> Vec<u8> {
        match self.resolve(obj) {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => self
                .decode_filters(stream, &filters(&stream.dict))
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// `/Mask [lo hi]` on an indexed image.
    fn color_key(&self, dict: &Dictionary) -> Option<RangeInclusive<u8>> {
        let Object::Array(range) = self.resolve(dict.get(b"Mask").ok()?) else {
            return None;
        };
        let bound = |i: usize| {
            range
                .get(i)
                .and_then(|o| o.as_i64().ok())
                .map(|v| v.clamp(0, 255) as u8)
        };
        Some(bound(0)?..=bound(1)?)
    }

    fn decode_inverted(&self, dict: &Dictionary) -> bool {
        let Some(Object::Array(decode)) = dict.get(b"Decode").ok().map(|o| self.resolve(o)) else {
            return false;
        };
        let v = |i: usize| decode.get(i).and_then(|o| o.as_float().ok());
        matches!((v(0), v(1)), (Some(a), Some(b)) if a > b)
    }

    /// Stream content with the leading `applied` filters undone.
    ///
    /// lopdf only reads `/DecodeParms` when it is a direct dictionary, so an
    /// array or reference is resolved here first.
    fn decode_filters(&self, stream: &Stream, applied: &[String]) -> Result<Vec<u8>, String> {
        if applied.is_empty() {
            return Ok(stream.content.clone());
        }
        let failed = |e: lopdf::Error| format!("failed to decompress stream: {e}");

        let raw_params = stream.dict.get(b"DecodeParms").ok();
        let direct = matches!(raw_params, None | Some(Object::Dictionary(_)));
        if direct && applied.len() == filters(&stream.dict).len() {
            return stream.decompressed_content().map_err(failed);
        }

        let params = raw_params.and_then(|o| match self.resolve(o) {
            Object::Dictionary(d) => Some(d.clone()),
            Object::Array(items) => items
                .iter()
                .take(applied.len())
                .find_map(|o| self.resolve(o).as_dict().ok())
                .cloned(),
            _ => None,
        });

        let mut dict = stream.dict.clone();
        dict.set(
            "Filter",
            applied
                .iter()
                .map(|f| Object::Name(f.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        );
        match params {
            Some(p) => dict.set("DecodeParms", p),
            None => {
                dict.remove(b"DecodeParms");
            }
        }
        Stream::new(dict, stream.content.clone())
            .decompressed_content()
            .map_err(failed)
    }
}

impl PdfSource for LopdfSource {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, page: usize) -> Result<String, SourceError> {
        self.page_id(page)?;
        self.doc
            .extract_text(&[page as u32])
            .map_err(|e| SourceError::Page {
                page,
                detail: format!("text extraction failed: {e}"),
            })
    }

    fn list_images(&self, page: usize) -> Result<Vec<ObjectRef>, SourceError> {
        let page_id = self.page_id(page)?;
        let mut out = Vec::new();
        if let Some(resources) = self.page_resources(page_id) {
            self.collect_images(resources, 0, &mut HashSet::new(), &mut out);
        }
        debug!("Page {}: {} image reference(s)", page, out.len());
        Ok(out)
    }

    fn object_dict(&self, id: ObjectRef) -> Result<ImageDict, SourceError> {
        let dict = &self.image_stream(id)?.dict;
        let int = |key: &[u8]| dict.get(key).ok().and_then(|o| self.resolve(o).as_i64().ok());

        let color_space = dict.get(b"ColorSpace").ok().and_then(|cs| {
            let family = match self.resolve(cs) {
                Object::Name(n) => n.as_slice(),
                Object::Array(items) => self.resolve(items.first()?).as_name().ok()?,
                _ => return None,
            };
            Some(String::from_utf8_lossy(family).into_owned())
        });

        Ok(ImageDict {
            width: int(b"Width").and_then(|v| u32::try_from(v).ok()),
            height: int(b"Height").and_then(|v| u32::try_from(v).ok()),
            bits_per_component: int(b"BitsPerComponent").and_then(|v| u8::try_from(v).ok()),
            color_space,
            filters: filters(dict),
            soft_mask: dict
                .get(b"SMask")
                .ok()
                .and_then(|o| o.as_reference().ok())
                .map(ObjectRef::from),
            image_mask: is_true(dict.get(b"ImageMask").ok()),
        })
    }

    fn extract_raw_image(&self, id: ObjectRef) -> Result<RawImage, SourceError> {
        let stream = self.image_stream(id)?;
        let filters = filters(&stream.dict);
        let undo = |count: usize| {
            self.decode_filters(stream, &filters[..count])
                .map_err(|detail| SourceError::Object { id, detail })
        };

        match filters.last().map(String::as_str) {
            Some("DCTDecode" | "DCT" | "JPXDecode") => {
                // Transport encodings in front of the codec come off first.
                let encoded = undo(filters.len() - 1)?;
                Ok(RawImage::encoded(encoded))
            }
            Some(f @ ("CCITTFaxDecode" | "CCF" | "JBIG2Decode")) => {
                Err(SourceError::Unsupported {
                    id,
                    what: format!("filter /{f}"),
                })
            }
            _ => {
                let data = undo(filters.len())?;
                let layout = self.sample_layout(id, &stream.dict)?;
                Ok(RawImage::samples(data, layout))
            }
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn filters(dict: &Dictionary) -> Vec<String> {
    let name = |o: &Object| o.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned());
    match dict.get(b"Filter") {
        Ok(Object::Array(items)) => items.iter().filter_map(name).collect(),
        Ok(other) => name(other).into_iter().collect(),
        Err(_) => Vec::new(),
    }
}

fn is_true(obj: Option<&Object>) -> bool {
    matches!(obj, Some(Object::Boolean(true)))
}

/// Expand an `/Indexed` lookup table into RGB entries.
fn expand_palette(base: &SampleColor, lookup: &[u8], entries: usize) -> Vec<[u8; 3]> {
    let width = match base {
        SampleColor::Gray => 1,
        SampleColor::Rgb => 3,
        SampleColor::Cmyk => 4,
        // Not a legal base; treat as gray so indices still render.
        SampleColor::Indexed { .. } => 1,
    };
    lookup
        .chunks_exact(width)
        .take(entries)
        .map(|c| match c {
            [g] => [*g, *g, *g],
            [r, g, b] => [*r, *g, *b],
            [c, m, y, k] => {
                let k = 255 - *k as u32;
                let ch = |v: u8| ((255 - v as u32) * k / 255) as u8;
                [ch(*c), ch(*m), ch(*y)]
            }
            _ => [0, 0, 0],
        })
        .collect()
}

/// A non-blank `/Info` text string (PDFDocEncoding, UTF-16BE or UTF-8).
fn info_string(obj: &Object) -> Option<String> {
    let text = lopdf::decode_text_string(obj).ok()?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    (!text.is_empty()).then(|| text.to_string())
}
