//! Pipeline stages for PDF-to-Markdown extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets the
//! page loop run against an in-memory [`source::PdfSource`] in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ extract ──▶ markdown
//! (dir/path) (lopdf)  (page loop)  (assembly)
//!                        │
//!                        └──▶ raster ──▶ composite ──▶ PNG
//! ```
//!
//! 1. [`input`]     — list `*.pdf` in a directory, or vet a single path
//! 2. [`source`]    — page text, image references and raw image bytes
//! 3. [`extract`]   — per-document dedup and per-page numbering; writes PNGs
//! 4. [`raster`]    — decode raw bytes into an explicit color-mode enum
//! 5. [`composite`] — merge an image with its soft mask into RGBA
//! 6. [`markdown`]  — the final document text

pub mod composite;
pub mod extract;
pub mod input;
pub mod markdown;
pub mod raster;
pub mod source;
