//! Markdown assembly.
//!
//! The layout is fixed so downstream tooling can rely on it:
//!
//! ```text
//! # <name>
//!
//!
//! ---
//!
//! ## Page 1
//!
//! <page text>
//!
//! ![Image 1](images/page1_img1.png)
//! ```
//!
//! Each page opens with a horizontal rule and a level-2 heading, page text
//! follows only when it is not blank, then one image link per extracted
//! image in encounter order. Skipped images leave no trace in the Markdown.

use crate::output::PageResult;

/// Assemble the full document from its page results.
pub fn render_document(name: &str, pages: &[PageResult]) -> String {
    let mut out = format!("# {name}\n\n");
    for page in pages {
        push_page(&mut out, page);
    }
    out
}

/// Append one page section to `out`.
pub fn push_page(out: &mut String, page: &PageResult) {
    out.push_str(&format!("\n---\n\n## Page {}\n\n", page.page_num));

    if !page.text.trim().is_empty() {
        out.push_str(&page.text);
        out.push('\n');
    }

    for image in &page.images {
        out.push_str(&format!("\n![Image {}]({})\n", image.index, image.link()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ExtractedImage;
    use crate::pipeline::composite::AlphaSource;
    use crate::pipeline::raster::ColorMode;
    use crate::pipeline::source::ObjectRef;

    fn image(page: usize, k: usize) -> ExtractedImage {
        ExtractedImage {
            index: k,
            file_name: format!("page{page}_img{k}.png"),
            reference: ObjectRef::new(10 + k as u32, 0),
            width: 1,
            height: 1,
            base_mode: ColorMode::Rgb,
            alpha: AlphaSource::Base,
        }
    }

    #[test]
    fn document_layout_is_exact() {
        let pages = vec![
            PageResult {
                page_num: 1,
                text: "Hello world".into(),
                images: vec![image(1, 1), image(1, 2)],
                skipped: vec![],
            },
            PageResult {
                page_num: 2,
                text: "  \n\t".into(),
                images: vec![],
                skipped: vec![],
            },
        ];

        let md = render_document("report", &pages);
        assert_eq!(
            md,
            "# report\n\n\
             \n---\n\n## Page 1\n\n\
             Hello world\n\
             \n![Image 1](images/page1_img1.png)\n\
             \n![Image 2](images/page1_img2.png)\n\
             \n---\n\n## Page 2\n\n"
        );
    }

    #[test]
    fn empty_document_is_only_a_heading() {
        assert_eq!(render_document("empty", &[]), "# empty\n\n");
    }

    #[test]
    fn text_is_kept_verbatim() {
        let mut out = String::new();
        push_page(
            &mut out,
            &PageResult {
                page_num: 3,
                text: "  indented\nline two\n".into(),
                ..Default::default()
            },
        );
        assert_eq!(out, "\n---\n\n## Page 3\n\n  indented\nline two\n\n");
    }
}
