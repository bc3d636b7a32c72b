//! PDF fixtures shared by the integration tests, built in memory with lopdf.

#![allow(dead_code)]

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

/// Builds a multi-page PDF whose pages each list a set of image XObjects.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn image(&mut self, mut dict: Dictionary, content: Vec<u8>) -> ObjectId {
        dict.set("Type", "XObject");
        dict.set("Subtype", "Image");
        self.doc.add_object(Stream::new(dict, content))
    }

    pub fn page(&mut self, text: Option<&str>, images: &[ObjectId]) {
        let mut xobjects = Dictionary::new();
        for (i, id) in images.iter().enumerate() {
            xobjects.set(format!("Im{i}"), *id);
        }
        let ops = match text {
            Some(t) => format!("BT /F1 12 Tf 72 700 Td ({t}) Tj ET"),
            None => String::new(),
        };
        let content = self.doc.add_object(Stream::new(dictionary! {}, ops.into_bytes()));
        let page = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => self.font_id },
                "XObject" => xobjects,
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        self.kids.push(page.into());
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog);
        let info = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal("Brochure"),
            "Producer" => Object::string_literal("lopdf"),
        });
        self.doc.trailer.set("Info", info);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).expect("save PDF");
        bytes
    }
}

pub fn rgb_image(w: i64, h: i64) -> Dictionary {
    dictionary! {
        "Width" => w,
        "Height" => h,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    }
}

pub fn gray_image(w: i64, h: i64) -> Dictionary {
    dictionary! {
        "Width" => w,
        "Height" => h,
        "ColorSpace" => "DeviceGray",
        "BitsPerComponent" => 8,
    }
}

/// Two pages:
/// 1. text, an 8×8 RGB logo with a 4×4 soft mask of 128, a 2×2 gray image
/// 2. the logo again, plus a keyed 2×1 palette image
pub fn brochure() -> Vec<u8> {
    let mut b = PdfBuilder::new();

    let mask = b.image(gray_image(4, 4), vec![128; 16]);
    let mut logo_dict = rgb_image(8, 8);
    logo_dict.set("SMask", mask);
    let logo = b.image(logo_dict, vec![40; 8 * 8 * 3]);

    let photo = b.image(gray_image(2, 2), vec![0, 85, 170, 255]);

    let palette = Object::String(vec![255, 0, 0, 0, 0, 255], StringFormat::Hexadecimal);
    let keyed = b.image(
        dictionary! {
            "Width" => 2,
            "Height" => 1,
            "BitsPerComponent" => 8,
            "ColorSpace" => vec!["Indexed".into(), "DeviceRGB".into(), 1.into(), palette],
            "Mask" => vec![0.into(), 0.into()],
        },
        vec![0, 1],
    );

    b.page(Some("Hello soft mask"), &[logo, photo]);
    b.page(None, &[logo, keyed]);
    b.to_bytes()
}
