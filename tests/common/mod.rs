//! Fixture PDFs for integration tests, built in memory with lopdf.

#![allow(dead_code)]

use lopdf::{dictionary, Document, Object, Stream};

/// One page: size in points and raw content operators.
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub content: Option<&'static str>,
}

impl Page {
    pub fn letter(content: &'static str) -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            content: Some(content),
        }
    }

    pub fn sized(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            content: Some(""),
        }
    }

    /// A page whose `/Contents` points at an object that does not exist.
    pub fn dangling_contents() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            content: None,
        }
    }
}

pub fn build_pdf(pages: &[Page]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let contents = match page.content {
            Some(ops) => Object::Reference(
                doc.add_object(Stream::new(dictionary! {}, ops.as_bytes().to_vec())),
            ),
            None => Object::Reference((9_999, 0)),
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Real(page.width), Object::Real(page.height)],
            "Contents" => contents,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save fixture PDF");
    buf
}

/// `n` US Letter pages, each with a filled rectangle so the JPEGs are not blank.
pub fn letter_pdf(n: usize) -> Vec<u8> {
    let pages: Vec<Page> = (0..n)
        .map(|_| Page::letter("0.2 0.4 0.8 rg 72 72 468 648 re f 0 G 4 w 72 396 m 540 396 l S"))
        .collect();
    build_pdf(&pages)
}
