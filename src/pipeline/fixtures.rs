//! Fixture PDFs for unit tests, built in memory with lopdf.

use lopdf::{
    dictionary, Dictionary, Document, EncryptionState, EncryptionVersion, Object, ObjectId,
    Permissions, Stream,
};

pub(crate) struct FixturePage {
    pub media_box: [f32; 4],
    pub rotate: Option<i64>,
    pub content: Vec<u8>,
    pub xobjects: Vec<(&'static str, Stream)>,
}

impl FixturePage {
    pub fn new(width: f32, height: f32, content: &str) -> Self {
        Self {
            media_box: [0.0, 0.0, width, height],
            rotate: None,
            content: content.as_bytes().to_vec(),
            xobjects: Vec::new(),
        }
    }

    pub fn letter(content: &str) -> Self {
        Self::new(612.0, 792.0, content)
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }

    pub fn with_xobject(mut self, name: &'static str, stream: Stream) -> Self {
        self.xobjects.push((name, stream));
        self
    }
}

fn rect(values: [f32; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

/// Serialise `pages` into a PDF byte buffer.
pub(crate) fn build_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page.content.clone()));

        let mut xobjects = Dictionary::new();
        for (name, stream) in &page.xobjects {
            let id = doc.add_object(stream.clone());
            xobjects.set(*name, Object::Reference(id));
        }

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => rect(page.media_box),
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        };
        if let Some(rotate) = page.rotate {
            page_dict.set("Rotate", Object::Integer(rotate));
        }
        kids.push(doc.add_object(page_dict).into());
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

/// `n` blank US Letter pages.
pub(crate) fn blank_letter_pdf(n: usize) -> Vec<u8> {
    let pages: Vec<FixturePage> = (0..n).map(|_| FixturePage::letter("")).collect();
    build_pdf(&pages)
}

/// An uncompressed 8-bit RGB image XObject.
pub(crate) fn rgb_image_xobject(width: u32, height: u32, pixels: Vec<u8>) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        pixels,
    )
}

/// A Form XObject with the given content and bounding box.
pub(crate) fn form_xobject(bbox: [f32; 4], content: &str) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => rect(bbox),
        },
        content.as_bytes().to_vec(),
    )
}

/// Re-save `bytes` encrypted (RC4, 128-bit) with the given user password.
pub(crate) fn encrypted_pdf(bytes: &[u8], user_password: &str) -> Vec<u8> {
    let mut doc = Document::load_mem(bytes).expect("fixture loads");
    let id = Object::string_literal("pdf-recode-fixture");
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));

    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    })
    .expect("encryption state");
    doc.encrypt(&state).expect("encrypt fixture");

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save encrypted fixture");
    buf
}
