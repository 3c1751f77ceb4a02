//! Shared fixtures: in-memory PDFs built with lopdf, and a fake backend.

#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use pdf2table::{DetectError, DetectionBackend, EncodedImage};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Minimal JPEG-looking payload; passed through untouched, never decoded.
pub fn fake_jpeg_bytes(tag: u8) -> Vec<u8> {
    vec![0xFF, 0xD8, 0xFF, 0xE0, tag, tag, 0x00, 0x10, 0xFF, 0xD9]
}

/// A `DCTDecode` image XObject.
pub fn jpeg_image(tag: u8) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(2),
            "Height" => Object::Integer(2),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        fake_jpeg_bytes(tag),
    )
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// A `FlateDecode` DeviceRGB image, 8 bits per component.
pub fn rgb_flate_image(width: i64, height: i64, pixels: &[u8]) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width),
            "Height" => Object::Integer(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "FlateDecode",
        },
        deflate(pixels),
    )
}

/// An unfiltered DeviceGray image with the given bit depth.
pub fn gray_raw_image(width: i64, height: i64, bpc: i64, samples: &[u8]) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(width),
            "Height" => Object::Integer(height),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => Object::Integer(bpc),
        },
        samples.to_vec(),
    )
}

/// A fax-compressed image, which the materializer does not support.
pub fn ccitt_image() -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(8),
            "Height" => Object::Integer(8),
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => Object::Integer(1),
            "Filter" => "CCITTFaxDecode",
        },
        vec![0u8; 8],
    )
}

/// Where a page's `/Resources` dictionary is attached.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ResourcesOn {
    Page,
    /// On the `/Pages` root, inherited by every page.
    PageTree,
}

/// Build a PDF with one page per entry of `pages`, each page referencing
/// its images through `/Resources /XObject` in the given order.
pub fn build_pdf(pages: Vec<Vec<Stream>>) -> Vec<u8> {
    build_pdf_with(pages, ResourcesOn::Page)
}

pub fn build_pdf_with(pages: Vec<Vec<Stream>>, resources_on: ResourcesOn) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_count = pages.len() as i64;
    let mut kids: Vec<Object> = Vec::new();
    let mut shared_xobjects = Dictionary::new();

    for (p, images) in pages.into_iter().enumerate() {
        let mut xobjects = Dictionary::new();
        for (i, image) in images.into_iter().enumerate() {
            let image_id = doc.add_object(image);
            xobjects.set(format!("Im{}_{}", p + 1, i + 1), image_id);
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q Q".to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        match resources_on {
            ResourcesOn::Page => {
                let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });
                page.set("Resources", resources_id);
            }
            ResourcesOn::PageTree => {
                for (name, value) in xobjects.iter() {
                    shared_xobjects.set(name.clone(), value.clone());
                }
            }
        }
        kids.push(doc.add_object(page).into());
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(page_count),
    };
    if resources_on == ResourcesOn::PageTree {
        tree.set("Resources", dictionary! { "XObject" => shared_xobjects });
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Write `bytes` as `name` under `dir`.
pub fn write_pdf(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// The two-page layout: one image on page 1, two on page 2.
pub fn two_page_pdf() -> Vec<u8> {
    build_pdf(vec![
        vec![jpeg_image(1)],
        vec![jpeg_image(2), rgb_flate_image(2, 1, &[255, 0, 0, 0, 0, 255])],
    ])
}

/// Backend answering a fixed text and recording what it was sent.
pub struct CountingBackend {
    pub calls: AtomicUsize,
    pub answer: String,
    pub mime_types: Mutex<Vec<&'static str>>,
}

impl CountingBackend {
    pub fn new(answer: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer: answer.to_string(),
            mime_types: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionBackend for CountingBackend {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn try_detect(
        &self,
        image: &EncodedImage,
        _instruction: &str,
    ) -> Result<String, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.mime_types.lock().unwrap().push(image.mime_type);
        Ok(self.answer.clone())
    }
}

/// Backend that is slow on the image whose bytes are `fake_jpeg_bytes(slow_tag)`,
/// so later images finish first when requests overlap.
pub struct SlowFirstBackend {
    slow_payload: String,
    delay: Duration,
}

impl SlowFirstBackend {
    pub fn new(slow_tag: u8, delay: Duration) -> Self {
        use base64::Engine;
        Self {
            slow_payload: base64::engine::general_purpose::STANDARD.encode(fake_jpeg_bytes(slow_tag)),
            delay,
        }
    }
}

#[async_trait]
impl DetectionBackend for SlowFirstBackend {
    fn name(&self) -> &'static str {
        "slow-first"
    }

    async fn try_detect(
        &self,
        image: &EncodedImage,
        _instruction: &str,
    ) -> Result<String, DetectError> {
        if image.data == self.slow_payload {
            tokio::time::sleep(self.delay).await;
        }
        Ok("No table".to_string())
    }
}
