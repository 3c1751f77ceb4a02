//! Image materializer: every embedded raster image of a PDF → one file on disk.
//!
//! ## Ordering
//!
//! Pages are walked in ascending page number. Within a page, images are
//! listed in the order their names appear in the page's `/Resources
//! /XObject` dictionary, descending depth-first into Form XObjects. An
//! object referenced twice on the same page is listed once. The output file
//! name is a pure function of `(page, image index)`, so re-running the
//! extraction overwrites the same files with the same bytes.
//!
//! ## Formats
//!
//! Images whose final filter is an image codec (`DCTDecode`, `JPXDecode`,
//! `JBIG2Decode`) are written byte-for-byte with the matching extension.
//! Images stored as raw samples (`FlateDecode` or unfiltered) have no file
//! format of their own, so the samples are wrapped in a PNG. The extension
//! always reflects what this facility produced; no format sniffing happens
//! afterwards.
//!
//! ## Why spawn_blocking?
//!
//! Parsing and inflating are CPU-bound and use blocking file I/O. The
//! document is opened, fully consumed and dropped inside the blocking task,
//! so its lifetime never overlaps with network activity.

use crate::error::ExtractError;
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::borrow::Cow;
use std::collections::HashSet;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Guard against cyclic `/Parent` chains in malformed page trees.
const MAX_TREE_DEPTH: usize = 64;

static BLACK: [u8; 4] = [0; 4];

/// File name of the `index`-th image (1-indexed) on page `page` (1-indexed).
pub fn image_file_name(page: usize, index: usize, ext: &str) -> String {
    format!("page_{page}_img_{index}.{ext}")
}

/// Extract all images, degrading any failure to an empty list.
///
/// The failure is logged at `error` level. Use [`try_extract_images`] when
/// the caller needs the reason.
pub async fn extract_images(pdf_path: &Path, output_dir: &Path) -> Vec<PathBuf> {
    match try_extract_images(pdf_path, output_dir).await {
        Ok(paths) => paths,
        Err(e) => {
            error!("Image extraction failed: {}", e);
            Vec::new()
        }
    }
}

/// Extract all images on the blocking pool.
///
/// The first error aborts the remaining extraction; files written before it
/// stay on disk.
pub async fn try_extract_images(
    pdf_path: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ExtractError> {
    let pdf = pdf_path.to_path_buf();
    let out = output_dir.to_path_buf();

    tokio::task::spawn_blocking(move || extract_images_blocking(&pdf, &out))
        .await
        .map_err(|e| ExtractError::Task(e.to_string()))?
}

/// Blocking implementation of image extraction.
pub fn extract_images_blocking(
    pdf_path: &Path,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, ExtractError> {
    std::fs::create_dir_all(output_dir).map_err(|source| ExtractError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let document = Document::load(pdf_path).map_err(|e| ExtractError::Open {
        path: pdf_path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut written = Vec::new();
    for (&page_num, &page_id) in &pages {
        let page = page_num as usize;
        let objects = page_image_objects(&document, page, page_id)?;
        debug!("Page {}: {} embedded images", page, objects.len());

        for (i, object) in objects.into_iter().enumerate() {
            let image = extract_image(&document, page, object)?;
            let path = output_dir.join(image_file_name(page, i + 1, image.ext));
            std::fs::write(&path, &image.bytes).map_err(|source| ExtractError::Write {
                path: path.clone(),
                source,
            })?;
            debug!(
                "Wrote {} ({} bytes, object {} {} R)",
                path.display(),
                image.bytes.len(),
                object.0,
                object.1
            );
            written.push(path);
        }
    }

    info!("Extracted {} images to {}", written.len(), output_dir.display());
    Ok(written)
}

// ── Discovery ────────────────────────────────────────────────────────────

/// Image XObjects used by a page, in discovery order, deduplicated.
pub fn page_image_objects(
    doc: &Document,
    page: usize,
    page_id: ObjectId,
) -> Result<Vec<ObjectId>, ExtractError> {
    let structure = |e: lopdf::Error| ExtractError::Structure {
        page,
        detail: e.to_string(),
    };

    let page_dict = doc.get_dictionary(page_id).map_err(structure)?;
    let mut found = Vec::new();
    let mut forms = HashSet::new();
    if let Some(resources) = inherited_resources(doc, page_dict).map_err(structure)? {
        collect_images(doc, resources, &mut found, &mut forms).map_err(structure)?;
    }
    Ok(found)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, lopdf::Error> {
    match obj {
        Object::Reference(id) => doc.get_object(*id),
        other => Ok(other),
    }
}

/// `/Resources` of a page, inherited from the page tree when absent.
fn inherited_resources<'a>(
    doc: &'a Document,
    page: &'a Dictionary,
) -> Result<Option<&'a Dictionary>, lopdf::Error> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources)?.as_dict().map(Some);
        }
        match node.get(b"Parent") {
            Ok(parent) => node = resolve(doc, parent)?.as_dict()?,
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

fn collect_images(
    doc: &Document,
    resources: &Dictionary,
    found: &mut Vec<ObjectId>,
    forms: &mut HashSet<ObjectId>,
) -> Result<(), lopdf::Error> {
    let Ok(xobjects) = resources.get(b"XObject") else {
        return Ok(());
    };
    let xobjects = resolve(doc, xobjects)?.as_dict()?;

    for (_name, entry) in xobjects.iter() {
        // Direct (non-reference) streams have no cross-reference identifier.
        let Object::Reference(id) = entry else {
            continue;
        };
        let Ok(stream) = doc.get_object(*id).and_then(Object::as_stream) else {
            continue;
        };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => {
                if !found.contains(id) {
                    found.push(*id);
                }
            }
            Ok(b"Form") => {
                if forms.insert(*id) {
                    if let Ok(form_resources) = stream.dict.get(b"Resources") {
                        let form_resources = resolve(doc, form_resources)?.as_dict()?;
                        collect_images(doc, form_resources, found, forms)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ── Extraction facility ──────────────────────────────────────────────────

/// Bytes and extension of one image object, as they will be written.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub bytes: Vec<u8>,
    /// `jpeg`, `jpx`, `jb2` or `png`.
    pub ext: &'static str,
}

/// Turn one image XObject into file content.
pub fn extract_image(
    doc: &Document,
    page: usize,
    id: ObjectId,
) -> Result<ExtractedImage, ExtractError> {
    let object = format!("{} {} R", id.0, id.1);
    let stream = doc
        .get_object(id)
        .and_then(Object::as_stream)
        .map_err(|e| ExtractError::Structure {
            page,
            detail: format!("{object}: {e}"),
        })?;
    let dict = &stream.dict;
    let filters = filter_chain(doc, dict);

    let mut data: Cow<'_, [u8]> = Cow::Borrowed(&stream.content);
    let mut rest = filters.as_slice();
    let mut inflated = false;
    while let Some((first, tail)) = rest.split_first() {
        if !is_flate(first) {
            break;
        }
        data = Cow::Owned(inflate(&data).map_err(|e| ExtractError::Inflate {
            page,
            object: object.clone(),
            detail: e.to_string(),
        })?);
        inflated = true;
        rest = tail;
    }

    let passthrough = |ext| ExtractedImage {
        bytes: data.to_vec(),
        ext,
    };
    match rest {
        [] => {
            let samples = if inflated {
                apply_predictor(doc, dict, &data).ok_or_else(|| ExtractError::UnsupportedImage {
                    page,
                    object: object.clone(),
                    detail: "unsupported or corrupt predictor data".into(),
                })?
            } else {
                data.to_vec()
            };
            let pixels = decode_samples(doc, dict, &samples).map_err(|detail| {
                ExtractError::UnsupportedImage {
                    page,
                    object: object.clone(),
                    detail,
                }
            })?;
            let mut buf = Vec::new();
            pixels
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(|source| ExtractError::Encode {
                    page,
                    object,
                    source,
                })?;
            Ok(ExtractedImage {
                bytes: buf,
                ext: "png",
            })
        }
        [f] if f == b"DCTDecode" || f == b"DCT" => Ok(passthrough("jpeg")),
        [f] if f == b"JPXDecode" => Ok(passthrough("jpx")),
        [f] if f == b"JBIG2Decode" => Ok(passthrough("jb2")),
        other => Err(ExtractError::UnsupportedFilter {
            page,
            object,
            filter: other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
                .join(" → "),
        }),
    }
}

fn is_flate(name: &[u8]) -> bool {
    name == b"FlateDecode" || name == b"Fl"
}

/// `/Filter` as a list of names; a single name and an array are both allowed.
fn filter_chain(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    let Ok(filter) = dict.get(b"Filter").and_then(|f| resolve(doc, f)) else {
        return Vec::new();
    };
    match filter {
        Object::Name(name) => vec![name.clone()],
        Object::Array(items) => items
            .iter()
            .filter_map(|o| resolve(doc, o).and_then(Object::as_name).ok())
            .map(<[u8]>::to_vec)
            .collect(),
        _ => Vec::new(),
    }
}

fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn int_entry(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key)
        .and_then(|o| resolve(doc, o))
        .and_then(Object::as_i64)
        .ok()
}

/// `/DecodeParms` of the Flate stage: a dictionary, or the first dictionary
/// of a parallel array.
fn decode_parms<'a>(doc: &'a Document, dict: &'a Dictionary) -> Option<&'a Dictionary> {
    match resolve(doc, dict.get(b"DecodeParms").ok()?).ok()? {
        Object::Dictionary(d) => Some(d),
        Object::Array(items) => items
            .iter()
            .find_map(|o| resolve(doc, o).and_then(Object::as_dict).ok()),
        _ => None,
    }
}

fn apply_predictor(doc: &Document, dict: &Dictionary, data: &[u8]) -> Option<Vec<u8>> {
    let Some(parms) = decode_parms(doc, dict) else {
        return Some(data.to_vec());
    };
    let predictor = int_entry(doc, parms, b"Predictor").unwrap_or(1);
    if predictor < 10 {
        // 1 is "none"; 2 (TIFF) is not supported.
        return (predictor == 1).then(|| data.to_vec());
    }
    let colors = int_entry(doc, parms, b"Colors").unwrap_or(1).max(1) as usize;
    let bpc = int_entry(doc, parms, b"BitsPerComponent").unwrap_or(8).max(1) as usize;
    let columns = int_entry(doc, parms, b"Columns").unwrap_or(1).max(1) as usize;
    undo_png_predictor(data, colors, bpc, columns)
}

/// Reverse the per-row PNG filters (None/Sub/Up/Average/Paeth).
pub(crate) fn undo_png_predictor(
    data: &[u8],
    colors: usize,
    bpc: usize,
    columns: usize,
) -> Option<Vec<u8>> {
    let bpp = (colors * bpc).div_ceil(8).max(1);
    let row_len = (colors * bpc * columns).div_ceil(8);
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < row_len + 1 {
            break;
        }
        let tag = chunk[0];
        let mut cur = chunk[1..].to_vec();
        match tag {
            0 => {}
            1 => {
                for i in bpp..row_len {
                    cur[i] = cur[i].wrapping_add(cur[i - bpp]);
                }
            }
            2 => {
                for i in 0..row_len {
                    cur[i] = cur[i].wrapping_add(prev[i]);
                }
            }
            3 => {
                for i in 0..row_len {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    let avg = ((left as u16 + prev[i] as u16) / 2) as u8;
                    cur[i] = cur[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..row_len {
                    let left = if i >= bpp { cur[i - bpp] } else { 0 };
                    let upper_left = if i >= bpp { prev[i - bpp] } else { 0 };
                    cur[i] = cur[i].wrapping_add(paeth(left, prev[i], upper_left));
                }
            }
            _ => return None,
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

// ── Raw samples → image ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum ColourSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `base` colours, packed.
    Indexed { base: Box<ColourSpace>, lookup: Vec<u8> },
}

impl ColourSpace {
    fn components(&self) -> usize {
        match self {
            ColourSpace::Gray | ColourSpace::Indexed { .. } => 1,
            ColourSpace::Rgb => 3,
            ColourSpace::Cmyk => 4,
        }
    }
}

fn colour_space(doc: &Document, dict: &Dictionary) -> Result<ColourSpace, String> {
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    match dict.get(b"ColorSpace").and_then(|c| resolve(doc, c)) {
        Ok(cs) => parse_colour_space(doc, cs, 0),
        Err(_) if is_mask => Ok(ColourSpace::Gray),
        Err(_) => Err("missing /ColorSpace".into()),
    }
}

fn parse_colour_space(doc: &Document, obj: &Object, depth: usize) -> Result<ColourSpace, String> {
    if depth > 4 {
        return Err("colour space nested too deeply".into());
    }
    match obj {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColourSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColourSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColourSpace::Cmyk),
            other => Err(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|o| resolve(doc, o).and_then(Object::as_name).ok())
                .ok_or("empty colour space array")?;
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve(doc, o).and_then(Object::as_stream).ok())
                        .and_then(|s| int_entry(doc, &s.dict, b"N"))
                        .ok_or("ICCBased profile without /N")?;
                    match n {
                        1 => Ok(ColourSpace::Gray),
                        3 => Ok(ColourSpace::Rgb),
                        4 => Ok(ColourSpace::Cmyk),
                        n => Err(format!("ICCBased profile with {n} components")),
                    }
                }
                b"CalRGB" => Ok(ColourSpace::Rgb),
                b"CalGray" => Ok(ColourSpace::Gray),
                b"Indexed" | b"I" => {
                    let base = items
                        .get(1)
                        .ok_or("Indexed without base")
                        .and_then(|o| resolve(doc, o).map_err(|_| "Indexed base unresolved"))?;
                    let base = parse_colour_space(doc, base, depth + 1)?;
                    let lookup = match items.get(3).map(|o| resolve(doc, o)) {
                        Some(Ok(Object::String(bytes, _))) => bytes.clone(),
                        Some(Ok(Object::Stream(s))) => s.content.clone(),
                        _ => return Err("Indexed without lookup table".into()),
                    };
                    Ok(ColourSpace::Indexed {
                        base: Box::new(base),
                        lookup,
                    })
                }
                other => Err(format!(
                    "unsupported colour space {}",
                    String::from_utf8_lossy(other)
                )),
            }
        }
        _ => Err("malformed /ColorSpace".into()),
    }
}

/// Split packed rows into one byte per sample (values `0..2^bpc`).
///
/// Rows start on byte boundaries. 16-bit samples keep their high byte.
pub(crate) fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: usize,
) -> Option<Vec<u8>> {
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return None;
    }
    let per_row = width * components;
    let row_bytes = (per_row * bpc).div_ceil(8);
    if row_bytes == 0 || data.len() < row_bytes * height {
        return None;
    }
    let mut out = Vec::with_capacity(per_row * height);
    for row in data.chunks(row_bytes).take(height) {
        match bpc {
            8 => out.extend_from_slice(&row[..per_row]),
            16 => out.extend(row.chunks(2).take(per_row).map(|pair| pair[0])),
            1 | 2 | 4 => {
                let mask = (1u8 << bpc) - 1;
                for s in 0..per_row {
                    let bit = s * bpc;
                    let shift = 8 - bpc - (bit % 8);
                    out.push((row[bit / 8] >> shift) & mask);
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

fn decode_samples(doc: &Document, dict: &Dictionary, data: &[u8]) -> Result<DynamicImage, String> {
    let width = int_entry(doc, dict, b"Width").ok_or("missing /Width")?;
    let height = int_entry(doc, dict, b"Height").ok_or("missing /Height")?;
    if width <= 0 || height <= 0 {
        return Err(format!("invalid dimensions {width}x{height}"));
    }
    let (width, height) = (width as usize, height as usize);
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bpc = if is_mask {
        1
    } else {
        int_entry(doc, dict, b"BitsPerComponent").unwrap_or(8) as usize
    };
    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
        return Err(format!("invalid /BitsPerComponent {bpc}"));
    }
    let cs = colour_space(doc, dict)?;
    let samples = unpack_samples(data, width, height, cs.components(), bpc)
        .ok_or_else(|| format!("sample data too short for {width}x{height} at {bpc} bpc"))?;
    let max = if bpc >= 8 { 255u16 } else { (1u16 << bpc) - 1 };
    let scale = |v: u8| ((v as u16 * 255) / max) as u8;
    let (w, h) = (width as u32, height as u32);

    let image = match cs {
        ColourSpace::Gray => {
            GrayImage::from_raw(w, h, samples.into_iter().map(scale).collect())
                .map(DynamicImage::ImageLuma8)
        }
        ColourSpace::Rgb => RgbImage::from_raw(w, h, samples.into_iter().map(scale).collect())
            .map(DynamicImage::ImageRgb8),
        ColourSpace::Cmyk => {
            let rgb = samples
                .chunks(4)
                .flat_map(|p| cmyk_to_rgb(scale(p[0]), scale(p[1]), scale(p[2]), scale(p[3])))
                .collect();
            RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
        }
        ColourSpace::Indexed { base, lookup } => {
            if matches!(*base, ColourSpace::Indexed { .. }) {
                return Err("nested Indexed colour space".into());
            }
            let n = base.components();
            // Out-of-range indices render black.
            let colour = |i: u8| -> [u8; 3] {
                let at = i as usize * n;
                let entry = lookup.get(at..at + n).unwrap_or(&BLACK[..n]);
                match *base {
                    ColourSpace::Gray => [entry[0]; 3],
                    ColourSpace::Cmyk => cmyk_to_rgb(entry[0], entry[1], entry[2], entry[3]),
                    _ => [entry[0], entry[1], entry[2]],
                }
            };
            let rgb = samples.into_iter().flat_map(colour).collect();
            RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    image.ok_or_else(|| "sample buffer does not match dimensions".into())
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let ink = |v: u8| ((255 - v as u16) * (255 - k as u16) / 255) as u8;
    [ink(c), ink(m), ink(y)]
}
