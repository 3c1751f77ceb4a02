//! Integration tests for the image materializer.
//!
//! Fixture PDFs are synthesised in memory with lopdf, so these tests need
//! neither files on disk nor a network.

mod common;

use common::*;
use pdf2table::{extract_images, try_extract_images, ExtractError};
use std::path::PathBuf;

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn two_pages_yield_ordered_deterministic_names() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "doc.pdf", &two_page_pdf());
    let out = dir.path().join("images");

    let paths = extract_images(&pdf, &out).await;
    assert_eq!(
        names(&paths),
        vec!["page_1_img_1.jpeg", "page_2_img_1.jpeg", "page_2_img_2.png"]
    );
    for p in &paths {
        assert!(p.starts_with(&out));
        assert!(p.exists());
    }
}

#[tokio::test]
async fn jpeg_bytes_are_written_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "doc.pdf", &build_pdf(vec![vec![jpeg_image(7)]]));
    let out = dir.path().join("images");

    let paths = extract_images(&pdf, &out).await;
    assert_eq!(paths.len(), 1);
    assert_eq!(std::fs::read(&paths[0]).unwrap(), fake_jpeg_bytes(7));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "doc.pdf", &two_page_pdf());
    let out = dir.path().join("images");

    let first = extract_images(&pdf, &out).await;
    let first_bytes: Vec<Vec<u8>> = first.iter().map(|p| std::fs::read(p).unwrap()).collect();
    let second = extract_images(&pdf, &out).await;
    let second_bytes: Vec<Vec<u8>> = second.iter().map(|p| std::fs::read(p).unwrap()).collect();

    assert_eq!(first, second);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 3);
}

#[tokio::test]
async fn flate_rgb_becomes_decodable_png() {
    let dir = tempfile::tempdir().unwrap();
    // 2×2: red, green / blue, white
    let pixels = [255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255];
    let pdf = write_pdf(
        dir.path(),
        "rgb.pdf",
        &build_pdf(vec![vec![rgb_flate_image(2, 2, &pixels)]]),
    );
    let out = dir.path().join("images");

    let paths = extract_images(&pdf, &out).await;
    assert_eq!(names(&paths), vec!["page_1_img_1.png"]);

    let img = image::open(&paths[0]).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (2, 2));
    assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(img.get_pixel(1, 0).0, [0, 255, 0]);
    assert_eq!(img.get_pixel(0, 1).0, [0, 0, 255]);
    assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
}

#[tokio::test]
async fn one_bit_gray_is_expanded() {
    let dir = tempfile::tempdir().unwrap();
    // 3×1 at 1 bpc: white, black, white
    let pdf = write_pdf(
        dir.path(),
        "mono.pdf",
        &build_pdf(vec![vec![gray_raw_image(3, 1, 1, &[0b1010_0000])]]),
    );
    let out = dir.path().join("images");

    let paths = extract_images(&pdf, &out).await;
    let img = image::open(&paths[0]).unwrap().to_luma8();
    assert_eq!(img.as_raw(), &vec![255, 0, 255]);
}

#[tokio::test]
async fn inherited_resources_are_found_on_every_page() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = build_pdf_with(
        vec![vec![jpeg_image(1)], vec![]],
        ResourcesOn::PageTree,
    );
    let pdf = write_pdf(dir.path(), "shared.pdf", &bytes);
    let out = dir.path().join("images");

    let paths = extract_images(&pdf, &out).await;
    assert_eq!(names(&paths), vec!["page_1_img_1.jpeg", "page_2_img_1.jpeg"]);
}

#[tokio::test]
async fn zero_images_yield_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "text.pdf", &build_pdf(vec![vec![], vec![]]));
    let out = dir.path().join("images");

    let paths = try_extract_images(&pdf, &out).await.unwrap();
    assert!(paths.is_empty());
    assert!(out.is_dir(), "output directory is created even with no images");
}

#[tokio::test]
async fn corrupt_pdf_degrades_to_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "broken.pdf", b"this is not a pdf at all");
    let out = dir.path().join("images");

    assert!(extract_images(&pdf, &out).await.is_empty());
    let err = try_extract_images(&pdf, &out).await.unwrap_err();
    assert!(matches!(err, ExtractError::Open { .. }), "got: {err:?}");
}

#[tokio::test]
async fn missing_pdf_degrades_to_empty_list() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("images");
    assert!(extract_images(&dir.path().join("nope.pdf"), &out).await.is_empty());
}

#[tokio::test]
async fn unsupported_filter_aborts_remaining_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(
        dir.path(),
        "fax.pdf",
        &build_pdf(vec![vec![jpeg_image(1)], vec![ccitt_image()], vec![jpeg_image(3)]]),
    );
    let out = dir.path().join("images");

    let err = try_extract_images(&pdf, &out).await.unwrap_err();
    match err {
        ExtractError::UnsupportedFilter { page, ref filter, .. } => {
            assert_eq!(page, 2);
            assert_eq!(filter, "CCITTFaxDecode");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Page 1 was written before the failure; page 3 never was.
    assert!(out.join("page_1_img_1.jpeg").exists());
    assert!(!out.join("page_3_img_1.jpeg").exists());
}

#[test]
fn zero_bit_depth_is_rejected_not_panicking() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(
        dir.path(),
        "zero.pdf",
        &build_pdf(vec![vec![gray_raw_image(2, 2, 0, &[0xFF; 4])]]),
    );
    let out = dir.path().join("images");

    let err = pdf2table::pipeline::extract::extract_images_blocking(&pdf, &out).unwrap_err();
    match err {
        ExtractError::UnsupportedImage { page, ref detail, .. } => {
            assert_eq!(page, 1);
            assert!(detail.contains("BitsPerComponent"), "got: {detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn nested_output_dir_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "doc.pdf", &two_page_pdf());
    let out = dir.path().join("a").join("b").join("c");

    let paths = extract_images(&pdf, &out).await;
    assert_eq!(paths.len(), 3);
    assert!(out.is_dir());
}

#[test]
fn blocking_entry_point_matches_async() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = write_pdf(dir.path(), "doc.pdf", &two_page_pdf());
    let out = dir.path().join("images");

    let blocking = pdf2table::pipeline::extract::extract_images_blocking(&pdf, &out).unwrap();
    let via_runtime = tokio_test::block_on(extract_images(&pdf, &out));
    assert_eq!(blocking, via_runtime);
}
