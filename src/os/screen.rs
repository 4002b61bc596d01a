//! Pixel-surface capture and OCR
//!
//! One monitor, one raster per call. OCR goes through the external
//! `tesseract` CLI and degrades to an error string; the caller never sees a
//! failure cross this boundary as a fault.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::{engine::general_purpose, Engine as _};
use image::codecs::png::PngEncoder;
use image::imageops::grayscale;
use image::{ExtendedColorType, GrayImage, ImageEncoder, RgbaImage};
use tokio::process::Command;
use xcap::Monitor;

use crate::core::{KinesisError, Result};
use crate::os::locate::FrameSource;

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Capture the primary monitor as an RGBA raster
pub fn capture() -> Result<RgbaImage> {
    let monitors =
        Monitor::all().map_err(|e| KinesisError::os(format!("monitor enumeration failed: {}", e)))?;
    let monitor = monitors
        .into_iter()
        .next()
        .ok_or_else(|| KinesisError::os("no monitor found"))?;
    monitor
        .capture_image()
        .map_err(|e| KinesisError::os(format!("screen capture failed: {}", e)))
}

/// Capture the primary monitor as a grayscale raster for template matching
pub fn capture_gray() -> Result<GrayImage> {
    Ok(grayscale(&capture()?))
}

/// PNG-encode a raster and base64 it for the state payload
pub fn encode_png_base64(image: &RgbaImage) -> Result<String> {
    let mut buf = Vec::new();
    PngEncoder::new(Cursor::new(&mut buf)).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(general_purpose::STANDARD.encode(&buf))
}

/// Best-effort check that a browser window exists on this desktop
///
/// Scans window titles for the configured substrings. This cannot force
/// focus; a miss only means correctness of subsequent pixel actions is not
/// guaranteed.
pub fn browser_window_present(title_fragments: &[String]) -> Result<bool> {
    let windows = xcap::Window::all()
        .map_err(|e| KinesisError::os(format!("window enumeration failed: {}", e)))?;
    Ok(windows.iter().any(|window| {
        let title = window.title().unwrap_or_default().to_lowercase();
        title_fragments
            .iter()
            .any(|fragment| title.contains(&fragment.to_lowercase()))
    }))
}

/// Run tesseract over a raster and return the recognized text
pub async fn recognize_text(image: &RgbaImage) -> Result<String> {
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("kinesis-ocr-{}-{}.png", std::process::id(), seq));
    image.save(&path)?;

    let result = run_tesseract(&path).await;
    let _ = tokio::fs::remove_file(&path).await;
    result
}

async fn run_tesseract(path: &Path) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(path)
        .arg("stdout")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KinesisError::TesseractNotFound
            } else {
                KinesisError::os(format!("failed to run tesseract: {}", e))
            }
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(KinesisError::os(format!(
            "tesseract failed: {}",
            stderr.trim()
        )))
    }
}

/// OCR that degrades to an error-string payload instead of raising
pub async fn ocr_or_error(image: &RgbaImage) -> String {
    match recognize_text(image).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Warning: OCR failed: {}", e);
            format!("OCR error: {}", e)
        }
    }
}

/// Dump a captured frame for diagnostics; the system never reads these back
pub fn save_diagnostic(image: &RgbaImage, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let path = dir.join(format!("frame-{}-{}.png", std::process::id(), seq));
    image.save(&path)?;
    Ok(path)
}

/// Live screen frames for the target resolver
pub struct LiveScreen;

impl FrameSource for LiveScreen {
    fn frame(&mut self) -> Result<GrayImage> {
        capture_gray()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_base64_roundtrips() {
        let image = RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let encoded = encode_png_base64(&image).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 2);
    }

    #[test]
    fn test_save_diagnostic_writes_png() {
        let image = RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 0, 255]));
        let dir = std::env::temp_dir().join("kinesis-test-diag");
        let path = save_diagnostic(&image, &dir).unwrap();
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    #[ignore] // Requires tesseract on PATH
    async fn test_recognize_text_runs() {
        let image = RgbaImage::from_pixel(64, 64, image::Rgba([255, 255, 255, 255]));
        let text = ocr_or_error(&image).await;
        assert!(!text.starts_with("OCR error") || text.contains("tesseract"));
    }
}
