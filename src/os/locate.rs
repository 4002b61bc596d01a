//! Pixel target resolution via template matching
//!
//! Screen content is not a stable addressable tree: scrolling or content
//! change invalidates prior coordinates, so a target's location is rederived
//! from a fresh capture on every call. A text description maps to a
//! pre-registered template image; matching runs at a fixed similarity
//! threshold until a wall-clock timeout.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::GrayImage;

use crate::core::{KinesisError, PixelConfig, Result};

/// Source of fresh screen rasters
///
/// Seam over live capture so resolution logic is testable with synthetic
/// frames.
pub trait FrameSource: Send {
    fn frame(&mut self) -> Result<GrayImage>;
}

/// A matched template region on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

impl TemplateMatch {
    /// Geometric center of the matched region
    pub fn center(&self) -> (i32, i32) {
        (
            (self.x + self.width / 2) as i32,
            (self.y + self.height / 2) as i32,
        )
    }
}

/// Derive the filesystem-safe template key for a target description
///
/// Keeps alphanumerics, underscores and dashes, drops everything else, and
/// appends the image extension.
pub fn template_key(description: &str) -> String {
    let mut safe: String = description
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    safe.push_str(".png");
    safe
}

/// Scan a frame for the template at the given similarity threshold
///
/// Normalized cross-correlation over grayscale pixels; the first window
/// (row-major) scoring at or above the threshold wins, with no ranking among
/// overlapping candidates.
pub fn find_template(
    screen: &GrayImage,
    template: &GrayImage,
    threshold: f64,
) -> Option<TemplateMatch> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return None;
    }

    let n = (tw * th) as f64;
    let t_pixels: Vec<f64> = template.as_raw().iter().map(|&p| p as f64).collect();
    let t_mean = t_pixels.iter().sum::<f64>() / n;
    let t_dev: Vec<f64> = t_pixels.iter().map(|v| v - t_mean).collect();
    let t_var: f64 = t_dev.iter().map(|d| d * d).sum();

    for y in 0..=(sh - th) {
        for x in 0..=(sw - tw) {
            let score = window_score(screen, x, y, tw, th, t_mean, &t_dev, t_var);
            if score >= threshold {
                return Some(TemplateMatch {
                    x,
                    y,
                    width: tw,
                    height: th,
                    score,
                });
            }
        }
    }
    None
}

fn window_score(
    screen: &GrayImage,
    x: u32,
    y: u32,
    tw: u32,
    th: u32,
    t_mean: f64,
    t_dev: &[f64],
    t_var: f64,
) -> f64 {
    let n = (tw * th) as f64;

    let mut sum = 0.0;
    for j in 0..th {
        for i in 0..tw {
            sum += screen.get_pixel(x + i, y + j)[0] as f64;
        }
    }
    let s_mean = sum / n;

    let mut cross = 0.0;
    let mut s_var = 0.0;
    let mut k = 0;
    for j in 0..th {
        for i in 0..tw {
            let s = screen.get_pixel(x + i, y + j)[0] as f64 - s_mean;
            cross += s * t_dev[k];
            s_var += s * s;
            k += 1;
        }
    }

    if t_var == 0.0 || s_var == 0.0 {
        // Correlation is undefined over uniform regions; two flat patches
        // match when their brightness does.
        if t_var == 0.0 && s_var == 0.0 && (s_mean - t_mean).abs() < 1.0 {
            return 1.0;
        }
        return 0.0;
    }

    cross / (s_var.sqrt() * t_var.sqrt())
}

/// Maps target descriptions to on-screen coordinates
pub struct TargetResolver {
    template_dir: PathBuf,
    confidence: f64,
    timeout: Duration,
    retry_interval: Duration,
}

impl TargetResolver {
    pub fn new(
        template_dir: PathBuf,
        confidence: f64,
        timeout: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            template_dir,
            confidence,
            timeout,
            retry_interval,
        }
    }

    pub fn from_config(config: &PixelConfig) -> Self {
        Self::new(
            config.template_dir.clone(),
            config.match_confidence,
            config.find_timeout(),
            config.retry_interval(),
        )
    }

    /// Full path of the template registered for a description
    pub fn template_path(&self, description: &str) -> PathBuf {
        self.template_dir.join(template_key(description))
    }

    /// Resolve a description to the center coordinates of its on-screen match
    ///
    /// Captures a fresh frame per attempt and retries until the wall-clock
    /// timeout; exhausting it is a recoverable not-found, never a panic. A
    /// missing template image fails immediately, as does a frame source
    /// fault (retrying a broken capture would spin for the full window).
    pub async fn resolve(
        &self,
        description: &str,
        frames: &mut dyn FrameSource,
    ) -> Result<(i32, i32)> {
        let path = self.template_path(description);
        if !path.exists() {
            return Err(KinesisError::resolution(format!(
                "template image missing for '{}': expected {}",
                description,
                path.display()
            )));
        }

        let template = image::open(&path)?.to_luma8();
        let deadline = Instant::now() + self.timeout;

        loop {
            let screen = frames.frame().map_err(|e| {
                KinesisError::resolution(format!(
                    "screen capture failed while looking for '{}': {}",
                    description, e
                ))
            })?;

            if let Some(found) = find_template(&screen, &template, self.confidence) {
                return Ok(found.center());
            }

            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.retry_interval).await;
        }

        Err(KinesisError::resolution(format!(
            "target '{}' not found on screen after {:?}",
            description, self.timeout
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::imageops;

    fn textured_screen(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            image::Luma([((x * 7 + y * 13) % 251) as u8])
        })
    }

    fn resolver(dir: PathBuf, timeout_ms: u64, interval_ms: u64) -> TargetResolver {
        TargetResolver::new(
            dir,
            0.8,
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
        )
    }

    struct CannedFrames {
        screen: GrayImage,
        captures: usize,
    }

    impl FrameSource for CannedFrames {
        fn frame(&mut self) -> Result<GrayImage> {
            self.captures += 1;
            Ok(self.screen.clone())
        }
    }

    #[test]
    fn test_template_key_sanitizes() {
        assert_eq!(template_key("login button"), "loginbutton.png");
        assert_eq!(template_key("Address_Bar-1!"), "Address_Bar-1.png");
        assert_eq!(template_key("search/../../etc"), "searchetc.png");
    }

    #[test]
    fn test_find_template_locates_exact_crop() {
        let screen = textured_screen(24, 18);
        let template = imageops::crop_imm(&screen, 5, 7, 6, 4).to_image();
        let found = find_template(&screen, &template, 0.8).unwrap();
        assert_eq!((found.x, found.y), (5, 7));
        assert_eq!(found.center(), (8, 9));
        assert!(found.score > 0.99);
    }

    #[test]
    fn test_find_template_returns_none_without_match() {
        let screen = GrayImage::from_pixel(16, 16, image::Luma([0]));
        let template = textured_screen(4, 4);
        assert!(find_template(&screen, &template, 0.8).is_none());
    }

    #[test]
    fn test_find_template_first_match_wins() {
        let mut screen = GrayImage::from_pixel(24, 8, image::Luma([0]));
        let pattern = [[0u8, 255], [255, 128]];
        for (dx, dy, v) in [(0, 0, pattern[0][0]), (1, 0, pattern[0][1]), (0, 1, pattern[1][0]), (1, 1, pattern[1][1])] {
            screen.put_pixel(3 + dx, 2 + dy, image::Luma([v]));
            screen.put_pixel(14 + dx, 2 + dy, image::Luma([v]));
        }
        let mut template = GrayImage::new(2, 2);
        template.put_pixel(0, 0, image::Luma([pattern[0][0]]));
        template.put_pixel(1, 0, image::Luma([pattern[0][1]]));
        template.put_pixel(0, 1, image::Luma([pattern[1][0]]));
        template.put_pixel(1, 1, image::Luma([pattern[1][1]]));

        let found = find_template(&screen, &template, 0.95).unwrap();
        assert_eq!((found.x, found.y), (3, 2));
    }

    #[test]
    fn test_find_template_rejects_oversized_template() {
        let screen = textured_screen(8, 8);
        let template = textured_screen(16, 16);
        assert!(find_template(&screen, &template, 0.5).is_none());
    }

    #[tokio::test]
    async fn test_resolve_missing_template_fails_fast() {
        let dir = std::env::temp_dir().join("kinesis-test-no-templates");
        let _ = std::fs::create_dir_all(&dir);
        let resolver = resolver(dir, 200, 50);
        let mut frames = CannedFrames {
            screen: textured_screen(16, 16),
            captures: 0,
        };
        let start = Instant::now();
        let err = resolver.resolve("nonexistent target", &mut frames).await.unwrap_err();
        assert!(err.to_string().contains("template image missing"));
        // No capture loop runs for a missing template.
        assert_eq!(frames.captures, 0);
        assert!(start.elapsed() < Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_resolve_finds_registered_template() {
        let dir = std::env::temp_dir().join("kinesis-test-templates");
        std::fs::create_dir_all(&dir).unwrap();
        let screen = textured_screen(32, 24);
        let template = imageops::crop_imm(&screen, 10, 6, 8, 5).to_image();
        template.save(dir.join(template_key("login button"))).unwrap();

        let resolver = resolver(dir, 500, 50);
        let mut frames = CannedFrames { screen, captures: 0 };
        let (x, y) = resolver.resolve("login button", &mut frames).await.unwrap();
        assert_eq!((x, y), (14, 8));
        assert_eq!(frames.captures, 1);
    }

    #[tokio::test]
    async fn test_resolve_not_found_honors_timeout_window() {
        let dir = std::env::temp_dir().join("kinesis-test-templates-timeout");
        std::fs::create_dir_all(&dir).unwrap();
        let template = textured_screen(4, 4);
        template.save(dir.join(template_key("ghost"))).unwrap();

        let timeout = Duration::from_millis(200);
        let resolver = resolver(dir, 200, 50);
        let mut frames = CannedFrames {
            screen: GrayImage::from_pixel(16, 16, image::Luma([0])),
            captures: 0,
        };

        let start = Instant::now();
        let err = resolver.resolve("ghost", &mut frames).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.to_string().contains("not found"));
        // Not before the window closes, and not substantially later.
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + Duration::from_millis(500));
        assert!(frames.captures >= 2);
    }

    #[tokio::test]
    async fn test_resolve_capture_fault_fails_without_retry() {
        struct BrokenFrames;
        impl FrameSource for BrokenFrames {
            fn frame(&mut self) -> Result<GrayImage> {
                Err(KinesisError::os("capture permission denied"))
            }
        }

        let dir = std::env::temp_dir().join("kinesis-test-templates-broken");
        std::fs::create_dir_all(&dir).unwrap();
        textured_screen(4, 4)
            .save(dir.join(template_key("target")))
            .unwrap();

        let resolver = resolver(dir, 5_000, 50);
        let start = Instant::now();
        let err = resolver
            .resolve("target", &mut BrokenFrames)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("capture"));
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
