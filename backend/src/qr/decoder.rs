//! Receipt QR decoding with a ladder of image-enhancement stages.
//!
//! Receipt photos are routinely taken under bad lighting or with washed-out
//! thermal print, so a single decode attempt over the raw image misses
//! codes a cheap enhancement would recover. The decoder keeps an ordered,
//! fixed list of transforms; each one is applied to a copy of the
//! *original* image and a decode is attempted on the result. The first
//! non-empty payload wins. Stages are fully independent: one stage finding
//! nothing (or failing outright) never affects the others, and the order
//! only reflects cost — cheap, likely-to-succeed transforms run first.

use image::imageops;
use image::{DynamicImage, GrayImage};
use log::info;
use thiserror::Error;

/// A successfully decoded QR payload. `method` / `method_name` report which
/// enhancement stage produced it (1-based); callers use them for logging
/// and the scan response, never for control flow.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedQr {
    pub payload: String,
    pub method: usize,
    pub method_name: &'static str,
}

#[derive(Debug, Error)]
pub enum QrDecodeError {
    #[error("Файл не является изображением или поврежден")]
    InvalidImage(#[source] image::ImageError),
    #[error(
        "QR код не найден ни одним из методов обработки. \
         Сделайте более четкое фото при хорошем освещении, чек должен быть полностью в кадре"
    )]
    NotFound,
}

struct Stage {
    name: &'static str,
    apply: fn(&DynamicImage) -> DynamicImage,
}

const STAGES: &[Stage] = &[
    Stage {
        name: "Оригинал",
        apply: original,
    },
    Stage {
        name: "Контраст + резкость",
        apply: contrast_sharpen,
    },
    Stage {
        name: "Черно-белое пороговое",
        apply: binary_threshold,
    },
    Stage {
        name: "Адаптивное пороговое",
        apply: adaptive_normalize,
    },
    Stage {
        name: "Улучшение краев",
        apply: edge_enhance,
    },
    Stage {
        name: "Морфологические операции",
        apply: morphological,
    },
];

/// QR decoder over the fixed enhancement-stage ladder.
#[derive(Clone)]
pub struct QrDecoder {
    stages: &'static [Stage],
}

impl Default for QrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDecoder {
    pub fn new() -> Self {
        Self { stages: STAGES }
    }

    /// Decode uploaded image bytes into a QR payload.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<DecodedQr, QrDecodeError> {
        let image = image::load_from_memory(bytes).map_err(QrDecodeError::InvalidImage)?;
        self.decode_image(&image)
    }

    /// Decode an already loaded image.
    pub fn decode_image(&self, image: &DynamicImage) -> Result<DecodedQr, QrDecodeError> {
        self.decode_with(image, extract_qr_text)
            .ok_or(QrDecodeError::NotFound)
    }

    /// Run the stage ladder with an arbitrary decode attempt. Each stage
    /// transforms a copy of the original image; the first attempt yielding
    /// a non-empty string short-circuits the rest.
    fn decode_with<F>(&self, image: &DynamicImage, mut attempt: F) -> Option<DecodedQr>
    where
        F: FnMut(&DynamicImage) -> Option<String>,
    {
        for (index, stage) in self.stages.iter().enumerate() {
            info!(
                "Trying enhancement stage {}/{}: {}",
                index + 1,
                self.stages.len(),
                stage.name
            );
            let transformed = (stage.apply)(image);
            match attempt(&transformed) {
                Some(payload) if !payload.trim().is_empty() => {
                    info!(
                        "QR decoded by stage {} ({}), payload length {}",
                        index + 1,
                        stage.name,
                        payload.len()
                    );
                    return Some(DecodedQr {
                        payload,
                        method: index + 1,
                        method_name: stage.name,
                    });
                }
                _ => info!("Stage {} ({}) found no QR code", index + 1, stage.name),
            }
        }
        None
    }
}

/// Locate and decode a QR symbol in an image. Returns the first grid that
/// decodes to a non-empty string.
fn extract_qr_text(image: &DynamicImage) -> Option<String> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32)[0]
        });
    for grid in prepared.detect_grids() {
        if let Ok((_meta, content)) = grid.decode() {
            if !content.trim().is_empty() {
                return Some(content);
            }
        }
    }
    None
}

// === Enhancement stages ===
//
// Each stage is a pure image -> image function over the original bytes.

fn original(image: &DynamicImage) -> DynamicImage {
    image.clone()
}

fn contrast_sharpen(image: &DynamicImage) -> DynamicImage {
    image
        .brighten(10)
        .adjust_contrast(15.0)
        .filter3x3(&[0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0])
}

fn binary_threshold(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(threshold(image.to_luma8(), 128))
}

fn adaptive_normalize(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(normalize(image.to_luma8()))
}

fn edge_enhance(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(image.to_luma8()).filter3x3(&[
        -1.0, -1.0, -1.0, //
        -1.0, 8.0, -1.0, //
        -1.0, -1.0, -1.0,
    ])
}

fn morphological(image: &DynamicImage) -> DynamicImage {
    let blurred = imageops::blur(&image.to_luma8(), 0.5);
    DynamicImage::ImageLuma8(threshold(blurred, 100))
}

fn threshold(mut gray: GrayImage, cutoff: u8) -> GrayImage {
    for pixel in gray.pixels_mut() {
        pixel[0] = if pixel[0] >= cutoff { 255 } else { 0 };
    }
    gray
}

/// Linear min/max contrast stretch over the luma channel.
fn normalize(mut gray: GrayImage) -> GrayImage {
    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in gray.pixels() {
        min = min.min(pixel[0]);
        max = max.max(pixel[0]);
    }
    if max > min {
        let range = (max - min) as f32;
        for pixel in gray.pixels_mut() {
            pixel[0] = (((pixel[0] - min) as f32 / range) * 255.0).round() as u8;
        }
    }
    gray
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn test_image() -> DynamicImage {
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 16 + y * 3) % 200) as u8 + 20]));
        DynamicImage::ImageLuma8(gray)
    }

    #[test]
    fn stage_ladder_is_fixed_and_ordered() {
        let decoder = QrDecoder::new();
        let names: Vec<&str> = decoder.stages.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "Оригинал",
                "Контраст + резкость",
                "Черно-белое пороговое",
                "Адаптивное пороговое",
                "Улучшение краев",
                "Морфологические операции",
            ]
        );
    }

    #[test]
    fn reports_the_stage_that_succeeded() {
        let decoder = QrDecoder::new();
        let mut attempts = 0;
        let decoded = decoder
            .decode_with(&test_image(), |_| {
                attempts += 1;
                // Only the third stage yields a payload.
                (attempts == 3).then(|| "t=20250630T1736&s=100".to_string())
            })
            .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(decoded.method, 3);
        assert_eq!(decoded.method_name, "Черно-белое пороговое");
        assert_eq!(decoded.payload, "t=20250630T1736&s=100");
    }

    #[test]
    fn a_failing_stage_never_aborts_the_rest() {
        let decoder = QrDecoder::new();
        let mut attempts = 0;
        let result = decoder.decode_with(&test_image(), |_| {
            attempts += 1;
            None
        });

        assert!(result.is_none());
        assert_eq!(attempts, STAGES.len());
    }

    #[test]
    fn blank_payload_counts_as_failure() {
        let decoder = QrDecoder::new();
        let mut attempts = 0;
        let decoded = decoder
            .decode_with(&test_image(), |_| {
                attempts += 1;
                match attempts {
                    1 => Some("   ".to_string()),
                    2 => Some("payload".to_string()),
                    _ => None,
                }
            })
            .unwrap();

        assert_eq!(decoded.method, 2);
        assert_eq!(decoded.method_name, "Контраст + резкость");
    }

    #[test]
    fn first_success_wins() {
        let decoder = QrDecoder::new();
        let mut attempts = 0;
        let decoded = decoder
            .decode_with(&test_image(), |_| {
                attempts += 1;
                Some(format!("payload-{attempts}"))
            })
            .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(decoded.method, 1);
        assert_eq!(decoded.method_name, "Оригинал");
        assert_eq!(decoded.payload, "payload-1");
    }

    #[test]
    fn stages_preserve_dimensions_and_input() {
        let input = test_image();
        let reference = input.clone();
        for stage in STAGES {
            let output = (stage.apply)(&input);
            assert_eq!(output.width(), input.width(), "stage {}", stage.name);
            assert_eq!(output.height(), input.height(), "stage {}", stage.name);
        }
        // Every stage worked on a copy; the original is untouched.
        assert_eq!(input, reference);
    }

    #[test]
    fn threshold_is_binary() {
        let gray = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 80) as u8]));
        let out = threshold(gray, 128);
        let values: Vec<u8> = out.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 0, 255, 255]);
    }

    #[test]
    fn normalize_stretches_to_full_range() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([100 + (x * 20) as u8]));
        let out = normalize(gray);
        let values: Vec<u8> = out.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![0, 128, 255]);
    }

    #[test]
    fn flat_image_survives_normalize() {
        let gray = GrayImage::from_pixel(4, 4, Luma([90]));
        let out = normalize(gray);
        assert!(out.pixels().all(|p| p[0] == 90));
    }

    #[test]
    fn invalid_bytes_report_a_distinct_error() {
        let decoder = QrDecoder::new();
        let err = decoder.decode_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, QrDecodeError::InvalidImage(_)));
    }

    #[test]
    fn image_without_qr_reports_not_found() {
        let decoder = QrDecoder::new();
        let mut bytes = Vec::new();
        test_image()
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let err = decoder.decode_bytes(&bytes).unwrap_err();
        assert!(matches!(err, QrDecodeError::NotFound));
    }
}
