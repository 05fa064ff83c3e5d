//! Tier 3: a neutral placeholder image. Only fails if the file cannot be written.

use std::path::Path;

use designbridge_core::{DesignBridgeError, Result, Strategy};
use image::{ImageFormat, Rgb, RgbImage};

use crate::tier::{RenderJob, TierOutput};

pub const BACKEND: &str = "placeholder";

const SIZE: u32 = 512;
const BACKGROUND: Rgb<u8> = Rgb([240, 240, 245]);
const PANEL: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE: Rgb<u8> = Rgb([180, 180, 190]);
const INK: Rgb<u8> = Rgb([100, 100, 110]);
/// Inclusive panel corners
const PANEL_MIN: (u32, u32) = (50, 200);
const PANEL_MAX: (u32, u32) = (462, 312);

pub const LABEL: &str = "DESIGNBRIDGE PLACEHOLDER";
const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;
const GLYPH_SCALE: u32 = 2;

/// 5x7 rows, most significant of the low five bits is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        _ => [0; 7],
    }
}

fn draw_text(image: &mut RgbImage, text: &str, center: (u32, u32)) {
    let advance = (GLYPH_W + 1) * GLYPH_SCALE;
    let count = text.chars().count() as u32;
    let width = (count * advance).saturating_sub(GLYPH_SCALE);
    let left = center.0.saturating_sub(width / 2);
    let top = center.1.saturating_sub(GLYPH_H * GLYPH_SCALE / 2);

    for (i, c) in text.chars().enumerate() {
        let origin_x = left + i as u32 * advance;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_W {
                if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let x = origin_x + col * GLYPH_SCALE + dx;
                        let y = top + row as u32 * GLYPH_SCALE + dy;
                        if x < image.width() && y < image.height() {
                            image.put_pixel(x, y, INK);
                        }
                    }
                }
            }
        }
    }
}

pub fn placeholder_image() -> RgbImage {
    let mut image = RgbImage::from_pixel(SIZE, SIZE, BACKGROUND);
    for y in PANEL_MIN.1..=PANEL_MAX.1 {
        for x in PANEL_MIN.0..=PANEL_MAX.0 {
            let edge = x == PANEL_MIN.0 || x == PANEL_MAX.0 || y == PANEL_MIN.1 || y == PANEL_MAX.1;
            image.put_pixel(x, y, if edge { OUTLINE } else { PANEL });
        }
    }
    draw_text(&mut image, LABEL, (SIZE / 2, SIZE / 2));
    image
}

pub fn write_placeholder(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    placeholder_image()
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| DesignBridgeError::Io(std::io::Error::other(e.to_string())))
}

pub struct PlaceholderTier;

impl Strategy<RenderJob, TierOutput> for PlaceholderTier {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn attempt(&self, job: &RenderJob) -> Result<TierOutput> {
        write_placeholder(&job.out_path)?;
        Ok(TierOutput::default().with("fallback", BACKEND))
    }
}
