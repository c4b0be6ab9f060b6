//! Minimal raster drawing for region boxes and labels.
//!
//! Text uses a built-in 5x7 bitmap font (upper case, digits and the
//! punctuation found in class labels), so no font files are needed at runtime.
use image::{Rgb, RgbImage};
use leafwatch_vision::Region;

pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;
pub const TEXT_SCALE: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const GLYPH_ADVANCE: u32 = 6;

/// Draws the outline of `region`, clipped to the frame.
pub fn draw_region_box(frame: &mut RgbImage, region: &Region, color: Rgb<u8>, thickness: u32) {
    let (left, top) = (region.x as u64, region.y as u64);
    let right = left + region.width as u64;
    let bottom = top + region.height as u64;
    let t = thickness.min(region.width).min(region.height) as u64;

    for (x0, y0, x1, y1) in [
        (left, top, right, top + t),
        (left, bottom - t, right, bottom),
        (left, top, left + t, bottom),
        (right - t, top, right, bottom),
    ] {
        fill_clipped(frame, x0, y0, x1, y1, color);
    }
}

/// Fills the half-open rectangle `[x0, x1) x [y0, y1)`.
fn fill_clipped(frame: &mut RgbImage, x0: u64, y0: u64, x1: u64, y1: u64, color: Rgb<u8>) {
    let x1 = x1.min(frame.width() as u64);
    let y1 = y1.min(frame.height() as u64);
    for y in y0..y1 {
        for x in x0..x1 {
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Draws `text` with its bottom edge on `baseline`. Pixels falling outside
/// the frame are dropped.
pub fn draw_text(
    frame: &mut RgbImage,
    x: i64,
    baseline: i64,
    text: &str,
    color: Rgb<u8>,
    scale: u32,
) {
    let scale = scale.max(1) as i64;
    let top = baseline - GLYPH_HEIGHT as i64 * scale;
    let (width, height) = (frame.width() as i64, frame.height() as i64);
    let mut pen = x;

    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(rows) = glyph(ch) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                        continue;
                    }
                    for dy in 0..scale {
                        for dx in 0..scale {
                            let px = pen + col as i64 * scale + dx;
                            let py = top + row as i64 * scale + dy;
                            if (0..width).contains(&px) && (0..height).contains(&py) {
                                frame.put_pixel(px as u32, py as u32, color);
                            }
                        }
                    }
                }
            }
        }
        pen += GLYPH_ADVANCE as i64 * scale;
    }
}

fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '_' => [0, 0, 0, 0, 0, 0, 0b11111],
        '-' => [0, 0, 0, 0b11111, 0, 0, 0],
        '.' => [0, 0, 0, 0, 0, 0b01100, 0b01100],
        ':' => [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '%' => [0b11000, 0b11001, 0b00010, 0b00100, 0b01000, 0b10011, 0b00011],
        ' ' => [0; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(frame: &RgbImage) -> usize {
        frame.pixels().filter(|p| **p == LABEL_COLOR).count()
    }

    #[test]
    fn test_box_outline() {
        let mut frame = RgbImage::new(20, 20);
        draw_region_box(&mut frame, &Region::new(2, 3, 10, 8), LABEL_COLOR, 1);
        assert_eq!(frame.get_pixel(2, 3), &LABEL_COLOR);
        assert_eq!(frame.get_pixel(11, 10), &LABEL_COLOR);
        assert_eq!(frame.get_pixel(6, 6), &Rgb([0, 0, 0]));
        // perimeter of a 10x8 box
        assert_eq!(lit(&frame), 2 * 10 + 2 * 8 - 4);
    }

    #[test]
    fn test_box_clipped_by_frame() {
        let mut frame = RgbImage::new(10, 10);
        draw_region_box(&mut frame, &Region::new(5, 5, 50, 50), LABEL_COLOR, 2);
        assert_eq!(frame.get_pixel(5, 5), &LABEL_COLOR);
        assert_eq!(frame.get_pixel(9, 6), &LABEL_COLOR);
        // no right/bottom edge inside the frame
        assert_eq!(frame.get_pixel(9, 9), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_box_outside_frame_draws_nothing() {
        let mut frame = RgbImage::new(10, 10);
        draw_region_box(&mut frame, &Region::new(50, 50, 5, 5), LABEL_COLOR, 2);
        assert_eq!(lit(&frame), 0);
    }

    #[test]
    fn test_text_is_drawn_above_baseline() {
        let mut frame = RgbImage::new(100, 40);
        draw_text(&mut frame, 2, 30, "Ab_1 (9.5%)", LABEL_COLOR, 2);
        assert!(lit(&frame) > 0);
        for (_, y, p) in frame.enumerate_pixels() {
            if *p == LABEL_COLOR {
                assert!((16..30).contains(&y));
            }
        }
    }

    #[test]
    fn test_text_off_frame_is_clipped() {
        let mut frame = RgbImage::new(10, 10);
        draw_text(&mut frame, -200, 5, "HEALTHY", LABEL_COLOR, 2);
        draw_text(&mut frame, 0, -20, "HEALTHY", LABEL_COLOR, 2);
        assert_eq!(lit(&frame), 0);
    }
}
