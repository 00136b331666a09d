use image::{Rgb, RgbImage};

use crate::application::glyphs::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};
use crate::domain::detection::DetectionRecord;

/// Distance between the label's top edge and the box's top edge.
const LABEL_OFFSET: i64 = 10;

/// Draws detection boxes and `"{class} {confidence:.2}"` labels onto frames.
///
/// Drawing happens in place on the caller's buffer. Pixels that fall outside
/// the frame are skipped, so boxes crossing the border are clipped.
#[derive(Debug, Clone)]
pub struct FrameAnnotator {
    pub box_color: Rgb<u8>,
    pub text_color: Rgb<u8>,
    pub label_background: Rgb<u8>,
    pub thickness: i32,
}

impl Default for FrameAnnotator {
    fn default() -> Self {
        Self {
            box_color: Rgb([0, 255, 0]),
            text_color: Rgb([0, 255, 0]),
            label_background: Rgb([0, 0, 0]),
            thickness: 2,
        }
    }
}

impl FrameAnnotator {
    pub fn annotate(&self, frame: &mut RgbImage, detections: &[DetectionRecord]) {
        for det in detections {
            let c = det.corners();
            let (x1, y1, x2, y2) = (i64::from(c.x1), i64::from(c.y1), i64::from(c.x2), i64::from(c.y2));
            for t in 0..i64::from(self.thickness.max(1)) {
                draw_rect(frame, x1 + t, y1 + t, x2 - t, y2 - t, self.box_color);
            }
        }

        // Labels go on after every box so a neighbouring box never covers them.
        for det in detections {
            let c = det.corners();
            let text = det.label();
            let lx = i64::from(c.x1);
            let ly = i64::from(c.y1) - LABEL_OFFSET;
            fill_rect(
                frame,
                lx - 1,
                ly - 1,
                lx + i64::from(glyphs::text_width(&text)),
                ly + i64::from(GLYPH_HEIGHT),
                self.label_background,
            );
            draw_text(frame, lx, ly, &text, self.text_color);
        }
    }
}

// Coordinates are i64 so saturated box corners can be offset without
// overflowing; every loop runs over the part of the span inside the frame.

fn bounds(frame: &RgbImage) -> (i64, i64) {
    (i64::from(frame.width()), i64::from(frame.height()))
}

fn put(frame: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = bounds(frame);
    if (0..w).contains(&x) && (0..h).contains(&y) {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

fn hline(frame: &mut RgbImage, left: i64, right: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = bounds(frame);
    if !(0..h).contains(&y) {
        return;
    }
    for x in left.max(0)..=right.min(w - 1) {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

fn vline(frame: &mut RgbImage, x: i64, top: i64, bottom: i64, color: Rgb<u8>) {
    let (w, h) = bounds(frame);
    if !(0..w).contains(&x) {
        return;
    }
    for y in top.max(0)..=bottom.min(h - 1) {
        frame.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_rect(frame: &mut RgbImage, left: i64, top: i64, right: i64, bottom: i64, color: Rgb<u8>) {
    if right < left || bottom < top {
        return;
    }
    hline(frame, left, right, top, color);
    hline(frame, left, right, bottom, color);
    vline(frame, left, top, bottom, color);
    vline(frame, right, top, bottom, color);
}

fn fill_rect(frame: &mut RgbImage, left: i64, top: i64, right: i64, bottom: i64, color: Rgb<u8>) {
    let (w, h) = bounds(frame);
    for y in top.max(0)..=bottom.min(h - 1) {
        for x in left.max(0)..=right.min(w - 1) {
            frame.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_text(frame: &mut RgbImage, mut x: i64, y: i64, text: &str, color: Rgb<u8>) {
    let (w, h) = bounds(frame);
    if y >= h || y + i64::from(GLYPH_HEIGHT) <= 0 {
        return;
    }
    for ch in text.chars() {
        if x >= w {
            break;
        }
        for (row, pattern) in glyphs::glyph(ch).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                    put(frame, x + i64::from(col), y + row as i64, color);
                }
            }
        }
        x += i64::from(GLYPH_ADVANCE);
    }
}
