//! frame.rs
//! Frame type, detection boxes and the operator overlay.

use image::{
    Rgb, RgbImage,
    imageops::{self, FilterType},
};

pub type Frame = RgbImage;

/// Overlay color while a recording session is open.
pub const RECORDING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Overlay color while idle.
pub const IDLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const OVERLAY_THICKNESS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Maps a box found on a downscaled copy back to full resolution.
    pub fn scaled(&self, factor: u32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

pub fn downscale(frame: &Frame, factor: u32) -> Frame {
    let factor = factor.max(1);
    let w = (frame.width() / factor).max(1);
    let h = (frame.height() / factor).max(1);
    imageops::resize(frame, w, h, FilterType::Triangle)
}

/// Draws box outlines, clipped to the frame.
pub fn draw_boxes(frame: &mut Frame, boxes: &[BoundingBox], color: Rgb<u8>) {
    for b in boxes {
        draw_outline(frame, b, color);
    }
}

fn draw_outline(frame: &mut Frame, b: &BoundingBox, color: Rgb<u8>) {
    if b.width == 0 || b.height == 0 {
        return;
    }
    let (fw, fh) = frame.dimensions();
    let x1 = (b.x + b.width - 1).min(fw.saturating_sub(1));
    let y1 = (b.y + b.height - 1).min(fh.saturating_sub(1));
    if b.x >= fw || b.y >= fh {
        return;
    }

    for t in 0..OVERLAY_THICKNESS {
        for x in b.x..=x1 {
            put(frame, x, b.y + t, color);
            put(frame, x, y1.saturating_sub(t), color);
        }
        for y in b.y..=y1 {
            put(frame, b.x + t, y, color);
            put(frame, x1.saturating_sub(t), y, color);
        }
    }
}

#[inline]
fn put(frame: &mut Frame, x: u32, y: u32, color: Rgb<u8>) {
    if x < frame.width() && y < frame.height() {
        frame.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_box_doubles_every_field() {
        let b = BoundingBox::new(10, 20, 30, 40).scaled(2);
        assert_eq!(b, BoundingBox::new(20, 40, 60, 80));
    }

    #[test]
    fn downscale_halves_dimensions() {
        let f = Frame::new(800, 600);
        let small = downscale(&f, 2);
        assert_eq!(small.dimensions(), (400, 300));
    }

    #[test]
    fn outline_is_drawn_and_interior_untouched() {
        let mut f = Frame::new(20, 20);
        draw_boxes(&mut f, &[BoundingBox::new(2, 2, 10, 10)], RECORDING_COLOR);
        assert_eq!(*f.get_pixel(2, 2), RECORDING_COLOR);
        assert_eq!(*f.get_pixel(11, 11), RECORDING_COLOR);
        assert_eq!(*f.get_pixel(3, 7), RECORDING_COLOR);
        assert_eq!(*f.get_pixel(7, 7), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut f = Frame::new(10, 10);
        draw_boxes(&mut f, &[BoundingBox::new(5, 5, 50, 50)], IDLE_COLOR);
        draw_boxes(&mut f, &[BoundingBox::new(40, 40, 5, 5)], IDLE_COLOR);
        assert_eq!(*f.get_pixel(9, 9), IDLE_COLOR);
    }
}
