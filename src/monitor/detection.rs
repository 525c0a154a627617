//! detection.rs
//! Presence detection seam and the detection cadence.
//!
//! Detection is expensive relative to a frame period, so it runs every
//! `interval` frames on a downscaled copy; frames in between reuse the cached
//! result (overlay continuity and recording decisions both read the cache).

use image::{GrayImage, imageops};

use crate::media::frame::{BoundingBox, Frame, downscale};

pub const DETECTION_INTERVAL: u64 = 5;
pub const DETECTION_SCALE: u32 = 2;

/// `detect(frame) -> boxes`. Boxes are in the coordinates of the frame passed in.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox>;
}

impl<F> Detector for F
where
    F: FnMut(&Frame) -> Vec<BoundingBox>,
{
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self(frame)
    }
}

pub struct DetectionCadence<D: Detector> {
    detector: D,
    interval: u64,
    scale: u32,
    last: Vec<BoundingBox>,
    stale: bool,
}

impl<D: Detector> DetectionCadence<D> {
    pub fn new(detector: D) -> Self {
        Self::with_interval(detector, DETECTION_INTERVAL, DETECTION_SCALE)
    }

    pub fn with_interval(detector: D, interval: u64, scale: u32) -> Self {
        Self {
            detector,
            interval: interval.max(1),
            scale: scale.max(1),
            last: Vec::new(),
            stale: false,
        }
    }

    /// Runs detection on cadence ticks, otherwise returns the cached result.
    /// Returned boxes are in full-resolution coordinates.
    pub fn update(&mut self, frame_index: u64, frame: &Frame) -> &[BoundingBox] {
        if self.stale || frame_index % self.interval == 0 {
            self.stale = false;
            let small = downscale(frame, self.scale);
            self.last = self
                .detector
                .detect(&small)
                .into_iter()
                .map(|b| b.scaled(self.scale))
                .collect();
        }
        &self.last
    }

    pub fn last(&self) -> &[BoundingBox] {
        &self.last
    }

    /// Drops the cached boxes; the next `update` detects whatever its index.
    pub fn reset(&mut self) {
        self.last.clear();
        self.stale = true;
    }
}

/// Frame-difference motion detector over a fixed grid.
///
/// A cell is active when enough of its pixels changed by more than
/// `pixel_threshold` since the previous frame. With at least `min_cells`
/// active cells the union of them is reported as one box.
pub struct MotionDetector {
    cell: u32,
    pixel_threshold: u8,
    cell_fraction: f32,
    min_cells: usize,
    previous: Option<GrayImage>,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            cell: 16,
            pixel_threshold: 25,
            cell_fraction: 0.25,
            min_cells: 2,
            previous: None,
        }
    }

    fn active_cells(&self, prev: &GrayImage, cur: &GrayImage) -> Vec<(u32, u32)> {
        let (w, h) = cur.dimensions();
        let mut active = Vec::new();

        for cy in (0..h).step_by(self.cell as usize) {
            for cx in (0..w).step_by(self.cell as usize) {
                let x_end = (cx + self.cell).min(w);
                let y_end = (cy + self.cell).min(h);
                let total = (x_end - cx) * (y_end - cy);

                let mut changed = 0u32;
                for y in cy..y_end {
                    for x in cx..x_end {
                        let a = prev.get_pixel(x, y)[0];
                        let b = cur.get_pixel(x, y)[0];
                        if a.abs_diff(b) > self.pixel_threshold {
                            changed += 1;
                        }
                    }
                }

                if changed as f32 >= total as f32 * self.cell_fraction {
                    active.push((cx, cy));
                }
            }
        }
        active
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MotionDetector {
    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        let gray = imageops::grayscale(frame);

        let boxes = match &self.previous {
            Some(prev) if prev.dimensions() == gray.dimensions() => {
                let cells = self.active_cells(prev, &gray);
                if cells.len() < self.min_cells {
                    Vec::new()
                } else {
                    let (w, h) = gray.dimensions();
                    let x0 = cells.iter().map(|c| c.0).min().unwrap_or(0);
                    let y0 = cells.iter().map(|c| c.1).min().unwrap_or(0);
                    let x1 = cells.iter().map(|c| (c.0 + self.cell).min(w)).max().unwrap_or(0);
                    let y1 = cells.iter().map(|c| (c.1 + self.cell).min(h)).max().unwrap_or(0);
                    vec![BoundingBox::new(x0, y0, x1 - x0, y1 - y0)]
                }
            }
            _ => Vec::new(),
        };

        self.previous = Some(gray);
        boxes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn frame_with_square(x: u32, y: u32, size: u32) -> Frame {
        let mut f = Frame::new(160, 120);
        for yy in y..y + size {
            for xx in x..x + size {
                f.put_pixel(xx, yy, Rgb([255, 255, 255]));
            }
        }
        f
    }

    #[test]
    fn detector_runs_only_on_cadence_ticks() {
        let mut calls = 0u32;
        let mut cadence = DetectionCadence::new(|_: &Frame| {
            calls += 1;
            vec![BoundingBox::new(1, 2, 3, 4)]
        });

        let frame = Frame::new(40, 40);
        for i in 0..11 {
            cadence.update(i, &frame);
        }
        drop(cadence);
        // ticks at 0, 5, 10
        assert_eq!(calls, 3);
    }

    #[test]
    fn boxes_are_rescaled_and_cached_between_ticks() {
        let mut cadence = DetectionCadence::new(|f: &Frame| {
            // detector sees the half-size copy
            assert_eq!(f.dimensions(), (20, 10));
            vec![BoundingBox::new(1, 2, 3, 4)]
        });
        let frame = Frame::new(40, 20);

        assert_eq!(cadence.update(0, &frame), &[BoundingBox::new(2, 4, 6, 8)]);
        assert_eq!(cadence.update(3, &frame), &[BoundingBox::new(2, 4, 6, 8)]);
    }

    #[test]
    fn empty_result_replaces_cache() {
        let mut hits = vec![vec![BoundingBox::new(0, 0, 1, 1)], vec![]].into_iter();
        let mut cadence =
            DetectionCadence::with_interval(move |_: &Frame| hits.next().unwrap_or_default(), 1, 1);
        let frame = Frame::new(4, 4);
        assert_eq!(cadence.update(0, &frame).len(), 1);
        assert!(cadence.update(1, &frame).is_empty());
        assert!(cadence.last().is_empty());
    }

    #[test]
    fn reset_forces_detection_off_cadence() {
        let before = BoundingBox::new(0, 0, 1, 1);
        let after = BoundingBox::new(2, 2, 1, 1);
        let mut hits = vec![vec![before], vec![after]].into_iter();
        let mut cadence =
            DetectionCadence::with_interval(move |_: &Frame| hits.next().unwrap_or_default(), 5, 1);
        let frame = Frame::new(4, 4);

        assert_eq!(cadence.update(0, &frame), &[before]);
        cadence.reset();
        assert!(cadence.last().is_empty());
        // index 1 is off cadence; a fresh result replaces the stale one
        assert_eq!(cadence.update(1, &frame), &[after]);
        assert_eq!(cadence.update(2, &frame), &[after]);
    }

    #[test]
    fn motion_detector_ignores_static_scene() {
        let mut d = MotionDetector::new();
        let f = frame_with_square(10, 10, 30);
        assert!(d.detect(&f).is_empty());
        assert!(d.detect(&f).is_empty());
    }

    #[test]
    fn motion_detector_boxes_changed_region() {
        let mut d = MotionDetector::new();
        d.detect(&Frame::new(160, 120));
        let boxes = d.detect(&frame_with_square(32, 32, 40));

        assert_eq!(boxes.len(), 1);
        let b = boxes[0];
        assert!(b.x <= 32 && b.y <= 32);
        assert!(b.x + b.width >= 72 && b.y + b.height >= 72);
    }
}
