use criterion::{Criterion, criterion_group, criterion_main};
use image::Rgb;
use std::hint::black_box;

use picam_guard::{
    media::frame::{BoundingBox, Frame, IDLE_COLOR, downscale, draw_boxes},
    monitor::detection::{DetectionCadence, Detector, MotionDetector},
};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

fn frame_with_block(offset: u32) -> Frame {
    let mut f = Frame::new(WIDTH, HEIGHT);
    for y in 200..320 {
        for x in offset..offset + 120 {
            f.put_pixel(x, y, Rgb([230, 230, 230]));
        }
    }
    f
}

fn bench_downscale(c: &mut Criterion) {
    let frame = frame_with_block(100);
    c.bench_function("downscale_800x600_by_2", |b| b.iter(|| black_box(downscale(&frame, 2))));
}

fn bench_motion_detector(c: &mut Criterion) {
    let small = [downscale(&frame_with_block(100), 2), downscale(&frame_with_block(160), 2)];
    let mut detector = MotionDetector::new();
    let mut i = 0usize;

    c.bench_function("motion_detect_400x300", |b| {
        b.iter(|| {
            i += 1;
            black_box(detector.detect(&small[i % 2]))
        })
    });
}

// Full per-frame cost as the sensing loop pays it: cadence tick every 5th frame.
fn bench_cadence(c: &mut Criterion) {
    let frames = [frame_with_block(100), frame_with_block(160)];
    let mut cadence = DetectionCadence::new(MotionDetector::new());
    let mut index = 0u64;

    c.bench_function("cadence_frame_800x600", |b| {
        b.iter(|| {
            let frame = &frames[(index / 5 % 2) as usize];
            let hits = cadence.update(index, frame).len();
            index += 1;
            black_box(hits)
        })
    });
}

fn bench_overlay(c: &mut Criterion) {
    let boxes = [BoundingBox::new(100, 200, 120, 120), BoundingBox::new(500, 50, 200, 400)];
    let mut frame = Frame::new(WIDTH, HEIGHT);
    c.bench_function("overlay_two_boxes", |b| {
        b.iter(|| draw_boxes(black_box(&mut frame), &boxes, IDLE_COLOR))
    });
}

criterion_group!(benches, bench_downscale, bench_motion_detector, bench_cadence, bench_overlay);
criterion_main!(benches);
