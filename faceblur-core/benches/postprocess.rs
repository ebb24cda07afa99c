use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use faceblur_core::{
    Face, PostprocessConfig, RawDetectionOutputs, apply_postprocess, generate_anchors, hard_nms,
};

const ORIGINAL_SIZE: (u32, u32) = (1920, 1080);

/// Raw outputs where every `stride`-th prior clears the score threshold.
fn synthetic_outputs(anchor_count: usize, stride: usize) -> RawDetectionOutputs {
    let mut scores = Vec::with_capacity(anchor_count * 2);
    let mut offsets = Vec::with_capacity(anchor_count * 4);
    for index in 0..anchor_count {
        let face = if index % stride == 0 { 0.9 } else { 0.05 };
        scores.extend_from_slice(&[1.0 - face, face]);
        let jitter = (index % 7) as f32 * 0.1 - 0.3;
        offsets.extend_from_slice(&[jitter, -jitter, jitter * 0.5, 0.0]);
    }
    RawDetectionOutputs { scores, offsets }
}

fn clustered_faces(count: usize) -> Vec<Face> {
    (0..count)
        .map(|i| {
            let cluster = (i / 10) as f32 * 120.0;
            let shift = (i % 10) as f32 * 3.0;
            Face {
                x1: cluster + shift,
                y1: cluster * 0.5 + shift,
                x2: cluster + shift + 80.0,
                y2: cluster * 0.5 + shift + 90.0,
                score: 1.0 - (i % 10) as f32 * 0.05,
            }
        })
        .collect()
}

fn benchmark_postprocess(c: &mut Criterion) {
    let anchors = generate_anchors();
    let config = PostprocessConfig::default();

    let mut group = c.benchmark_group("apply_postprocess");
    for stride in [50usize, 500, 5000] {
        let raw = synthetic_outputs(anchors.len(), stride);
        group.bench_with_input(BenchmarkId::new("every_nth_prior", stride), &raw, |b, raw| {
            b.iter(|| {
                apply_postprocess(
                    black_box(&anchors),
                    black_box(raw),
                    ORIGINAL_SIZE,
                    &config,
                )
                .expect("outputs match anchor layout")
            });
        });
    }
    group.finish();

    let mut nms_group = c.benchmark_group("hard_nms");
    for count in [50usize, 200, 1000] {
        let faces = clustered_faces(count);
        nms_group.bench_with_input(BenchmarkId::from_parameter(count), &faces, |b, faces| {
            b.iter(|| hard_nms(black_box(faces.clone()), config.iou_threshold));
        });
    }
    nms_group.finish();

    c.bench_function("generate_anchors", |b| b.iter(generate_anchors));
}

criterion_group!(benches, benchmark_postprocess);
criterion_main!(benches);
