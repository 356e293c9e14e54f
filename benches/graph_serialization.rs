//! Benchmarks for filter graph serialization and recipe selection

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eb_av::{select_recipe, AssetPaths, FilterGraph, MixMode, Normalization, SampleRate};
use std::path::{Path, PathBuf};

fn audio_paths(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("/tmp/encodebox-job/assets/{i}/part-{i}.mp3")))
        .collect()
}

/// Concatenate `tracks` inputs, normalize, resample and duck a side track.
fn build_graph(tracks: usize) -> String {
    let mut graph = FilterGraph::new();
    let inputs: Vec<_> = (1..=tracks).map(|i| graph.input(i.to_string())).collect();
    let joined = graph.concat(inputs);
    let normalized = graph.normalize(joined, Normalization::Speechnorm);
    let speech = graph.resample(normalized, SampleRate::K44);
    let side = graph.input((tracks + 1).to_string());
    let side = graph.resample(side, SampleRate::K44);
    let root = graph.mix(side, speech, MixMode::Modulated, [0.2, 1.0]);
    graph.build(root).unwrap_or_default()
}

fn bench_filter_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_graph");

    for tracks in [1usize, 8, 64] {
        group.bench_with_input(BenchmarkId::new("modulated", tracks), &tracks, |b, &n| {
            b.iter(|| build_graph(black_box(n)))
        });
    }

    group.finish();
}

fn bench_select_recipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_recipe");
    let output = Path::new("/tmp/encodebox-job/job.mp4");

    let video = AssetPaths {
        videos: vec![PathBuf::from("/tmp/encodebox-job/assets/0/clip.mp4")],
        audios: audio_paths(3),
        ..Default::default()
    };
    group.bench_function("video_with_audio", |b| {
        b.iter(|| select_recipe(black_box(&video), output))
    });

    let image = AssetPaths {
        images: vec![PathBuf::from("/tmp/encodebox-job/assets/3/cover.png")],
        audios: audio_paths(3),
        ..Default::default()
    };
    group.bench_function("image_with_audio", |b| {
        b.iter(|| select_recipe(black_box(&image), output))
    });

    let audio_only = AssetPaths {
        audios: audio_paths(3),
        side_audios: vec![PathBuf::from("/tmp/encodebox-job/assets/4/bed.mp3")],
        ..Default::default()
    };
    group.bench_function("audio_only_with_side", |b| {
        b.iter(|| {
            select_recipe(black_box(&audio_only), output)
                .map(|recipe| recipe.args().len())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_filter_graph, bench_select_recipe);
criterion_main!(benches);
