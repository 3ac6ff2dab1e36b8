use core_diff::{detect_scroll_kmp, diff_with_anchors, find_overlap_kmp, hash_lines, myers_diff};
use core_diff::kmp::find_overlap_naive;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn screen(prefix: &str, start: usize, len: usize) -> Vec<String> {
    (start..start + len)
        .map(|i| format!("{prefix} {i:04} build output line for target crate"))
        .collect()
}

fn bench_overlap(c: &mut Criterion) {
    let prev = screen("log", 0, 100);
    let next = screen("log", 40, 100);
    c.bench_function("overlap_kmp_100", |b| {
        b.iter(|| find_overlap_kmp(black_box(&prev), black_box(&next)))
    });
    c.bench_function("overlap_naive_100", |b| {
        b.iter(|| find_overlap_naive(black_box(&prev), black_box(&next)))
    });
    c.bench_function("detect_scroll_100", |b| {
        b.iter(|| detect_scroll_kmp(black_box(&prev), black_box(&next), 0.1))
    });
}

fn bench_myers(c: &mut Criterion) {
    let prev = screen("row", 0, 100);
    let mut next = prev.clone();
    for i in (0..100).step_by(7) {
        next[i] = format!("edited {i}");
    }
    let (ph, nh) = (hash_lines(&prev), hash_lines(&next));
    c.bench_function("myers_sparse_edits_100", |b| {
        b.iter(|| myers_diff(black_box(&ph), black_box(&nh)))
    });
    let unrelated = hash_lines(&screen("other", 0, 100));
    c.bench_function("myers_bound_exceeded_100", |b| {
        b.iter(|| myers_diff(black_box(&ph), black_box(&unrelated)))
    });
    c.bench_function("anchor_regions_100", |b| {
        b.iter(|| diff_with_anchors(black_box(&prev), black_box(&next)))
    });
}

criterion_group!(benches, bench_overlap, bench_myers);
criterion_main!(benches);
