use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use pinshot::capture::{plan_offsets, CaptureSlice, Compositor};
use pinshot::{CapturedImage, PageDimensions};
use std::hint::black_box;

const WIDTH: u32 = 1280;
const VIEWPORT: u32 = 720;

fn slices_for(total: u32) -> Vec<CaptureSlice> {
    let dims = PageDimensions::new(WIDTH, VIEWPORT, WIDTH, total);
    plan_offsets(&dims)
        .unwrap()
        .into_iter()
        .enumerate()
        .map(|(i, offset)| {
            let shade = (i * 40 % 256) as u8;
            let raster = RgbaImage::from_pixel(WIDTH, VIEWPORT, Rgba([shade, shade, 200, 255]));
            CaptureSlice {
                image: CapturedImage::from_raster(&DynamicImage::ImageRgba8(raster))
                    .unwrap()
                    .data,
                vertical_offset: offset,
            }
        })
        .collect()
}

fn bench_composite(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite");
    group.sample_size(10);

    for total in [VIEWPORT, 4_000, 12_000] {
        let slices = slices_for(total);
        group.bench_with_input(BenchmarkId::from_parameter(total), &slices, |b, slices| {
            b.iter(|| {
                let image = Compositor::new()
                    .composite(black_box(slices), WIDTH, total)
                    .unwrap();
                black_box(image.size())
            })
        });
    }

    group.finish();
}

fn bench_plan_offsets(c: &mut Criterion) {
    let dims = PageDimensions::new(WIDTH, VIEWPORT, WIDTH, 250_000);
    c.bench_function("plan_offsets_250k", |b| {
        b.iter(|| plan_offsets(black_box(&dims)).unwrap().len())
    });
}

criterion_group!(composite_benches, bench_composite, bench_plan_offsets);
criterion_main!(composite_benches);
