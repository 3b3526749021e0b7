use criterion::{criterion_group, criterion_main, Criterion};
use exrbench::{write_image_with_compression, BenchConfig, Compression, PixelBuffer, Target};
use std::hint::black_box;

fn run_benches(c: &mut Criterion) {
	let config = BenchConfig::default();
	let buffer = PixelBuffer::zeroed(config.width, config.height).unwrap();
	let pixels = black_box(buffer.pixels());

	let mut group = c.benchmark_group("rgba-half-1980x1080");
	group.sample_size(10);

	for (name, compression) in [
		("zip16", Compression::ZIP16),
		("rle", Compression::RLE),
		("uncompressed", Compression::Uncompressed),
	] {
		group.bench_function(format!("discard/{name}"), |b| {
			b.iter(|| {
				let report = write_image_with_compression(
					&Target::Discard,
					pixels,
					config.width,
					config.height,
					compression,
				)
				.unwrap();
				black_box(report);
			})
		});
	}

	group.bench_function("null-device/zip16", |b| {
		b.iter(|| {
			let report = write_image_with_compression(
				&Target::NullDevice,
				pixels,
				config.width,
				config.height,
				config.compression,
			)
			.unwrap();
			black_box(report);
		})
	});
	group.finish();
}

criterion_group!(benches, run_benches);
criterion_main!(benches);
