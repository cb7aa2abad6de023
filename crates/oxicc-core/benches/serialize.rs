//! Profile serialization benchmarks
//!
//! Write, read and checksum costs for a matrix/TRC profile and a
//! Lut-based CMYK profile.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxicc_core::checksum::md5;
use oxicc_core::icc::types::TV_43;
use oxicc_core::icc::{
    ColorSpace, CompatFlags, CompatOptions, LutLayout, Profile, ProfileClass, TagSignature, XyzNumber,
};
use oxicc_core::stream::MemStream;

fn options() -> CompatOptions {
    CompatOptions::strict().with_flags(CompatFlags::NO_REQUIRED_CHECK)
}

fn matrix_profile(entries: usize) -> Profile {
    let mut p = Profile::new().with_options(options());
    p.header.device_class = ProfileClass::Display;
    p.header.color_space = ColorSpace::Rgb;
    p.header.pcs = ColorSpace::Xyz;
    p.set_version(TV_43).unwrap();
    let colorants = [
        XyzNumber::new(0.4361, 0.2225, 0.0139),
        XyzNumber::new(0.3851, 0.7169, 0.0971),
        XyzNumber::new(0.1431, 0.0606, 0.7141),
    ];
    p.create_matrix_xforms(colorants, entries, |ch, x| x.powf(2.2 + ch as f64 * 0.1))
        .unwrap();
    p
}

fn cmyk_profile(grid: usize) -> Profile {
    let mut p = Profile::new().with_options(options());
    p.header.device_class = ProfileClass::Output;
    p.header.color_space = ColorSpace::Cmyk;
    p.header.pcs = ColorSpace::Lab;
    p.set_version(TV_43).unwrap();
    p.create_lut_xforms(
        TagSignature::A2B0,
        LutLayout::lut16(grid, 256, 256),
        |_, x| x,
        |i, o| {
            let k = 1.0 - i[3];
            o[0] = (1.0 - i[0].max(i[1]).max(i[2])) * k;
            o[1] = 0.5 + (i[1] - i[0]) * 0.25;
            o[2] = 0.5 + (i[2] - i[1]) * 0.25;
        },
        |_, x| x,
    )
    .unwrap();
    p
}

fn write(p: &mut Profile) -> Vec<u8> {
    let mut out = MemStream::new();
    p.write(&mut out, 0).unwrap();
    out.into_inner()
}

// ============================================================================
// Write
// ============================================================================

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for entries in [256, 1024, 4096].iter() {
        let mut p = matrix_profile(*entries);
        let size = write(&mut p).len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("matrix_trc", entries), entries, |b, _| {
            b.iter(|| black_box(write(&mut p)))
        });
    }

    for grid in [9, 17].iter() {
        let mut p = cmyk_profile(*grid);
        let size = write(&mut p).len();
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("cmyk_lut16", grid), grid, |b, _| {
            b.iter(|| black_box(write(&mut p)))
        });
    }

    group.finish();
}

// ============================================================================
// Read
// ============================================================================

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for grid in [9, 17].iter() {
        let bytes = write(&mut cmyk_profile(*grid));
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("all_tags", grid), &bytes, |b, bytes| {
            b.iter(|| {
                let mut p = Profile::new();
                p.read(MemStream::from_vec(bytes.clone()).shared(), 0).unwrap();
                p.read_all_tags().unwrap();
                black_box(p.tag_count())
            })
        });
        group.bench_with_input(BenchmarkId::new("directory_only", grid), &bytes, |b, bytes| {
            b.iter(|| {
                let mut p = Profile::new();
                p.read(MemStream::from_vec(bytes.clone()).shared(), 0).unwrap();
                black_box(p.tag_count())
            })
        });
    }

    group.finish();
}

// ============================================================================
// Checksum
// ============================================================================

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");

    let bytes = write(&mut cmyk_profile(17));
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("md5", |b| b.iter(|| md5(black_box(&bytes))));

    let mut p = cmyk_profile(17);
    write(&mut p);
    group.bench_function("check_id", |b| b.iter(|| black_box(p.check_id().unwrap())));

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_checksum);
criterion_main!(benches);
