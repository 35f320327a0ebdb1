use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use subtext::{SrtCleaner, SrtEntry, SrtGenerator};

fn sample_srt(cues: usize) -> String {
    let mut content = String::new();
    for i in 0..cues {
        let start = i * 4;
        let end = start + 3;
        content.push_str(&format!(
            "{}\n{:02}:{:02}:{:02},000 --> {:02}:{:02}:{:02},500\n<i>Cue number {}</i> with some dialogue text\n\n",
            i + 1,
            start / 3600,
            (start % 3600) / 60,
            start % 60,
            end / 3600,
            (end % 3600) / 60,
            end % 60,
            i + 1,
        ));
    }
    content
}

fn bench_cleaning(c: &mut Criterion) {
    let cleaner = SrtCleaner::new();
    let small = sample_srt(10);
    let large = sample_srt(1000);

    c.bench_function("clean_small_file", |b| {
        b.iter(|| black_box(cleaner.clean_content(black_box(&small))))
    });

    c.bench_function("clean_large_file", |b| {
        b.iter(|| black_box(cleaner.clean_content(black_box(&large))))
    });
}

fn bench_srt_generation(c: &mut Criterion) {
    c.bench_function("srt_generate_500_entries", |b| {
        b.iter(|| {
            let mut generator = SrtGenerator::new();
            for i in 0..500u64 {
                generator.add_entry(SrtEntry::new(
                    (i + 1) as u32,
                    Duration::from_secs(i * 5),
                    Duration::from_secs((i + 1) * 5),
                    format!("Generated subtitle line {}", i + 1),
                ));
            }
            generator.sort_entries();
            black_box(generator.generate())
        })
    });
}

criterion_group!(benches, bench_cleaning, bench_srt_generation);
criterion_main!(benches);
