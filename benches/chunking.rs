use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use therapist_voice::text::{CharTokenizer, TextChunker};
use therapist_voice::tts::Assembly;

const WORD_COUNT: usize = 2_000;
const SAMPLE_RATE: u32 = 24_000;

fn long_reply() -> String {
    let sentence = "It sounds like the week has been heavy, and it makes sense to feel worn down.";
    let mut text = String::new();
    let mut words = 0;
    while words < WORD_COUNT {
        text.push_str(sentence);
        text.push(' ');
        words += sentence.split_whitespace().count();
    }
    text
}

fn bench_chunking(c: &mut Criterion) {
    let text = long_reply();
    let chunker = TextChunker::new(280);
    c.bench_with_input(
        BenchmarkId::new("chunk_reply", WORD_COUNT),
        &text,
        |b, text| {
            b.iter(|| chunker.chunk(black_box(text), &CharTokenizer));
        },
    );
}

fn bench_assembly(c: &mut Criterion) {
    let chunks: Vec<Vec<f32>> = (0..12)
        .map(|idx| vec![0.1; SAMPLE_RATE as usize * (2 + idx % 3)])
        .collect();
    let assembly = Assembly::Pause {
        pause_ms: 120.0,
        edge_fade_ms: 6.0,
    };
    c.bench_with_input(
        BenchmarkId::new("join_with_pauses", chunks.len()),
        &chunks,
        |b, chunks| {
            b.iter(|| assembly.join(black_box(chunks.clone()), SAMPLE_RATE));
        },
    );
}

criterion_group!(benches, bench_chunking, bench_assembly);
criterion_main!(benches);
