use criterion::{Criterion, criterion_group, criterion_main};
use docs_rag::documents::{Sectionizer, sectionize};
use std::fmt::Write as _;
use std::hint::black_box;

fn sample_document(sections: usize) -> String {
    let mut doc = String::from(
        "---\ntitle: entity\ntype: core\nsource_code: src/core/a-entity.js\n---\n\nEntities are placeholders.\n",
    );
    for i in 0..sections {
        let _ = write!(
            doc,
            "\n## Section {i}\n\nSome prose about section {i}.\n\n```html\n<a-entity geometry=\"primitive: box\"></a-entity>\n```\n\n### Details {i}\n\n| Property | Default |\n| -------- | ------- |\n| width    | 1       |\n"
        );
    }
    doc
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let small = sample_document(8);
    let large = sample_document(400);

    c.bench_function("sectionize_small", |b| {
        b.iter(|| sectionize(black_box(&small), black_box("#")))
    });
    c.bench_function("sectionize_large", |b| {
        b.iter(|| sectionize(black_box(&large), black_box("#")))
    });

    let sectionizer = Sectionizer::new("#");
    c.bench_function("sectionize_large_reused", |b| {
        b.iter(|| sectionizer.sectionize(black_box(&large)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
