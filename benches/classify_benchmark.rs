use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use rotscan::{Classifier, DirectoryWalker, Engine, Invoker, Mode, Registry, WalkConfig};

fn gzip_bytes(payload: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

/// Files that resolve by extension, by header, and not at all.
fn setup_files(count: usize) -> (TempDir, Vec<PathBuf>) {
    let temp_dir = TempDir::new().unwrap();
    let mut paths = Vec::with_capacity(count * 3);

    for i in 0..count {
        let by_extension = temp_dir.path().join(format!("data_{i}.gz"));
        fs::write(&by_extension, gzip_bytes(format!("payload {i}").as_bytes())).unwrap();

        let by_header = temp_dir.path().join(format!("noext_{i}"));
        fs::write(&by_header, gzip_bytes(format!("payload {i}").as_bytes())).unwrap();

        let unresolved = temp_dir.path().join(format!("unknown_{i}.qqq"));
        fs::write(&unresolved, format!("nothing to see {i}")).unwrap();

        paths.extend([by_extension, by_header, unresolved]);
    }

    (temp_dir, paths)
}

fn benchmark_classify(c: &mut Criterion) {
    let registry = Arc::new(Registry::builtin().unwrap());
    let classifier = Classifier::new(Arc::clone(&registry));
    let mut group = c.benchmark_group("classify");

    for count in [10, 100].iter() {
        let (_dir, paths) = setup_files(*count);

        group.bench_with_input(BenchmarkId::new("files", count), count, |b, _| {
            b.iter(|| {
                for path in &paths {
                    black_box(classifier.classify(path).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_verify_tree(c: &mut Criterion) {
    let registry = Arc::new(Registry::builtin().unwrap());
    let engine = Engine::new(registry, Invoker::default(), Mode::Verify);
    let walker = DirectoryWalker::new(WalkConfig::default());
    let (dir, _) = setup_files(50);

    c.bench_function("verify_tree", |b| {
        b.iter(|| {
            for entry in walker.walk(dir.path()) {
                black_box(engine.check(entry.path()));
            }
        });
    });
}

criterion_group!(benches, benchmark_classify, benchmark_verify_tree);
criterion_main!(benches);
