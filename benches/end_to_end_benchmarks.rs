use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use export_synth::config::SynthConfig;
use export_synth::file_walker::FileWalker;
use export_synth::resolver;
use export_synth::Synthesizer;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

// Build a module tree `fanout` wide and `depth` deep. Every directory module
// re-exports its children through wildcards and leaves declare `items`
// uniquely named functions.
fn create_module_tree(dir: &Path, manifest: &str, prefix: &str, depth: usize, fanout: usize, items: usize) -> usize {
    let mut source = String::new();
    let mut units = 1;

    if depth == 0 {
        for i in 0..items {
            source.push_str(&format!("pub fn {prefix}_item_{i}() {{}}\n"));
        }
    } else {
        for i in 0..fanout {
            let child = format!("m{depth}_{i}");
            source.push_str(&format!("pub mod {child};\n"));
            source.push_str(&format!("pub use {child}::*;\n"));
            let child_dir = dir.join(&child);
            fs::create_dir_all(&child_dir).unwrap();
            units += create_module_tree(&child_dir, "mod.rs", &format!("{prefix}_{i}"), depth - 1, fanout, items);
        }
    }

    fs::write(dir.join(manifest), source).unwrap();
    units
}

fn bench_end_to_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("end_to_end");
    let temp_dir = tempdir().unwrap();

    let test_configs = [
        // (depth, fanout, items, name)
        (1, 5, 10, "small"),
        (2, 5, 20, "medium"),
        (3, 5, 20, "large"),
    ];

    for &(depth, fanout, items, name) in &test_configs {
        let root = temp_dir.path().join(name);
        fs::create_dir_all(&root).unwrap();
        let units = create_module_tree(&root, "lib.rs", "m", depth, fanout, items);
        println!("Created {} units for {} test", units, name);

        group.bench_function(BenchmarkId::new("walk_and_resolve", name), |b| {
            b.iter(|| {
                let outcome = FileWalker::new().build_tree(black_box(&root)).unwrap();
                resolver::resolve(&outcome.tree)
            })
        });

        let config = SynthConfig { root: root.clone(), dry_run: true, ..SynthConfig::default() };
        group.bench_function(BenchmarkId::new("dry_run_pipeline", name), |b| {
            b.iter(|| Synthesizer::new(black_box(config.clone())).run().unwrap())
        });
    }

    group.finish();
}

criterion_group!(end_to_end_benches, bench_end_to_end);
criterion_main!(end_to_end_benches);
