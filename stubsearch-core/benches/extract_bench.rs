// Benchmark import extraction and candidate generation throughput.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rayon::prelude::*;

use stubsearch_core::candidates::{CandidatePool, StrategyContext, generate_blind};
use stubsearch_core::config::{ExtractionSection, StrategiesSection};
use stubsearch_core::extract::{ImportExtractor, StubInfoBuilder, extract_imports};
use stubsearch_core::stub::build_baseline;
use stubsearch_core::types::ModuleRank;

fn generate_ts_source(imports: usize) -> String {
    use std::fmt::Write;
    let mut src = String::from("// generated\n");
    for i in 0..imports {
        let _ = writeln!(src, "import def{i}, {{ named{i}, type Opts{i} }} from 'pkg-{}';", i % 7);
        let _ = writeln!(src, "import * as ns{i} from '@scope/lib-{}';", i % 5);
        let _ = writeln!(src, "const req{i} = require('legacy-{}');", i % 3);
    }
    for i in 0..imports {
        let _ = writeln!(
            src,
            "export function use{i}(x: number) {{\n  /* call */ def{i}.run(x);\n  named{i}(x, x);\n  return ns{i}.helper + req{i}.value;\n}}"
        );
    }
    src
}

fn bench_extract_single_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_single_file");
    for imports in [10, 50, 200] {
        let source = generate_ts_source(imports);
        group.bench_with_input(BenchmarkId::new("imports", imports), &source, |b, src| {
            b.iter(|| extract_imports(src, 64));
        });
    }
    group.finish();
}

fn bench_extract_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_parallel");
    let files: Vec<String> = (0..100).map(|i| generate_ts_source(10 + i % 10)).collect();

    group.bench_function("100_files_sequential", |b| {
        b.iter(|| files.iter().map(|src| extract_imports(src, 64)).collect::<Vec<_>>());
    });
    group.bench_function("100_files_rayon", |b| {
        b.iter(|| files.par_iter().map(|src| extract_imports(src, 64)).collect::<Vec<_>>());
    });

    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<_> = files
        .iter()
        .enumerate()
        .map(|(i, src)| {
            let path = dir.path().join(format!("f{i}.ts"));
            std::fs::write(&path, src).unwrap();
            path
        })
        .collect();
    group.bench_function("100_files_extractor_cold", |b| {
        b.iter(|| {
            let mut extractor = ImportExtractor::new(&ExtractionSection::default());
            extractor.extract_files(&paths).len()
        });
    });
    group.finish();
}

fn bench_generate_candidates(c: &mut Criterion) {
    let mut builder = StubInfoBuilder::new(true);
    builder.absorb(&extract_imports(&generate_ts_source(40), 64));
    let infos = builder.finish();
    let ranked: Vec<ModuleRank> = infos
        .keys()
        .enumerate()
        .map(|(i, module)| ModuleRank {
            module: module.clone(),
            rank: i + 1,
            files: 1,
            errors: 1,
        })
        .collect();
    let baseline = build_baseline(&ranked, &infos);
    let config = StrategiesSection {
        sweep_arity: 2,
        symbol_widen_max: 64,
        ..StrategiesSection::default()
    };

    c.bench_function("generate_blind_pairs", |b| {
        b.iter(|| {
            let mut pool = CandidatePool::new(baseline.clone(), 256);
            let ctx = StrategyContext {
                ranked: &ranked,
                infos: &infos,
                config: &config,
            };
            generate_blind(&ctx, &mut pool)
        });
    });
}

criterion_group!(
    benches,
    bench_extract_single_file,
    bench_extract_parallel,
    bench_generate_candidates,
);
criterion_main!(benches);
