use std::path::PathBuf;
use std::time::{Duration, Instant};

use stubsearch_core::candidates::{CandidatePool, StrategyContext, generate_blind};
use stubsearch_core::config::{ExtractionSection, LocalizeMode, StrategiesSection};
use stubsearch_core::extract::{ImportExtractor, StubInfoBuilder};
use stubsearch_core::localize::Localizer;
use stubsearch_core::stub::build_baseline;

fn threshold_ms(var: &str, default_ms: u64) -> Duration {
    let ms = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

fn synthetic_project(file_count: usize) -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();

    let mut paths = Vec::with_capacity(file_count);
    for i in 0..file_count {
        let path = src.join(format!("mod_{i}.ts"));
        std::fs::write(
            &path,
            format!(
                "import dep{i} from 'dep-{m}';\nimport {{ helper, type Opts }} from '@scope/util-{n}';\nimport * as local from './mod_{prev}';\n\nexport function run{i}(o: Opts) {{\n  dep{i}.start(o);\n  return helper(local, {i});\n}}\n",
                m = i % 25,
                n = i % 9,
                prev = i.saturating_sub(1),
            ),
        )
        .unwrap();
        paths.push(path);
    }
    (dir, paths)
}

#[test]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
fn perf_extract_and_localize_under_threshold() {
    let (_dir, paths) = synthetic_project(400);

    let t0 = Instant::now();
    let mut extractor = ImportExtractor::new(&ExtractionSection::default());
    let extracted = extractor.extract_files(&paths);
    let mut builder = StubInfoBuilder::new(true);
    let mut localizer = Localizer::new();
    for (path, imports) in &extracted {
        builder.absorb(imports);
        localizer.observe_file(&path.display().to_string(), imports.modules(), 1);
    }
    let ranked = localizer.rank(LocalizeMode::PerFile, None);
    let elapsed = t0.elapsed();

    assert_eq!(extracted.len(), 400);
    assert_eq!(builder.finish().len(), 34);
    assert!(!ranked.is_empty());
    assert!(
        elapsed <= threshold_ms("STUBSEARCH_PERF_EXTRACT_MS", 5000),
        "extraction exceeded threshold: {elapsed:?}"
    );
}

#[test]
#[ignore = "performance gate; run explicitly in CI/dev workflows"]
fn perf_pairwise_generation_under_threshold() {
    let (_dir, paths) = synthetic_project(200);
    let mut extractor = ImportExtractor::new(&ExtractionSection::default());
    let mut builder = StubInfoBuilder::new(true);
    let mut localizer = Localizer::new();
    for (path, imports) in extractor.extract_files(&paths) {
        builder.absorb(&imports);
        localizer.observe_file(&path.display().to_string(), imports.modules(), 2);
    }
    let infos = builder.finish();
    let ranked = localizer.rank(LocalizeMode::PerFile, None);
    let baseline = build_baseline(&ranked, &infos);
    let config = StrategiesSection {
        sweep_arity: 2,
        ..StrategiesSection::default()
    };

    let t0 = Instant::now();
    let mut pool = CandidatePool::new(baseline, 1000);
    let added = generate_blind(
        &StrategyContext {
            ranked: &ranked,
            infos: &infos,
            config: &config,
        },
        &mut pool,
    );
    let elapsed = t0.elapsed();

    assert!(added > 0);
    assert!(
        elapsed <= threshold_ms("STUBSEARCH_PERF_GENERATE_MS", 10000),
        "candidate generation exceeded threshold: {elapsed:?}"
    );
}
