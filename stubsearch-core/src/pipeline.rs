//! Per-project search and the project worker pool.
//!
//! One project runs: un-injected baseline → localize → baseline stub →
//! top1 trial → repair + blind candidates → (rerank) → sequential trials
//! until the selection policy stops. Projects run in parallel, bounded by
//! `search.concurrency`; trials within a project never overlap.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::adapter::BaselineAdapter;
use crate::candidates::{CandidatePool, PushOutcome, StrategyContext, TreeSitterResolver, generate_blind, plan_repairs};
use crate::config::{BaselineSource, SearchConfig};
use crate::decl::{DeclarationFile, parse_declarations};
use crate::diagnostics::{Taxonomy, code_counts, parse_output};
use crate::error::{OracleError, Result, SearchError};
use crate::extract::{ImportExtractor, StubInfoBuilder, is_external_specifier};
use crate::localize::Localizer;
use crate::oracle::{InjectionLayout, Oracle};
use crate::progress::{NoopReporter, ProgressReporter};
use crate::rerank::{FeatureContext, RerankerModel, rerank};
use crate::selection::SearchMachine;
use crate::store::{BaselineSummary, ProjectRecord, RepairSummary, TrialLog, TrialRecord, write_patch};
use crate::stub::build_baseline;
use crate::trial::TrialExecutor;
use crate::types::{Candidate, Diagnostic, ModuleRank, ModuleStubInfo, StopReason, StrategyTag};

/// Searches one project at a time. Cheap to clone; shared state is
/// read-only.
#[derive(Clone)]
pub struct ProjectSearch {
    config: Arc<SearchConfig>,
    oracle: Arc<dyn Oracle>,
    model: Option<Arc<RerankerModel>>,
    taxonomy: Taxonomy,
    run_id: String,
}

impl std::fmt::Debug for ProjectSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectSearch")
            .field("oracle", &self.oracle.name())
            .field("model", &self.model.is_some())
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

/// What the localization phase hands to candidate generation.
struct Localized {
    ranked: Vec<ModuleRank>,
    infos: BTreeMap<String, ModuleStubInfo>,
    /// Diagnostic file → external modules it imports.
    file_modules: BTreeMap<String, BTreeSet<String>>,
}

impl ProjectSearch {
    pub fn new(config: Arc<SearchConfig>, oracle: Arc<dyn Oracle>) -> Self {
        let taxonomy = Taxonomy::from_config(&config.taxonomy);
        Self {
            config,
            oracle,
            model: None,
            taxonomy,
            run_id: Uuid::new_v4().to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<Arc<RerankerModel>>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Search one project. Per-project failures become a skip reason on
    /// the record; only an unavailable oracle is returned as an error.
    #[instrument(skip_all, name = "project_search", fields(project = %project.display()))]
    pub async fn run(&self, project: &Path) -> Result<ProjectRecord> {
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.search.project_timeout_secs);
        let mut record = ProjectRecord::new(&self.run_id, project, Utc::now());

        let result = self.search(project, deadline, &mut record).await;
        record.duration_ms = millis(started.elapsed());
        match result {
            Ok(()) => {}
            Err(e) if e.is_oracle_unavailable() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Project search failed");
                record.skip_reason = Some(skip_reason(&e).to_string());
            }
        }
        match (&record.skip_reason, &record.outcome) {
            (Some(reason), _) => info!(reason = %reason, "Project skipped"),
            (None, Some(outcome)) => info!(
                chosen = ?outcome.chosen_candidate_id,
                trials = outcome.trials_run,
                stop = outcome.stop_reason.as_str(),
                "Project searched"
            ),
            (None, None) => {}
        }
        Ok(record)
    }

    async fn search(&self, project: &Path, deadline: Instant, record: &mut ProjectRecord) -> Result<()> {
        let layout = InjectionLayout::new(project);
        if !layout.has_tsconfig() {
            record.skip_reason = Some("no-tsconfig".into());
            return Ok(());
        }

        let run = self
            .oracle
            .check(project, &layout.base_tsconfig(), self.trial_timeout(deadline))
            .await?;
        let diagnostics = if run.timed_out {
            Vec::new()
        } else {
            parse_output(&run.stdout, &run.stderr)
        };
        let core = self.taxonomy.core_diagnostics(&diagnostics);
        record.baseline = Some(BaselineSummary {
            exit_code: run.exit_code,
            timed_out: run.timed_out,
            counts: code_counts(&diagnostics),
            core_total: core.len(),
            total: diagnostics.len(),
        });
        if run.timed_out {
            record.skip_reason = Some("baseline-timeout".into());
            return Ok(());
        }
        if core.is_empty() {
            record.skip_reason = Some("no-core-diagnostics".into());
            return Ok(());
        }
        debug!(core = core.len(), total = diagnostics.len(), "Baseline diagnostics");

        let localized = self.localize(project, &core)?;
        if localized.ranked.is_empty() {
            record.skip_reason = Some("no-stub-modules".into());
            return Ok(());
        }
        record.localized.clone_from(&localized.ranked);
        record.stub_modules = localized.ranked.iter().map(|r| r.module.clone()).collect();

        let baseline = match self.config.baseline.source {
            BaselineSource::Stub => build_baseline(&localized.ranked, &localized.infos),
            BaselineSource::Adapter => {
                let adapter = BaselineAdapter::new(&self.config.baseline);
                match adapter.generate(project, &record.stub_modules, &localized.infos).await {
                    Ok(text) => parse_declarations(&text),
                    Err(e) => {
                        warn!(error = %e, "Baseline adapter failed");
                        record.skip_reason = Some(e.skip_reason().to_string());
                        return Ok(());
                    }
                }
            }
        };

        layout.prepare()?;
        let searched = self
            .run_trials(&layout, baseline, &localized, &diagnostics, deadline, record)
            .await;
        if !self.config.output.keep_injection {
            if let Err(e) = layout.cleanup() {
                warn!(error = %e, "Cannot remove injection files");
            }
        }
        searched
    }

    /// Extract imports from the files carrying core diagnostics and rank
    /// the modules they import.
    fn localize(&self, project: &Path, core: &[&Diagnostic]) -> Result<Localized> {
        let excludes = self
            .config
            .search
            .exclude_patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| crate::error::ConfigError::Invalid(e.to_string()))?;

        let mut per_file: BTreeMap<&str, usize> = BTreeMap::new();
        for diag in core {
            if excludes.iter().any(|p| p.matches(&diag.file)) {
                continue;
            }
            *per_file.entry(diag.file.as_str()).or_insert(0) += 1;
        }
        let paths: Vec<PathBuf> = per_file.keys().map(|f| project.join(f)).collect();

        let mut extractor = ImportExtractor::new(&self.config.extraction);
        let extracted: BTreeMap<PathBuf, _> = extractor.extract_files(&paths).into_iter().collect();

        let only_external = self.config.search.only_external;
        let mut builder = StubInfoBuilder::new(only_external);
        let mut localizer = Localizer::new();
        let mut file_modules = BTreeMap::new();
        for (file, errors) in &per_file {
            let Some(imports) = extracted.get(&project.join(file)) else {
                continue;
            };
            builder.absorb(imports);
            let modules: BTreeSet<String> = imports
                .modules()
                .into_iter()
                .filter(|m| !only_external || is_external_specifier(m))
                .map(String::from)
                .collect();
            localizer.observe_file(file, modules.iter().map(String::as_str), *errors);
            file_modules.insert((*file).to_string(), modules);
        }

        let ranked = localizer.rank(self.config.localizer.mode, self.config.localizer.top_m);
        debug!(
            files = per_file.len(),
            modules = ranked.len(),
            cached = extractor.cache_len(),
            "Localized"
        );
        Ok(Localized {
            ranked,
            infos: builder.finish(),
            file_modules,
        })
    }

    async fn run_trials(
        &self,
        layout: &InjectionLayout,
        baseline: DeclarationFile,
        localized: &Localized,
        diagnostics: &[Diagnostic],
        deadline: Instant,
        record: &mut ProjectRecord,
    ) -> Result<()> {
        let config = &self.config;
        let core = self.taxonomy.core_diagnostics(diagnostics);
        let mut executor = TrialExecutor::new(
            Arc::clone(&self.oracle),
            layout.clone(),
            self.taxonomy.clone(),
            core.len(),
        );
        let mut machine = SearchMachine::new(&config.selection, core.len());
        let mut pool = CandidatePool::new(baseline, config.search.trial_max);
        let features = FeatureContext::new(
            &localized.ranked,
            self.taxonomy.core_codes().map(String::from),
            code_counts(diagnostics),
            &core,
            localized.file_modules.clone(),
            pool.top1().declaration_count,
        );
        let top1 = pool.top1().clone();
        let limit = config.output.log_diagnostics_limit;

        machine.begin();
        let trial = executor.execute(&top1, self.trial_timeout(deadline)).await?;
        let top1_diagnostics = trial.diagnostics.clone();
        record.trials.push(TrialRecord::new(
            trial.clone(),
            &top1,
            features.features(&top1),
            &top1.declaration_text,
            limit,
        ));
        machine.score(trial);

        let mut queue = Vec::new();
        if !machine.is_stopped() {
            if config.strategies.repair {
                record.repair = self.queue_repairs(layout.project(), &top1_diagnostics, &mut pool);
            }
            let ctx = StrategyContext {
                ranked: &localized.ranked,
                infos: &localized.infos,
                config: &config.strategies,
            };
            let blind = generate_blind(&ctx, &mut pool);
            debug!(repair = record.repair.candidates, blind, "Candidates generated");

            queue = pool.generated().to_vec();
            if let Some(model) = &self.model {
                queue = rerank(&top1, queue, model, &features);
            }
        }

        let mut executed: Vec<&Candidate> = vec![&top1];
        for candidate in &queue {
            if machine.is_stopped() {
                break;
            }
            if Instant::now() >= deadline {
                machine.stop(StopReason::ProjectTimeout);
                break;
            }
            machine.begin();
            let trial = executor.execute(candidate, self.trial_timeout(deadline)).await?;
            record.trials.push(TrialRecord::new(
                trial.clone(),
                candidate,
                features.features(candidate),
                &top1.declaration_text,
                limit,
            ));
            executed.push(candidate);
            machine.score(trial);
        }
        machine.stop(StopReason::Exhausted);

        let outcome = machine.outcome();
        if config.output.write_patches {
            let chosen = outcome
                .chosen_candidate_id
                .as_deref()
                .and_then(|id| executed.iter().find(|c| c.candidate_id == id));
            if let Some(candidate) = chosen {
                match write_patch(&config.output.dir, &record.project, &candidate.declaration_text) {
                    Ok(path) => debug!(path = %path.display(), "Patch written"),
                    Err(e) => warn!(error = %e, "Cannot write patch"),
                }
            }
        }
        record.outcome = Some(outcome);
        Ok(())
    }

    /// Queue up to `repair_max` repair candidates from the top1 trial's own
    /// diagnostics.
    fn queue_repairs(&self, project: &Path, diagnostics: &[Diagnostic], pool: &mut CandidatePool) -> RepairSummary {
        let config = &self.config;
        let mut resolver = TreeSitterResolver::new(project, config.extraction.max_file_bytes);
        let report = plan_repairs(
            diagnostics,
            &self.taxonomy,
            pool.baseline(),
            &mut resolver,
            config.search.only_external,
        );
        let mut candidates = 0;
        for plan in report.plans {
            if candidates >= config.strategies.repair_max {
                break;
            }
            match pool.push(StrategyTag::Repair, plan.edit, Some(plan.symbol)) {
                PushOutcome::Added(_) => candidates += 1,
                PushOutcome::BudgetExhausted => break,
                PushOutcome::Duplicate | PushOutcome::Inapplicable => {}
            }
        }
        RepairSummary {
            attempted: report.attempted,
            resolved: report.resolved,
            candidates,
        }
    }

    /// Per-trial timeout, clipped to what is left of the project deadline.
    fn trial_timeout(&self, deadline: Instant) -> Duration {
        let per_trial = Duration::from_secs(self.config.oracle.trial_timeout_secs);
        per_trial.min(deadline.saturating_duration_since(Instant::now()))
    }
}

/// Skip reason recorded for a per-project failure.
fn skip_reason(err: &SearchError) -> &'static str {
    match err {
        SearchError::Oracle(OracleError::Tsconfig { .. }) => "invalid-tsconfig",
        SearchError::Oracle(OracleError::Process(_)) => "oracle-error",
        SearchError::Oracle(OracleError::Io(_)) | SearchError::Io(_) => "io-error",
        SearchError::Config(_) => "config-error",
        _ => "error",
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ── Worker pool ────────────────────────────────────────────────────

/// Result of one `SearchRunner::run`.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub log_path: PathBuf,
    /// One record per input project, in input order.
    pub records: Vec<ProjectRecord>,
}

impl RunSummary {
    pub fn searched(&self) -> usize {
        self.records.iter().filter(|r| r.skip_reason.is_none()).count()
    }

    /// Projects whose chosen candidate beat the un-injected core count.
    pub fn improved(&self) -> usize {
        self.records
            .iter()
            .filter(|r| {
                let (Some(trial), Some(base)) = (r.chosen_trial(), &r.baseline) else {
                    return false;
                };
                trial.trial.core_diagnostic_count < base.core_total
            })
            .count()
    }
}

/// Runs many projects through [`ProjectSearch`] on a bounded pool and
/// appends every record to the run's trial log.
pub struct SearchRunner {
    config: Arc<SearchConfig>,
    oracle: Arc<dyn Oracle>,
    model: Option<Arc<RerankerModel>>,
    reporter: Arc<dyn ProgressReporter>,
}

impl std::fmt::Debug for SearchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchRunner")
            .field("oracle", &self.oracle.name())
            .field("model", &self.model.is_some())
            .finish_non_exhaustive()
    }
}

impl SearchRunner {
    pub fn new(config: SearchConfig, oracle: Arc<dyn Oracle>) -> Self {
        Self {
            config: Arc::new(config),
            oracle,
            model: None,
            reporter: Arc::new(NoopReporter),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: RerankerModel) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search every project. Aborts outstanding work and returns the error
    /// if the oracle cannot be started.
    pub async fn run(&self, projects: &[PathBuf]) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let log = TrialLog::create(&self.config.output.dir, &run_id, Utc::now())?;
        info!(run_id = %run_id, log = %log.path().display(), projects = projects.len(), "Search run started");

        let search = ProjectSearch::new(Arc::clone(&self.config), Arc::clone(&self.oracle))
            .with_model(self.model.clone())
            .with_run_id(run_id.to_string());
        let semaphore = Arc::new(Semaphore::new(self.config.search.concurrency));
        self.reporter.start("Searching projects", Some(projects.len() as u64));

        let mut join_set = JoinSet::new();
        for (idx, project) in projects.iter().cloned().enumerate() {
            let search = search.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (idx, Err(SearchError::Io(std::io::Error::other("worker pool closed"))));
                };
                (idx, search.run(&project).await)
            });
        }

        let mut slots: Vec<Option<ProjectRecord>> = vec![None; projects.len()];
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined.map_err(|e| SearchError::Io(std::io::Error::other(format!("project task failed: {e}"))))?;
            match result {
                Ok(record) => {
                    log.append(&record)?;
                    self.reporter.advance(1);
                    slots[idx] = Some(record);
                }
                Err(e) if e.is_oracle_unavailable() => {
                    join_set.abort_all();
                    self.reporter.finish();
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }
        self.reporter.finish();

        Ok(RunSummary {
            run_id: run_id.to_string(),
            log_path: log.path().to_path_buf(),
            records: slots.into_iter().flatten().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::oracle::OracleRun;

    /// Answers every check with a fixed diagnostic listing, counting calls.
    struct Fixed {
        output: String,
        calls: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Oracle for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn check(&self, _project: &Path, _tsconfig: &Path, _timeout: Duration) -> std::result::Result<OracleRun, OracleError> {
            *self.calls.lock().unwrap() += 1;
            Ok(OracleRun {
                exit_code: Some(if self.output.is_empty() { 0 } else { 2 }),
                stdout: self.output.clone(),
                ..OracleRun::default()
            })
        }
    }

    struct Missing;

    #[async_trait::async_trait]
    impl Oracle for Missing {
        fn name(&self) -> &str {
            "missing"
        }

        async fn check(&self, _project: &Path, _tsconfig: &Path, _timeout: Duration) -> std::result::Result<OracleRun, OracleError> {
            Err(OracleError::Unavailable {
                command: "tsc".into(),
                reason: "not found".into(),
            })
        }
    }

    /// Answers the un-injected run at once; injected runs take `delay` or
    /// report a timeout.
    struct Slow {
        output: String,
        delay: Duration,
        baseline_timed_out: bool,
    }

    #[async_trait::async_trait]
    impl Oracle for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn check(&self, _project: &Path, tsconfig: &Path, _timeout: Duration) -> std::result::Result<OracleRun, OracleError> {
            let baseline = tsconfig.file_name().is_some_and(|n| n == crate::oracle::BASE_TSCONFIG);
            if baseline && self.baseline_timed_out {
                return Ok(OracleRun {
                    timed_out: true,
                    ..OracleRun::default()
                });
            }
            if !baseline {
                tokio::time::sleep(self.delay).await;
            }
            Ok(OracleRun {
                exit_code: Some(2),
                stdout: self.output.clone(),
                ..OracleRun::default()
            })
        }
    }

    fn config(out: &Path) -> SearchConfig {
        let mut config = SearchConfig::default();
        config.output.dir = out.to_path_buf();
        config
    }

    fn project(with_tsconfig: bool) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        if with_tsconfig {
            std::fs::write(dir.path().join("tsconfig.json"), "{ \"compilerOptions\": {} }\n").unwrap();
        }
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "import x from 'pkg';\nx.foo();\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn project_without_tsconfig_is_skipped() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Fixed {
            output: String::new(),
            calls: Mutex::new(0),
        });
        let search = ProjectSearch::new(Arc::new(config(out.path())), oracle.clone());
        let dir = project(false);
        let record = search.run(dir.path()).await.unwrap();
        assert_eq!(record.skip_reason.as_deref(), Some("no-tsconfig"));
        assert_eq!(*oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn clean_project_has_nothing_to_search() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Fixed {
            output: String::new(),
            calls: Mutex::new(0),
        });
        let search = ProjectSearch::new(Arc::new(config(out.path())), oracle);
        let dir = project(true);
        let record = search.run(dir.path()).await.unwrap();
        assert_eq!(record.skip_reason.as_deref(), Some("no-core-diagnostics"));
        assert_eq!(record.baseline.unwrap().total, 0);
    }

    #[tokio::test]
    async fn unchanged_diagnostics_exhaust_the_pool() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Fixed {
            output: "src/a.ts(1,15): error TS2307: Cannot find module 'pkg' or its corresponding type declarations.\n".into(),
            calls: Mutex::new(0),
        });
        let mut cfg = config(out.path());
        cfg.selection.tie_streak = None;
        let search = ProjectSearch::new(Arc::new(cfg), oracle.clone());
        let dir = project(true);
        let record = search.run(dir.path()).await.unwrap();

        assert_eq!(record.skip_reason, None);
        assert_eq!(record.stub_modules, vec!["pkg"]);
        let outcome = record.outcome.clone().unwrap();
        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.chosen_candidate_id.as_deref(), Some("c000_top1"));
        assert_eq!(outcome.trials_run, record.trials.len());
        assert_eq!(*oracle.calls.lock().unwrap(), record.trials.len() + 1);
        assert!(!dir.path().join(".stubsearch").exists());
        assert!(!dir.path().join("tsconfig.stubsearch.json").exists());
    }

    #[tokio::test]
    async fn unavailable_oracle_aborts_the_run() {
        let out = tempfile::tempdir().unwrap();
        let runner = SearchRunner::new(config(out.path()), Arc::new(Missing));
        let dir = project(true);
        let err = runner.run(&[dir.path().to_path_buf()]).await.unwrap_err();
        assert!(err.is_oracle_unavailable());
    }

    #[tokio::test]
    async fn runner_logs_one_record_per_project_in_order() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Fixed {
            output: String::new(),
            calls: Mutex::new(0),
        });
        let runner = SearchRunner::new(config(out.path()), oracle);
        let a = project(false);
        let b = project(true);
        let summary = runner
            .run(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .await
            .unwrap();
        let reasons: Vec<_> = summary.records.iter().map(|r| r.skip_reason.as_deref()).collect();
        assert_eq!(reasons, vec![Some("no-tsconfig"), Some("no-core-diagnostics")]);
        assert_eq!(crate::store::read_records(&summary.log_path).unwrap().len(), 2);
        assert_eq!(summary.searched(), 0);
    }

    const UNRESOLVED_PKG: &str =
        "src/a.ts(1,15): error TS2307: Cannot find module 'pkg' or its corresponding type declarations.\n";

    #[tokio::test]
    async fn baseline_timeout_skips_the_project() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Slow {
            output: UNRESOLVED_PKG.into(),
            delay: Duration::ZERO,
            baseline_timed_out: true,
        });
        let search = ProjectSearch::new(Arc::new(config(out.path())), oracle);
        let dir = project(true);
        let record = search.run(dir.path()).await.unwrap();

        assert_eq!(record.skip_reason.as_deref(), Some("baseline-timeout"));
        assert!(record.baseline.unwrap().timed_out);
        assert!(record.trials.is_empty());
        assert!(record.outcome.is_none());
    }

    #[tokio::test]
    async fn project_deadline_stops_after_the_running_trial() {
        let out = tempfile::tempdir().unwrap();
        let oracle = Arc::new(Slow {
            output: UNRESOLVED_PKG.into(),
            delay: Duration::from_millis(1100),
            baseline_timed_out: false,
        });
        let mut cfg = config(out.path());
        cfg.search.project_timeout_secs = 1;
        cfg.selection.tie_streak = None;
        let search = ProjectSearch::new(Arc::new(cfg), oracle);
        let dir = project(true);
        let record = search.run(dir.path()).await.unwrap();

        assert_eq!(record.skip_reason, None);
        let outcome = record.outcome.clone().unwrap();
        assert_eq!(outcome.stop_reason, StopReason::ProjectTimeout);
        let ids: Vec<_> = record.trials.iter().map(|t| t.trial.candidate_id.as_str()).collect();
        assert_eq!(ids, vec!["c000_top1"]);
        assert_eq!(outcome.trials_run, 1);
        assert_eq!(outcome.chosen_candidate_id.as_deref(), Some("c000_top1"));
        assert!(!dir.path().join("tsconfig.stubsearch.json").exists());
    }
}
