//! Trial execution: inject one candidate, run the oracle, score the output.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::diagnostics::{Taxonomy, code_counts, parse_output};
use crate::error::OracleError;
use crate::oracle::{InjectionLayout, Oracle, OracleRun};
use crate::types::{Candidate, InvalidReason, Trial};

/// Runs candidates one at a time against one project. Trials within a
/// project are strictly sequential: they share the single injected file.
pub struct TrialExecutor {
    oracle: Arc<dyn Oracle>,
    layout: InjectionLayout,
    taxonomy: Taxonomy,
    baseline_core: usize,
    next_id: usize,
}

impl std::fmt::Debug for TrialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialExecutor")
            .field("oracle", &self.oracle.name())
            .field("layout", &self.layout)
            .field("baseline_core", &self.baseline_core)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl TrialExecutor {
    /// `baseline_core` is the core count of the un-injected run that every
    /// trial's delta is measured against.
    pub fn new(
        oracle: Arc<dyn Oracle>,
        layout: InjectionLayout,
        taxonomy: Taxonomy,
        baseline_core: usize,
    ) -> Self {
        Self {
            oracle,
            layout,
            taxonomy,
            baseline_core,
            next_id: 1,
        }
    }

    pub fn trials_started(&self) -> usize {
        self.next_id - 1
    }

    /// Write the candidate's text and run the oracle once. Timeouts and
    /// broken runs come back as invalid trials, never as errors; only a
    /// failure to run the oracle at all is an error.
    pub async fn execute(&mut self, candidate: &Candidate, timeout: Duration) -> Result<Trial, OracleError> {
        self.layout.write_declaration(&candidate.declaration_text)?;
        let run = self
            .oracle
            .check(self.layout.project(), &self.layout.overlay_tsconfig(), timeout)
            .await?;

        let trial_id = self.next_id;
        self.next_id += 1;
        let trial = score_run(trial_id, candidate, &run, &self.taxonomy, self.baseline_core);
        if trial.valid_injection {
            info!(
                candidate = %trial.candidate_id,
                core = trial.core_diagnostic_count,
                total = trial.total_diagnostic_count,
                delta = trial.delta_from_baseline,
                "Trial scored"
            );
        } else {
            info!(candidate = %trial.candidate_id, reason = ?trial.invalid_reason, "Trial invalid");
        }
        Ok(trial)
    }
}

/// Score one oracle run. Pure; no I/O.
pub fn score_run(
    trial_id: usize,
    candidate: &Candidate,
    run: &OracleRun,
    taxonomy: &Taxonomy,
    baseline_core: usize,
) -> Trial {
    let diagnostics = if run.timed_out {
        Vec::new()
    } else {
        parse_output(&run.stdout, &run.stderr)
    };
    let core = taxonomy.core_count(&diagnostics);

    let invalid_reason = if run.timed_out {
        Some(InvalidReason::Timeout)
    } else if taxonomy.has_parser_codes(&diagnostics) {
        Some(InvalidReason::ParserDiagnostics)
    } else if run.exit_code != Some(0) && diagnostics.is_empty() {
        Some(InvalidReason::OracleCrash)
    } else {
        None
    };
    if let Some(reason) = invalid_reason {
        debug!(candidate = %candidate.candidate_id, ?reason, exit_code = ?run.exit_code, "Marking trial invalid");
    }

    Trial {
        trial_id,
        candidate_id: candidate.candidate_id.clone(),
        injected_declaration_hash: candidate.declaration_hash.clone(),
        declaration_count: candidate.declaration_count,
        oracle_exit_code: run.exit_code,
        timed_out: run.timed_out,
        counts: code_counts(&diagnostics),
        core_diagnostic_count: core,
        total_diagnostic_count: diagnostics.len(),
        delta_from_baseline: signed(core) - signed(baseline_core),
        valid_injection: invalid_reason.is_none(),
        invalid_reason,
        duration_ms: run.duration_ms(),
        diagnostics,
    }
}

fn signed(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
