use crate::core::io::diagnostics::{AtomDiagnostic, ChargeStatus, FragmentDiagnostic};
use crate::core::io::pdb::write_fragment;
use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::spatial::{SpatialError, SpatialIndex};
use crate::engine::cancel::CancellationToken;
use crate::engine::capping::Capper;
use crate::engine::comparator::BondTopologyComparator;
use crate::engine::config::{ChargeConfig, FailurePolicy, NetChargeBasis};
use crate::engine::error::{EngineError, FragmentError};
use crate::engine::fragment::{CenterDecision, FragmentExtractor, net_charge};
use crate::engine::merge::{ChargeLedger, ChargeWrite};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::repair::BoundaryRepairer;
use crate::engine::solver::ChargeEngine;
use crate::engine::workspace::{FragmentWorkspace, WorkspaceRoot};
use crate::tools::Toolchain;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub centers: usize,
    pub skipped_hydrogens: usize,
    pub skipped_oxygens: usize,
    pub completed: usize,
    pub failed: usize,
    pub refined_atoms: usize,
    pub empirical_atoms: usize,
    pub unresolved_atoms: usize,
    pub nan_zeroed_atoms: usize,
}

#[derive(Debug, Clone)]
pub struct ChargeResult {
    /// Final charge per atom, in atom order.
    pub charges: Vec<f64>,
    pub statuses: Vec<ChargeStatus>,
    pub atom_diagnostics: Vec<AtomDiagnostic>,
    pub fragment_diagnostics: Vec<FragmentDiagnostic>,
    pub summary: RunSummary,
}

/// What a center's pipeline learned before it finished or failed.
#[derive(Debug, Default)]
struct FragmentTrace {
    inner: usize,
    outer: usize,
    core: Vec<AtomId>,
    broken: usize,
    repaired: usize,
    cut_carbons: usize,
    caps: usize,
    net_charge: Option<i64>,
}

struct CenterOutcome {
    center: AtomId,
    trace: FragmentTrace,
    result: Result<Vec<ChargeWrite>, FragmentError>,
    elapsed: Duration,
}

struct FragmentContext<'a> {
    structure: &'a Structure,
    index: &'a SpatialIndex,
    empirical: &'a [f64],
    config: &'a ChargeConfig,
    toolchain: &'a Toolchain,
    workspace: &'a WorkspaceRoot,
    cancel: &'a CancellationToken,
    halted: &'a AtomicBool,
}

impl FragmentContext<'_> {
    fn checkpoint(&self) -> Result<(), FragmentError> {
        if self.cancel.is_cancelled() || self.halted.load(Ordering::Relaxed) {
            Err(FragmentError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Replaces the empirical charges of `structure` with fragment QM charges.
///
/// Every heavy atom that is not a saturated oxygen becomes the center of one
/// fragment. Fragments run in parallel; their core charges are merged into
/// the ledger afterwards in center order.
#[instrument(skip_all, name = "charge_workflow")]
pub fn run(
    structure: &Structure,
    empirical: &[f64],
    config: &ChargeConfig,
    toolchain: &Toolchain,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<ChargeResult, EngineError> {
    // === Phase 0: Preparation ===
    reporter.phase("Preparation");
    config.validate()?;

    if empirical.len() != structure.len() {
        return Err(EngineError::ChargeCountMismatch {
            expected: structure.len(),
            found: empirical.len(),
        });
    }
    if empirical.iter().all(|&c| c == 0.0 || c.is_nan()) {
        return Err(EngineError::EmpiricalChargesAllZero);
    }

    let mut ledger = ChargeLedger::new(empirical, config.merge_policy);
    let index = SpatialIndex::build(structure)?;
    let workspace = WorkspaceRoot::new(&config.execution)?;

    let extractor = FragmentExtractor::new(structure, &index, &config.fragmentation);
    let mut summary = RunSummary::default();
    let mut centers = Vec::new();
    let mut skipped_oxygens = Vec::new();
    for id in structure.ids() {
        match extractor.classify(id).map_err(|source| EngineError::Fragment {
            center: id,
            source,
        })? {
            CenterDecision::Process => centers.push(id),
            CenterDecision::SkipHydrogen => summary.skipped_hydrogens += 1,
            CenterDecision::SkipSaturatedOxygen { neighbors } => {
                debug!(center = %id, neighbors, "Skipping saturated oxygen center.");
                skipped_oxygens.push(id);
            }
        }
    }
    summary.centers = centers.len();
    summary.skipped_oxygens = skipped_oxygens.len();
    info!(
        atoms = structure.len(),
        centers = centers.len(),
        skipped_hydrogens = summary.skipped_hydrogens,
        skipped_oxygens = summary.skipped_oxygens,
        "Fragment centers selected."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Fragment calculations ===
    reporter.phase("Fragment Calculations");
    reporter.report(Progress::TaskStart {
        total: centers.len() as u64,
    });

    let halted = AtomicBool::new(false);
    let context = FragmentContext {
        structure,
        index: &index,
        empirical: ledger.initial(),
        config,
        toolchain,
        workspace: &workspace,
        cancel,
        halted: &halted,
    };
    let outcomes = run_centers(&context, &centers, reporter)?;

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    if cancel.is_cancelled() {
        warn!("Run cancelled; no charges were merged.");
        return Err(EngineError::Cancelled);
    }

    // === Phase 2: Merge in center order ===
    reporter.phase("Merging Charges");
    let mut fragment_diagnostics = Vec::with_capacity(outcomes.len() + skipped_oxygens.len());
    for &id in &skipped_oxygens {
        fragment_diagnostics.push(fragment_row(structure, id, &FragmentTrace::default(), "skipped-oxygen", String::new()));
    }

    for outcome in outcomes {
        let CenterOutcome {
            center,
            trace,
            result,
            elapsed,
        } = outcome;
        match result {
            Ok(writes) => {
                let accepted = ledger.merge_fragment(center, &writes);
                debug!(
                    center = %center,
                    core = writes.len(),
                    accepted,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Fragment merged."
                );
                summary.completed += 1;
                fragment_diagnostics.push(fragment_row(structure, center, &trace, "refined", String::new()));
            }
            Err(FragmentError::Cancelled) => {}
            Err(source) => {
                if config.execution.failure_policy == FailurePolicy::Abort {
                    return Err(EngineError::Fragment { center, source });
                }
                warn!(center = %center, error = %source, "Fragment failed; keeping empirical charges for its core.");
                ledger.mark_unresolved(&trace.core);
                summary.failed += 1;
                fragment_diagnostics.push(fragment_row(structure, center, &trace, "failed", source.to_string()));
            }
        }
    }
    fragment_diagnostics.sort_by_key(|row| row.center_index);

    let merged = ledger.finalize();
    summary.refined_atoms = merged.count(ChargeStatus::Refined);
    summary.empirical_atoms = merged.count(ChargeStatus::Empirical);
    summary.unresolved_atoms = merged.count(ChargeStatus::Unresolved);
    summary.nan_zeroed_atoms = merged.count(ChargeStatus::NanZeroed);

    let atom_diagnostics = structure
        .atoms()
        .iter()
        .map(|atom| {
            let i = atom.id.index();
            let refined = ledger.refined(atom.id);
            AtomDiagnostic {
                atom_index: i + 1,
                chain: atom.residue.chain_id.clone(),
                residue: atom.residue.name.clone(),
                residue_seq: atom.residue.seq,
                atom_name: atom.name.clone(),
                element: atom.element.symbol().to_string(),
                empirical_charge: empirical[i],
                final_charge: merged.charges[i],
                status: merged.statuses[i],
                source_center: refined.map(|r| r.center.index() + 1),
                center_distance: refined.map(|r| r.distance),
            }
        })
        .collect();
    reporter.report(Progress::PhaseFinish);

    info!(
        completed = summary.completed,
        failed = summary.failed,
        refined = summary.refined_atoms,
        unresolved = summary.unresolved_atoms,
        nan_zeroed = summary.nan_zeroed_atoms,
        "Charge workflow complete."
    );

    Ok(ChargeResult {
        charges: merged.charges,
        statuses: merged.statuses,
        atom_diagnostics,
        fragment_diagnostics,
        summary,
    })
}

fn run_centers(
    context: &FragmentContext,
    centers: &[AtomId],
    reporter: &ProgressReporter,
) -> Result<Vec<CenterOutcome>, EngineError> {
    let failures = AtomicUsize::new(0);
    let run_all = || -> Vec<CenterOutcome> {
        #[cfg(not(feature = "parallel"))]
        let iterator = centers.iter();

        #[cfg(feature = "parallel")]
        let iterator = centers.par_iter();

        iterator
            .map(|&center| {
                let outcome = process_center(context, center);
                if matches!(&outcome.result, Err(e) if !matches!(e, FragmentError::Cancelled)) {
                    let failed = failures.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.report(Progress::StatusUpdate {
                        text: format!("{} failed", failed),
                    });
                }
                reporter.report(Progress::TaskIncrement { amount: 1 });
                outcome
            })
            .collect()
    };

    execute(context.config.execution.max_workers, run_all)
}

#[cfg(feature = "parallel")]
fn execute<T: Send>(
    workers: Option<usize>,
    job: impl FnOnce() -> T + Send,
) -> Result<T, EngineError> {
    match workers {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
            Ok(pool.install(job))
        }
        None => Ok(job()),
    }
}

#[cfg(not(feature = "parallel"))]
fn execute<T>(_workers: Option<usize>, job: impl FnOnce() -> T) -> Result<T, EngineError> {
    Ok(job())
}

fn process_center(context: &FragmentContext, center: AtomId) -> CenterOutcome {
    let started = Instant::now();
    let mut trace = FragmentTrace::default();
    let result = run_stages(context, center, &mut trace);

    if result.is_err() && context.config.execution.failure_policy == FailurePolicy::Abort {
        context.halted.store(true, Ordering::Relaxed);
    }
    CenterOutcome {
        center,
        trace,
        result,
        elapsed: started.elapsed(),
    }
}

fn run_stages(
    context: &FragmentContext,
    center: AtomId,
    trace: &mut FragmentTrace,
) -> Result<Vec<ChargeWrite>, FragmentError> {
    let structure = context.structure;
    let settings = &context.config.fragmentation;

    context.checkpoint()?;
    let plan = FragmentExtractor::new(structure, context.index, settings)
        .plan(center, context.empirical)?;
    trace.inner = plan.inner.len();
    trace.outer = plan.outer.len();
    trace.core = plan.core.clone();

    let workspace = context.workspace.fragment(center)?;
    if workspace.is_kept() {
        write_shell(structure, &plan.inner, &workspace, "inner.pdb")?;
        write_shell(structure, &plan.outer, &workspace, "outer.pdb")?;
    }

    context.checkpoint()?;
    let comparison = BondTopologyComparator::compare(structure, &plan)?;
    trace.broken = comparison.broken.len();

    context.checkpoint()?;
    let repair = BoundaryRepairer::new(structure, &comparison.outer_graph)
        .repair(&plan.inner, &comparison.broken)?;
    trace.repaired = repair.added.len();
    trace.cut_carbons = repair.markers.len();

    let total_charge = match settings.net_charge_basis {
        NetChargeBasis::InnerShell => plan.net_charge,
        NetChargeBasis::RepairedFragment => net_charge(&repair.members, context.empirical),
    };
    trace.net_charge = Some(total_charge);

    context.checkpoint()?;
    let capped = Capper::new(
        structure,
        context.toolchain.saturator.as_ref(),
        settings.cap_distance,
    )
    .cap(&repair, workspace.path(), context.cancel)?;
    trace.caps = capped.caps_retained;

    context.checkpoint()?;
    let charges = ChargeEngine::new(context.toolchain.solver.as_ref(), &context.config.solver)
        .compute(&capped, total_charge, workspace.path(), context.cancel)?;

    let center_position = structure
        .position(center)
        .ok_or(SpatialError::UnknownAtom(center))?;
    let writes = capped
        .members
        .iter()
        .zip(&charges)
        .filter(|(id, _)| plan.core.binary_search(id).is_ok())
        .map(|(&atom, &value)| ChargeWrite {
            atom,
            value,
            distance: structure
                .position(atom)
                .map_or(f64::INFINITY, |p| (p - center_position).norm()),
        })
        .collect();
    Ok(writes)
}

fn write_shell(
    structure: &Structure,
    members: &[AtomId],
    workspace: &FragmentWorkspace,
    file_name: &str,
) -> Result<(), FragmentError> {
    let path: &Path = workspace.path();
    let mut writer = BufWriter::new(File::create(path.join(file_name))?);
    write_fragment(structure, members, &mut writer)?;
    writer.flush()?;
    Ok(())
}

fn fragment_row(
    structure: &Structure,
    center: AtomId,
    trace: &FragmentTrace,
    outcome: &str,
    message: String,
) -> FragmentDiagnostic {
    let (center_name, residue) = structure
        .atom(center)
        .map(|a| (a.name.clone(), a.residue.to_string()))
        .unwrap_or_default();
    FragmentDiagnostic {
        center_index: center.index() + 1,
        center_name,
        residue,
        outcome: outcome.to_string(),
        inner_atoms: trace.inner,
        outer_atoms: trace.outer,
        core_atoms: trace.core.len(),
        broken_bonds: trace.broken,
        repaired_atoms: trace.repaired,
        cut_carbons: trace.cut_carbons,
        capping_atoms: trace.caps,
        net_charge: trace.net_charge,
        message,
    }
}
