use super::process::{ToolInvocation, local_path, probe_version};
use crate::engine::config::SolverConfig;
use crate::engine::error::ToolError;
use crate::engine::solver::{ChargeSolver, SolverJob};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

pub const SOLVER_OUTPUT_FILE: &str = "solver_output.txt";
pub const SOLVER_ERROR_FILE: &str = "solver_error.txt";

/// Runs GFN-xTB on a capped fragment.
///
/// The report is read from stdout, which is also kept in the fragment
/// directory together with stderr.
#[derive(Debug, Clone)]
pub struct XtbSolver {
    config: SolverConfig,
}

impl XtbSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn executable(&self) -> &Path {
        &self.config.executable
    }

    fn arguments(&self, input: &Path, total_charge: i64) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.as_os_str().to_os_string(),
            "--gfn".into(),
            self.config.gfn.to_string().into(),
        ];
        if let Some(solvent) = &self.config.solvent {
            args.push("--gbsa".into());
            args.push(solvent.into());
        }
        args.push("--acc".into());
        args.push(self.config.accuracy.to_string().into());
        args.push("--chrg".into());
        args.push(total_charge.to_string().into());
        args.extend(self.config.extra_args.iter().map(OsString::from));
        args
    }

    pub fn version(&self) -> Result<String, ToolError> {
        probe_version(&self.config.executable, &["--version"], Duration::from_secs(30))
    }
}

impl ChargeSolver for XtbSolver {
    fn name(&self) -> &str {
        "xtb"
    }

    fn solve(&self, job: &SolverJob) -> Result<String, ToolError> {
        let output = ToolInvocation::new(&self.config.executable, job.work_dir)
            .args(self.arguments(local_path(job.input, job.work_dir), job.total_charge))
            .stdout_to(job.work_dir.join(SOLVER_OUTPUT_FILE))
            .stderr_to(job.work_dir.join(SOLVER_ERROR_FILE))
            .timeout(self.config.timeout)
            .run(job.cancel)?;
        Ok(output.stdout)
    }
}
