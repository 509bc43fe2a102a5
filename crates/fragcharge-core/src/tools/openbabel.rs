use super::process::{ToolInvocation, local_path, probe_version};
use crate::engine::capping::{SaturationJob, ValenceSaturator};
use crate::engine::error::ToolError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SATURATED_FILE: &str = "saturated.pdb";
pub const SATURATOR_ERROR_FILE: &str = "saturator_error.txt";

/// Adds hydrogens with `obabel -iPDB -oPDB <input> -h`.
///
/// Open Babel echoes the input atoms first and appends the hydrogens it
/// adds, which is exactly the [`ValenceSaturator`] contract.
#[derive(Debug, Clone)]
pub struct OpenBabelSaturator {
    executable: PathBuf,
    timeout: Duration,
}

impl OpenBabelSaturator {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn arguments(input: &Path) -> Vec<OsString> {
        vec![
            "-iPDB".into(),
            "-oPDB".into(),
            input.as_os_str().to_os_string(),
            "-h".into(),
        ]
    }

    pub fn version(&self) -> Result<String, ToolError> {
        probe_version(&self.executable, &["-V"], Duration::from_secs(30))
    }
}

impl ValenceSaturator for OpenBabelSaturator {
    fn name(&self) -> &str {
        "obabel"
    }

    fn saturate(&self, job: &SaturationJob) -> Result<String, ToolError> {
        let output = ToolInvocation::new(&self.executable, job.work_dir)
            .args(Self::arguments(local_path(job.input, job.work_dir)))
            .stdout_to(job.work_dir.join(SATURATED_FILE))
            .stderr_to(job.work_dir.join(SATURATOR_ERROR_FILE))
            .timeout(self.timeout)
            .run(job.cancel)?;

        let has_atoms = output
            .stdout
            .lines()
            .any(|l| l.starts_with("ATOM") || l.starts_with("HETATM"));
        if !has_atoms {
            return Err(ToolError::MissingOutput {
                program: self.executable.display().to_string(),
                reason: "no ATOM/HETATM records on stdout".to_string(),
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cancel::CancellationToken;

    #[test]
    fn builds_the_hydrogen_addition_command() {
        let args = OpenBabelSaturator::arguments(Path::new("substructure.pdb"));
        assert_eq!(args, vec!["-iPDB", "-oPDB", "substructure.pdb", "-h"]);
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("substructure.pdb");
        std::fs::write(&input, "END\n").unwrap();
        let saturator = OpenBabelSaturator::new("true", Duration::from_secs(10));

        let err = saturator
            .saturate(&SaturationJob {
                input: &input,
                work_dir: dir.path(),
                cancel: &CancellationToken::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingOutput { .. }));
        assert!(dir.path().join(SATURATED_FILE).exists());
    }

    #[cfg(unix)]
    #[test]
    fn missing_executable_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("substructure.pdb");
        let saturator =
            OpenBabelSaturator::new("fragcharge-missing-obabel", Duration::from_secs(10));
        let err = saturator
            .saturate(&SaturationJob {
                input: &input,
                work_dir: dir.path(),
                cancel: &CancellationToken::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
