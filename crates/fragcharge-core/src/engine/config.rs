use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

/// Which membership the fragment's net integer charge is summed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetChargeBasis {
    /// Empirical charges of the inner shell, before boundary repair.
    #[default]
    InnerShell,
    /// Empirical charges of the repaired membership.
    RepairedFragment,
}

/// How a refined charge is resolved when several fragments cover one atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep the value from the fragment whose center is closest to the atom.
    #[default]
    NearestCenter,
    /// Every write overwrites; the last center in iteration order wins.
    LastWriteWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure and keep going with the next center.
    #[default]
    Skip,
    /// Stop the whole run at the first failed fragment.
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentationConfig {
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub core_radius: f64,
    /// Oxygen centers with more than this many other atoms inside the core
    /// radius are skipped.
    pub oxygen_neighbor_limit: usize,
    pub cap_distance: f64,
    pub net_charge_basis: NetChargeBasis,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        Self {
            inner_radius: 6.0,
            outer_radius: 12.0,
            core_radius: 1.5,
            oxygen_neighbor_limit: 2,
            cap_distance: 1.3,
            net_charge_basis: NetChargeBasis::InnerShell,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub executable: PathBuf,
    pub gfn: u8,
    pub solvent: Option<String>,
    pub accuracy: f64,
    pub timeout: Duration,
    /// Whitespace token index of the charge inside each report row.
    pub charge_column: usize,
    /// Leading text of the line that opens the charge table.
    pub header: String,
    pub extra_args: Vec<String>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("xtb"),
            gfn: 1,
            solvent: Some("water".to_string()),
            accuracy: 1000.0,
            timeout: Duration::from_secs(3600),
            charge_column: 3,
            header: "Mulliken/CM5 charges".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaturatorConfig {
    OpenBabel {
        executable: PathBuf,
        timeout: Duration,
    },
    Geometric,
}

impl SaturatorConfig {
    pub const DEFAULT_OBABEL: &'static str = "obabel";
    pub const DEFAULT_OBABEL_TIMEOUT: Duration = Duration::from_secs(120);
}

impl Default for SaturatorConfig {
    fn default() -> Self {
        Self::OpenBabel {
            executable: PathBuf::from(Self::DEFAULT_OBABEL),
            timeout: Self::DEFAULT_OBABEL_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionConfig {
    /// Worker threads for fragment processing; `None` uses every logical core.
    pub max_workers: Option<usize>,
    pub failure_policy: FailurePolicy,
    /// Root for per-fragment directories. Temporary directories are used when unset.
    pub work_dir: Option<PathBuf>,
    pub keep_fragment_files: bool,
}

/// Labels written into the charge metadata block of the annotated structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeMetadata {
    pub type_label: String,
    pub method: String,
}

impl Default for ChargeMetadata {
    fn default() -> Self {
        Self {
            type_label: "QM".to_string(),
            method: "GFN1-xTB/CM5 fragment".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeConfig {
    pub fragmentation: FragmentationConfig,
    pub solver: SolverConfig,
    pub saturator: SaturatorConfig,
    pub merge_policy: MergePolicy,
    pub execution: ExecutionConfig,
    pub metadata: ChargeMetadata,
}

#[derive(Default)]
pub struct ChargeConfigBuilder {
    fragmentation: Option<FragmentationConfig>,
    solver: Option<SolverConfig>,
    saturator: Option<SaturatorConfig>,
    merge_policy: Option<MergePolicy>,
    execution: Option<ExecutionConfig>,
    metadata: Option<ChargeMetadata>,
}

impl ChargeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fragmentation(mut self, fragmentation: FragmentationConfig) -> Self {
        self.fragmentation = Some(fragmentation);
        self
    }
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = Some(solver);
        self
    }
    pub fn saturator(mut self, saturator: SaturatorConfig) -> Self {
        self.saturator = Some(saturator);
        self
    }
    pub fn merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = Some(policy);
        self
    }
    pub fn execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = Some(execution);
        self
    }
    pub fn metadata(mut self, metadata: ChargeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Assembles and validates the configuration.
    ///
    /// The solver and saturator must be chosen explicitly; the remaining
    /// sections fall back to their defaults.
    pub fn build(self) -> Result<ChargeConfig, ConfigError> {
        let config = ChargeConfig {
            fragmentation: self.fragmentation.unwrap_or_default(),
            solver: self.solver.ok_or(ConfigError::MissingParameter("solver"))?,
            saturator: self
                .saturator
                .ok_or(ConfigError::MissingParameter("saturator"))?,
            merge_policy: self.merge_policy.unwrap_or_default(),
            execution: self.execution.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn require_positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue {
            parameter,
            reason: format!("must be a positive finite number, got {}", value),
        })
    }
}

impl ChargeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.fragmentation;
        require_positive("inner_radius", f.inner_radius)?;
        require_positive("outer_radius", f.outer_radius)?;
        require_positive("core_radius", f.core_radius)?;
        require_positive("cap_distance", f.cap_distance)?;
        if f.core_radius > f.inner_radius {
            return Err(ConfigError::InvalidValue {
                parameter: "core_radius",
                reason: format!(
                    "core radius {} exceeds inner radius {}",
                    f.core_radius, f.inner_radius
                ),
            });
        }
        if f.inner_radius > f.outer_radius {
            return Err(ConfigError::InvalidValue {
                parameter: "inner_radius",
                reason: format!(
                    "inner radius {} exceeds outer radius {}",
                    f.inner_radius, f.outer_radius
                ),
            });
        }

        require_positive("solver.accuracy", self.solver.accuracy)?;
        if self.solver.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                parameter: "solver.timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.solver.header.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "solver.header",
                reason: "must not be empty".to_string(),
            });
        }
        if let SaturatorConfig::OpenBabel { timeout, .. } = &self.saturator {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidValue {
                    parameter: "saturator.timeout",
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.execution.max_workers == Some(0) {
            return Err(ConfigError::InvalidValue {
                parameter: "max_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
