use crate::cli::{MergePolicyArg, RunArgs, SaturatorKind};
use crate::error::{CliError, Result};
use fragcharge::engine::config as core_config;
use serde::Deserialize;
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialNetChargeBasis {
    InnerShell,
    RepairedFragment,
}

impl From<PartialNetChargeBasis> for core_config::NetChargeBasis {
    fn from(p: PartialNetChargeBasis) -> Self {
        match p {
            PartialNetChargeBasis::InnerShell => Self::InnerShell,
            PartialNetChargeBasis::RepairedFragment => Self::RepairedFragment,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialSaturatorKind {
    OpenBabel,
    Geometric,
}

impl From<SaturatorKind> for PartialSaturatorKind {
    fn from(kind: SaturatorKind) -> Self {
        match kind {
            SaturatorKind::OpenBabel => Self::OpenBabel,
            SaturatorKind::Geometric => Self::Geometric,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialMergePolicy {
    NearestCenter,
    LastWriteWins,
}

impl From<PartialMergePolicy> for core_config::MergePolicy {
    fn from(p: PartialMergePolicy) -> Self {
        match p {
            PartialMergePolicy::NearestCenter => Self::NearestCenter,
            PartialMergePolicy::LastWriteWins => Self::LastWriteWins,
        }
    }
}

impl From<MergePolicyArg> for PartialMergePolicy {
    fn from(arg: MergePolicyArg) -> Self {
        match arg {
            MergePolicyArg::NearestCenter => Self::NearestCenter,
            MergePolicyArg::LastWriteWins => Self::LastWriteWins,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum PartialFailurePolicy {
    Skip,
    Abort,
}

impl From<PartialFailurePolicy> for core_config::FailurePolicy {
    fn from(p: PartialFailurePolicy) -> Self {
        match p {
            PartialFailurePolicy::Skip => Self::Skip,
            PartialFailurePolicy::Abort => Self::Abort,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialFragmentationConfig {
    inner_radius: Option<f64>,
    outer_radius: Option<f64>,
    core_radius: Option<f64>,
    oxygen_neighbor_limit: Option<usize>,
    cap_distance: Option<f64>,
    net_charge_basis: Option<PartialNetChargeBasis>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSaturatorConfig {
    kind: Option<PartialSaturatorKind>,
    executable: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialSolverConfig {
    executable: Option<PathBuf>,
    gfn: Option<u8>,
    /// An empty string disables implicit solvation.
    solvent: Option<String>,
    accuracy: Option<f64>,
    timeout_secs: Option<u64>,
    charge_column: Option<usize>,
    header: Option<String>,
    extra_args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialMergeConfig {
    policy: Option<PartialMergePolicy>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialExecutionConfig {
    max_workers: Option<usize>,
    failure_policy: Option<PartialFailurePolicy>,
    work_dir: Option<PathBuf>,
    keep_fragment_files: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialMetadataConfig {
    #[serde(rename = "type")]
    type_label: Option<String>,
    method: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialChargeConfig {
    fragmentation: Option<PartialFragmentationConfig>,
    saturator: Option<PartialSaturatorConfig>,
    solver: Option<PartialSolverConfig>,
    merge: Option<PartialMergeConfig>,
    execution: Option<PartialExecutionConfig>,
    metadata: Option<PartialMetadataConfig>,
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn parse_keyword<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    let deserializer: StrDeserializer<'_, serde::de::value::Error> = value.into_deserializer();
    T::deserialize(deserializer)
        .map_err(|e| CliError::Config(format!("Invalid value for {}: {}", key, e)))
}

/// Relative executable paths like `bin/xtb` are fixed against the current
/// directory; bare program names stay as `PATH` lookups.
fn anchor_executable(path: PathBuf) -> Result<PathBuf> {
    if path.is_relative() && path.components().count() > 1 {
        std::path::absolute(&path).map_err(|e| {
            CliError::Config(format!("Cannot resolve executable {:?}: {}", path, e))
        })
    } else {
        Ok(path)
    }
}

impl PartialChargeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| match e {
            CliError::Config(message) => CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!(message),
            },
            other => other,
        })
    }

    fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CliError::Config(e.to_string()))
    }

    /// Reads `path` when given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies `-S` overrides and dedicated flags, in that order of increasing
    /// precedence, and builds the core configuration.
    pub fn merge_with_cli(
        mut self,
        args: &RunArgs,
        threads: Option<usize>,
    ) -> Result<core_config::ChargeConfig> {
        self.apply_set_values(&args.set_values)?;

        let fragmentation = self.fragmentation.get_or_insert_with(Default::default);
        if args.inner_radius.is_some() {
            fragmentation.inner_radius = args.inner_radius;
        }
        if args.outer_radius.is_some() {
            fragmentation.outer_radius = args.outer_radius;
        }

        let saturator = self.saturator.get_or_insert_with(Default::default);
        if let Some(kind) = args.saturator {
            saturator.kind = Some(kind.into());
        }
        if let Some(path) = &args.obabel {
            saturator.executable = Some(path.clone());
        }
        if let Some(path) = &args.xtb {
            self.solver.get_or_insert_with(Default::default).executable = Some(path.clone());
        }
        if let Some(policy) = args.merge_policy {
            self.merge.get_or_insert_with(Default::default).policy = Some(policy.into());
        }

        let execution = self.execution.get_or_insert_with(Default::default);
        if threads.is_some() {
            execution.max_workers = threads;
        }
        if args.abort_on_failure {
            execution.failure_policy = Some(PartialFailurePolicy::Abort);
        }
        if args.keep_fragments {
            execution.keep_fragment_files = Some(true);
        }
        if execution.keep_fragment_files == Some(true) && execution.work_dir.is_none() {
            execution.work_dir = Some(args.output.join("fragments"));
        }

        self.build()
    }

    /// Fills every unset key with its default and validates the result.
    pub fn build(self) -> Result<core_config::ChargeConfig> {
        let fragmentation = {
            let p = self.fragmentation.unwrap_or_default();
            let d = core_config::FragmentationConfig::default();
            core_config::FragmentationConfig {
                inner_radius: p.inner_radius.unwrap_or(d.inner_radius),
                outer_radius: p.outer_radius.unwrap_or(d.outer_radius),
                core_radius: p.core_radius.unwrap_or(d.core_radius),
                oxygen_neighbor_limit: p.oxygen_neighbor_limit.unwrap_or(d.oxygen_neighbor_limit),
                cap_distance: p.cap_distance.unwrap_or(d.cap_distance),
                net_charge_basis: p.net_charge_basis.map(Into::into).unwrap_or(d.net_charge_basis),
            }
        };

        let saturator = {
            let p = self.saturator.unwrap_or_default();
            match p.kind.unwrap_or(PartialSaturatorKind::OpenBabel) {
                PartialSaturatorKind::Geometric => core_config::SaturatorConfig::Geometric,
                PartialSaturatorKind::OpenBabel => core_config::SaturatorConfig::OpenBabel {
                    executable: anchor_executable(p.executable.unwrap_or_else(|| {
                        PathBuf::from(core_config::SaturatorConfig::DEFAULT_OBABEL)
                    }))?,
                    timeout: p
                        .timeout_secs
                        .map(Duration::from_secs)
                        .unwrap_or(core_config::SaturatorConfig::DEFAULT_OBABEL_TIMEOUT),
                },
            }
        };

        let solver = {
            let p = self.solver.unwrap_or_default();
            let d = core_config::SolverConfig::default();
            core_config::SolverConfig {
                executable: anchor_executable(p.executable.unwrap_or(d.executable))?,
                gfn: p.gfn.unwrap_or(d.gfn),
                solvent: match p.solvent {
                    Some(s) if s.trim().is_empty() => None,
                    Some(s) => Some(s),
                    None => d.solvent,
                },
                accuracy: p.accuracy.unwrap_or(d.accuracy),
                timeout: p.timeout_secs.map(Duration::from_secs).unwrap_or(d.timeout),
                charge_column: p.charge_column.unwrap_or(d.charge_column),
                header: p.header.unwrap_or(d.header),
                extra_args: p.extra_args.unwrap_or(d.extra_args),
            }
        };

        let merge_policy = self
            .merge
            .and_then(|m| m.policy)
            .map(Into::into)
            .unwrap_or_default();

        let execution = {
            let p = self.execution.unwrap_or_default();
            core_config::ExecutionConfig {
                max_workers: p.max_workers,
                failure_policy: p.failure_policy.map(Into::into).unwrap_or_default(),
                work_dir: p.work_dir,
                keep_fragment_files: p.keep_fragment_files.unwrap_or(false),
            }
        };

        let metadata = {
            let p = self.metadata.unwrap_or_default();
            let d = core_config::ChargeMetadata::default();
            core_config::ChargeMetadata {
                type_label: p.type_label.unwrap_or(d.type_label),
                method: p.method.unwrap_or(d.method),
            }
        };

        core_config::ChargeConfigBuilder::new()
            .fragmentation(fragmentation)
            .saturator(saturator)
            .solver(solver)
            .merge_policy(merge_policy)
            .execution(execution)
            .metadata(metadata)
            .build()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "fragmentation.inner-radius" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .inner_radius = Some(parse_number(key, value)?);
                }
                "fragmentation.outer-radius" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .outer_radius = Some(parse_number(key, value)?);
                }
                "fragmentation.core-radius" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .core_radius = Some(parse_number(key, value)?);
                }
                "fragmentation.oxygen-neighbor-limit" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .oxygen_neighbor_limit = Some(parse_number(key, value)?);
                }
                "fragmentation.cap-distance" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .cap_distance = Some(parse_number(key, value)?);
                }
                "fragmentation.net-charge-basis" => {
                    self.fragmentation
                        .get_or_insert_with(Default::default)
                        .net_charge_basis = Some(parse_keyword(key, value)?);
                }
                "saturator.kind" => {
                    self.saturator.get_or_insert_with(Default::default).kind =
                        Some(parse_keyword(key, value)?);
                }
                "saturator.executable" => {
                    self.saturator.get_or_insert_with(Default::default).executable =
                        Some(PathBuf::from(value));
                }
                "saturator.timeout-secs" => {
                    self.saturator
                        .get_or_insert_with(Default::default)
                        .timeout_secs = Some(parse_number(key, value)?);
                }
                "solver.executable" => {
                    self.solver.get_or_insert_with(Default::default).executable =
                        Some(PathBuf::from(value));
                }
                "solver.gfn" => {
                    self.solver.get_or_insert_with(Default::default).gfn =
                        Some(parse_number(key, value)?);
                }
                "solver.solvent" => {
                    self.solver.get_or_insert_with(Default::default).solvent =
                        Some(value.to_string());
                }
                "solver.accuracy" => {
                    self.solver.get_or_insert_with(Default::default).accuracy =
                        Some(parse_number(key, value)?);
                }
                "solver.timeout-secs" => {
                    self.solver.get_or_insert_with(Default::default).timeout_secs =
                        Some(parse_number(key, value)?);
                }
                "solver.charge-column" => {
                    self.solver.get_or_insert_with(Default::default).charge_column =
                        Some(parse_number(key, value)?);
                }
                "merge.policy" => {
                    self.merge.get_or_insert_with(Default::default).policy =
                        Some(parse_keyword(key, value)?);
                }
                "execution.max-workers" => {
                    self.execution.get_or_insert_with(Default::default).max_workers =
                        Some(parse_number(key, value)?);
                }
                "execution.failure-policy" => {
                    self.execution
                        .get_or_insert_with(Default::default)
                        .failure_policy = Some(parse_keyword(key, value)?);
                }
                "execution.keep-fragment-files" => {
                    self.execution
                        .get_or_insert_with(Default::default)
                        .keep_fragment_files = Some(parse_number(key, value)?);
                }
                "execution.work-dir" => {
                    self.execution.get_or_insert_with(Default::default).work_dir =
                        Some(PathBuf::from(value));
                }
                "metadata.type" => {
                    self.metadata.get_or_insert_with(Default::default).type_label =
                        Some(value.to_string());
                }
                "metadata.method" => {
                    self.metadata.get_or_insert_with(Default::default).method =
                        Some(value.to_string());
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}
