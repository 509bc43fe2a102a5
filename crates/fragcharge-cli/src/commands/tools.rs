use crate::cli::ToolsArgs;
use crate::config::PartialChargeConfig;
use crate::error::{CliError, Result};
use fragcharge::engine::config::{ChargeConfig, SaturatorConfig};
use fragcharge::engine::error::ToolError;
use fragcharge::tools::openbabel::OpenBabelSaturator;
use fragcharge::tools::xtb::XtbSolver;
use tracing::{info, warn};

/// One line of the tool report.
#[derive(Debug)]
struct ToolStatus {
    role: &'static str,
    program: String,
    outcome: std::result::Result<String, ToolError>,
}

fn probe_all(config: &ChargeConfig) -> Vec<ToolStatus> {
    let mut statuses = Vec::with_capacity(2);

    match &config.saturator {
        SaturatorConfig::OpenBabel {
            executable,
            timeout,
        } => {
            let saturator = OpenBabelSaturator::new(executable.clone(), *timeout);
            statuses.push(ToolStatus {
                role: "saturator",
                program: executable.display().to_string(),
                outcome: saturator.version(),
            });
        }
        SaturatorConfig::Geometric => statuses.push(ToolStatus {
            role: "saturator",
            program: "geometric".to_string(),
            outcome: Ok("built in".to_string()),
        }),
    }

    let solver = XtbSolver::new(config.solver.clone());
    statuses.push(ToolStatus {
        role: "solver",
        program: solver.executable().display().to_string(),
        outcome: solver.version(),
    });
    statuses
}

pub async fn run(args: ToolsArgs) -> Result<()> {
    let config = PartialChargeConfig::load(args.config.as_deref())?.build()?;
    info!("Probing configured external programs...");

    let statuses = tokio::task::block_in_place(|| probe_all(&config));
    let mut first_failure = None;
    for status in statuses {
        match status.outcome {
            Ok(version) => println!("✓ {:<9} {} ({})", status.role, status.program, version),
            Err(e) => {
                warn!("{} '{}' is not usable: {}", status.role, status.program, e);
                println!("✗ {:<9} {}: {}", status.role, status.program, e);
                first_failure.get_or_insert(e);
            }
        }
    }

    match first_failure {
        Some(e) => Err(CliError::Tool(e)),
        None => Ok(()),
    }
}
