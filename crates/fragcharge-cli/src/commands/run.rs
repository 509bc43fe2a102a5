use crate::cli::RunArgs;
use crate::config::PartialChargeConfig;
use crate::error::{CliError, Result};
use crate::ui::{CliProgressHandler, UiEvent};
use fragcharge::{
    core::io::{
        charges::{read_charges, write_charges_to_path},
        diagnostics::{write_atom_diagnostics_to_path, write_fragment_diagnostics_to_path},
        mmcif::{ChargeAnnotation, MmcifFile, MmcifMetadata},
        traits::StructureFile,
    },
    core::models::structure::Structure,
    engine::{cancel::CancellationToken, config::ChargeConfig, progress::ProgressReporter},
    tools::Toolchain,
    workflows::charges::{self, ChargeResult},
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const CHARGES_FILE: &str = "charges.txt";
pub const STRUCTURE_FILE: &str = "final.cif";
pub const ATOM_DIAGNOSTICS_FILE: &str = "diagnostics.csv";
pub const FRAGMENT_DIAGNOSTICS_FILE: &str = "fragments.csv";

pub async fn run(
    args: RunArgs,
    threads: Option<usize>,
    ui_sender: mpsc::Sender<UiEvent>,
) -> Result<()> {
    let partial_config = PartialChargeConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args, threads)?;

    prepare_output_dir(&args.output, args.overwrite)?;

    info!("Loading input structure from {:?}", &args.input);
    let (structure, mut metadata) =
        MmcifFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
            path: args.input.clone(),
            source: e.into(),
        })?;
    let empirical = load_empirical_charges(args.empirical_charges.as_deref(), &metadata)?;
    info!(
        "Loaded {} atoms and {} empirical charges.",
        structure.len(),
        empirical.len()
    );

    let toolchain = Toolchain::from_config(&config);
    let cancel = CancellationToken::new();
    let interrupt_watcher = spawn_interrupt_watcher(cancel.clone());

    let progress_handler = CliProgressHandler::new(ui_sender);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Refining charges of {} atoms with {} + {}...",
        structure.len(),
        toolchain.saturator.name(),
        toolchain.solver.name()
    );
    let outcome = tokio::task::block_in_place(|| {
        charges::run(
            &structure,
            &empirical,
            &config,
            &toolchain,
            &reporter,
            &cancel,
        )
    });
    interrupt_watcher.abort();
    let result = outcome?;

    write_outputs(&args.output, &structure, &mut metadata, &config, &result)?;
    report_summary(&args.output, &result);
    Ok(())
}

fn prepare_output_dir(output: &Path, overwrite: bool) -> Result<()> {
    if output.exists() && !overwrite {
        return Err(CliError::Argument(format!(
            "Output directory {:?} already exists; pass --overwrite to reuse it.",
            output
        )));
    }
    std::fs::create_dir_all(output)?;
    Ok(())
}

fn load_empirical_charges(path: Option<&Path>, metadata: &MmcifMetadata) -> Result<Vec<f64>> {
    match path {
        Some(path) => {
            info!("Reading empirical charges from {:?}", path);
            read_charges(path).map_err(|e| CliError::FileParsing {
                path: path.to_path_buf(),
                source: e.into(),
            })
        }
        None => metadata.embedded_charges.clone().ok_or_else(|| {
            CliError::Argument(
                "No empirical charges given: pass --empirical-charges or use an mmCIF with a \
                 _sb_ncbr_partial_atomic_charges block."
                    .to_string(),
            )
        }),
    }
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling outstanding fragments.");
            cancel.cancel();
        }
    })
}

fn output_error(path: PathBuf, source: impl Into<anyhow::Error>) -> CliError {
    CliError::Output {
        path,
        source: source.into(),
    }
}

fn write_outputs(
    output: &Path,
    structure: &Structure,
    metadata: &mut MmcifMetadata,
    config: &ChargeConfig,
    result: &ChargeResult,
) -> Result<()> {
    let charges_path = output.join(CHARGES_FILE);
    write_charges_to_path(&result.charges, &charges_path)
        .map_err(|e| output_error(charges_path.clone(), e))?;

    metadata.annotate_charges(&ChargeAnnotation {
        type_label: &config.metadata.type_label,
        method: &config.metadata.method,
        charges: &result.charges,
    });
    let structure_path = output.join(STRUCTURE_FILE);
    MmcifFile::write_to_path(structure, metadata, &structure_path)
        .map_err(|e| output_error(structure_path.clone(), e))?;

    let atoms_path = output.join(ATOM_DIAGNOSTICS_FILE);
    write_atom_diagnostics_to_path(&result.atom_diagnostics, &atoms_path)
        .map_err(|e| output_error(atoms_path.clone(), e))?;

    let fragments_path = output.join(FRAGMENT_DIAGNOSTICS_FILE);
    write_fragment_diagnostics_to_path(&result.fragment_diagnostics, &fragments_path)
        .map_err(|e| output_error(fragments_path.clone(), e))?;

    info!("Outputs written to {:?}", output);
    Ok(())
}

fn report_summary(output: &Path, result: &ChargeResult) {
    let summary = &result.summary;
    println!(
        "✓ {} of {} atoms refined from {} fragments.",
        summary.refined_atoms,
        result.charges.len(),
        summary.completed
    );
    if summary.failed > 0 {
        warn!(
            "{} fragment(s) failed; {} atom(s) keep their empirical charge.",
            summary.failed, summary.unresolved_atoms
        );
        println!(
            "  {} fragment(s) failed, {} atom(s) unresolved (see {}).",
            summary.failed, summary.unresolved_atoms, FRAGMENT_DIAGNOSTICS_FILE
        );
    }
    if summary.nan_zeroed_atoms > 0 {
        println!(
            "  {} NaN charge(s) were replaced by 0.0.",
            summary.nan_zeroed_atoms
        );
    }
    println!("  Results written to: {}", output.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    const GLYCINE_CIF: &str = "\
data_GLY
#
loop_
_chem_comp.id
_chem_comp.type
GLY 'L-peptide linking'
#
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.auth_asym_id
_atom_site.auth_seq_id
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
ATOM 1 N N GLY A 1 -1.90 0.27 0.00
ATOM 2 C CA GLY A 1 -0.62 -0.45 0.00
ATOM 3 C C GLY A 1 0.58 0.49 0.00
ATOM 4 O O GLY A 1 0.40 1.73 0.00
ATOM 5 O OXT GLY A 1 1.72 -0.03 0.00
ATOM 6 H H1 GLY A 1 -2.69 -0.38 0.00
ATOM 7 H H2 GLY A 1 -1.96 0.87 0.82
ATOM 8 H H3 GLY A 1 -1.96 0.87 -0.82
ATOM 9 H HA2 GLY A 1 -0.57 -1.10 0.88
ATOM 10 H HA3 GLY A 1 -0.57 -1.10 -0.88
#
";

    const GLYCINE_CHARGES: &str = "-0.30 -0.02 0.70 -0.80 -0.80 0.33 0.33 0.33 0.09 0.09\n";

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["fragcharge", "run"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Run(args) => args,
            Commands::Tools(_) => panic!("Expected 'run' subcommand"),
        }
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            prepare_output_dir(dir.path(), false),
            Err(CliError::Argument(_))
        ));
        assert!(prepare_output_dir(dir.path(), true).is_ok());

        let fresh = dir.path().join("nested").join("out");
        prepare_output_dir(&fresh, false).unwrap();
        assert!(fresh.is_dir());
    }

    #[test]
    fn empirical_charges_fall_back_to_the_embedded_block() {
        let mut metadata = MmcifMetadata::from_lines(Vec::new());
        assert!(matches!(
            load_empirical_charges(None, &metadata),
            Err(CliError::Argument(_))
        ));

        metadata.embedded_charges = Some(vec![0.1, -0.1]);
        assert_eq!(
            load_empirical_charges(None, &metadata).unwrap(),
            vec![0.1, -0.1]
        );
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn full_run_writes_every_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("gly.cif");
        let charges = dir.path().join("charges.in");
        let output = dir.path().join("out");
        std::fs::write(&input, GLYCINE_CIF).unwrap();
        std::fs::write(&charges, GLYCINE_CHARGES).unwrap();

        let xtb = dir.path().join("fake-xtb");
        std::fs::write(
            &xtb,
            "#!/bin/sh\n\
             echo '  Mulliken/CM5 charges         n(s)   n(p)   n(d)'\n\
             awk '/^(ATOM|HETATM)/ { n++; printf \"%6d X  0.000000 0.050000 1.000 1.000 0.000\\n\", n }' \"$1\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&xtb, std::fs::Permissions::from_mode(0o755)).unwrap();

        let args = run_args(&[
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-e",
            charges.to_str().unwrap(),
            "--saturator",
            "geometric",
            "--xtb",
            xtb.to_str().unwrap(),
        ]);
        let (sender, _receiver) = mpsc::channel(1024);
        run(args, Some(2), sender).await.unwrap();

        let refined = read_charges(&output.join(CHARGES_FILE)).unwrap();
        assert_eq!(refined.len(), 10);
        assert!(refined.iter().all(|&c| (c - 0.05).abs() < 1e-12));

        let cif = std::fs::read_to_string(output.join(STRUCTURE_FILE)).unwrap();
        assert!(!cif.contains("_chem_comp.id"));
        assert!(cif.contains("_sb_ncbr_partial_atomic_charges_meta.method"));
        assert!(cif.contains("1 10  0.0500"));

        let diagnostics = std::fs::read_to_string(output.join(ATOM_DIAGNOSTICS_FILE)).unwrap();
        assert_eq!(diagnostics.lines().count(), 11);
        assert!(diagnostics.lines().skip(1).all(|l| l.contains("refined")));

        let fragments = std::fs::read_to_string(output.join(FRAGMENT_DIAGNOSTICS_FILE)).unwrap();
        assert_eq!(fragments.lines().count(), 6);
    }
}
