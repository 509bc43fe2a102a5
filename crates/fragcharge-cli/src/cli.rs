use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "fragcharge developers",
    version,
    about = "fragcharge CLI - fragment-based QM partial charges for large biomolecular structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of fragments computed concurrently.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine the partial charges of a structure fragment by fragment.
    Run(RunArgs),
    /// Check that the configured external programs can be executed.
    Tools(ToolsArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    // --- Core Arguments ---
    /// Path to the input structure in mmCIF format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory that receives charges.txt, final.cif and the diagnostics tables.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Whitespace-separated empirical charges, one per atom in file order.
    /// When omitted, the charges embedded in the input mmCIF are used.
    #[arg(short, long, value_name = "PATH")]
    pub empirical_charges: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Allow writing into an existing output directory.
    #[arg(long)]
    pub overwrite: bool,

    // --- Fragmentation Overrides ---
    /// Override the inner (work) shell radius in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub inner_radius: Option<f64>,

    /// Override the outer (context) shell radius in Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub outer_radius: Option<f64>,

    // --- Tool Overrides ---
    /// Override the valence saturator.
    #[arg(long, value_enum, value_name = "KIND")]
    pub saturator: Option<SaturatorKind>,

    /// Override the path to the xtb executable.
    #[arg(long, value_name = "PATH")]
    pub xtb: Option<PathBuf>,

    /// Override the path to the obabel executable.
    #[arg(long, value_name = "PATH")]
    pub obabel: Option<PathBuf>,

    // --- Execution Overrides ---
    /// Override how overlapping fragment cores are resolved.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub merge_policy: Option<MergePolicyArg>,

    /// Abort the whole run on the first failed fragment instead of skipping it.
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Keep every fragment's input and tool output files.
    /// They are written to <OUTPUT>/fragments unless a work directory is configured.
    #[arg(long)]
    pub keep_fragments: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S fragmentation.cap-distance=1.2
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `tools` subcommand.
#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Configuration file naming the executables to check.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaturatorKind {
    /// Open Babel `obabel -h`.
    OpenBabel,
    /// Built-in geometric hydrogen placement.
    Geometric,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicyArg {
    /// The fragment whose center is closest to the atom wins.
    NearestCenter,
    /// The last fragment in center order wins.
    LastWriteWins,
}
