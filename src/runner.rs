use std::path::PathBuf;

use clap::{ArgAction, Args, Command, FromArgMatches as _};
use log::{info, LevelFilter};

use crate::context::Context;
use crate::controller::ContextRecomputeExt;
use crate::error::SirError;
use crate::log::{apply_log_spec, set_log_level, LogSpec};
use crate::parameters::{parse_assignment, ContextParametersExt, ParameterField};
use crate::report::ContextReportExt;

/// Command line arguments shared by every simulator binary.
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// JSON file with starting parameters and scheduled changes
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Change a parameter, e.g. `--set beta=0.3`. Repeat to script a sequence of changes; the
    /// n-th one is applied at t = n
    #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(ParameterField, f64)>,

    /// Directory for report output
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Prefix for report file names
    #[arg(long)]
    pub file_prefix: Option<String>,

    /// Replace report files that already exist
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// `LEVEL` for everything, `module=LEVEL` for one module, or a comma separated mix
    #[arg(long, value_name = "LEVEL", value_parser = parse_log_spec)]
    pub log_level: Option<LogSpec>,

    /// Increase verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_log_spec(text: &str) -> Result<LogSpec, SirError> {
    text.parse()
}

#[derive(Args, Debug)]
pub struct PlaceholderCustom {}

fn create_cli() -> Command {
    let cli = Command::new("sir-explorer")
        .about("Recomputes SIR epidemic trajectories as parameters change");
    BaseArgs::augment_args(cli)
}

/// Runs the simulator with extra command line arguments of type `A`.
///
/// `setup_fn` receives the context after parameters and report options are in place and before
/// the initial recompute; register views and reports there.
///
/// # Errors
///
/// Returns an error if argument parsing, loading the configuration or the setup function fails.
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    A: Args,
    F: Fn(&mut Context, &BaseArgs, Option<A>) -> Result<(), SirError>,
{
    let cli = A::augment_args(create_cli());
    let matches = cli.get_matches();

    let base_args = BaseArgs::from_arg_matches(&matches)?;
    let custom_args = A::from_arg_matches(&matches)?;
    run_with_args_internal(base_args, Some(custom_args), setup_fn)
}

/// Runs the simulator with the standard command line arguments.
///
/// # Errors
///
/// Returns an error if argument parsing, loading the configuration or the setup function fails.
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs, Option<PlaceholderCustom>) -> Result<(), SirError>,
{
    let matches = create_cli().get_matches();
    let base_args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(base_args, None, setup_fn)
}

fn configure_logging(args: &BaseArgs) {
    let level = match args.verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    if let Some(level) = level {
        set_log_level(level);
    }
    // An explicit --log-level wins over -v.
    if let Some(spec) = &args.log_level {
        apply_log_spec(spec);
    }
}

fn run_with_args_internal<A, F>(
    args: BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs, Option<A>) -> Result<(), SirError>,
{
    configure_logging(&args);
    let mut context = Context::new();

    if let Some(path) = &args.config {
        info!("loading parameters from {}", path.display());
        context.load_parameters_from_json(path)?;
    }

    for (index, (field, value)) in args.set.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let time = (index + 1) as f64;
        context.schedule_parameter_change(time, *field, *value);
    }

    {
        let report_options = context.report_options();
        if let Some(output_dir) = &args.output_dir {
            report_options.directory(output_dir.clone());
        }
        if let Some(prefix) = &args.file_prefix {
            report_options.file_prefix(prefix.clone());
        }
        report_options.overwrite(args.force_overwrite);
    }

    context.init_recompute_controller();
    setup_fn(&mut context, &args, custom_args)?;

    context.execute();
    context.recompute_statistics().log();

    let failures = context.report_failures();
    if failures > 0 {
        return Err(SirError::ReportError(format!(
            "{failures} report write(s) failed; output files are incomplete"
        ))
        .into());
    }
    Ok(context)
}
