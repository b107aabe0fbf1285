use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use weather_file_selector::app::{App, ProgressSink, RunWarning};
use weather_file_selector::bundle::{BundleSummary, HttpContentFetcher};
use weather_file_selector::config::{ConfigLoader, ResolvedConfig, load_choices};
use weather_file_selector::domain::MatchStrategyKind;
use weather_file_selector::error::SelectorError;
use weather_file_selector::listing::{CachedDirectoryFetcher, HttpDirectoryFetcher};
use weather_file_selector::mapping::CountryMap;
use weather_file_selector::matching::strategy_for;
use weather_file_selector::output::{ConsoleProgress, JsonOutput, OutputMode, RunSummary};
use weather_file_selector::report::Report;
use weather_file_selector::resolver::{ManualChoices, parse_choice_spec};
use weather_file_selector::tui::Picker;

#[derive(Parser)]
#[command(name = "wfs")]
#[command(about = "Match cities to TMYx weather files, resolve ambiguities and bundle the selection")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Resolve an input list of cities to weather files")]
    Resolve(ResolveArgs),
    #[command(about = "Print the parsed listing of a country or region URL as JSON")]
    Listing(ListingArgs),
}

#[derive(Args)]
struct ResolveArgs {
    /// Spreadsheet or CSV with `City` and `Country` columns.
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    mapping: Option<PathBuf>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, value_enum)]
    strategy: Option<MatchStrategyKind>,

    #[arg(long)]
    region_hint: Option<String>,

    /// Manual pick as `CITY|COUNTRY=FILE`; may be repeated.
    #[arg(long = "choice")]
    choices: Vec<String>,

    /// JSON file holding `[{ "city", "country", "file" }]`.
    #[arg(long = "choices")]
    choices_file: Option<String>,

    /// Report destination; `.csv` writes CSV, anything else xlsx.
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    bundle: Option<PathBuf>,

    #[arg(long)]
    download_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ListingArgs {
    /// Country name from the mapping, or a region listing URL.
    target: String,

    #[arg(long)]
    mapping: Option<PathBuf>,

    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<SelectorError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SelectorError) -> u8 {
    match error {
        error if error.is_setup_error() => 2,
        SelectorError::ReportWrite(_)
        | SelectorError::BundleWrite(_)
        | SelectorError::Filesystem(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Resolve(args) => run_resolve(args, output_mode),
        Commands::Listing(args) => run_listing(args),
    }
}

fn build_app(
    config: &ResolvedConfig,
) -> Result<App<CachedDirectoryFetcher<HttpDirectoryFetcher>, HttpContentFetcher>, SelectorError> {
    let directory = CachedDirectoryFetcher::new(HttpDirectoryFetcher::new(config.listing)?);
    let content = HttpContentFetcher::new(config.content)?;
    Ok(App::new(directory, content))
}

fn run_resolve(args: ResolveArgs, output_mode: OutputMode) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let mapping_path = args
        .mapping
        .clone()
        .unwrap_or_else(|| config.mapping_path.clone().into_std_path_buf());
    let mapping = CountryMap::load(&mapping_path)?;
    let cli_choices = collect_choices(&args)?;

    let strategy = args.strategy.unwrap_or(config.strategy);
    let region_hint = args.region_hint.clone().or_else(|| config.region_hint.clone());
    let app = build_app(&config)?.with_strategy(strategy_for(strategy, region_hint));

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Interactive => &ConsoleProgress,
        OutputMode::NonInteractive => &JsonOutput,
    };

    let (input, outcome) = app.resolve_input(&args.input, &mapping, sink)?;
    let mut session = outcome.session;
    session.apply_choices(&cli_choices)?;

    if matches!(output_mode, OutputMode::Interactive) {
        let pending = session.pending();
        let picked = Picker::choose_all(&pending)?;
        session.apply_choices(&picked)?;
    }

    let pending = session.pending().into_iter().cloned().collect::<Vec<_>>();
    let choices = session.choices().to_entries();
    let report = session.finalize();

    if let Some(path) = &args.report {
        report.write_to(path)?;
        tracing::info!(path = %path.display(), "report written");
    }

    let bundle = match &args.bundle {
        Some(path) => {
            let bundle = app.bundle(&report, sink)?;
            bundle.write_to(path)?;
            tracing::info!(path = %path.display(), entries = bundle.entries.len(), "bundle written");
            Some(bundle.summary())
        }
        None => None,
    };

    let download_dir = match &args.download_dir {
        Some(base) => {
            let export = app.export_dir(&report, base, sink)?;
            Some(export.dir.to_string())
        }
        None => None,
    };

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = RunSummary {
                strategy: app.strategy_name().to_string(),
                counts: report.counts(),
                report,
                pending,
                choices,
                warnings: outcome.warnings,
                skipped_rows: input.skipped_rows,
                bundle,
                download_dir,
            };
            JsonOutput::print_run(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            print_summary(&report, &outcome.warnings, bundle.as_ref(), download_dir.as_deref());
        }
    }
    Ok(())
}

fn collect_choices(args: &ResolveArgs) -> Result<ManualChoices, SelectorError> {
    let mut choices = match &args.choices_file {
        Some(path) => load_choices(path)?,
        None => ManualChoices::new(),
    };
    for spec in &args.choices {
        let (key, file) = parse_choice_spec(spec)?;
        choices.insert(key, file);
    }
    Ok(choices)
}

fn run_listing(args: ListingArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let url = if args.target.starts_with("http://") || args.target.starts_with("https://") {
        args.target.clone()
    } else {
        let mapping_path = args
            .mapping
            .clone()
            .unwrap_or_else(|| config.mapping_path.clone().into_std_path_buf());
        let mapping = CountryMap::load(&mapping_path)?;
        mapping
            .get(&args.target)
            .map(str::to_string)
            .ok_or_else(|| SelectorError::UnknownCountry(args.target.trim().to_uppercase()))?
    };

    let app = build_app(&config)?;
    let listing = app.listing(&url)?;
    JsonOutput::print_listing(&listing).into_diagnostic()?;
    Ok(())
}

fn print_summary(
    report: &Report,
    warnings: &[RunWarning],
    bundle: Option<&BundleSummary>,
    download_dir: Option<&str>,
) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let counts = report.counts();
    println!("{cyan}Weather file selection{reset}");
    for row in &report.rows {
        if row.is_found() {
            println!(
                "{green}  {} ({}): {}{reset}",
                row.city, row.country, row.weather_file_zip
            );
        } else {
            println!("{yellow}  {} ({}): {}{reset}", row.city, row.country, row.status);
        }
    }
    println!(
        "{green}Mapped: {}{reset} | {yellow}Not mapped: {}{reset}",
        counts.found, counts.not_found
    );

    for warning in warnings {
        println!("{yellow}warning: {warning}{reset}");
    }

    if let Some(bundle) = bundle {
        println!(
            "{cyan}Bundle: {} files, {} failed{reset}",
            bundle.entries.len(),
            bundle.failures.len()
        );
        for failure in &bundle.failures {
            println!("{yellow}  {}: {}{reset}", failure.file, failure.reason);
        }
    }
    if let Some(dir) = download_dir {
        println!("{cyan}Files saved to {dir}{reset}");
    }
}
