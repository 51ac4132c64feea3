use std::{env, path::PathBuf, process};

use opsreport::config::{load_config, resolve_config_path, ReportConfig, ReportPeriod};
use opsreport::logging::{self, init_logger, LogLevel, Stage};
use opsreport::model::ReportError;
use opsreport::pipeline::{build_operations_table, run_pipeline, PipelineOptions};
use opsreport::verify::{print_summary, run_verification};

fn main() {
    dotenv::dotenv().ok();
    let level = env::var("OPSREPORT_LOG")
        .ok()
        .and_then(|s| LogLevel::parse(&s))
        .unwrap_or(LogLevel::Info);
    let log_file = env::var("OPSREPORT_LOG_FILE").ok();
    init_logger(level, log_file.as_deref(), false);

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

/// Positional arguments and flags of one command line.
struct Args {
    positional: Vec<String>,
    config: Option<String>,
    operations_csv: Option<PathBuf>,
    no_template: bool,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args {
        positional: Vec::new(),
        config: None,
        operations_csv: None,
        no_template: false,
    };
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--config" => args.config = Some(raw.next().ok_or("--config needs a path")?),
            "--operations-csv" => {
                args.operations_csv = Some(raw.next().map(PathBuf::from).ok_or("--operations-csv needs a path")?)
            }
            "--no-template" => args.no_template = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {flag}")),
            _ => args.positional.push(arg),
        }
    }
    Ok(args)
}

fn parse_period(month: Option<&String>, year: Option<&String>) -> Result<ReportPeriod, Box<dyn std::error::Error>> {
    let (Some(month), Some(year)) = (month, year) else {
        print_usage();
        process::exit(1);
    };
    let month: u32 = month.parse().map_err(|_| format!("invalid month '{month}'"))?;
    let year: i32 = year.parse().map_err(|_| format!("invalid year '{year}'"))?;
    Ok(ReportPeriod::new(month, year)?)
}

fn load(args: &Args) -> Result<ReportConfig, ReportError> {
    let path = resolve_config_path(args.config.as_deref());
    logging::debug(Stage::Config, None, &format!("Using configuration {}", path.display()));
    load_config(&path)
}

/// Returns `Ok(false)` when the command ran but produced nothing usable.
fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let mut raw = env::args().skip(1);
    let command = raw.next().unwrap_or_else(|| {
        print_usage();
        process::exit(1);
    });
    let args = parse_args(raw)?;

    match command.as_str() {
        "run" => {
            let period = parse_period(args.positional.first(), args.positional.get(1))?;
            let config = load(&args)?;
            let options = PipelineOptions {
                operations_csv: args.operations_csv.clone(),
                update_template: !args.no_template,
            };
            let report = run_pipeline(&config, period, &options)?;

            println!("\n{}", report.title);
            println!("  Figures written:  {}", report.figures.len());
            println!("  Pairs summarized: {}/{}", report.succeeded_pairs(), report.pairs.len());
            for line in report.failure_lines() {
                println!("  {}", line);
            }
            if let Some(Ok(template)) = &report.template {
                let unmatched: Vec<_> = template.unmatched().map(|s| s.name).collect();
                if !unmatched.is_empty() {
                    println!("  Template substitutions not applied: {}", unmatched.join(", "));
                }
            }
            Ok(report.produced_any_figure())
        }
        "verify" => {
            let period = parse_period(args.positional.first(), args.positional.get(1))?;
            let config = load(&args)?;
            let report = run_verification(&config, &period);
            print_summary(&report);
            Ok(report.summary.failed < report.summary.total)
        }
        "ops-table" => {
            // The log path may be omitted when the configuration names one.
            let (log_arg, period) = match args.positional.len() {
                2 => (None, parse_period(args.positional.first(), args.positional.get(1))?),
                _ => (
                    args.positional.first().map(PathBuf::from),
                    parse_period(args.positional.get(1), args.positional.get(2))?,
                ),
            };
            let config = load(&args)?;
            let Some(log_path) = log_arg.or_else(|| config.paths.operations_log.clone()) else {
                print_usage();
                process::exit(1);
            };
            let table = build_operations_table(&config, &log_path, &period)?;
            println!("Saved operations CSV to {}", table.csv_path.display());
            println!("Saved LaTeX table to {}", table.latex_path.display());
            println!("\n{}", table.latex);
            Ok(true)
        }
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage: opsreport <command>\n\
         Commands:\n  \
         run <month> <year> [--operations-csv PATH] [--config PATH] [--no-template]\n  \
         verify <month> <year> [--config PATH]\n  \
         ops-table [<log.csv>] <month> <year> [--config PATH]\n\
         Environment:\n  \
         OPSREPORT_CONFIG    configuration file (default ./opsreport.toml)\n  \
         OPSREPORT_LOG       debug | info | warning | error\n  \
         OPSREPORT_LOG_FILE  append log entries to this file"
    );
}
