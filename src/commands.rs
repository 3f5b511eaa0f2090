use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::cost::{format_bytes, format_number, CostEstimate, BYTES_PER_GIGABYTE};
use crate::doctor::{probe_command, run_checks};
use crate::error::{AppError, Result};
use crate::gate::{GateMode, LinePrompter, Prompter};
use crate::report::{analyze, format_preview};
use crate::settings::Settings;
use crate::view::ViewSpec;
use crate::warehouse::{BqCli, Outcome};
use crate::workflow::CostGuard;

/// Options of the bulk CSV runner
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub query_file: PathBuf,
    pub limit: Option<u64>,
    pub output: Option<PathBuf>,
    pub preview: usize,
    pub dry_run: bool,
    pub analysis: bool,
    pub confirm: bool,
}

#[derive(Debug, Clone)]
pub struct CreateViewOptions {
    pub name: String,
    pub query_file: PathBuf,
    pub dataset: Option<String>,
    pub project: Option<String>,
    pub description: Option<String>,
    pub replace: bool,
    pub dry_run: bool,
}

pub fn read_query(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| AppError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })
}

/// `<query-stem>_<YYYY-MM-DD>_<HHMMSS>.csv`
pub fn generate_output_filename(query_file: &Path, now: &NaiveDateTime) -> PathBuf {
    let stem = query_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "query".to_string());
    PathBuf::from(format!("{}_{}.csv", stem, now.format("%Y-%m-%d_%H%M%S")))
}

/// Write the result file, creating parent directories; returns its size in bytes
pub fn write_output(path: &Path, content: &str) -> Result<u64> {
    let write_err = |e: std::io::Error| AppError::WriteFile {
        path: path.display().to_string(),
        source: e,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)?;
    Ok(content.len() as u64)
}

fn print_estimate(estimate: &CostEstimate) {
    println!(
        "Query will process: {} bytes",
        format_number(estimate.bytes_processed)
    );
    println!("Estimated cost: {}", estimate.cost_display());
    println!("Size: {}", format_bytes(estimate.bytes_processed));
}

fn print_soft_warning(exit_code: i32, stderr: Option<&str>) {
    println!("Query completed with warnings (exit code {})", exit_code);
    if let Some(stderr) = stderr {
        println!("\nError details:");
        println!("{}", stderr);
    }
}

fn print_failure(what: &str, exit_code: i32, stderr: &str) {
    eprintln!("{} failed with exit code {}", what, exit_code);
    if !stderr.trim().is_empty() {
        eprintln!("Error details: {}", stderr.trim());
    }
}

pub fn run_safe_query(settings: &Settings, query_file: &Path, max_bytes: Option<u64>) -> Result<i32> {
    run_safe_query_with(settings, query_file, max_bytes, &mut LinePrompter::stdio())
}

pub fn run_safe_query_with(
    settings: &Settings,
    query_file: &Path,
    max_bytes: Option<u64>,
    prompter: &mut dyn Prompter,
) -> Result<i32> {
    let query = read_query(query_file)?;

    let mut gate = settings.interactive_gate();
    if let Some(max_bytes) = max_bytes {
        gate = gate.with_ceiling(max_bytes);
    }
    let guard = CostGuard::new(settings.client()?, gate)
        .with_price_per_terabyte(settings.warehouse.price_per_terabyte);

    println!("Validating query (dry run)...");
    let run = guard.run(&query, prompter, Some(&print_estimate))?;

    match &run.outcome {
        Outcome::Completed { output } => {
            print!("{}", output);
            println!("Query completed");
        }
        Outcome::SoftWarning {
            output,
            exit_code,
            stderr,
        } => {
            print!("{}", output);
            print_soft_warning(*exit_code, stderr.as_deref());
        }
        Outcome::CancelledBySafetyGate => println!("Query cancelled for safety"),
        Outcome::Failed { exit_code, stderr } => print_failure("Query", *exit_code, stderr),
    }

    Ok(run.outcome.exit_code())
}

pub fn run_query(settings: &Settings, options: &RunOptions) -> Result<i32> {
    run_query_with(settings, options, &mut LinePrompter::stdio())
}

pub fn run_query_with(
    settings: &Settings,
    options: &RunOptions,
    prompter: &mut dyn Prompter,
) -> Result<i32> {
    let query = read_query(&options.query_file)?;

    let output_path = match &options.output {
        Some(path) => path.clone(),
        None => generate_output_filename(&options.query_file, &Local::now().naive_local()),
    };

    let mut gate = settings.batch_gate();
    if let Some(limit) = options.limit {
        gate = gate.with_ceiling(limit);
    }
    if options.confirm {
        gate = gate.with_mode(GateMode::Interactive);
    }

    println!("Query: {}", options.query_file.display());
    println!("Output: {}", output_path.display());
    println!(
        "Limit: {:.1}GB",
        gate.ceiling as f64 / BYTES_PER_GIGABYTE as f64
    );

    let client = settings.client()?.with_format("csv");
    let guard = CostGuard::new(client, gate)
        .with_price_per_terabyte(settings.warehouse.price_per_terabyte);

    println!("Running dry run to check cost...");
    if options.dry_run {
        let estimate = guard.estimate(&query)?;
        print_estimate(&estimate);
        println!("Dry run completed");
        return Ok(0);
    }

    let run = guard.run(&query, prompter, Some(&print_estimate))?;

    match &run.outcome {
        Outcome::Completed { output } => {
            let size = write_output(&output_path, output)?;
            println!(
                "Saved: {} ({:.1}KB)",
                output_path.display(),
                size as f64 / 1024.0
            );

            let preview = format_preview(output, options.preview);
            if !preview.is_empty() {
                println!("\n{}", preview);
            }
            if options.analysis {
                match analyze(output) {
                    Some(analysis) => println!("{}", analysis),
                    None => println!("No data returned"),
                }
            }
        }
        Outcome::SoftWarning {
            output,
            exit_code,
            stderr,
        } => {
            write_output(&output_path, output)?;
            println!("Results saved: {}", output_path.display());
            print_soft_warning(*exit_code, stderr.as_deref());
        }
        Outcome::CancelledBySafetyGate => println!("Query cancelled for safety"),
        Outcome::Failed { exit_code, stderr } => print_failure("Query", *exit_code, stderr),
    }

    Ok(run.outcome.exit_code())
}

pub fn run_create_view(settings: &Settings, options: &CreateViewOptions) -> Result<i32> {
    run_create_view_with(settings, options, &mut LinePrompter::stdio())
}

pub fn run_create_view_with(
    settings: &Settings,
    options: &CreateViewOptions,
    prompter: &mut dyn Prompter,
) -> Result<i32> {
    let project = options
        .project
        .clone()
        .unwrap_or_else(|| settings.view.project.clone());
    let dataset = options
        .dataset
        .clone()
        .unwrap_or_else(|| settings.view.dataset.clone());

    let spec = ViewSpec::new(&project, &dataset, &options.name)?
        .with_description(options.description.clone())
        .with_replace(options.replace);

    let query = read_query(&options.query_file)?;
    let statement = spec.create_statement(&query);

    println!("Query file: {}", options.query_file.display());
    println!("View name: {}", spec.full_name());
    println!(
        "Description: {}",
        spec.description.as_deref().unwrap_or("No description")
    );

    let guard = CostGuard::new(settings.client()?, settings.interactive_gate())
        .with_price_per_terabyte(settings.warehouse.price_per_terabyte);

    if options.dry_run {
        println!("Dry run - statement that would be executed:\n");
        println!("{}\n", statement);
        println!("{}", guard.client().describe_execute(guard.gate().ceiling));
        return Ok(0);
    }

    println!("Creating view...");
    let run = guard.run(&statement, &mut *prompter, None)?;

    match &run.outcome {
        Outcome::Completed { .. } => {}
        Outcome::SoftWarning {
            output,
            exit_code,
            stderr,
        } => {
            println!("{}", output);
            print_soft_warning(*exit_code, stderr.as_deref());
        }
        Outcome::CancelledBySafetyGate => {
            println!("View creation cancelled for safety");
            return Ok(0);
        }
        Outcome::Failed { exit_code, stderr } => {
            print_failure("View creation", *exit_code, stderr);
            return Ok(*exit_code);
        }
    }

    println!("View created: {}", spec.full_name());
    test_view(&guard, &spec, prompter);
    print_usage_tips(&spec);

    Ok(0)
}

/// Query the new view; problems here are reported but do not fail the command
fn test_view(guard: &CostGuard<BqCli>, spec: &ViewSpec, prompter: &mut dyn Prompter) {
    println!("Testing view with SELECT * LIMIT 5...");
    match guard.run(&spec.sample_query(), prompter, None) {
        Ok(run) => match run.outcome.output() {
            Some(output) => {
                println!("View test successful!\n\nSample results:");
                println!("{}", output);
            }
            None => println!("View created but test did not run - check the view manually"),
        },
        Err(e) => {
            tracing::warn!(error = %e, "view test failed");
            println!("View created but test failed - check the view manually");
        }
    }
}

fn print_usage_tips(spec: &ViewSpec) {
    println!("\nUsage tips:");
    println!("   Query the view: SELECT * FROM `{}`", spec.full_name());
    println!("   Delete view: DROP VIEW `{}`", spec.full_name());
}

pub fn run_doctor(settings: &Settings) -> Result<i32> {
    let base_dir = std::env::current_dir()?;

    println!("Checking installation...\n");
    let report = run_checks(&probe_command, &base_dir, &settings.warehouse.command);

    for check in &report.checks {
        println!("{}", check);
    }

    println!();
    if report.is_healthy() {
        println!(
            "Installation looks ready to use ({} warnings)",
            report.warnings()
        );
        Ok(0)
    } else {
        println!("Installation has issues, see the items marked [fail] above");
        Ok(1)
    }
}
