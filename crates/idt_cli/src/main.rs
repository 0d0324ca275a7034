//! `workflow` - runs the image description pipeline from the command line.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use tokio::task::JoinError;

use idt_core::layout::absolutize;
use idt_core::logging::{init_tracing, LogConfig, LogLevel};
use idt_core::models::{WorkflowReport, WorkflowStep};
use idt_core::orchestrator::{WorkflowError, WorkflowOrchestrator, WorkflowResult};
use idt_core::runner::{CancelHandle, ProcessTool};

use cli::{load_settings, print_plan, resolve_output_dir, Cli, RunLabels};

/// Exit status after Ctrl+C, as a shell reports SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let input_dir = absolutize(&cli.input_dir);
    if !input_dir.is_dir() {
        eprintln!("Error: Input directory does not exist: {}", input_dir.display());
        return Ok(ExitCode::FAILURE);
    }

    let settings = load_settings(&cli)?;
    let labels = RunLabels::resolve(&settings);
    let cwd = std::env::current_dir()?;
    let output_dir = resolve_output_dir(cli.output_dir.as_deref(), &cwd, &labels, Local::now());
    let steps = cli.steps.0;

    if cli.dry_run {
        print_plan(&input_dir, &output_dir, &steps, &labels);
        return Ok(ExitCode::SUCCESS);
    }

    tracing::info!(
        "Running {} step(s) on {} with model {} ({})",
        steps.len(),
        input_dir.display(),
        labels.model,
        labels.prompt_style
    );

    let cancel = CancelHandle::new();
    let log_config = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    let orchestrator = WorkflowOrchestrator::new(Arc::new(settings), Arc::new(ProcessTool::new()))
        .with_log_config(log_config)
        .with_cancel_handle(cancel.clone());

    let task_input = input_dir.clone();
    let task_output = output_dir.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        orchestrator.run_workflow(&task_input, Some(&task_output), &steps)
    });

    tokio::select! {
        joined = &mut task => finish(joined),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!("Cannot listen for Ctrl+C: {}", e);
                return finish(task.await);
            }
            cancel.cancel();
            eprintln!("\nWorkflow interrupted by user");
            // Let the running tool be killed and the logger flushed
            let _ = task.await;
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}

fn finish(joined: Result<WorkflowResult<WorkflowReport>, JoinError>) -> Result<ExitCode> {
    let outcome = joined.map_err(|e| anyhow!("Workflow task failed: {}", e))?;
    match outcome {
        Ok(report) => {
            print_summary(&report);
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(WorkflowError::Cancelled { .. }) => {
            eprintln!("\nWorkflow interrupted by user");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Err(e) => Err(e.into()),
    }
}

fn step_names(steps: &[WorkflowStep]) -> String {
    if steps.is_empty() {
        return "none".to_string();
    }
    steps
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_summary(report: &WorkflowReport) {
    let rule = "=".repeat(60);
    println!("\n{}", rule);
    println!("WORKFLOW SUMMARY");
    println!("{}", rule);
    println!("Input directory:  {}", report.input_dir.display());
    println!("Output directory: {}", report.output_dir.display());
    println!(
        "Overall success:  {}",
        if report.success { "yes" } else { "no" }
    );
    println!("Steps completed:  {}", step_names(report.steps_completed()));
    println!("Steps failed:     {}", step_names(report.steps_failed()));

    for result in &report.step_results {
        match result.error_message {
            Some(ref message) => println!("  {}: FAILED - {}", result.step, message),
            None => println!("  {}: {} processed", result.step, result.processed),
        }
    }

    if let Some(ref log) = report.log_file {
        println!("Log file:         {}", log.display());
    }
    println!("{}", rule);
}
