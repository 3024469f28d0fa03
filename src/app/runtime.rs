use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use regfetch_core::Document;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, progress_manager::BarProgress, summary::SummarizeOperation, terminal};
use crate::cli::Args;

pub(crate) async fn run_regfetch() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    let default_level = terminal::resolve_default_log_level(&args);
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(default_level, no_color);

    debug!(?args, "CLI arguments parsed");
    info!(agencies = args.agencies.len(), "regfetch starting");

    let config = args.pipeline_config();
    config.validate().context("invalid configuration")?;
    let retrieval_cancel = CancellationToken::new();
    let retriever = config
        .build_retriever()?
        .with_cancellation(retrieval_cancel.clone());
    let processor = Arc::new(config.build_processor()?);

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    let cancel_target = Arc::clone(&processor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        interrupted_signal.store(true, Ordering::SeqCst);
        retrieval_cancel.cancel();
        cancel_target.cancel_all();
        warn!("interrupt received, finishing up; press Ctrl-C again to exit immediately");

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(exit_handler::FORCED_EXIT_CODE);
        }
    });

    let mut documents: Vec<Document> = Vec::new();
    for agency in &args.agencies {
        if interrupted.load(Ordering::SeqCst) {
            warn!(agency = %agency, "interrupted, skipping remaining agencies");
            break;
        }
        let retrieval = retriever.retrieve_agency(agency, args.limit).await;
        if retrieval.documents.is_empty() {
            warn!(agency = %agency, "no documents retrieved");
        }
        documents.extend(retrieval.documents);
    }

    let retrieved = documents.len();
    if interrupted.load(Ordering::SeqCst) {
        warn!(retrieved, "interrupted during retrieval, skipping processing");
        return Ok(exit_handler::determine_exit_outcome(retrieved, true));
    }
    if retrieved == 0 {
        warn!("no documents retrieved for any agency");
        return Ok(exit_handler::determine_exit_outcome(
            0,
            interrupted.load(Ordering::SeqCst),
        ));
    }

    let use_bar = terminal::should_use_progress_bar(
        io::stderr().is_terminal(),
        args.quiet,
        terminal::is_dumb_terminal(),
    );
    let progress = BarProgress::new(use_bar, retrieved);
    let report = processor
        .process_all(documents, SummarizeOperation, &progress)
        .await;
    progress.finish();

    let mut stdout = io::stdout().lock();
    for result in &report.results {
        serde_json::to_writer(&mut stdout, &result.output)?;
        writeln!(stdout)?;
    }
    stdout.flush()?;

    for failure in &report.failures {
        warn!(
            identifier = %failure.document.identifier,
            reason = %failure.reason,
            attempts = failure.attempts,
            "document not processed"
        );
    }

    info!(
        retrieved,
        completed = report.summary.completed,
        failed = report.summary.failed,
        cancelled = report.summary.cancelled,
        elapsed_ms = report.summary.elapsed.as_millis(),
        "regfetch complete"
    );
    if let Some(resources) = report.summary.resources {
        debug!(
            peak_memory_mb = resources.peak_memory_mb,
            peak_cpu_percent = resources.peak_cpu_percent,
            memory_warnings = resources.memory_warnings,
            "resource usage"
        );
    }

    let interrupted = report.cancelled || interrupted.load(Ordering::SeqCst);
    if interrupted {
        warn!(completed = report.summary.completed, "Interrupted before all documents were processed");
    }
    Ok(exit_handler::determine_exit_outcome(retrieved, interrupted))
}
