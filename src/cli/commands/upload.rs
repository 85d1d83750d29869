//! Upload command - push build artifacts for one commit

use crate::cli::args::UploadArgs;
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::history::BlobHistoryIndex;
use crate::project::ProjectLayout;
use crate::store::BlobStore;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::upload::{HistoryUpdate, Transfer, TransferAction, UploadReport, UploadSettings, Uploader};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Execute the upload command
pub async fn execute(args: UploadArgs, config: &Config) -> SyncResult<()> {
    let ctx = UiContext::detect();

    let root = super::project_root(args.project)?;
    let layout = ProjectLayout::new(&root, &config.layout)?.with_commit(args.commit);
    let store: Arc<dyn BlobStore> = Arc::new(super::open_store(&args.server, config)?);
    let dry_run = args.dry_run;

    let mut settings = UploadSettings::from_config(config);
    if !args.bundles.is_empty() {
        settings.bundles = args.bundles;
    }
    if let Some(workers) = args.workers {
        settings.executor = settings.executor.with_workers(workers);
    }
    settings.dry_run = dry_run;

    ui::intro(
        &ctx,
        if dry_run {
            "cachesync upload (dry run)"
        } else {
            "cachesync upload"
        },
    );
    ui::key_value(&ctx, "Project", &layout.root.display().to_string());
    ui::key_value(&ctx, "Server", &store.location());

    let history = BlobHistoryIndex::new(Arc::clone(&store), layout.scratch_dir.clone());
    let uploader = Uploader::new(store, Arc::new(history), layout, settings);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Uploading artifacts...");

    let outcome = tokio::task::spawn_blocking(move || uploader.upload())
        .await
        .map_err(|e| SyncError::Internal(format!("upload task failed: {}", e)));

    let report = match outcome {
        Ok(Ok(report)) => report,
        Ok(Err(e)) | Err(e) => {
            spinner.stop_error("Upload did not start");
            return Err(e);
        }
    };

    if report.is_complete() {
        spinner.stop(&format!("Commit {}", report.commit));
    } else {
        spinner.stop_warn(&format!("Commit {}", report.commit));
    }

    print_report(&ctx, &report);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .await
            .map_err(|e| SyncError::io(format!("writing report to {}", path.display()), e))?;
        debug!("Report written to {}", path.display());
    }

    let summary = if dry_run {
        format!(
            "{} to upload, {} already present",
            report.planned().count(),
            report.skipped().count()
        )
    } else {
        format!(
            "{} uploaded ({}), {} already present",
            report.uploaded().count(),
            ui::human_bytes(report.uploaded_bytes()),
            report.skipped().count()
        )
    };

    if report.is_complete() {
        ui::outro_success(&ctx, &summary);
        return Ok(());
    }

    let failed = report.failures.len();
    if args.strict {
        ui::outro_error(&ctx, &format!("{} job(s) failed; {}", failed, summary));
        return Err(SyncError::PartialUpload { failed });
    }

    ui::outro_warn(&ctx, &format!("{} job(s) failed; {}", failed, summary));
    Ok(())
}

fn print_report(ctx: &UiContext, report: &UploadReport) {
    let uploaded: Vec<&Transfer> = report.uploaded().collect();
    if !uploaded.is_empty() {
        ui::section(ctx, "Uploaded");
        for transfer in uploaded {
            if let TransferAction::Uploaded { bytes } = transfer.action {
                ui::step_ok_detail(ctx, &transfer.address, &ui::human_bytes(bytes));
            }
        }
    }

    let planned: Vec<&Transfer> = report.planned().collect();
    if !planned.is_empty() {
        ui::section(ctx, "Would upload");
        for transfer in planned {
            ui::remark(ctx, &transfer.address);
        }
    }

    let skipped = report.skipped().count();
    if skipped > 0 {
        ui::step_info(ctx, &format!("{} address(es) already on the server", skipped));
    }

    if !report.failures.is_empty() {
        ui::section(ctx, "Failed");
        for failure in &report.failures {
            ui::step_error_detail(ctx, &failure.label, &failure.error.to_string());
        }
    }

    match &report.history {
        HistoryUpdate::Recorded { added: true } => {
            ui::step_ok(ctx, &format!("Commit {} recorded in history", report.commit))
        }
        HistoryUpdate::Recorded { added: false } => {
            ui::step_info(ctx, &format!("Commit {} was already in history", report.commit))
        }
        HistoryUpdate::Planned { added: true } => {
            ui::step_info(ctx, &format!("Commit {} would be recorded in history", report.commit))
        }
        HistoryUpdate::Planned { added: false } => {
            ui::step_info(ctx, &format!("Commit {} is already in history", report.commit))
        }
        HistoryUpdate::Skipped { reason } => {
            ui::step_warn_hint(ctx, "Commit history not updated", reason)
        }
    }
}
