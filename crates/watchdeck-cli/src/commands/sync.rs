use super::context::{no_storage_error, AppContext};
use super::updates::cancel_on_ctrl_c;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Table;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use watchdeck_core::Transfer;
use watchdeck_models::{SyncOutcome, SyncReport};
use watchdeck_sources::RemoteStorage;

fn report_summary(report: &SyncReport) -> String {
    format!(
        "{:?}: {} uploaded, {} downloaded, {} unchanged, {} failed",
        report.scenario,
        report.uploaded.len(),
        report.downloaded.len(),
        report.skipped,
        report.failed.len()
    )
}

pub async fn run_sync(status: bool, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let storage = ctx.storage().ok_or_else(no_storage_error)?;
    if !ctx.config.sync.enabled {
        output.warn("Sync is disabled in the config; running a one-off pass anyway");
    }
    let synchronizer = ctx.synchronizer(storage.clone());

    if status {
        return show_status(&ctx, storage.as_ref(), &synchronizer, output).await;
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let outcome = synchronizer
        .try_sync(&cancel)
        .await
        .ok_or_else(|| eyre!("Another sync is already running"))?;

    if !output.is_human() {
        output.json(&serde_json::to_value(&outcome)?);
        return Ok(());
    }

    match outcome {
        SyncOutcome::Success(report) => {
            if report.cancelled {
                output.warn(format!("Sync cancelled. {}", report_summary(&report)));
            } else {
                output.success(format!("Sync completed. {}", report_summary(&report)));
            }
            for file in &report.failed {
                output.warn(format!("Failed: {}", file));
            }
            Ok(())
        }
        SyncOutcome::Error(message) => Err(eyre!("Sync failed: {}", message)),
    }
}

async fn show_status(
    ctx: &AppContext,
    storage: &dyn RemoteStorage,
    synchronizer: &watchdeck_core::FileSynchronizer,
    output: &Output,
) -> Result<()> {
    let plan = synchronizer.plan().await?;
    let settings = synchronizer.settings();
    let titles_remote = match settings.state_files.first() {
        Some(name) => storage.metadata(&settings.remote_path(name)).await?,
        None => None,
    };
    let last_sync = synchronizer.last_sync();

    if !output.is_human() {
        let steps: Vec<_> = plan
            .steps
            .iter()
            .map(|s| json!({ "file": s.relative, "transfer": format!("{:?}", s.transfer) }))
            .collect();
        output.json(&json!({
            "scenario": plan.scenario,
            "last_sync": last_sync,
            "remote_root": settings.remote_root,
            "remote_state_modified": titles_remote.map(|r| r.server_modified),
            "transfers": steps,
            "unchanged": plan.skipped,
        }));
        return Ok(());
    }

    output.info(format!("Library folder: {}", ctx.paths.library_dir().display()));
    output.info(format!(
        "Remote folder: {}",
        if settings.remote_root.is_empty() { "/" } else { &settings.remote_root }
    ));
    match last_sync {
        Some(at) => output.info(format!("Last sync: {}", at.to_rfc3339())),
        None => output.info("Last sync: never"),
    }
    if let Some(record) = titles_remote {
        output.info(format!("Remote {} modified {}", record.name, record.server_modified.to_rfc3339()));
    }

    if plan.steps.is_empty() {
        output.success(format!("Everything is in sync ({} files unchanged)", plan.skipped));
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec!["File", "Action"]);
    for step in &plan.steps {
        let action = match step.transfer {
            Transfer::Upload => "upload",
            Transfer::Download => "download",
            Transfer::Skip => "skip",
        };
        table.add_row(vec![step.relative.as_str(), action]);
    }
    output.println(table.to_string());
    output.info(format!("{:?}: {} transfers pending", plan.scenario, plan.steps.len()));
    Ok(())
}
