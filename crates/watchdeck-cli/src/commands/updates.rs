use super::context::{short_id, AppContext};
use super::scan_ui::ScanUi;
use crate::output::Output;
use crate::UpdatesCommands;
use color_eyre::Result;
use comfy_table::{Cell, Color, Table};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use watchdeck_core::UpdateScanner;
use watchdeck_models::EpisodeUpdateCandidate;

fn candidates_table(candidates: &[EpisodeUpdateCandidate]) -> Table {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec!["Id", "Title", "Current", "New", "Source"]);
    for candidate in candidates {
        table.add_row(vec![
            Cell::new(short_id(&candidate.title_id)),
            Cell::new(&candidate.title),
            Cell::new(candidate.current_episode_count),
            Cell::new(candidate.proposed_episode_count).fg(Color::Green),
            Cell::new(&candidate.source_name),
        ]);
    }
    table
}

/// Cancel `token` on Ctrl-C so long scans stop between titles
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current item");
            token.cancel();
        }
    });
}

pub async fn run_check(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let scanner = UpdateScanner::new(ctx.resolver(), ctx.library.clone());

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let ui = ScanUi::new(output.is_human() && !output.is_quiet());
    let result = scanner
        .run(&cancel, |done, total, title| ui.update(done, total, title))
        .await;
    ui.finish();
    let report = result?;

    if !output.is_human() {
        output.json(&json!({
            "checked": report.checked,
            "cancelled": report.cancelled,
            "updates": report.candidates,
        }));
        return Ok(());
    }

    if report.cancelled {
        output.warn(format!(
            "Check cancelled after {} titles; pending updates were left unchanged",
            report.checked
        ));
        return Ok(());
    }
    if report.candidates.is_empty() {
        output.success(format!("Checked {} titles, no updates found", report.checked));
        return Ok(());
    }

    output.success(format!(
        "Checked {} titles, {} with new episodes",
        report.checked,
        report.candidates.len()
    ));
    output.println(candidates_table(&report.candidates).to_string());
    output.info("Apply with 'watchdeck updates accept <id>' or 'watchdeck updates accept-all'.");
    Ok(())
}

pub async fn run_updates(cmd: UpdatesCommands, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;

    match cmd {
        UpdatesCommands::List => {
            let pending = ctx.library.load_pending()?;
            if !output.is_human() {
                output.json(&json!({ "updates": pending }));
            } else if pending.is_empty() {
                output.info("No pending updates");
            } else {
                output.println(candidates_table(&pending).to_string());
            }
        }
        UpdatesCommands::Accept { id } => {
            let id = ctx.resolve_title_id(&id)?;
            let title = ctx.library.accept_update(&id)?;
            output.success(format!("'{}' updated to {} episodes", title.title, title.episode_count));
        }
        UpdatesCommands::Dismiss { id } => {
            let id = ctx.resolve_title_id(&id)?;
            let candidate = ctx.library.dismiss_update(&id)?;
            output.success(format!(
                "Dismissed {} episodes for '{}'",
                candidate.proposed_episode_count, candidate.title
            ));
        }
        UpdatesCommands::AcceptAll => {
            let pending = ctx.library.load_pending()?;
            let mut accepted = 0;
            for candidate in &pending {
                match ctx.library.accept_update(&candidate.title_id) {
                    Ok(_) => accepted += 1,
                    Err(e) => output.warn(format!("Skipped '{}': {}", candidate.title, e)),
                }
            }
            output.success(format!("Accepted {} of {} updates", accepted, pending.len()));
        }
    }
    Ok(())
}
