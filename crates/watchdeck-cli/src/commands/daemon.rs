use super::context::AppContext;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use watchdeck_core::{FileSynchronizer, SyncTrigger, UpdateScanner};
use watchdeck_models::SyncOutcome;

async fn sync_pass(synchronizer: &FileSynchronizer, cancel: &CancellationToken) {
    match synchronizer.try_sync(cancel).await {
        None => info!(operation = "scheduled_sync", "Previous sync still running, skipped"),
        Some(SyncOutcome::Success(report)) => info!(
            operation = "scheduled_sync_complete",
            uploaded = report.uploaded.len(),
            downloaded = report.downloaded.len(),
            failed = report.failed.len(),
            "Sync completed"
        ),
        Some(SyncOutcome::Error(message)) => {
            error!(operation = "scheduled_sync_error", error = %message, "Sync failed")
        }
    }
}

/// Work the scheduled jobs share
struct DaemonTasks {
    scanner: UpdateScanner,
    synchronizer: Option<Arc<FileSynchronizer>>,
    trigger: Option<SyncTrigger>,
    cancel: CancellationToken,
}

impl DaemonTasks {
    async fn check_updates(&self) {
        info!(operation = "scheduled_check_start", "Starting update check");
        match self.scanner.run(&self.cancel, |_, _, _| {}).await {
            Ok(report) if report.cancelled => {
                info!(operation = "scheduled_check", "Update check cancelled");
            }
            Ok(report) => {
                info!(
                    operation = "scheduled_check_complete",
                    checked = report.checked,
                    pending = report.candidates.len(),
                    "Update check completed"
                );
                // The pending list file changed, push it once things settle
                if let Some(trigger) = &self.trigger {
                    trigger.request();
                }
            }
            Err(e) => error!(operation = "scheduled_check_error", error = %e, "Update check failed"),
        }
    }

    async fn sync(&self) {
        if let Some(synchronizer) = &self.synchronizer {
            sync_pass(synchronizer, &self.cancel).await;
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

pub async fn run_daemon(
    check_schedule: Option<String>,
    sync_schedule: Option<String>,
    no_startup_run: bool,
    output: &Output,
) -> Result<()> {
    let ctx = AppContext::load()?;
    let defaults = watchdeck_config::default_scheduler_config();
    let scheduler_config = ctx.config.scheduler.clone().unwrap_or(defaults);
    let check_schedule = check_schedule.unwrap_or(scheduler_config.update_check_schedule);
    let sync_schedule = sync_schedule.unwrap_or(scheduler_config.sync_schedule);
    let run_on_startup = scheduler_config.run_on_startup && !no_startup_run;

    let cancel = CancellationToken::new();
    let synchronizer = if ctx.config.sync.enabled {
        match ctx.storage() {
            Some(storage) => Some(ctx.synchronizer(storage)),
            None => {
                warn!("Sync is enabled but Dropbox is not configured; only update checks will run");
                None
            }
        }
    } else {
        None
    };

    let trigger = synchronizer.clone().map(|synchronizer| {
        let quiet_period = Duration::from_millis(ctx.config.sync.debounce_ms);
        let trigger_cancel = cancel.clone();
        let (trigger, _handle) = SyncTrigger::spawn(quiet_period, cancel.clone(), move || {
            let synchronizer = synchronizer.clone();
            let cancel = trigger_cancel.clone();
            async move { sync_pass(&synchronizer, &cancel).await }
        });
        trigger
    });

    let tasks = Arc::new(DaemonTasks {
        scanner: UpdateScanner::new(ctx.resolver(), ctx.library.clone()),
        synchronizer,
        trigger,
        cancel: cancel.clone(),
    });

    output.info(format!(
        "WatchDeck daemon running. Logs: {}",
        ctx.paths.daemon_log_file().display()
    ));

    if run_on_startup {
        info!(operation = "scheduler_startup", "Running initial sync and update check");
        tasks.sync().await;
        tasks.check_updates().await;
    }

    let mut scheduler = JobScheduler::new()
        .await
        .map_err(|e| eyre!("Failed to create scheduler: {}", e))?;

    let check_tasks = tasks.clone();
    let check_job = Job::new_async(check_schedule.as_str(), move |_uuid, _lock| {
        let tasks = check_tasks.clone();
        Box::pin(async move { tasks.check_updates().await })
    })
    .map_err(|e| eyre!("Invalid update check schedule '{}': {}", check_schedule, e))?;
    scheduler
        .add(check_job)
        .await
        .map_err(|e| eyre!("Failed to schedule update check: {}", e))?;

    if tasks.synchronizer.is_some() {
        let sync_tasks = tasks.clone();
        let sync_job = Job::new_async(sync_schedule.as_str(), move |_uuid, _lock| {
            let tasks = sync_tasks.clone();
            Box::pin(async move { tasks.sync().await })
        })
        .map_err(|e| eyre!("Invalid sync schedule '{}': {}", sync_schedule, e))?;
        scheduler
            .add(sync_job)
            .await
            .map_err(|e| eyre!("Failed to schedule sync: {}", e))?;
    }

    scheduler
        .start()
        .await
        .map_err(|e| eyre!("Failed to start scheduler: {}", e))?;
    info!(
        operation = "scheduler_started",
        check_schedule = %check_schedule,
        sync_schedule = %sync_schedule,
        sync_enabled = tasks.synchronizer.is_some(),
        "Scheduler started"
    );

    shutdown_signal().await?;
    info!(operation = "scheduler_shutdown", "Shutting down");
    cancel.cancel();
    scheduler
        .shutdown()
        .await
        .map_err(|e| eyre!("Failed to stop scheduler: {}", e))?;
    Ok(())
}
