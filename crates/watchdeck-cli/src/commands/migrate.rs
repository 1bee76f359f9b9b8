use super::context::AppContext;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Run the legacy import again, for a list copied in after first start
pub async fn run_migrate(output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let imported = ctx.library.migrate_legacy()?;
    ctx.preferences
        .set_migration_completed(true)
        .map_err(|e| eyre!("Failed to record migration flag: {}", e))?;

    if imported == 0 {
        output.info("Nothing to migrate");
    } else {
        output.success(format!("Imported {} titles from the legacy list", imported));
    }
    Ok(())
}
