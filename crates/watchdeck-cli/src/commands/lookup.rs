use super::context::AppContext;
use crate::output::Output;
use crate::TitleKind;
use color_eyre::Result;
use serde_json::json;
use watchdeck_models::ContentType;

pub async fn run_lookup(title: &str, kind: TitleKind, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let resolver = ctx.resolver();
    let content_type = ContentType::from_category(kind.category());

    if !resolver.has_providers(content_type) {
        output.warn(format!("No provider is enabled for {}", content_type));
        return Ok(());
    }

    let finding = resolver
        .find_total_episodes(title, kind.category(), content_type)
        .await;

    if !output.is_human() {
        output.json(&json!({
            "title": title,
            "content_type": content_type,
            "finding": finding,
        }));
        return Ok(());
    }

    match finding {
        Some(finding) => output.success(format!(
            "{}: {} episodes (via {})",
            title, finding.episode_count, finding.source_name
        )),
        None => output.info(format!("No episode count found for '{}'", title)),
    }
    Ok(())
}
