use super::context::{short_id, AppContext};
use crate::output::Output;
use crate::TitleKind;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use comfy_table::{Cell, Color, Table};
use serde_json::json;
use std::path::{Path, PathBuf};
use watchdeck_core::new_title_id;
use watchdeck_models::TrackedTitle;

pub struct NewTitle {
    pub title: String,
    pub kind: TitleKind,
    pub episodes: u32,
    pub rating: u8,
    pub tags: Vec<String>,
    pub image: Option<PathBuf>,
    pub favorite: bool,
}

/// Next free numeric file name in the image folder ("7.jpg" after "6.png")
fn next_image_name(images_dir: &Path, source: &Path) -> Result<String> {
    let mut existing: Vec<String> = Vec::new();
    if images_dir.exists() {
        for entry in std::fs::read_dir(images_dir)? {
            if let Some(name) = entry?.file_name().to_str() {
                existing.push(name.to_string());
            }
        }
    }

    let next = existing
        .iter()
        .filter_map(|name| Path::new(name).file_stem()?.to_str()?.parse::<u64>().ok())
        .max()
        .map_or(1, |n| n + 1);
    let extension = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "jpg".to_string());
    Ok(format!("{}.{}", next, extension))
}

pub async fn run_add(new_title: NewTitle, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let name = new_title.title.trim();
    if name.is_empty() {
        return Err(eyre!("Title cannot be empty"));
    }

    let existing = ctx.library.load_titles()?;
    if existing.iter().any(|t| t.title.eq_ignore_ascii_case(name)) {
        output.warn(format!("'{}' is already in the library", name));
        return Ok(());
    }

    let mut title = TrackedTitle::new(new_title_id(), name, new_title.kind.category());
    title.episode_count = new_title.episodes;
    title.set_rating(new_title.rating);
    title.is_favorite = new_title.favorite;
    for tag in &new_title.tags {
        title.add_tag(tag);
    }

    if let Some(source) = &new_title.image {
        let images_dir = ctx.paths.images_dir(&ctx.config.sync.images_dir);
        std::fs::create_dir_all(&images_dir)?;
        let file_name = next_image_name(&images_dir, source)?;
        std::fs::copy(source, images_dir.join(&file_name))
            .wrap_err_with(|| format!("Failed to copy image {}", source.display()))?;
        title.image_reference = Some(file_name);
    }

    let title = ctx.library.add_title(title)?;
    if output.is_human() {
        output.success(format!("Added '{}' ({})", title.title, short_id(&title.id)));
    } else {
        output.json(&serde_json::to_value(&title)?);
    }
    Ok(())
}

pub async fn run_list(tag: Option<String>, favorites: bool, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let pending = ctx.library.load_pending()?;
    let titles: Vec<TrackedTitle> = ctx
        .library
        .load_titles()?
        .into_iter()
        .filter(|t| !favorites || t.is_favorite)
        .filter(|t| tag.as_ref().map_or(true, |tag| t.tags.iter().any(|x| x == tag)))
        .collect();

    if !output.is_human() {
        output.json(&json!({ "titles": titles, "pending_updates": pending.len() }));
        return Ok(());
    }

    if titles.is_empty() {
        output.info("The library is empty. Add something with 'watchdeck add <title>'.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec!["Id", "Title", "Kind", "Episodes", "Rating", "Tags"]);
    for title in &titles {
        let has_update = pending.iter().any(|c| c.title_id == title.id);
        let episodes = if has_update {
            Cell::new(format!("{} (update)", title.episode_count)).fg(Color::Yellow)
        } else {
            Cell::new(title.episode_count)
        };
        let name = if title.is_favorite {
            format!("★ {}", title.title)
        } else {
            title.title.clone()
        };
        table.add_row(vec![
            Cell::new(short_id(&title.id)),
            Cell::new(name),
            Cell::new(title.content_type()),
            episodes,
            Cell::new("★".repeat(title.rating as usize)),
            Cell::new(title.tags.join(", ")),
        ]);
    }
    output.println(table.to_string());
    output.info(format!("{} titles, {} pending updates", titles.len(), pending.len()));
    Ok(())
}

pub async fn run_remove(id: &str, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let id = ctx.resolve_title_id(id)?;
    let removed = ctx.library.remove_title(&id)?;

    if let Some(image) = &removed.image_reference {
        let path = ctx.paths.images_dir(&ctx.config.sync.images_dir).join(image);
        if path.exists() {
            std::fs::remove_file(&path)
                .wrap_err_with(|| format!("Removed title but could not delete {}", path.display()))?;
        }
    }

    output.success(format!("Removed '{}'", removed.title));
    Ok(())
}

pub async fn run_set_episodes(id: &str, episodes: u32, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    let id = ctx.resolve_title_id(id)?;
    let updated = ctx.library.update_title(&id, |t| t.episode_count = episodes)?;

    // A pending proposal at or below the new count is stale now
    let pending = ctx.library.load_pending()?;
    ctx.library.replace_pending(pending)?;

    output.success(format!("'{}' is now at {} episodes", updated.title, updated.episode_count));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_next_image_name_continues_numbering() {
        let dir = TempDir::new().unwrap();
        for name in ["1.jpg", "2.png", "10.jpg", "cover.jpg"] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let name = next_image_name(dir.path(), Path::new("/tmp/poster.PNG")).unwrap();
        assert_eq!(name, "11.png");
    }

    #[test]
    fn test_next_image_name_empty_dir() {
        let dir = TempDir::new().unwrap();
        let name = next_image_name(&dir.path().join("missing"), Path::new("poster")).unwrap();
        assert_eq!(name, "1.jpg");
    }
}
