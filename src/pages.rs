// src/pages.rs

use serde_json::Value;

use crate::courses::get_course_or_throw;
use crate::error::AppError;
use crate::media::{MediaService, delete_media_quietly, removed_media, removed_media_keeping};
use crate::models::{Page, PageType};
use crate::permissions::{Ctx, MANAGE_SITE};
use crate::store::Store;

/// Site managers edit every page; product pages are also editable by whoever
/// may manage the course behind them.
async fn get_page_or_throw(store: &dyn Store, ctx: &Ctx, page_id: &str) -> Result<Page, AppError> {
    let page = store
        .get_page(&ctx.domain, page_id)
        .await?
        .ok_or(AppError::ItemNotFound)?;

    if ctx.can(&[MANAGE_SITE]) {
        return Ok(page);
    }

    match (&page.page_type, &page.entity_id) {
        (PageType::Product, Some(course_id)) => {
            get_course_or_throw(store, ctx, course_id).await?;
            Ok(page)
        }
        _ => Err(AppError::ItemNotFound),
    }
}

/// Replaces the draft layout. Media dropped from the draft is deleted unless the
/// published layout still shows it.
pub async fn update_page_draft(
    store: &dyn Store,
    media: &dyn MediaService,
    ctx: &Ctx,
    page_id: &str,
    draft_layout: Value,
) -> Result<Page, AppError> {
    let mut page = get_page_or_throw(store, ctx, page_id).await?;

    let orphaned = removed_media_keeping(&page.draft_layout, &draft_layout, &page.layout);
    page.draft_layout = draft_layout;
    store.save_page(&page).await?;

    for media_id in &orphaned {
        delete_media_quietly(media, &ctx.domain, media_id).await;
    }
    Ok(page)
}

/// Promotes the draft to the published layout. Media only the old published
/// layout used is deleted.
pub async fn publish_page(
    store: &dyn Store,
    media: &dyn MediaService,
    ctx: &Ctx,
    page_id: &str,
) -> Result<Page, AppError> {
    let mut page = get_page_or_throw(store, ctx, page_id).await?;

    let orphaned = removed_media(&page.layout, &page.draft_layout);
    page.layout = page.draft_layout.clone();
    page.published = true;
    store.save_page(&page).await?;

    log::info!(
        "page published domain={} page_id={} orphaned_media={}",
        ctx.domain,
        page_id,
        orphaned.len()
    );
    for media_id in &orphaned {
        delete_media_quietly(media, &ctx.domain, media_id).await;
    }
    Ok(page)
}
