// src/courses.rs

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::error::AppError;
use crate::media::{MediaService, delete_media_quietly, extract_media_ids, removed_media};
use crate::models::{Course, CourseType, Group, Media, Page, PageType, new_id};
use crate::permissions::{Ctx, MANAGE_ANY_COURSE, MANAGE_COURSE, PUBLISH_COURSE};
use crate::store::Store;
use crate::{certificates, lessons, responses};

/// Loads a course the caller may manage.
///
/// Callers that neither own the course nor hold `course:manage_any` get
/// `ItemNotFound`, the same as for a missing course, so course ids cannot be probed.
pub async fn get_course_or_throw(store: &dyn Store, ctx: &Ctx, course_id: &str) -> Result<Course, AppError> {
    let course = store
        .get_course(&ctx.domain, course_id)
        .await?
        .ok_or(AppError::ItemNotFound)?;

    if !ctx.can(&[MANAGE_ANY_COURSE]) {
        if course.creator_id != ctx.user_id() {
            return Err(AppError::ItemNotFound);
        }
        if !ctx.can(&[MANAGE_COURSE]) {
            return Err(AppError::ActionNotAllowed);
        }
    }

    Ok(course)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseInput {
    pub title: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub course_type: Option<CourseType>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub description: Option<Value>,
    #[serde(default)]
    pub certificate: bool,
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Creates a course with one empty section and its product page.
pub async fn create_course(store: &dyn Store, ctx: &Ctx, input: CreateCourseInput) -> Result<Course, AppError> {
    if !ctx.can(&[MANAGE_COURSE, MANAGE_ANY_COURSE]) {
        return Err(AppError::ActionNotAllowed);
    }
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title is required".into()));
    }

    let now = Utc::now();
    let course_id = new_id();
    let page = Page {
        page_id: new_id(),
        domain: ctx.domain.clone(),
        name: title.to_string(),
        page_type: PageType::Product,
        entity_id: Some(course_id.clone()),
        creator_id: ctx.user_id().to_string(),
        layout: json!([]),
        draft_layout: json!([]),
        published: false,
        deleteable: false,
    };

    let course = Course {
        course_id: course_id.clone(),
        domain: ctx.domain.clone(),
        title: title.to_string(),
        slug: format!("{}-{}", slugify(title), &course_id[..6]),
        creator_id: ctx.user_id().to_string(),
        published: false,
        course_type: input.course_type.unwrap_or_default(),
        description: input.description,
        featured_image: None,
        groups: vec![Group::new(responses::DEFAULT_GROUP_NAME, 0)],
        lessons: Vec::new(),
        page_id: Some(page.page_id.clone()),
        certificate: input.certificate,
        payment_plans: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    store.save_page(&page).await?;
    store.save_course(&course).await?;

    log::info!("course created domain={} course_id={}", ctx.domain, course_id);
    Ok(course)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub published: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub description: Option<Value>,
    /// Removes the description; `description: null` leaves it unchanged.
    #[serde(default)]
    pub clear_description: bool,
    #[schema(value_type = Option<Object>)]
    pub featured_image: Option<Media>,
    #[serde(default)]
    pub clear_featured_image: bool,
    pub certificate: Option<bool>,
}

/// Applies an edit and deletes media the edit orphaned: anything only the old
/// description referenced, and a replaced or cleared featured image.
pub async fn update_course(
    store: &dyn Store,
    media: &dyn MediaService,
    ctx: &Ctx,
    course_id: &str,
    input: UpdateCourseInput,
) -> Result<Course, AppError> {
    let mut course = get_course_or_throw(store, ctx, course_id).await?;
    let mut orphaned = BTreeSet::new();

    if let Some(title) = input.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("title is required".into()));
        }
        course.title = title.to_string();
    }

    if let Some(published) = input.published {
        if published != course.published && !ctx.can(&[PUBLISH_COURSE, MANAGE_ANY_COURSE]) {
            return Err(AppError::ActionNotAllowed);
        }
        course.published = published;
    }

    if input.clear_description || input.description.is_some() {
        if let Some(old) = course.description.take() {
            match &input.description {
                Some(new) => orphaned.extend(removed_media(&old, new)),
                None => orphaned.extend(extract_media_ids(&old)),
            }
        }
        course.description = input.description;
    }

    if input.clear_featured_image || input.featured_image.is_some() {
        if let Some(old) = course.featured_image.take() {
            let kept = input
                .featured_image
                .as_ref()
                .is_some_and(|new| new.media_id == old.media_id);
            if !kept {
                orphaned.insert(old.media_id);
            }
        }
        course.featured_image = input.featured_image;
    }

    if let Some(certificate) = input.certificate {
        course.certificate = certificate;
    }

    // Media still used elsewhere in the course is not orphaned.
    if let Some(image) = &course.featured_image {
        orphaned.remove(&image.media_id);
    }
    if let Some(description) = &course.description {
        for id in extract_media_ids(description) {
            orphaned.remove(&id);
        }
    }

    course.updated_at = Utc::now();
    store.save_course(&course).await?;

    for media_id in &orphaned {
        delete_media_quietly(media, &ctx.domain, media_id).await;
    }

    Ok(course)
}

/// Deletes a course and everything that references it, step by step.
///
/// There is no transaction: a failing step aborts the rest and leaves earlier
/// steps applied. Only media deletion failures are tolerated. Invoices and
/// payment-provider subscriptions for the course's memberships are left alone.
pub async fn delete_course(
    store: &dyn Store,
    media: &dyn MediaService,
    ctx: &Ctx,
    course_id: &str,
) -> Result<bool, AppError> {
    let course = get_course_or_throw(store, ctx, course_id).await?;
    let domain = ctx.domain.as_str();

    certificates::remove_for_course(store, media, domain, course_id).await?;

    let memberships = store.delete_memberships_for_entity(domain, course_id).await?;
    let plans = store.delete_payment_plans_for_entity(domain, course_id).await?;
    let bundles = store.remove_included_product(domain, course_id).await?;

    let activities = store
        .delete_activities_referencing(domain, course_id, "courseId")
        .await?;

    let course_lessons = store.lessons_for_course(domain, course_id).await?;
    for lesson in &course_lessons {
        lessons::purge_lesson(store, media, lesson).await?;
    }

    let mut course_media = BTreeSet::new();
    if let Some(image) = &course.featured_image {
        course_media.insert(image.media_id.clone());
    }
    if let Some(description) = &course.description {
        course_media.extend(extract_media_ids(description));
    }
    for media_id in &course_media {
        delete_media_quietly(media, domain, media_id).await;
    }

    let purchases = store.remove_purchases_for_course(domain, course_id).await?;

    if let Some(page_id) = &course.page_id {
        store.delete_page(domain, page_id).await?;
    }

    store.delete_course(domain, course_id).await?;

    log::info!(
        "course deleted domain={} course_id={} lessons={} memberships={} plans={} bundles={} activities={} purchases={}",
        domain,
        course_id,
        course_lessons.len(),
        memberships,
        plans,
        bundles,
        activities,
        purchases
    );
    Ok(true)
}
