// src/lessons.rs

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

use crate::courses::get_course_or_throw;
use crate::drip::{is_group_accessible, release_due_groups};
use crate::error::AppError;
use crate::media::{MediaService, delete_media_quietly, extract_media_ids};
use crate::models::{
    ActivityType, Course, Lesson, LessonEvaluation, LessonType, Media, Progress, User, new_id,
};
use crate::permissions::Ctx;
use crate::scorm::{self, ScormOutcome};
use crate::store::Store;
use crate::{activities, certificates};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLessonInput {
    pub title: String,
    pub group_id: String,
    #[serde(default, rename = "type")]
    #[schema(value_type = Option<String>)]
    pub lesson_type: Option<LessonType>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub content: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub media: Option<Media>,
    #[serde(default)]
    pub published: bool,
    pub requires_enrollment: Option<bool>,
}

pub async fn create_lesson(
    store: &dyn Store,
    ctx: &Ctx,
    course_id: &str,
    input: CreateLessonInput,
) -> Result<Lesson, AppError> {
    let mut course = get_course_or_throw(store, ctx, course_id).await?;
    let title = input.title.trim();
    if title.is_empty() {
        return Err(AppError::InvalidInput("title is required".into()));
    }

    let lesson = Lesson {
        lesson_id: new_id(),
        domain: ctx.domain.clone(),
        title: title.to_string(),
        course_id: course.course_id.clone(),
        group_id: input.group_id.clone(),
        creator_id: ctx.user_id().to_string(),
        lesson_type: input.lesson_type.unwrap_or_default(),
        content: input.content.unwrap_or_else(|| json!({})),
        media: input.media,
        published: input.published,
        requires_enrollment: input.requires_enrollment.unwrap_or(true),
    };

    let group = course
        .group_mut(&input.group_id)
        .ok_or(AppError::GroupNotFound)?;
    group.lessons_order.push(lesson.lesson_id.clone());
    course.lessons.push(lesson.lesson_id.clone());
    course.updated_at = Utc::now();

    store.save_lesson(&lesson).await?;
    store.save_course(&course).await?;

    Ok(lesson)
}

/// Deletes one lesson's dependents and the lesson document. Course lists and
/// learner progress are the caller's concern.
pub(crate) async fn purge_lesson(
    store: &dyn Store,
    media: &dyn MediaService,
    lesson: &Lesson,
) -> Result<(), AppError> {
    let domain = lesson.domain.as_str();
    let lesson_id = lesson.lesson_id.as_str();

    store.delete_evaluations_for_lesson(domain, lesson_id).await?;
    store
        .delete_activities_referencing(domain, lesson_id, "lessonId")
        .await?;

    let mut lesson_media: BTreeSet<String> = extract_media_ids(&lesson.content);
    if let Some(m) = &lesson.media {
        lesson_media.insert(m.media_id.clone());
    }
    for media_id in &lesson_media {
        delete_media_quietly(media, domain, media_id).await;
    }

    store.delete_lesson(domain, lesson_id).await?;
    log::info!("lesson purged course_id={} lesson_id={}", lesson.course_id, lesson_id);
    Ok(())
}

pub async fn delete_lesson(
    store: &dyn Store,
    media: &dyn MediaService,
    ctx: &Ctx,
    lesson_id: &str,
) -> Result<bool, AppError> {
    let lesson = store
        .get_lesson(&ctx.domain, lesson_id)
        .await?
        .ok_or(AppError::ItemNotFound)?;
    let mut course = get_course_or_throw(store, ctx, &lesson.course_id).await?;

    purge_lesson(store, media, &lesson).await?;

    course.lessons.retain(|id| id != lesson_id);
    for group in &mut course.groups {
        group.lessons_order.retain(|id| id != lesson_id);
    }
    course.updated_at = Utc::now();
    store.save_course(&course).await?;

    store
        .remove_completed_lesson(&ctx.domain, &course.course_id, lesson_id)
        .await?;

    Ok(true)
}

/// Lesson ids in the order a learner walks them: sections by rank, then any
/// lesson not placed in a section.
pub fn ordered_lessons(course: &Course) -> Vec<String> {
    let mut groups: Vec<_> = course.groups.iter().collect();
    groups.sort_by_key(|g| g.rank);

    let mut order: Vec<String> = groups
        .iter()
        .flat_map(|g| g.lessons_order.iter().cloned())
        .filter(|id| course.lessons.contains(id))
        .collect();
    for id in &course.lessons {
        if !order.contains(id) {
            order.push(id.clone());
        }
    }
    order
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
    #[schema(value_type = Object)]
    pub lesson: Lesson,
    pub prev_lesson: Option<String>,
    pub next_lesson: Option<String>,
}

struct Access {
    lesson: Lesson,
    course: Course,
    user: User,
}

/// Resolves a lesson for a learner: published, enrolled, and its section released.
async fn learner_access(store: &dyn Store, ctx: &Ctx, lesson_id: &str) -> Result<Access, AppError> {
    let domain = ctx.domain.as_str();
    let lesson = store
        .get_lesson(domain, lesson_id)
        .await?
        .ok_or(AppError::ItemNotFound)?;
    let course = store
        .get_course(domain, &lesson.course_id)
        .await?
        .ok_or(AppError::ItemNotFound)?;
    if !lesson.published || !course.published {
        return Err(AppError::ItemNotFound);
    }

    let mut user = store
        .get_user(domain, ctx.user_id())
        .await?
        .ok_or(AppError::ItemNotFound)?;

    if user.purchase(&course.course_id).is_none() {
        if lesson.requires_enrollment {
            return Err(AppError::NotEnrolled);
        }
        return Ok(Access { lesson, course, user });
    }

    release_due_groups(store, &mut user, &course, Utc::now()).await?;

    if let (Some(group), Some(progress)) = (course.group(&lesson.group_id), user.purchase(&course.course_id)) {
        if !is_group_accessible(group, progress) {
            return Err(AppError::DripNotReleased);
        }
    }

    Ok(Access { lesson, course, user })
}

pub async fn get_lesson_details(store: &dyn Store, ctx: &Ctx, lesson_id: &str) -> Result<LessonView, AppError> {
    let Access { lesson, course, mut user } = learner_access(store, ctx, lesson_id).await?;

    if let Some(progress) = user.purchase_mut(&course.course_id) {
        if progress.last_accessed_lesson.as_deref() != Some(lesson_id) {
            progress.last_accessed_lesson = Some(lesson_id.to_string());
            store.save_user(&user).await?;
        }
    }

    let order = ordered_lessons(&course);
    let position = order.iter().position(|id| id == lesson_id);
    let prev_lesson = position
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| order.get(i))
        .cloned();
    let next_lesson = position.and_then(|i| order.get(i + 1)).cloned();

    Ok(LessonView {
        lesson,
        prev_lesson,
        next_lesson,
    })
}

/// Stores runtime state posted by the SCORM player and returns where it now stands.
pub async fn record_scorm_state(
    store: &dyn Store,
    ctx: &Ctx,
    lesson_id: &str,
    state: Value,
) -> Result<ScormOutcome, AppError> {
    let Access { lesson, course, mut user } = learner_access(store, ctx, lesson_id).await?;
    if lesson.lesson_type != LessonType::Scorm {
        return Err(AppError::InvalidInput("lesson is not a SCORM package".into()));
    }
    let progress = user
        .purchase_mut(&course.course_id)
        .ok_or(AppError::NotEnrolled)?;

    let scorm_data = progress.scorm_data.get_or_insert_with(|| json!({}));
    if !scorm_data.is_object() {
        *scorm_data = json!({});
    }
    let lessons = scorm_data
        .as_object_mut()
        .map(|o| o.entry("lessons").or_insert_with(|| json!({})));
    let Some(lessons) = lessons else {
        return Err(AppError::InvalidInput("malformed SCORM data".into()));
    };
    if !lessons.is_object() {
        *lessons = json!({});
    }
    let slot = lessons
        .as_object_mut()
        .map(|o| o.entry(lesson_id.to_string()).or_insert_with(|| json!({})));
    let Some(slot) = slot else {
        return Err(AppError::InvalidInput("malformed SCORM data".into()));
    };
    scorm::merge_state(slot, state);
    let outcome = scorm::evaluate(slot);

    store.save_user(&user).await?;
    Ok(outcome)
}

fn scorm_state<'a>(progress: &'a Progress, lesson_id: &str) -> Option<&'a Value> {
    progress.scorm_data.as_ref()?.get("lessons")?.get(lesson_id)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuizAnswers {
    /// Selected option indexes, one list per question.
    pub answers: Vec<Vec<usize>>,
}

/// Grades quiz content shaped as
/// `{"questions": [{"options": [{"correctAnswer": bool}]}], "requiresPassingGrade": bool, "passingGrade": 0-100}`.
pub fn grade_quiz(content: &Value, answers: &[Vec<usize>]) -> (bool, f64) {
    let questions = content
        .get("questions")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if questions.is_empty() {
        return (true, 100.0);
    }

    let correct = questions
        .iter()
        .enumerate()
        .filter(|(i, question)| {
            let expected: BTreeSet<usize> = question
                .get("options")
                .and_then(Value::as_array)
                .map(|options| {
                    options
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| o.get("correctAnswer").and_then(Value::as_bool) == Some(true))
                        .map(|(j, _)| j)
                        .collect()
                })
                .unwrap_or_default();
            let given: BTreeSet<usize> = answers.get(*i).map(|a| a.iter().copied().collect()).unwrap_or_default();
            expected == given
        })
        .count();

    let score = correct as f64 * 100.0 / questions.len() as f64;
    let requires_grade = content
        .get("requiresPassingGrade")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let passing = content.get("passingGrade").and_then(Value::as_f64).unwrap_or(0.0);
    let pass = !requires_grade || score >= passing;
    (pass, score)
}

pub async fn evaluate_quiz(
    store: &dyn Store,
    ctx: &Ctx,
    lesson_id: &str,
    answers: QuizAnswers,
) -> Result<LessonEvaluation, AppError> {
    let Access { lesson, .. } = learner_access(store, ctx, lesson_id).await?;
    if lesson.lesson_type != LessonType::Quiz {
        return Err(AppError::InvalidInput("lesson is not a quiz".into()));
    }

    let (pass, score) = grade_quiz(&lesson.content, &answers.answers);
    let evaluation = LessonEvaluation {
        evaluation_id: new_id(),
        domain: ctx.domain.clone(),
        lesson_id: lesson.lesson_id.clone(),
        user_id: ctx.user_id().to_string(),
        pass,
        score: Some(score),
        created_at: Utc::now(),
    };
    store.save_evaluation(&evaluation).await?;
    Ok(evaluation)
}

pub async fn mark_lesson_completed(store: &dyn Store, ctx: &Ctx, lesson_id: &str) -> Result<Progress, AppError> {
    let Access { lesson, course, mut user } = learner_access(store, ctx, lesson_id).await?;
    let domain = ctx.domain.as_str();

    let progress = user
        .purchase(&course.course_id)
        .ok_or(AppError::NotEnrolled)?;

    match lesson.lesson_type {
        LessonType::Scorm => {
            let outcome = scorm_state(progress, lesson_id)
                .map(scorm::evaluate)
                .unwrap_or(ScormOutcome::NotAttempted);
            if !outcome.is_complete() {
                return Err(AppError::ScormIncomplete);
            }
        }
        LessonType::Quiz => {
            let passed = store
                .latest_evaluation(domain, lesson_id, ctx.user_id())
                .await?
                .is_some_and(|e| e.pass);
            if !passed {
                return Err(AppError::QuizNotPassed);
            }
        }
        _ => {}
    }

    let progress = user
        .purchase_mut(&course.course_id)
        .ok_or(AppError::NotEnrolled)?;
    if progress.completed_lessons.iter().any(|id| id == lesson_id) {
        return Ok(progress.clone());
    }
    progress.completed_lessons.push(lesson_id.to_string());
    let finished = course
        .lessons
        .iter()
        .all(|id| progress.completed_lessons.contains(id));
    let snapshot = progress.clone();
    store.save_user(&user).await?;

    activities::record(
        store,
        domain,
        ctx.user_id(),
        ActivityType::LessonCompleted,
        Some(lesson_id),
        json!({ "courseId": course.course_id, "lessonId": lesson_id }),
    )
    .await?;

    if finished {
        activities::record(
            store,
            domain,
            ctx.user_id(),
            ActivityType::CourseCompleted,
            Some(&course.course_id),
            json!({}),
        )
        .await?;
        certificates::issue(store, ctx.user_id(), &course).await?;
    }

    Ok(snapshot)
}
