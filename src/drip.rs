// src/drip.rs

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::AppError;
use crate::models::{Course, DripType, Group, Progress, User};
use crate::store::Store;

/// A group is open when it is not dripped, or when the learner's progress lists it.
pub fn is_group_accessible(group: &Group, progress: &Progress) -> bool {
    !group.is_dripped() || progress.accessible_groups.iter().any(|g| g == &group.id)
}

/// When a dripped group opens for a learner who enrolled at `enrolled_at`.
pub fn release_at(group: &Group, enrolled_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let drip = group.drip.as_ref().filter(|d| d.status)?;
    match drip.drip_type {
        DripType::RelativeDate => {
            let delay = drip.delay_in_millis?;
            enrolled_at.checked_add_signed(Duration::milliseconds(delay))
        }
        DripType::ExactDate => Utc.timestamp_millis_opt(drip.date_in_utc?).single(),
    }
}

/// Dripped groups that should be open by `now` but are not yet, in rank order.
pub fn due_groups(course: &Course, progress: &Progress, now: DateTime<Utc>) -> Vec<String> {
    let mut groups: Vec<&Group> = course
        .groups
        .iter()
        .filter(|g| g.is_dripped() && !is_group_accessible(g, progress))
        .filter(|g| release_at(g, progress.enrolled_at).is_some_and(|at| at <= now))
        .collect();
    groups.sort_by_key(|g| g.rank);
    groups.into_iter().map(|g| g.id.clone()).collect()
}

/// Groups a learner can open the moment they enrol.
pub fn initially_accessible_groups(course: &Course) -> Vec<String> {
    course
        .groups
        .iter()
        .filter(|g| !g.is_dripped())
        .map(|g| g.id.clone())
        .collect()
}

/// Opens every due group on `user`'s progress for `course` and persists it.
/// Returns the ids that were opened.
pub async fn release_due_groups(
    store: &dyn Store,
    user: &mut User,
    course: &Course,
    now: DateTime<Utc>,
) -> Result<Vec<String>, AppError> {
    let Some(progress) = user.purchase_mut(&course.course_id) else {
        return Ok(Vec::new());
    };

    let due = due_groups(course, progress, now);
    if due.is_empty() {
        return Ok(due);
    }

    progress.accessible_groups.extend(due.iter().cloned());
    store.save_user(user).await?;

    log::info!(
        "drip released user_id={} course_id={} groups={:?}",
        user.user_id,
        course.course_id,
        due
    );
    Ok(due)
}
