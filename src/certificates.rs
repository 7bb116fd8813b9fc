// src/certificates.rs

use chrono::Utc;
use serde_json::json;

use crate::activities;
use crate::error::AppError;
use crate::media::{MediaService, delete_media_quietly};
use crate::models::{ActivityType, Certificate, Course, new_id};
use crate::store::Store;

/// Removes the course's certificate template, the media it points at, and every
/// certificate issued for the course.
pub async fn remove_for_course(
    store: &dyn Store,
    media: &dyn MediaService,
    domain: &str,
    course_id: &str,
) -> Result<(), AppError> {
    if let Some(template) = store.get_certificate_template(domain, course_id).await? {
        for m in template.media() {
            delete_media_quietly(media, domain, &m.media_id).await;
        }
        store
            .delete_certificate_template(domain, &template.template_id)
            .await?;
    }

    let issued = store.delete_certificates_for_course(domain, course_id).await?;
    log::info!("certificates removed course_id={course_id} issued={issued}");
    Ok(())
}

/// Issues (or returns the existing) certificate for a learner who finished `course`.
/// Nothing is issued unless the course offers certificates and has a template.
pub async fn issue(
    store: &dyn Store,
    user_id: &str,
    course: &Course,
) -> Result<Option<Certificate>, AppError> {
    if !course.certificate {
        return Ok(None);
    }
    let domain = &course.domain;
    if store
        .get_certificate_template(domain, &course.course_id)
        .await?
        .is_none()
    {
        log::warn!("course offers certificates without a template course_id={}", course.course_id);
        return Ok(None);
    }

    if let Some(existing) = store.find_certificate(domain, user_id, &course.course_id).await? {
        return Ok(Some(existing));
    }

    let certificate = Certificate {
        certificate_id: new_id(),
        domain: domain.clone(),
        user_id: user_id.to_string(),
        course_id: course.course_id.clone(),
        created_at: Utc::now(),
    };
    store.save_certificate(&certificate).await?;

    activities::record(
        store,
        domain,
        user_id,
        ActivityType::CertificateIssued,
        Some(&certificate.certificate_id),
        json!({ "courseId": course.course_id }),
    )
    .await?;

    Ok(Some(certificate))
}
