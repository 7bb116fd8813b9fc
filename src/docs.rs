use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::courses::get_course,
        crate::api::courses::create_course,
        crate::api::courses::update_course,
        crate::api::courses::delete_course,
        crate::api::courses::create_lesson,
        crate::api::lessons::get_lesson,
        crate::api::lessons::delete_lesson,
        crate::api::lessons::complete_lesson,
        crate::api::lessons::evaluate_lesson,
        crate::api::lessons::put_scorm_state,
        crate::api::pages::save_draft,
        crate::api::pages::publish,
        crate::api::media::presigned_upload,
        crate::api::media::seal_media,
        crate::api::media::delete_media,
        crate::api::webhooks::payment_webhook,
        crate::api::webhooks::unsubscribe
    ),
    components(
        schemas(
            crate::courses::CreateCourseInput,
            crate::courses::UpdateCourseInput,
            crate::lessons::CreateLessonInput,
            crate::lessons::LessonView,
            crate::lessons::QuizAnswers,
            crate::media::PresignedUpload,
            crate::api::media::PresignRequest,
            crate::payments::PaymentEvent,
            crate::payments::PaymentStatus
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "courses", description = "Course authoring"),
        (name = "lessons", description = "Lessons, progress and grading"),
        (name = "pages", description = "Page drafts and publishing"),
        (name = "media", description = "Uploads to object storage"),
        (name = "webhooks", description = "Payment notifications and email links")
    )
)]
pub struct ApiDoc;
