//! Document persistence.
//!
//! Every collection is a set of JSON documents keyed by id and scoped by tenant
//! `domain`. `PgStore` keeps them in Postgres JSONB columns, `MemoryStore` keeps
//! them in process for tests and local runs.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PgStore;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StoreError;
use crate::models::{
    Activity, Certificate, CertificateTemplate, Course, Invoice, Lesson, LessonEvaluation,
    Membership, Page, PaymentPlan, User,
};

/// A document type stored in its own collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
    fn domain(&self) -> &str;
}

macro_rules! document {
    ($ty:ty, $collection:literal, $id:ident) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> &str {
                &self.$id
            }

            fn domain(&self) -> &str {
                &self.domain
            }
        }
    };
}

document!(Course, "courses", course_id);
document!(Lesson, "lessons", lesson_id);
document!(LessonEvaluation, "lesson_evaluations", evaluation_id);
document!(CertificateTemplate, "certificate_templates", template_id);
document!(Certificate, "certificates", certificate_id);
document!(Membership, "memberships", membership_id);
document!(PaymentPlan, "payment_plans", plan_id);
document!(Activity, "activities", activity_id);
document!(User, "users", user_id);
document!(Page, "pages", page_id);
document!(Invoice, "invoices", invoice_id);

/// Bulk operations return the number of documents they touched.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_course(&self, domain: &str, course_id: &str) -> Result<Option<Course>, StoreError>;
    async fn save_course(&self, course: &Course) -> Result<(), StoreError>;
    async fn delete_course(&self, domain: &str, course_id: &str) -> Result<bool, StoreError>;

    async fn get_lesson(&self, domain: &str, lesson_id: &str) -> Result<Option<Lesson>, StoreError>;
    async fn lessons_for_course(&self, domain: &str, course_id: &str) -> Result<Vec<Lesson>, StoreError>;
    async fn save_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;
    async fn delete_lesson(&self, domain: &str, lesson_id: &str) -> Result<bool, StoreError>;

    async fn save_evaluation(&self, evaluation: &LessonEvaluation) -> Result<(), StoreError>;
    async fn latest_evaluation(
        &self,
        domain: &str,
        lesson_id: &str,
        user_id: &str,
    ) -> Result<Option<LessonEvaluation>, StoreError>;
    async fn delete_evaluations_for_lesson(&self, domain: &str, lesson_id: &str) -> Result<u64, StoreError>;

    async fn get_certificate_template(
        &self,
        domain: &str,
        course_id: &str,
    ) -> Result<Option<CertificateTemplate>, StoreError>;
    async fn save_certificate_template(&self, template: &CertificateTemplate) -> Result<(), StoreError>;
    async fn delete_certificate_template(&self, domain: &str, template_id: &str) -> Result<bool, StoreError>;
    async fn find_certificate(
        &self,
        domain: &str,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>, StoreError>;
    async fn save_certificate(&self, certificate: &Certificate) -> Result<(), StoreError>;
    async fn delete_certificates_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError>;

    async fn get_membership(&self, domain: &str, membership_id: &str) -> Result<Option<Membership>, StoreError>;
    async fn find_membership(
        &self,
        domain: &str,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<Membership>, StoreError>;
    async fn save_membership(&self, membership: &Membership) -> Result<(), StoreError>;
    async fn delete_memberships_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError>;

    async fn get_payment_plan(&self, domain: &str, plan_id: &str) -> Result<Option<PaymentPlan>, StoreError>;
    async fn save_payment_plan(&self, plan: &PaymentPlan) -> Result<(), StoreError>;
    async fn delete_payment_plans_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError>;
    /// Pulls `product_id` out of every plan's `includedProducts` without deleting the plans.
    async fn remove_included_product(&self, domain: &str, product_id: &str) -> Result<u64, StoreError>;

    async fn save_activity(&self, activity: &Activity) -> Result<(), StoreError>;
    async fn activities_for_user(&self, domain: &str, user_id: &str) -> Result<Vec<Activity>, StoreError>;
    /// Deletes activities whose `entityId` is `id` or whose `metadata[metadata_key]` is `id`.
    async fn delete_activities_referencing(
        &self,
        domain: &str,
        id: &str,
        metadata_key: &str,
    ) -> Result<u64, StoreError>;

    async fn get_user(&self, domain: &str, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_unsubscribe_token(&self, token: &str) -> Result<Option<User>, StoreError>;
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;
    async fn remove_purchases_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError>;
    async fn remove_completed_lesson(
        &self,
        domain: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<u64, StoreError>;

    async fn get_page(&self, domain: &str, page_id: &str) -> Result<Option<Page>, StoreError>;
    async fn save_page(&self, page: &Page) -> Result<(), StoreError>;
    async fn delete_page(&self, domain: &str, page_id: &str) -> Result<bool, StoreError>;

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError>;
    async fn find_invoice_by_transaction(
        &self,
        domain: &str,
        processor: &str,
        transaction_id: &str,
    ) -> Result<Option<Invoice>, StoreError>;
    async fn invoices_for_membership(&self, domain: &str, membership_id: &str) -> Result<Vec<Invoice>, StoreError>;
}
