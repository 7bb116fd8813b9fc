// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::{Document, Store};
use crate::error::StoreError;
use crate::models::{
    Activity, Certificate, CertificateTemplate, Course, Invoice, Lesson, LessonEvaluation,
    Membership, Page, PaymentPlan, User,
};

/// Documents live in `<collection>(id, domain, doc JSONB)` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch<T: Document>(&self, domain: &str, id: &str) -> Result<Option<T>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE domain = $1 AND id = $2", T::COLLECTION);
        let row = sqlx::query(&sql)
            .bind(domain)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(decode).transpose()
    }

    /// `field` is always a literal from this file, never caller input.
    async fn fetch_by_field<T: Document>(
        &self,
        domain: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE domain = $1 AND doc->>'{field}' = $2",
            T::COLLECTION
        );
        let rows = sqlx::query(&sql)
            .bind(domain)
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn upsert<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        let sql = format!(
            r#"INSERT INTO {} (id, domain, doc)
               VALUES ($1, $2, $3)
               ON CONFLICT (id)
               DO UPDATE SET domain = EXCLUDED.domain, doc = EXCLUDED.doc, updated_at = NOW()"#,
            T::COLLECTION
        );
        sqlx::query(&sql)
            .bind(doc.id())
            .bind(doc.domain())
            .bind(Json(doc))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove<T: Document>(&self, domain: &str, id: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE domain = $1 AND id = $2", T::COLLECTION);
        let result = sqlx::query(&sql)
            .bind(domain)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_by_field<T: Document>(
        &self,
        domain: &str,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE domain = $1 AND doc->>'{field}' = $2",
            T::COLLECTION
        );
        let result = sqlx::query(&sql)
            .bind(domain)
            .bind(value)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn decode<T: Document>(row: PgRow) -> Result<T, StoreError> {
    let Json(doc): Json<T> = row.try_get("doc")?;
    Ok(doc)
}

#[async_trait]
impl Store for PgStore {
    async fn get_course(&self, domain: &str, course_id: &str) -> Result<Option<Course>, StoreError> {
        self.fetch(domain, course_id).await
    }

    async fn save_course(&self, course: &Course) -> Result<(), StoreError> {
        self.upsert(course).await
    }

    async fn delete_course(&self, domain: &str, course_id: &str) -> Result<bool, StoreError> {
        self.remove::<Course>(domain, course_id).await
    }

    async fn get_lesson(&self, domain: &str, lesson_id: &str) -> Result<Option<Lesson>, StoreError> {
        self.fetch(domain, lesson_id).await
    }

    async fn lessons_for_course(&self, domain: &str, course_id: &str) -> Result<Vec<Lesson>, StoreError> {
        self.fetch_by_field(domain, "courseId", course_id).await
    }

    async fn save_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        self.upsert(lesson).await
    }

    async fn delete_lesson(&self, domain: &str, lesson_id: &str) -> Result<bool, StoreError> {
        self.remove::<Lesson>(domain, lesson_id).await
    }

    async fn save_evaluation(&self, evaluation: &LessonEvaluation) -> Result<(), StoreError> {
        self.upsert(evaluation).await
    }

    async fn latest_evaluation(
        &self,
        domain: &str,
        lesson_id: &str,
        user_id: &str,
    ) -> Result<Option<LessonEvaluation>, StoreError> {
        let row = sqlx::query(
            r#"SELECT doc FROM lesson_evaluations
               WHERE domain = $1 AND doc->>'lessonId' = $2 AND doc->>'userId' = $3
               ORDER BY (doc->>'createdAt')::timestamptz DESC
               LIMIT 1"#,
        )
        .bind(domain)
        .bind(lesson_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn delete_evaluations_for_lesson(&self, domain: &str, lesson_id: &str) -> Result<u64, StoreError> {
        self.remove_by_field::<LessonEvaluation>(domain, "lessonId", lesson_id)
            .await
    }

    async fn get_certificate_template(
        &self,
        domain: &str,
        course_id: &str,
    ) -> Result<Option<CertificateTemplate>, StoreError> {
        Ok(self
            .fetch_by_field(domain, "courseId", course_id)
            .await?
            .into_iter()
            .next())
    }

    async fn save_certificate_template(&self, template: &CertificateTemplate) -> Result<(), StoreError> {
        self.upsert(template).await
    }

    async fn delete_certificate_template(&self, domain: &str, template_id: &str) -> Result<bool, StoreError> {
        self.remove::<CertificateTemplate>(domain, template_id).await
    }

    async fn find_certificate(
        &self,
        domain: &str,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        let row = sqlx::query(
            r#"SELECT doc FROM certificates
               WHERE domain = $1 AND doc->>'userId' = $2 AND doc->>'courseId' = $3"#,
        )
        .bind(domain)
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn save_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        self.upsert(certificate).await
    }

    async fn delete_certificates_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        self.remove_by_field::<Certificate>(domain, "courseId", course_id)
            .await
    }

    async fn get_membership(&self, domain: &str, membership_id: &str) -> Result<Option<Membership>, StoreError> {
        self.fetch(domain, membership_id).await
    }

    async fn find_membership(
        &self,
        domain: &str,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        let row = sqlx::query(
            r#"SELECT doc FROM memberships
               WHERE domain = $1 AND doc->>'userId' = $2 AND doc->>'entityId' = $3"#,
        )
        .bind(domain)
        .bind(user_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn save_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.upsert(membership).await
    }

    async fn delete_memberships_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        self.remove_by_field::<Membership>(domain, "entityId", entity_id)
            .await
    }

    async fn get_payment_plan(&self, domain: &str, plan_id: &str) -> Result<Option<PaymentPlan>, StoreError> {
        self.fetch(domain, plan_id).await
    }

    async fn save_payment_plan(&self, plan: &PaymentPlan) -> Result<(), StoreError> {
        self.upsert(plan).await
    }

    async fn delete_payment_plans_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        self.remove_by_field::<PaymentPlan>(domain, "entityId", entity_id)
            .await
    }

    async fn remove_included_product(&self, domain: &str, product_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE payment_plans
               SET doc = jsonb_set(doc, '{includedProducts}', (doc->'includedProducts') - $2::text),
                   updated_at = NOW()
               WHERE domain = $1 AND jsonb_exists(doc->'includedProducts', $2)"#,
        )
        .bind(domain)
        .bind(product_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn save_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.upsert(activity).await
    }

    async fn activities_for_user(&self, domain: &str, user_id: &str) -> Result<Vec<Activity>, StoreError> {
        self.fetch_by_field(domain, "userId", user_id).await
    }

    async fn delete_activities_referencing(
        &self,
        domain: &str,
        id: &str,
        metadata_key: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"DELETE FROM activities
               WHERE domain = $1
                 AND (doc->>'entityId' = $2 OR doc->'metadata'->>$3 = $2)"#,
        )
        .bind(domain)
        .bind(id)
        .bind(metadata_key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_user(&self, domain: &str, user_id: &str) -> Result<Option<User>, StoreError> {
        self.fetch(domain, user_id).await
    }

    async fn find_user_by_unsubscribe_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(r#"SELECT doc FROM users WHERE doc->>'unsubscribeToken' = $1"#)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        row.map(decode).transpose()
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.upsert(user).await
    }

    async fn remove_purchases_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE users
               SET doc = jsonb_set(doc, '{purchases}', COALESCE(
                       (SELECT jsonb_agg(p)
                        FROM jsonb_array_elements(doc->'purchases') p
                        WHERE p->>'courseId' <> $2),
                       '[]'::jsonb)),
                   updated_at = NOW()
               WHERE domain = $1
                 AND doc->'purchases' @> jsonb_build_array(jsonb_build_object('courseId', $2::text))"#,
        )
        .bind(domain)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn remove_completed_lesson(
        &self,
        domain: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"UPDATE users
               SET doc = jsonb_set(doc, '{purchases}', (
                       SELECT jsonb_agg(CASE
                           WHEN p->>'courseId' = $2 THEN
                               jsonb_set(p, '{completedLessons}',
                                         COALESCE(p->'completedLessons', '[]'::jsonb) - $3::text)
                           ELSE p
                       END)
                       FROM jsonb_array_elements(doc->'purchases') p)),
                   updated_at = NOW()
               WHERE domain = $1
                 AND doc->'purchases' @> jsonb_build_array(jsonb_build_object(
                       'courseId', $2::text,
                       'completedLessons', jsonb_build_array($3::text)))"#,
        )
        .bind(domain)
        .bind(course_id)
        .bind(lesson_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn get_page(&self, domain: &str, page_id: &str) -> Result<Option<Page>, StoreError> {
        self.fetch(domain, page_id).await
    }

    async fn save_page(&self, page: &Page) -> Result<(), StoreError> {
        self.upsert(page).await
    }

    async fn delete_page(&self, domain: &str, page_id: &str) -> Result<bool, StoreError> {
        self.remove::<Page>(domain, page_id).await
    }

    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        self.upsert(invoice).await
    }

    async fn find_invoice_by_transaction(
        &self,
        domain: &str,
        processor: &str,
        transaction_id: &str,
    ) -> Result<Option<Invoice>, StoreError> {
        let row = sqlx::query(
            r#"SELECT doc FROM invoices
               WHERE domain = $1
                 AND doc->>'paymentProcessor' = $2
                 AND doc->>'paymentProcessorTransactionId' = $3"#,
        )
        .bind(domain)
        .bind(processor)
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn invoices_for_membership(&self, domain: &str, membership_id: &str) -> Result<Vec<Invoice>, StoreError> {
        self.fetch_by_field(domain, "membershipId", membership_id).await
    }
}
