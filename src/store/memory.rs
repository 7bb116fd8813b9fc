// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Document, Store};
use crate::error::StoreError;
use crate::models::{
    Activity, Certificate, CertificateTemplate, Course, Invoice, Lesson, LessonEvaluation,
    Membership, Page, PaymentPlan, User,
};

/// In-process document store with the same matching rules as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, across all domains.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, |c| c.len())
    }

    async fn fetch<T: Document>(&self, domain: &str, id: &str) -> Result<Option<T>, StoreError> {
        let collections = self.collections.read().await;
        let Some(doc) = collections.get(T::COLLECTION).and_then(|c| c.get(id)) else {
            return Ok(None);
        };
        let doc: T = serde_json::from_value(doc.clone())?;
        Ok((doc.domain() == domain).then_some(doc))
    }

    async fn filter<T, F>(&self, domain: &str, pred: F) -> Result<Vec<T>, StoreError>
    where
        T: Document,
        F: Fn(&T) -> bool,
    {
        let collections = self.collections.read().await;
        let mut out = Vec::new();
        for doc in collections.get(T::COLLECTION).into_iter().flat_map(|c| c.values()) {
            let doc: T = serde_json::from_value(doc.clone())?;
            if doc.domain() == domain && pred(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    async fn upsert<T: Document>(&self, doc: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(doc)?;
        self.collections
            .write()
            .await
            .entry(T::COLLECTION)
            .or_default()
            .insert(doc.id().to_string(), value);
        Ok(())
    }

    async fn remove<T: Document>(&self, domain: &str, id: &str) -> Result<bool, StoreError> {
        if self.fetch::<T>(domain, id).await?.is_none() {
            return Ok(false);
        }
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(T::COLLECTION)
            .and_then(|c| c.remove(id))
            .is_some())
    }

    async fn remove_where<T, F>(&self, domain: &str, pred: F) -> Result<u64, StoreError>
    where
        T: Document,
        F: Fn(&T) -> bool,
    {
        let doomed: Vec<String> = self
            .filter::<T, _>(domain, pred)
            .await?
            .iter()
            .map(|d| d.id().to_string())
            .collect();

        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(T::COLLECTION) else {
            return Ok(0);
        };
        for id in &doomed {
            collection.remove(id);
        }
        Ok(doomed.len() as u64)
    }

    /// Applies `update` to every document in `domain`; it returns whether it changed the document.
    async fn update_where<T, F>(&self, domain: &str, update: F) -> Result<u64, StoreError>
    where
        T: Document,
        F: Fn(&mut T) -> bool,
    {
        let mut collections = self.collections.write().await;
        let Some(collection) = collections.get_mut(T::COLLECTION) else {
            return Ok(0);
        };

        let mut touched = 0;
        for value in collection.values_mut() {
            let mut doc: T = serde_json::from_value(value.clone())?;
            if doc.domain() == domain && update(&mut doc) {
                *value = serde_json::to_value(&doc)?;
                touched += 1;
            }
        }
        Ok(touched)
    }
}

fn metadata_matches(metadata: &Value, key: &str, id: &str) -> bool {
    metadata.get(key).and_then(Value::as_str) == Some(id)
}

#[async_trait]
impl Store for MemoryStore {
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
        self.filter(domain, |l: &Lesson| l.course_id == course_id).await
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
        let evaluations = self
            .filter(domain, |e: &LessonEvaluation| {
                e.lesson_id == lesson_id && e.user_id == user_id
            })
            .await?;
        Ok(evaluations.into_iter().max_by_key(|e| e.created_at))
    }

    async fn delete_evaluations_for_lesson(&self, domain: &str, lesson_id: &str) -> Result<u64, StoreError> {
        self.remove_where(domain, |e: &LessonEvaluation| e.lesson_id == lesson_id)
            .await
    }

    async fn get_certificate_template(
        &self,
        domain: &str,
        course_id: &str,
    ) -> Result<Option<CertificateTemplate>, StoreError> {
        Ok(self
            .filter(domain, |t: &CertificateTemplate| t.course_id == course_id)
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
        Ok(self
            .filter(domain, |c: &Certificate| {
                c.user_id == user_id && c.course_id == course_id
            })
            .await?
            .into_iter()
            .next())
    }

    async fn save_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        self.upsert(certificate).await
    }

    async fn delete_certificates_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        self.remove_where(domain, |c: &Certificate| c.course_id == course_id)
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
        Ok(self
            .filter(domain, |m: &Membership| {
                m.user_id == user_id && m.entity_id == entity_id
            })
            .await?
            .into_iter()
            .next())
    }

    async fn save_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.upsert(membership).await
    }

    async fn delete_memberships_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        self.remove_where(domain, |m: &Membership| m.entity_id == entity_id)
            .await
    }

    async fn get_payment_plan(&self, domain: &str, plan_id: &str) -> Result<Option<PaymentPlan>, StoreError> {
        self.fetch(domain, plan_id).await
    }

    async fn save_payment_plan(&self, plan: &PaymentPlan) -> Result<(), StoreError> {
        self.upsert(plan).await
    }

    async fn delete_payment_plans_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        self.remove_where(domain, |p: &PaymentPlan| p.entity_id == entity_id)
            .await
    }

    async fn remove_included_product(&self, domain: &str, product_id: &str) -> Result<u64, StoreError> {
        self.update_where(domain, |p: &mut PaymentPlan| {
            let before = p.included_products.len();
            p.included_products.retain(|id| id != product_id);
            p.included_products.len() != before
        })
        .await
    }

    async fn save_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        self.upsert(activity).await
    }

    async fn activities_for_user(&self, domain: &str, user_id: &str) -> Result<Vec<Activity>, StoreError> {
        self.filter(domain, |a: &Activity| a.user_id == user_id).await
    }

    async fn delete_activities_referencing(
        &self,
        domain: &str,
        id: &str,
        metadata_key: &str,
    ) -> Result<u64, StoreError> {
        self.remove_where(domain, |a: &Activity| {
            a.entity_id.as_deref() == Some(id) || metadata_matches(&a.metadata, metadata_key, id)
        })
        .await
    }

    async fn get_user(&self, domain: &str, user_id: &str) -> Result<Option<User>, StoreError> {
        self.fetch(domain, user_id).await
    }

    async fn find_user_by_unsubscribe_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let collections = self.collections.read().await;
        for doc in collections.get(User::COLLECTION).into_iter().flat_map(|c| c.values()) {
            let user: User = serde_json::from_value(doc.clone())?;
            if user.unsubscribe_token.as_deref() == Some(token) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.upsert(user).await
    }

    async fn remove_purchases_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        self.update_where(domain, |u: &mut User| {
            let before = u.purchases.len();
            u.purchases.retain(|p| p.course_id != course_id);
            u.purchases.len() != before
        })
        .await
    }

    async fn remove_completed_lesson(
        &self,
        domain: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<u64, StoreError> {
        self.update_where(domain, |u: &mut User| {
            let Some(progress) = u.purchase_mut(course_id) else {
                return false;
            };
            let before = progress.completed_lessons.len();
            progress.completed_lessons.retain(|id| id != lesson_id);
            progress.completed_lessons.len() != before
        })
        .await
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
        Ok(self
            .filter(domain, |i: &Invoice| {
                i.payment_processor == processor && i.payment_processor_transaction_id == transaction_id
            })
            .await?
            .into_iter()
            .next())
    }

    async fn invoices_for_membership(&self, domain: &str, membership_id: &str) -> Result<Vec<Invoice>, StoreError> {
        self.filter(domain, |i: &Invoice| i.membership_id == membership_id)
            .await
    }
}
