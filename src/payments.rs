// src/payments.rs

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use utoipa::ToSchema;

use crate::activities;
use crate::drip::initially_accessible_groups;
use crate::error::AppError;
use crate::models::{
    ActivityType, Course, EntityType, Invoice, InvoiceStatus, MembershipStatus, Progress, User,
    new_id,
};
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `data`.
pub fn sign_hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC takes keys of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub domain: String,
    pub membership_id: String,
    pub status: PaymentStatus,
    pub transaction_id: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub processor: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Activated,
    Failed,
    Duplicate,
    Ignored,
}

/// Adds `course` to the learner's purchases, opening every section that is not dripped.
/// Returns false when the learner was already enrolled.
pub fn enroll(user: &mut User, course: &Course) -> bool {
    if user.purchase(&course.course_id).is_some() {
        return false;
    }
    user.purchases.push(Progress {
        course_id: course.course_id.clone(),
        completed_lessons: Vec::new(),
        accessible_groups: initially_accessible_groups(course),
        downloaded: false,
        enrolled_at: Utc::now(),
        last_accessed_lesson: None,
        scorm_data: None,
    });
    if user.unsubscribe_token.is_none() {
        user.unsubscribe_token = Some(new_id());
    }
    true
}

/// Applies a payment processor notification to the membership it pays for.
///
/// The invoice is written as pending first and settled as the last step, so a
/// delivery that fails halfway is completed by the processor's retry. Settled
/// transactions are no-ops. A successful payment activates the membership and
/// enrols the user in the course and in every course the plan bundles.
pub async fn handle_payment_event(store: &dyn Store, event: &PaymentEvent) -> Result<PaymentOutcome, AppError> {
    let domain = event.domain.as_str();

    let existing = store
        .find_invoice_by_transaction(domain, &event.processor, &event.transaction_id)
        .await?;
    if existing.as_ref().is_some_and(|i| i.status != InvoiceStatus::Pending) {
        return Ok(PaymentOutcome::Duplicate);
    }

    let Some(mut membership) = store.get_membership(domain, &event.membership_id).await? else {
        log::warn!(
            "payment for unknown membership domain={} membership_id={}",
            domain,
            event.membership_id
        );
        return Ok(PaymentOutcome::Ignored);
    };

    let settled = match event.status {
        PaymentStatus::Success => InvoiceStatus::Paid,
        PaymentStatus::Failed => InvoiceStatus::Failed,
        PaymentStatus::Unknown => return Ok(PaymentOutcome::Ignored),
    };

    let mut invoice = match existing {
        Some(pending) => {
            log::info!(
                "resuming payment domain={} invoice_id={} transaction_id={}",
                domain,
                pending.invoice_id,
                event.transaction_id
            );
            pending
        }
        None => {
            let invoice = Invoice {
                invoice_id: new_id(),
                domain: domain.to_string(),
                membership_id: membership.membership_id.clone(),
                amount: event.amount,
                currency_iso_code: event.currency.clone(),
                status: InvoiceStatus::Pending,
                payment_processor: event.processor.clone(),
                payment_processor_transaction_id: event.transaction_id.clone(),
                created_at: Utc::now(),
            };
            store.save_invoice(&invoice).await?;
            invoice
        }
    };

    if settled == InvoiceStatus::Failed {
        invoice.status = InvoiceStatus::Failed;
        store.save_invoice(&invoice).await?;
        log::warn!(
            "payment failed domain={} membership_id={} transaction_id={}",
            domain,
            membership.membership_id,
            event.transaction_id
        );
        return Ok(PaymentOutcome::Failed);
    }

    if membership.status != MembershipStatus::Active {
        membership.status = MembershipStatus::Active;
        store.save_membership(&membership).await?;
    }

    let course_ids = if membership.entity_type == EntityType::Course {
        enroll_buyer(
            store,
            domain,
            &membership.user_id,
            &membership.entity_id,
            &membership.membership_id,
            membership.payment_plan_id.as_deref(),
            &invoice.invoice_id,
        )
        .await?
    } else {
        Vec::new()
    };

    invoice.status = InvoiceStatus::Paid;
    store.save_invoice(&invoice).await?;

    log::info!(
        "membership activated domain={} membership_id={} courses={:?}",
        domain,
        membership.membership_id,
        course_ids
    );
    Ok(PaymentOutcome::Activated)
}

/// Enrols the buyer in the purchased course and the plan's bundled courses, and
/// records the purchase once per invoice. Returns the course ids considered.
async fn enroll_buyer(
    store: &dyn Store,
    domain: &str,
    user_id: &str,
    course_id: &str,
    membership_id: &str,
    plan_id: Option<&str>,
    invoice_id: &str,
) -> Result<Vec<String>, AppError> {
    let Some(mut user) = store.get_user(domain, user_id).await? else {
        log::warn!("payment for unknown user domain={domain} user_id={user_id}");
        return Ok(Vec::new());
    };

    let mut course_ids = vec![course_id.to_string()];
    if let Some(plan_id) = plan_id {
        if let Some(plan) = store.get_payment_plan(domain, plan_id).await? {
            course_ids.extend(plan.included_products);
        }
    }

    let mut enrolled = Vec::new();
    for id in &course_ids {
        let Some(course) = store.get_course(domain, id).await? else {
            log::warn!("payment references missing course domain={domain} course_id={id}");
            continue;
        };
        if enroll(&mut user, &course) {
            enrolled.push(course.course_id);
        }
    }
    store.save_user(&user).await?;

    for id in &enrolled {
        activities::record(
            store,
            domain,
            user_id,
            ActivityType::Enrolled,
            Some(id),
            json!({ "membershipId": membership_id }),
        )
        .await?;
    }

    let recorded = store
        .activities_for_user(domain, user_id)
        .await?
        .into_iter()
        .any(|a| a.activity_type == ActivityType::Purchased && a.metadata["invoiceId"] == invoice_id);
    if !recorded {
        activities::record(
            store,
            domain,
            user_id,
            ActivityType::Purchased,
            Some(course_id),
            json!({ "courseId": course_id, "invoiceId": invoice_id }),
        )
        .await?;
    }

    Ok(course_ids)
}

/// Turns off update emails for the owner of an unsubscribe link.
pub async fn unsubscribe(store: &dyn Store, token: &str) -> Result<(), AppError> {
    let mut user = store
        .find_user_by_unsubscribe_token(token)
        .await?
        .ok_or(AppError::ItemNotFound)?;

    if user.subscribed_to_updates {
        user.subscribed_to_updates = false;
        store.save_user(&user).await?;
        log::info!("user unsubscribed domain={} user_id={}", user.domain, user.user_id);
    }
    Ok(())
}
