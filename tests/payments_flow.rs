use course_commerce::error::AppError;
use course_commerce::models::{
    ActivityType, Drip, DripType, EntityType, InvoiceStatus, Membership, MembershipStatus,
    PaymentPlan, PaymentPlanType,
};
use course_commerce::payments::{
    PaymentEvent, PaymentOutcome, PaymentStatus, handle_payment_event, unsubscribe,
};
use course_commerce::store::{MemoryStore, Store};

mod support;
use support::{DOMAIN, FlakyStore};

fn event(transaction_id: &str, status: PaymentStatus) -> PaymentEvent {
    PaymentEvent {
        domain: DOMAIN.into(),
        membership_id: "mem1".into(),
        status,
        transaction_id: transaction_id.into(),
        amount: 99.0,
        currency: "USD".into(),
        processor: "stripe".into(),
    }
}

/// A pending membership for a bundle plan on course1 that also grants course2.
/// course1 has one dripped section.
async fn seed(store: &MemoryStore) {
    let mut dripped = support::group("g-late", 1);
    dripped.drip = Some(Drip {
        status: true,
        drip_type: DripType::ExactDate,
        delay_in_millis: None,
        date_in_utc: Some(4_102_444_800_000),
        email: None,
    });
    let c1 = support::course("course1", "owner", vec![support::group("g-open", 0), dripped]);
    let c2 = support::course("course2", "owner", vec![support::group("g2", 0)]);
    store.save_course(&c1).await.unwrap();
    store.save_course(&c2).await.unwrap();

    store
        .save_payment_plan(&PaymentPlan {
            plan_id: "bundle".into(),
            domain: DOMAIN.into(),
            name: "Everything".into(),
            entity_id: "course1".into(),
            entity_type: EntityType::Course,
            plan_type: PaymentPlanType::Onetime,
            amount: Some(99.0),
            included_products: vec!["course2".into(), "gone-course".into()],
            archived: false,
        })
        .await
        .unwrap();
    store
        .save_membership(&Membership {
            membership_id: "mem1".into(),
            domain: DOMAIN.into(),
            user_id: "buyer".into(),
            entity_id: "course1".into(),
            entity_type: EntityType::Course,
            payment_plan_id: Some("bundle".into()),
            status: MembershipStatus::Pending,
            subscription_id: None,
            subscription_method: None,
        })
        .await
        .unwrap();
    store.save_user(&support::user("buyer", &[])).await.unwrap();
}

#[tokio::test]
async fn successful_payment_activates_and_enrolls_in_the_bundle() {
    let store = MemoryStore::new();
    seed(&store).await;

    let outcome = handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    assert_eq!(outcome, PaymentOutcome::Activated);

    let membership = store.get_membership(DOMAIN, "mem1").await.unwrap().unwrap();
    assert_eq!(membership.status, MembershipStatus::Active);

    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    let courses: Vec<&str> = buyer.purchases.iter().map(|p| p.course_id.as_str()).collect();
    assert_eq!(courses, vec!["course1", "course2"]);
    assert_eq!(buyer.purchase("course1").unwrap().accessible_groups, vec!["g-open".to_string()]);
    assert!(buyer.unsubscribe_token.is_some());

    let invoices = store.invoices_for_membership(DOMAIN, "mem1").await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].status, InvoiceStatus::Paid);

    let enrolled = store
        .activities_for_user(DOMAIN, "buyer")
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.activity_type == ActivityType::Enrolled)
        .count();
    assert_eq!(enrolled, 2);
}

#[tokio::test]
async fn repeated_notifications_are_idempotent() {
    let store = MemoryStore::new();
    seed(&store).await;

    handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    let again = handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    assert_eq!(again, PaymentOutcome::Duplicate);

    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    assert_eq!(buyer.purchases.len(), 2);
    assert_eq!(store.invoices_for_membership(DOMAIN, "mem1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_retry_completes_a_delivery_that_failed_halfway() {
    let store = FlakyStore::new();
    seed(&store.inner).await;
    store.fail_once("save_membership");

    assert!(handle_payment_event(&store, &event("txn1", PaymentStatus::Success)).await.is_err());
    let invoices = store.invoices_for_membership(DOMAIN, "mem1").await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].status, InvoiceStatus::Pending);
    let pending_id = invoices[0].invoice_id.clone();

    let retry = handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    assert_eq!(retry, PaymentOutcome::Activated);

    let membership = store.get_membership(DOMAIN, "mem1").await.unwrap().unwrap();
    assert_eq!(membership.status, MembershipStatus::Active);
    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    assert_eq!(buyer.purchases.len(), 2);

    let invoices = store.invoices_for_membership(DOMAIN, "mem1").await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].invoice_id, pending_id);
    assert_eq!(invoices[0].status, InvoiceStatus::Paid);

    let again = handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    assert_eq!(again, PaymentOutcome::Duplicate);
}

#[tokio::test]
async fn a_retry_after_enrollment_does_not_repeat_activities() {
    let store = FlakyStore::new();
    seed(&store.inner).await;
    // The pending invoice is written; settling it as paid fails.
    store.fail_after("save_invoice", 1);

    assert!(handle_payment_event(&store, &event("txn1", PaymentStatus::Success)).await.is_err());
    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    assert_eq!(buyer.purchases.len(), 2);

    let retry = handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    assert_eq!(retry, PaymentOutcome::Activated);

    let activities = store.activities_for_user(DOMAIN, "buyer").await.unwrap();
    let count = |kind: ActivityType| activities.iter().filter(|a| a.activity_type == kind).count();
    assert_eq!(count(ActivityType::Enrolled), 2);
    assert_eq!(count(ActivityType::Purchased), 1);

    let invoices = store.invoices_for_membership(DOMAIN, "mem1").await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn failed_payments_leave_the_membership_pending() {
    let store = MemoryStore::new();
    seed(&store).await;

    let outcome = handle_payment_event(&store, &event("txn-bad", PaymentStatus::Failed))
        .await
        .unwrap();
    assert_eq!(outcome, PaymentOutcome::Failed);

    let membership = store.get_membership(DOMAIN, "mem1").await.unwrap().unwrap();
    assert_eq!(membership.status, MembershipStatus::Pending);
    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    assert!(buyer.purchases.is_empty());

    let invoices = store.invoices_for_membership(DOMAIN, "mem1").await.unwrap();
    assert_eq!(invoices[0].status, InvoiceStatus::Failed);
}

#[tokio::test]
async fn unknown_memberships_are_ignored() {
    let store = MemoryStore::new();
    seed(&store).await;
    let mut stray = event("txn2", PaymentStatus::Success);
    stray.membership_id = "nope".into();

    let outcome = handle_payment_event(&store, &stray).await.unwrap();
    assert_eq!(outcome, PaymentOutcome::Ignored);
    assert_eq!(store.count("invoices").await, 0);
}

#[tokio::test]
async fn unsubscribe_links_turn_off_update_emails() {
    let store = MemoryStore::new();
    seed(&store).await;
    handle_payment_event(&store, &event("txn1", PaymentStatus::Success))
        .await
        .unwrap();
    let token = store
        .get_user(DOMAIN, "buyer")
        .await
        .unwrap()
        .unwrap()
        .unsubscribe_token
        .unwrap();

    unsubscribe(&store, &token).await.unwrap();
    let buyer = store.get_user(DOMAIN, "buyer").await.unwrap().unwrap();
    assert!(!buyer.subscribed_to_updates);

    // Following the link twice is fine.
    unsubscribe(&store, &token).await.unwrap();

    let err = unsubscribe(&store, "not-a-token").await.unwrap_err();
    assert!(matches!(err, AppError::ItemNotFound));
}
