#![allow(dead_code)]

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};

use course_commerce::AppState;
use course_commerce::error::{MediaError, StoreError};
use course_commerce::media::{MediaService, PresignedUpload};
use course_commerce::models::{
    Activity, ActivityType, Certificate, CertificateTemplate, Course, CourseType, EntityType,
    Group, Invoice, InvoiceStatus, Lesson, LessonEvaluation, LessonType, Media, MediaAccess,
    Membership, MembershipStatus, Page, PageType, PaymentPlan, PaymentPlanType, Progress, User,
};
use course_commerce::permissions::{Ctx, MANAGE_COURSE};
use course_commerce::store::{MemoryStore, Store};

pub const DOMAIN: &str = "school";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Media host double that remembers what it was asked to delete.
#[derive(Default)]
pub struct RecordingMedia {
    deleted: Mutex<Vec<String>>,
    /// `(owner domain, media id)` pairs stored for other tenants.
    held: Vec<(String, String)>,
    fail: bool,
}

impl RecordingMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delete errors, as if the bucket were unreachable.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// `media_id` is stored for `owner`; other tenants cannot see it.
    pub fn holding(owner: &str, media_id: &str) -> Self {
        Self {
            held: vec![(owner.to_string(), media_id.to_string())],
            ..Self::default()
        }
    }

    fn foreign(&self, domain: &str, media_id: &str) -> bool {
        self.held.iter().any(|(owner, id)| id == media_id && owner != domain)
    }

    pub async fn deleted(&self) -> Vec<String> {
        let mut ids = self.deleted.lock().await.clone();
        ids.sort();
        ids
    }
}

#[async_trait]
impl MediaService for RecordingMedia {
    async fn presigned_upload(&self, _domain: &str, file_name: &str) -> Result<PresignedUpload, MediaError> {
        Ok(PresignedUpload {
            media_id: "upload000001".to_string(),
            upload_url: format!("http://localhost/tmp/upload000001/{file_name}"),
        })
    }

    async fn seal(&self, domain: &str, media_id: &str) -> Result<Media, MediaError> {
        if self.foreign(domain, media_id) {
            return Err(MediaError::NotFound(media_id.to_string()));
        }
        Ok(media(media_id))
    }

    async fn delete(&self, domain: &str, media_id: &str) -> Result<bool, MediaError> {
        if self.foreign(domain, media_id) {
            return Ok(false);
        }
        self.deleted.lock().await.push(media_id.to_string());
        if self.fail {
            return Err(MediaError::Storage("bucket unreachable".into()));
        }
        Ok(true)
    }
}

/// `MemoryStore` whose armed methods fail once, after letting a number of calls through.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    armed: std::sync::Mutex<HashMap<&'static str, usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_once(&self, method: &'static str) {
        self.fail_after(method, 0);
    }

    pub fn fail_after(&self, method: &'static str, successful_calls: usize) {
        self.armed.lock().unwrap().insert(method, successful_calls);
    }

    fn trip(&self, method: &'static str) -> Result<(), StoreError> {
        let mut armed = self.armed.lock().unwrap();
        match armed.get_mut(method) {
            Some(0) => {
                armed.remove(method);
                let err = serde_json::from_str::<Value>("").unwrap_err();
                Err(StoreError::Encoding(err))
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

macro_rules! delegate {
    ($self:ident, $method:ident($($arg:expr),*)) => {{
        $self.trip(stringify!($method))?;
        $self.inner.$method($($arg),*).await
    }};
}

#[async_trait]
impl Store for FlakyStore {
    async fn get_course(&self, domain: &str, course_id: &str) -> Result<Option<Course>, StoreError> {
        delegate!(self, get_course(domain, course_id))
    }
    async fn save_course(&self, course: &Course) -> Result<(), StoreError> {
        delegate!(self, save_course(course))
    }
    async fn delete_course(&self, domain: &str, course_id: &str) -> Result<bool, StoreError> {
        delegate!(self, delete_course(domain, course_id))
    }
    async fn get_lesson(&self, domain: &str, lesson_id: &str) -> Result<Option<Lesson>, StoreError> {
        delegate!(self, get_lesson(domain, lesson_id))
    }
    async fn lessons_for_course(&self, domain: &str, course_id: &str) -> Result<Vec<Lesson>, StoreError> {
        delegate!(self, lessons_for_course(domain, course_id))
    }
    async fn save_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        delegate!(self, save_lesson(lesson))
    }
    async fn delete_lesson(&self, domain: &str, lesson_id: &str) -> Result<bool, StoreError> {
        delegate!(self, delete_lesson(domain, lesson_id))
    }
    async fn save_evaluation(&self, evaluation: &LessonEvaluation) -> Result<(), StoreError> {
        delegate!(self, save_evaluation(evaluation))
    }
    async fn latest_evaluation(
        &self,
        domain: &str,
        lesson_id: &str,
        user_id: &str,
    ) -> Result<Option<LessonEvaluation>, StoreError> {
        delegate!(self, latest_evaluation(domain, lesson_id, user_id))
    }
    async fn delete_evaluations_for_lesson(&self, domain: &str, lesson_id: &str) -> Result<u64, StoreError> {
        delegate!(self, delete_evaluations_for_lesson(domain, lesson_id))
    }
    async fn get_certificate_template(
        &self,
        domain: &str,
        course_id: &str,
    ) -> Result<Option<CertificateTemplate>, StoreError> {
        delegate!(self, get_certificate_template(domain, course_id))
    }
    async fn save_certificate_template(&self, template: &CertificateTemplate) -> Result<(), StoreError> {
        delegate!(self, save_certificate_template(template))
    }
    async fn delete_certificate_template(&self, domain: &str, template_id: &str) -> Result<bool, StoreError> {
        delegate!(self, delete_certificate_template(domain, template_id))
    }
    async fn find_certificate(
        &self,
        domain: &str,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<Certificate>, StoreError> {
        delegate!(self, find_certificate(domain, user_id, course_id))
    }
    async fn save_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        delegate!(self, save_certificate(certificate))
    }
    async fn delete_certificates_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        delegate!(self, delete_certificates_for_course(domain, course_id))
    }
    async fn get_membership(&self, domain: &str, membership_id: &str) -> Result<Option<Membership>, StoreError> {
        delegate!(self, get_membership(domain, membership_id))
    }
    async fn find_membership(
        &self,
        domain: &str,
        user_id: &str,
        entity_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        delegate!(self, find_membership(domain, user_id, entity_id))
    }
    async fn save_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        delegate!(self, save_membership(membership))
    }
    async fn delete_memberships_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        delegate!(self, delete_memberships_for_entity(domain, entity_id))
    }
    async fn get_payment_plan(&self, domain: &str, plan_id: &str) -> Result<Option<PaymentPlan>, StoreError> {
        delegate!(self, get_payment_plan(domain, plan_id))
    }
    async fn save_payment_plan(&self, plan: &PaymentPlan) -> Result<(), StoreError> {
        delegate!(self, save_payment_plan(plan))
    }
    async fn delete_payment_plans_for_entity(&self, domain: &str, entity_id: &str) -> Result<u64, StoreError> {
        delegate!(self, delete_payment_plans_for_entity(domain, entity_id))
    }
    async fn remove_included_product(&self, domain: &str, product_id: &str) -> Result<u64, StoreError> {
        delegate!(self, remove_included_product(domain, product_id))
    }
    async fn save_activity(&self, activity: &Activity) -> Result<(), StoreError> {
        delegate!(self, save_activity(activity))
    }
    async fn activities_for_user(&self, domain: &str, user_id: &str) -> Result<Vec<Activity>, StoreError> {
        delegate!(self, activities_for_user(domain, user_id))
    }
    async fn delete_activities_referencing(
        &self,
        domain: &str,
        id: &str,
        metadata_key: &str,
    ) -> Result<u64, StoreError> {
        delegate!(self, delete_activities_referencing(domain, id, metadata_key))
    }
    async fn get_user(&self, domain: &str, user_id: &str) -> Result<Option<User>, StoreError> {
        delegate!(self, get_user(domain, user_id))
    }
    async fn find_user_by_unsubscribe_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        delegate!(self, find_user_by_unsubscribe_token(token))
    }
    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        delegate!(self, save_user(user))
    }
    async fn remove_purchases_for_course(&self, domain: &str, course_id: &str) -> Result<u64, StoreError> {
        delegate!(self, remove_purchases_for_course(domain, course_id))
    }
    async fn remove_completed_lesson(
        &self,
        domain: &str,
        course_id: &str,
        lesson_id: &str,
    ) -> Result<u64, StoreError> {
        delegate!(self, remove_completed_lesson(domain, course_id, lesson_id))
    }
    async fn get_page(&self, domain: &str, page_id: &str) -> Result<Option<Page>, StoreError> {
        delegate!(self, get_page(domain, page_id))
    }
    async fn save_page(&self, page: &Page) -> Result<(), StoreError> {
        delegate!(self, save_page(page))
    }
    async fn delete_page(&self, domain: &str, page_id: &str) -> Result<bool, StoreError> {
        delegate!(self, delete_page(domain, page_id))
    }
    async fn save_invoice(&self, invoice: &Invoice) -> Result<(), StoreError> {
        delegate!(self, save_invoice(invoice))
    }
    async fn find_invoice_by_transaction(
        &self,
        domain: &str,
        processor: &str,
        transaction_id: &str,
    ) -> Result<Option<Invoice>, StoreError> {
        delegate!(self, find_invoice_by_transaction(domain, processor, transaction_id))
    }
    async fn invoices_for_membership(&self, domain: &str, membership_id: &str) -> Result<Vec<Invoice>, StoreError> {
        delegate!(self, invoices_for_membership(domain, membership_id))
    }
}

pub fn media(media_id: &str) -> Media {
    Media {
        media_id: media_id.to_string(),
        original_file_name: Some("main.png".into()),
        mime_type: Some("image/png".into()),
        size: Some(1024),
        access: MediaAccess::Public,
        file: Some(format!("https://cdn.example.com/{media_id}/main.png")),
        thumbnail: None,
        caption: None,
    }
}

/// Rich text that embeds `media_id` the way the editor does: as an image URL.
pub fn rich_text_with(media_id: &str) -> Value {
    json!({
        "type": "doc",
        "content": [
            { "type": "paragraph", "content": [{ "type": "text", "text": "Welcome" }] },
            { "type": "image", "attrs": { "src": format!("https://cdn.example.com/{media_id}/main.png") } }
        ]
    })
}

pub fn user(user_id: &str, permissions: &[&str]) -> User {
    User {
        user_id: user_id.to_string(),
        domain: DOMAIN.to_string(),
        email: format!("{user_id}@example.com"),
        name: None,
        active: true,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        purchases: Vec::new(),
        subscribed_to_updates: true,
        unsubscribe_token: None,
    }
}

pub fn ctx(user: &User) -> Ctx {
    Ctx::new(user.clone())
}

pub fn group(id: &str, rank: i32) -> Group {
    let mut group = Group::new(&format!("Section {rank}"), rank);
    group.id = id.to_string();
    group
}

pub fn course(course_id: &str, creator_id: &str, groups: Vec<Group>) -> Course {
    let now = Utc::now();
    Course {
        course_id: course_id.to_string(),
        domain: DOMAIN.to_string(),
        title: format!("Course {course_id}"),
        slug: course_id.to_string(),
        creator_id: creator_id.to_string(),
        published: true,
        course_type: CourseType::Course,
        description: None,
        featured_image: None,
        groups,
        lessons: Vec::new(),
        page_id: None,
        certificate: false,
        payment_plans: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn lesson(lesson_id: &str, course: &Course, group_id: &str, lesson_type: LessonType) -> Lesson {
    Lesson {
        lesson_id: lesson_id.to_string(),
        domain: DOMAIN.to_string(),
        title: format!("Lesson {lesson_id}"),
        course_id: course.course_id.clone(),
        group_id: group_id.to_string(),
        creator_id: course.creator_id.clone(),
        lesson_type,
        content: json!({}),
        media: None,
        published: true,
        requires_enrollment: true,
    }
}

pub fn product_page(page_id: &str, course: &Course) -> Page {
    Page {
        page_id: page_id.to_string(),
        domain: DOMAIN.to_string(),
        name: course.title.clone(),
        page_type: PageType::Product,
        entity_id: Some(course.course_id.clone()),
        creator_id: course.creator_id.clone(),
        layout: json!([]),
        draft_layout: json!([]),
        published: false,
        deleteable: false,
    }
}

pub fn progress(course: &Course, accessible_groups: &[&str]) -> Progress {
    Progress {
        course_id: course.course_id.clone(),
        completed_lessons: Vec::new(),
        accessible_groups: accessible_groups.iter().map(|g| g.to_string()).collect(),
        downloaded: false,
        enrolled_at: Utc::now(),
        last_accessed_lesson: None,
        scorm_data: None,
    }
}

/// Saves lessons and threads them into the course's lesson lists.
pub async fn save_course_with_lessons(store: &dyn Store, course: &mut Course, lessons: &[Lesson]) {
    for l in lessons {
        course.lessons.push(l.lesson_id.clone());
        if let Some(group) = course.group_mut(&l.group_id) {
            group.lessons_order.push(l.lesson_id.clone());
        }
        store.save_lesson(l).await.expect("save lesson");
    }
    store.save_course(course).await.expect("save course");
}

pub fn activity(id: &str, user_id: &str, entity_id: Option<&str>, metadata: serde_json::Value) -> Activity {
    Activity {
        activity_id: id.to_string(),
        domain: DOMAIN.to_string(),
        user_id: user_id.to_string(),
        activity_type: ActivityType::LessonCompleted,
        entity_id: entity_id.map(str::to_string),
        metadata,
        created_at: Utc::now(),
    }
}

pub fn plan(plan_id: &str, entity_id: &str, included: &[&str]) -> PaymentPlan {
    PaymentPlan {
        plan_id: plan_id.to_string(),
        domain: DOMAIN.to_string(),
        name: plan_id.to_string(),
        entity_id: entity_id.to_string(),
        entity_type: EntityType::Course,
        plan_type: PaymentPlanType::Onetime,
        amount: Some(49.0),
        included_products: included.iter().map(|s| s.to_string()).collect(),
        archived: false,
    }
}

/// `course1` wired into every collection that can reference it, plus a second
/// course that must come through untouched.
pub async fn seed_course_graph(store: &dyn Store) {
    let owner = user("owner", &[MANAGE_COURSE]);
    let mut learner = user("learner", &[]);

    let mut c1 = course("course1", "owner", vec![group("g1", 0)]);
    c1.featured_image = Some(media("featured01"));
    c1.description = Some(rich_text_with("descmedia01"));
    c1.page_id = Some("page1".into());
    c1.certificate = true;

    let mut l1 = lesson("lesson1", &c1, "g1", LessonType::Text);
    l1.content = rich_text_with("lessonbody1");
    let mut l2 = lesson("lesson2", &c1, "g1", LessonType::Quiz);
    l2.media = Some(media("lessonfile1"));
    save_course_with_lessons(store, &mut c1, &[l1, l2]).await;

    let c2 = course("course2", "owner", vec![group("g2", 0)]);
    store.save_course(&c2).await.unwrap();

    store.save_page(&product_page("page1", &c1)).await.unwrap();

    store
        .save_certificate_template(&CertificateTemplate {
            template_id: "tpl1".into(),
            domain: DOMAIN.into(),
            course_id: "course1".into(),
            title: "Certificate of completion".into(),
            subtitle: None,
            description: None,
            signature_image: Some(media("signature01")),
            logo: Some(media("certlogo01")),
            signature_name: None,
            signature_designation: None,
        })
        .await
        .unwrap();
    store
        .save_certificate(&Certificate {
            certificate_id: "cert1".into(),
            domain: DOMAIN.into(),
            user_id: "learner".into(),
            course_id: "course1".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    store
        .save_membership(&Membership {
            membership_id: "mem1".into(),
            domain: DOMAIN.into(),
            user_id: "learner".into(),
            entity_id: "course1".into(),
            entity_type: EntityType::Course,
            payment_plan_id: Some("plan1".into()),
            status: MembershipStatus::Active,
            subscription_id: Some("sub_123".into()),
            subscription_method: Some("stripe".into()),
        })
        .await
        .unwrap();
    store
        .save_invoice(&Invoice {
            invoice_id: "inv1".into(),
            domain: DOMAIN.into(),
            membership_id: "mem1".into(),
            amount: 49.0,
            currency_iso_code: "USD".into(),
            status: InvoiceStatus::Paid,
            payment_processor: "stripe".into(),
            payment_processor_transaction_id: "txn1".into(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    store.save_payment_plan(&plan("plan1", "course1", &[])).await.unwrap();
    store
        .save_payment_plan(&plan("bundle", "course2", &["course1", "course2"]))
        .await
        .unwrap();

    store
        .save_activity(&activity("a-entity", "learner", Some("course1"), json!({})))
        .await
        .unwrap();
    store
        .save_activity(&activity("a-meta", "learner", None, json!({ "courseId": "course1" })))
        .await
        .unwrap();
    store
        .save_activity(&activity("a-lesson", "learner", None, json!({ "lessonId": "lesson2" })))
        .await
        .unwrap();
    store
        .save_activity(&activity("a-other", "learner", Some("course2"), json!({})))
        .await
        .unwrap();

    store
        .save_evaluation(&LessonEvaluation {
            evaluation_id: "eval1".into(),
            domain: DOMAIN.into(),
            lesson_id: "lesson2".into(),
            user_id: "learner".into(),
            pass: true,
            score: Some(100.0),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    learner.purchases.push(progress(&c1, &["g1"]));
    learner.purchases.push(progress(&c2, &["g2"]));
    store.save_user(&learner).await.unwrap();
    store.save_user(&owner).await.unwrap();
}

pub fn build_state(store: Arc<MemoryStore>, media: Arc<RecordingMedia>) -> AppState {
    AppState {
        store,
        media,
        jwt_secret: JWT_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
    }
}

fn split_db_url(url: &str) -> Result<(String, String), String> {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base.to_string(), Some(query)),
        None => (url.to_string(), None),
    };

    let db_start = base
        .rfind('/')
        .ok_or_else(|| "invalid database url".to_string())?;
    if db_start + 1 >= base.len() {
        return Err("database name is empty".to_string());
    }

    let db_name = base[db_start + 1..].to_string();
    let mut admin_url = format!("{}postgres", &base[..db_start + 1]);
    if let Some(query) = query {
        admin_url = format!("{admin_url}?{query}");
    }

    Ok((admin_url, db_name))
}

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestDb {
    pub pool: PgPool,
    _guard: MutexGuard<'static, ()>,
}

/// Recreates the database named by `TEST_DATABASE_URL` and migrates it.
/// Returns `None` when the variable is unset so Postgres tests can be skipped.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let test_url = env::var("TEST_DATABASE_URL").ok()?;
    let (admin_url, db_name) = split_db_url(&test_url).expect("invalid TEST_DATABASE_URL format");

    let lock = TEST_DB_LOCK.get_or_init(|| Mutex::new(()));
    let guard = lock.lock().await;

    let admin_pool = PgPool::connect(&admin_url).await.expect("connect admin db");
    let quoted = format!("\"{}\"", db_name.replace('"', "\"\""));
    sqlx::query(&format!("DROP DATABASE IF EXISTS {quoted} WITH (FORCE)"))
        .execute(&admin_pool)
        .await
        .expect("drop test db");
    sqlx::query(&format!("CREATE DATABASE {quoted}"))
        .execute(&admin_pool)
        .await
        .expect("create test db");
    admin_pool.close().await;

    let pool = PgPool::connect(&test_url).await.expect("connect test db");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    Some(TestDb { pool, _guard: guard })
}
