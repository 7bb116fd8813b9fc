// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub media_id: String,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub access: MediaAccess,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaAccess {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    #[default]
    Course,
    Download,
    Blog,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    pub domain: String,
    pub title: String,
    pub slug: String,
    pub creator_id: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub course_type: CourseType,
    /// Rich-text JSON. Media is referenced by URL or `mediaId` somewhere inside.
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub featured_image: Option<Media>,
    #[serde(default)]
    pub groups: Vec<Group>,
    /// Lesson ids in course order.
    #[serde(default)]
    pub lessons: Vec<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub certificate: bool,
    #[serde(default)]
    pub payment_plans: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn group_mut(&mut self, group_id: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.id == group_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rank: i32,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub lessons_order: Vec<String>,
    #[serde(default)]
    pub drip: Option<Drip>,
}

impl Group {
    pub fn new(name: &str, rank: i32) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            rank,
            collapsed: false,
            lessons_order: Vec::new(),
            drip: None,
        }
    }

    pub fn is_dripped(&self) -> bool {
        self.drip.as_ref().is_some_and(|d| d.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DripType {
    RelativeDate,
    ExactDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Drip {
    pub status: bool,
    #[serde(rename = "type")]
    pub drip_type: DripType,
    #[serde(default)]
    pub delay_in_millis: Option<i64>,
    /// Epoch milliseconds.
    #[serde(default, rename = "dateInUTC")]
    pub date_in_utc: Option<i64>,
    #[serde(default)]
    pub email: Option<DripEmail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DripEmail {
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LessonType {
    #[default]
    Text,
    Video,
    Audio,
    Pdf,
    Quiz,
    File,
    Embed,
    Scorm,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub lesson_id: String,
    pub domain: String,
    pub title: String,
    pub course_id: String,
    pub group_id: String,
    pub creator_id: String,
    #[serde(rename = "type", default)]
    pub lesson_type: LessonType,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub media: Option<Media>,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_true")]
    pub requires_enrollment: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonEvaluation {
    pub evaluation_id: String,
    pub domain: String,
    pub lesson_id: String,
    pub user_id: String,
    pub pass: bool,
    #[serde(default)]
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Course,
    Community,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Active,
    Expired,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub membership_id: String,
    pub domain: String,
    pub user_id: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub payment_plan_id: Option<String>,
    pub status: MembershipStatus,
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub subscription_method: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPlanType {
    Free,
    Onetime,
    Subscription,
    Emi,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPlan {
    pub plan_id: String,
    pub domain: String,
    pub name: String,
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(rename = "type")]
    pub plan_type: PaymentPlanType,
    #[serde(default)]
    pub amount: Option<f64>,
    /// Courses a bundle purchase also grants.
    #[serde(default)]
    pub included_products: Vec<String>,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateTemplate {
    pub template_id: String,
    pub domain: String,
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub signature_image: Option<Media>,
    #[serde(default)]
    pub logo: Option<Media>,
    #[serde(default)]
    pub signature_name: Option<String>,
    #[serde(default)]
    pub signature_designation: Option<String>,
}

impl CertificateTemplate {
    pub fn media(&self) -> impl Iterator<Item = &Media> {
        self.signature_image.iter().chain(self.logo.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub certificate_id: String,
    pub domain: String,
    pub user_id: String,
    pub course_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Enrolled,
    LessonCompleted,
    CourseCompleted,
    CertificateIssued,
    Purchased,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_id: String,
    pub domain: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Older writers put the course here, newer ones use `metadata.courseId`.
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub course_id: String,
    #[serde(default)]
    pub completed_lessons: Vec<String>,
    #[serde(default)]
    pub accessible_groups: Vec<String>,
    #[serde(default)]
    pub downloaded: bool,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed_lesson: Option<String>,
    #[serde(default)]
    pub scorm_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    pub domain: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub purchases: Vec<Progress>,
    #[serde(default = "default_true")]
    pub subscribed_to_updates: bool,
    #[serde(default)]
    pub unsubscribe_token: Option<String>,
}

impl User {
    pub fn purchase(&self, course_id: &str) -> Option<&Progress> {
        self.purchases.iter().find(|p| p.course_id == course_id)
    }

    pub fn purchase_mut(&mut self, course_id: &str) -> Option<&mut Progress> {
        self.purchases.iter_mut().find(|p| p.course_id == course_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Product,
    Site,
    Blog,
    Community,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub page_id: String,
    pub domain: String,
    pub name: String,
    #[serde(rename = "type")]
    pub page_type: PageType,
    #[serde(default)]
    pub entity_id: Option<String>,
    pub creator_id: String,
    #[serde(default)]
    pub layout: Value,
    #[serde(default)]
    pub draft_layout: Value,
    #[serde(default)]
    pub published: bool,
    #[serde(default = "default_true")]
    pub deleteable: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_id: String,
    pub domain: String,
    pub membership_id: String,
    pub amount: f64,
    pub currency_iso_code: String,
    pub status: InvoiceStatus,
    pub payment_processor: String,
    pub payment_processor_transaction_id: String,
    pub created_at: DateTime<Utc>,
}
