// src/permissions.rs

use crate::models::User;

pub const MANAGE_COURSE: &str = "course:manage";
pub const MANAGE_ANY_COURSE: &str = "course:manage_any";
pub const PUBLISH_COURSE: &str = "course:publish";
pub const MANAGE_MEDIA: &str = "media:manage";
pub const MANAGE_SITE: &str = "site:manage";

/// Caller context for one request: the authenticated user inside its tenant.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub domain: String,
    pub user: User,
}

impl Ctx {
    pub fn new(user: User) -> Self {
        Self {
            domain: user.domain.clone(),
            user,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }

    pub fn can(&self, required: &[&str]) -> bool {
        check_permission(&self.user.permissions, required)
    }
}

/// True when any of `required` is held.
pub fn check_permission(held: &[String], required: &[&str]) -> bool {
    required.iter().any(|r| held.iter().any(|h| h == r))
}
