// src/responses.rs

//! User-facing message strings. Every error rendered to a client comes from here.

pub const ITEM_NOT_FOUND: &str = "Item not found";
pub const ACTION_NOT_ALLOWED: &str = "You are not allowed to perform this action";
pub const UNAUTHORIZED: &str = "Missing or invalid Authorization header";
pub const INVALID_TOKEN: &str = "Invalid token";
pub const NOT_ENROLLED: &str = "You are not enrolled in this course";
pub const DRIP_NOT_RELEASED: &str = "This section has not been released yet";
pub const SCORM_INCOMPLETE: &str = "Complete the SCORM package before marking this lesson as done";
pub const QUIZ_NOT_PASSED: &str = "Pass the quiz before marking this lesson as done";
pub const GROUP_NOT_FOUND: &str = "Section not found in this course";
pub const INVALID_SIGNATURE: &str = "Invalid signature";
pub const INVALID_INPUT: &str = "Invalid input";
pub const INTERNAL_ERROR: &str = "Something went wrong";

pub const DEFAULT_GROUP_NAME: &str = "Section #1";
pub const UNSUBSCRIBED: &str = "You have been unsubscribed";
