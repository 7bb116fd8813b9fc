pub mod auth;
pub mod courses;
pub mod lessons;
pub mod media;
pub mod pages;
pub mod webhooks;
