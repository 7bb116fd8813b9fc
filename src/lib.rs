pub mod activities;
pub mod api;
pub mod certificates;
pub mod config;
pub mod courses;
pub mod docs;
pub mod drip;
pub mod error;
pub mod lessons;
pub mod media;
pub mod models;
pub mod pages;
pub mod payments;
pub mod permissions;
pub mod responses;
pub mod scorm;
pub mod store;

use std::sync::Arc;

use media::MediaService;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub media: Arc<dyn MediaService>,
    pub jwt_secret: String,
    pub webhook_secret: String,
}
