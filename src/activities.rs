// src/activities.rs

use chrono::Utc;
use serde_json::Value;

use crate::error::StoreError;
use crate::models::{Activity, ActivityType, new_id};
use crate::store::Store;

/// Appends one event to the activity log.
pub async fn record(
    store: &dyn Store,
    domain: &str,
    user_id: &str,
    activity_type: ActivityType,
    entity_id: Option<&str>,
    metadata: Value,
) -> Result<Activity, StoreError> {
    let activity = Activity {
        activity_id: new_id(),
        domain: domain.to_string(),
        user_id: user_id.to_string(),
        activity_type,
        entity_id: entity_id.map(str::to_string),
        metadata,
        created_at: Utc::now(),
    };
    store.save_activity(&activity).await?;
    Ok(activity)
}
