//! Media references inside rich-text and page-layout JSON.
//!
//! Media shows up either as an object carrying `mediaId`, or as a URL of the
//! form `<base>/<mediaId>/main.<ext>` anywhere inside a string. Descriptions
//! written by older editors are stored as a JSON document serialised into a
//! string, so strings that parse as JSON are walked too.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static MEDIA_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Za-z0-9_-]{6,})/main\.[A-Za-z0-9]+").unwrap());

pub fn extract_media_ids(value: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    collect(value, &mut ids);
    ids
}

fn collect(value: &Value, ids: &mut BTreeSet<String>) {
    match value {
        Value::String(s) => {
            for caps in MEDIA_URL_RE.captures_iter(s) {
                ids.insert(caps[1].to_string());
            }
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                if let Ok(inner) = serde_json::from_str::<Value>(trimmed) {
                    collect(&inner, ids);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect(item, ids);
            }
        }
        Value::Object(map) => {
            for (key, v) in map {
                if key == "mediaId" {
                    if let Some(id) = v.as_str().filter(|id| !id.is_empty()) {
                        ids.insert(id.to_string());
                        continue;
                    }
                }
                collect(v, ids);
            }
        }
        _ => {}
    }
}

/// Media referenced by `old` and no longer by `new`.
pub fn removed_media(old: &Value, new: &Value) -> BTreeSet<String> {
    removed_media_keeping(old, new, &Value::Null)
}

/// Like [`removed_media`], but anything still referenced by `keep` survives.
pub fn removed_media_keeping(old: &Value, new: &Value, keep: &Value) -> BTreeSet<String> {
    let new_ids = extract_media_ids(new);
    let keep_ids = extract_media_ids(keep);
    extract_media_ids(old)
        .into_iter()
        .filter(|id| !new_ids.contains(id) && !keep_ids.contains(id))
        .collect()
}
