//! Cache types for entity catalog responses.

use super::types::{Feature, Page, Segment, TrackType};

/// Cached catalog lists. Keys are built as `"<resource>:<app id or empty>"`.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Pages(Vec<Page>),
    Features(Vec<Feature>),
    TrackTypes(Vec<TrackType>),
    Segments(Vec<Segment>),
}

/// Build a catalog cache key.
pub fn cache_key(resource: &str, app_id: Option<&str>) -> String {
    format!("{resource}:{}", app_id.unwrap_or(""))
}
