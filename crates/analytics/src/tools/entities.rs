//! Simple-entity tools: catalogs and single records.

use pendo_insights_core::{AccountId, AppId, FeatureId, VisitorId};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::intents::{ParamSpec, Params};
use crate::pendo::{Metadata, PendoError};
use crate::query::AnalyticsBackend;

use super::ToolExecutor;
use super::format::{self, LIST_PREVIEW};

const APP_FILTER: &[ParamSpec] = &[ParamSpec::optional_text("app_id", "Application id")];

fn app_filter(input: &Value) -> Result<Option<AppId>, ToolError> {
    let params = Params::validate(APP_FILTER, input)?;
    Ok(params.opt_text("app_id").map(AppId::new))
}

fn required(input: &Value, name: &'static str) -> Result<String, ToolError> {
    let spec = [ParamSpec::text(name, "")];
    let params = Params::validate(&spec, input)?;
    Ok(params.text(name)?.to_string())
}

/// Render a scalar metadata value on one line.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn metadata_lines(title: &str, fields: &Map<String, Value>) -> Vec<String> {
    if fields.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{title}:")];
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(value) = fields.get(key) {
            lines.push(format!("  {key}: {}", scalar(value)));
        }
    }
    lines
}

fn visit_lines(metadata: &Metadata) -> Vec<String> {
    vec![
        format!("First visit: {}", format::date(metadata.auto_millis("firstvisit"))),
        format!("Last visit: {}", format::date(metadata.auto_millis("lastvisit"))),
    ]
}

impl<B: AnalyticsBackend> ToolExecutor<'_, B> {
    // =========================================================================
    // Catalogs
    // =========================================================================

    pub(super) async fn list_pages(&self, input: &Value) -> Result<String, ToolError> {
        let app = app_filter(input)?;
        let pages = self.backend.list_pages(app.as_ref()).await?;
        if pages.is_empty() {
            return Ok("No pages found.".to_string());
        }

        let mut lines = vec![format!("Found {} pages:", pages.len())];
        for page in pages.iter().take(LIST_PREVIEW) {
            lines.push(format!("- {} (id: {})", page.name, page.id));
        }
        lines.extend(format::list_footer(LIST_PREVIEW.min(pages.len()), pages.len(), "pages"));
        Ok(lines.join("\n"))
    }

    pub(super) async fn list_features(&self, input: &Value) -> Result<String, ToolError> {
        let app = app_filter(input)?;
        let features = self.backend.list_features(app.as_ref()).await?;
        if features.is_empty() {
            return Ok("No features found.".to_string());
        }

        let mut lines = vec![format!("Found {} features:", features.len())];
        for feature in features.iter().take(LIST_PREVIEW) {
            lines.push(format!("- {} (id: {})", feature.name, feature.id));
        }
        lines.extend(format::list_footer(
            LIST_PREVIEW.min(features.len()),
            features.len(),
            "features",
        ));
        Ok(lines.join("\n"))
    }

    pub(super) async fn list_track_events(&self, input: &Value) -> Result<String, ToolError> {
        let app = app_filter(input)?;
        let track_types = self.backend.list_track_types(app.as_ref()).await?;
        if track_types.is_empty() {
            return Ok("No track event types found.".to_string());
        }

        let mut lines = vec![format!("Found {} track event types:", track_types.len())];
        for track in track_types.iter().take(LIST_PREVIEW) {
            lines.push(format!("- {} (id: {})", track.name, track.id));
        }
        lines.extend(format::list_footer(
            LIST_PREVIEW.min(track_types.len()),
            track_types.len(),
            "track event types",
        ));
        Ok(lines.join("\n"))
    }

    pub(super) async fn list_segments(&self) -> Result<String, ToolError> {
        let segments = self.backend.list_segments().await?;
        if segments.is_empty() {
            return Ok("No segments found.".to_string());
        }

        let mut lines = vec![format!("Found {} segments:", segments.len())];
        for segment in segments.iter().take(LIST_PREVIEW) {
            let shared = if segment.shared { ", shared" } else { "" };
            lines.push(format!("- {} (id: {}{shared})", segment.name, segment.id));
        }
        lines.extend(format::list_footer(
            LIST_PREVIEW.min(segments.len()),
            segments.len(),
            "segments",
        ));
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Single records
    // =========================================================================

    pub(super) async fn get_feature_details(&self, input: &Value) -> Result<String, ToolError> {
        let id = FeatureId::new(required(input, "feature_id")?);
        let feature = match self.backend.get_feature(&id).await {
            Ok(feature) => feature,
            Err(PendoError::NotFound(_)) => return Ok(format!("Feature {id} not found.")),
            Err(e) => return Err(e.into()),
        };

        let mut lines = vec![
            format!("Feature: {}", feature.name),
            format!("ID: {}", feature.id),
        ];
        if let Some(app) = &feature.app_id {
            lines.push(format!("App: {app}"));
        }
        if let Some(page) = &feature.page_id {
            lines.push(format!("Page: {page}"));
        }
        lines.push(format!("Created: {}", format::date(feature.created_at)));
        lines.push(format!("Last updated: {}", format::date(feature.last_updated_at)));
        Ok(lines.join("\n"))
    }

    pub(super) async fn get_visitor_details(&self, input: &Value) -> Result<String, ToolError> {
        let id = VisitorId::new(required(input, "visitor_id")?);
        let visitor = match self.backend.get_visitor(&id).await {
            Ok(visitor) => visitor,
            Err(PendoError::NotFound(_)) => return Ok(format!("Visitor {id} not found.")),
            Err(e) => return Err(e.into()),
        };

        let mut lines = vec![format!("Visitor: {}", visitor.id)];
        if let Some(account) = visitor.metadata.auto_str("accountid") {
            lines.push(format!("Account: {account}"));
        }
        lines.extend(visit_lines(&visitor.metadata));
        lines.extend(metadata_lines("Agent metadata", &visitor.metadata.agent));
        lines.extend(metadata_lines("Custom metadata", &visitor.metadata.custom));
        Ok(lines.join("\n"))
    }

    pub(super) async fn get_account_details(&self, input: &Value) -> Result<String, ToolError> {
        let id = AccountId::new(required(input, "account_id")?);
        let account = match self.backend.get_account(&id).await {
            Ok(account) => account,
            Err(PendoError::NotFound(_)) => return Ok(format!("Account {id} not found.")),
            Err(e) => return Err(e.into()),
        };

        let mut lines = vec![format!("Account: {}", account.id)];
        lines.extend(visit_lines(&account.metadata));
        lines.extend(metadata_lines("Agent metadata", &account.metadata.agent));
        lines.extend(metadata_lines("Custom metadata", &account.metadata.custom));
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::testing::ScriptedBackend;

    #[tokio::test]
    async fn test_empty_catalogs() {
        let backend = ScriptedBackend::new(vec![]);
        let executor = ToolExecutor::new(&backend);
        assert_eq!(
            executor.execute("list_pages", &json!({})).await.unwrap(),
            "No pages found."
        );
        assert_eq!(
            executor.execute("list_segments", &json!({})).await.unwrap(),
            "No segments found."
        );
    }

    #[tokio::test]
    async fn test_not_found_is_a_message() {
        let backend = ScriptedBackend::new(vec![]);
        let executor = ToolExecutor::new(&backend);
        let text = executor
            .execute("get_visitor_details", &json!({"visitor_id": "v-9"}))
            .await
            .unwrap();
        assert_eq!(text, "Visitor v-9 not found.");
    }

    #[tokio::test]
    async fn test_missing_id_is_invalid() {
        let backend = ScriptedBackend::new(vec![]);
        let executor = ToolExecutor::new(&backend);
        let err = executor
            .execute("get_account_details", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[test]
    fn test_metadata_lines_sorted() {
        let mut fields = Map::new();
        fields.insert("tier".into(), json!("gold"));
        fields.insert("seats".into(), json!(12));
        assert_eq!(
            metadata_lines("Agent metadata", &fields),
            vec!["Agent metadata:", "  seats: 12", "  tier: gold"]
        );
        assert!(metadata_lines("Empty", &Map::new()).is_empty());
    }
}
