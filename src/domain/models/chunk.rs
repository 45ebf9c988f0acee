//! Trajectory content: chunks of screenshots, text and application-focus signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A single piece of trajectory content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    /// Free text: action descriptions, input-log excerpts, captions.
    Text { text: String },

    /// A screenshot or other frame.
    Image {
        /// Raw encoded image bytes
        #[serde(with = "image_bytes")]
        data: Arc<[u8]>,
        /// MIME type, e.g. `image/png`
        mime_type: String,
        /// Optional short note about how the frame was cropped or where it came from
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crop_note: Option<String>,
    },

    /// Which application had focus at a point in time.
    AppFocus {
        focused_app: String,
        #[serde(default)]
        available_apps: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            crop_note: None,
        }
    }

    pub fn image_with_note(
        data: impl Into<Arc<[u8]>>,
        mime_type: impl Into<String>,
        crop_note: impl Into<String>,
    ) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
            crop_note: Some(crop_note.into()),
        }
    }

    pub fn app_focus(
        focused_app: impl Into<String>,
        available_apps: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::AppFocus {
            focused_app: focused_app.into(),
            available_apps,
            timestamp,
        }
    }

    pub const fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A contiguous, immutable slice of a trajectory.
///
/// Items are shared behind an `Arc` so that grouping chunks into evaluation
/// windows and handing them to collaborators never copies image data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ContentItem>", into = "Vec<ContentItem>")]
pub struct Chunk {
    items: Arc<[ContentItem]>,
}

impl Chunk {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_image()).count()
    }

    /// Concatenate several chunks, preserving order.
    pub fn merge<'a>(chunks: impl IntoIterator<Item = &'a Self>) -> Self {
        let items: Vec<ContentItem> = chunks
            .into_iter()
            .flat_map(|chunk| chunk.items.iter().cloned())
            .collect();
        Self::new(items)
    }
}

impl From<Vec<ContentItem>> for Chunk {
    fn from(items: Vec<ContentItem>) -> Self {
        Self::new(items)
    }
}

impl From<Chunk> for Vec<ContentItem> {
    fn from(chunk: Chunk) -> Self {
        chunk.items.to_vec()
    }
}

/// Focus counts per application across a set of chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppUsageStats {
    /// Number of focus observations per application
    pub counts: BTreeMap<String, usize>,
    /// Total focus observations
    pub total: usize,
}

impl AppUsageStats {
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        let mut stats = Self::default();
        for chunk in chunks {
            for item in chunk.items() {
                if let ContentItem::AppFocus { focused_app, .. } = item {
                    let app = focused_app.trim();
                    if app.is_empty() {
                        continue;
                    }
                    *stats.counts.entry(app.to_string()).or_insert(0) += 1;
                    stats.total += 1;
                }
            }
        }
        stats
    }

    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn percentage(&self, app: &str) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = self.counts.get(app).copied().unwrap_or(0);
        count as f64 * 100.0 / self.total as f64
    }

    /// Applications ordered by descending count, ties by name.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .counts
            .iter()
            .map(|(app, count)| (app.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

mod image_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<[u8]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn focus(app: &str) -> ContentItem {
        ContentItem::app_focus(app, vec![], Utc::now())
    }

    #[test]
    fn test_merge_preserves_order() {
        let a = Chunk::new(vec![ContentItem::text("one"), ContentItem::text("two")]);
        let b = Chunk::new(vec![ContentItem::text("three")]);

        let merged = Chunk::merge([&a, &b]);

        let texts: Vec<&str> = merged
            .items()
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_app_usage_counts_and_percentages() {
        let chunks = vec![
            Chunk::new(vec![focus("Chrome"), focus("Chrome"), ContentItem::text("x")]),
            Chunk::new(vec![focus("Terminal"), focus("Chrome"), focus("  ")]),
        ];

        let stats = AppUsageStats::from_chunks(&chunks);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.counts.get("Chrome"), Some(&3));
        assert!((stats.percentage("Chrome") - 75.0).abs() < f64::EPSILON);
        assert!((stats.percentage("Missing")).abs() < f64::EPSILON);
        assert_eq!(stats.ranked()[0], ("Chrome", 3));
    }

    #[test]
    fn test_image_serializes_as_base64() {
        let item = ContentItem::image(vec![1_u8, 2, 3], "image/png");
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["type"], "image");
        assert_eq!(json["data"], "AQID");

        let back: ContentItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
