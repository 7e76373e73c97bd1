//! Concrete row identity for segmented objects.

use std::hash::{Hash, Hasher};

use parking_lot::RwLock;

use crate::affine::AffineTransform3D;
use crate::traits::Annotation;

/// Column name of the segment label id.
pub const LABEL_ID: &str = "label_id";
/// Column name of the timepoint.
pub const TIMEPOINT: &str = "timepoint";
/// Column names of the anchor coordinates.
pub const ANCHOR_X: &str = "anchor_x";
pub const ANCHOR_Y: &str = "anchor_y";
pub const ANCHOR_Z: &str = "anchor_z";

/// One segmented object from one data source.
///
/// Identity is the (source, label id, timepoint) triple; equality and
/// hashing ignore the mutable anchor and feature map, so a transformed or
/// lazily enriched annotation keeps its row index everywhere.
pub struct SegmentAnnotation {
    source: String,
    label_id: u32,
    timepoint: u32,
    anchor: RwLock<[f64; 3]>,
    features: RwLock<serde_json::Map<String, serde_json::Value>>,
}

impl SegmentAnnotation {
    /// Creates an annotation with an empty feature map.
    pub fn new(source: impl Into<String>, label_id: u32, timepoint: u32, anchor: [f64; 3]) -> Self {
        Self {
            source: source.into(),
            label_id,
            timepoint,
            anchor: RwLock::new(anchor),
            features: RwLock::new(serde_json::Map::new()),
        }
    }

    /// Creates an annotation with pre-populated feature values.
    pub fn with_features(
        source: impl Into<String>,
        label_id: u32,
        timepoint: u32,
        anchor: [f64; 3],
        features: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            source: source.into(),
            label_id,
            timepoint,
            anchor: RwLock::new(anchor),
            features: RwLock::new(features),
        }
    }

    pub fn label_id(&self) -> u32 {
        self.label_id
    }

    pub fn timepoint(&self) -> u32 {
        self.timepoint
    }

    /// Writes one feature cell. Used by column loaders merging a lazily
    /// materialized column group into already published rows.
    pub fn set_value(&self, column: &str, value: serde_json::Value) {
        self.features.write().insert(column.to_string(), value);
    }

    /// Snapshot of the current feature map.
    pub fn features(&self) -> serde_json::Map<String, serde_json::Value> {
        self.features.read().clone()
    }
}

impl Annotation for SegmentAnnotation {
    fn uuid(&self) -> String {
        format!("{};{};{}", self.source, self.timepoint, self.label_id)
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn position(&self) -> [f64; 3] {
        *self.anchor.read()
    }

    fn value(&self, column: &str) -> Option<serde_json::Value> {
        // Identity and anchor columns are served live so they stay consistent
        // with transforms; everything else comes from the feature map.
        match column {
            LABEL_ID => Some(serde_json::json!(self.label_id)),
            TIMEPOINT => Some(serde_json::json!(self.timepoint)),
            ANCHOR_X => Some(serde_json::json!(self.position()[0])),
            ANCHOR_Y => Some(serde_json::json!(self.position()[1])),
            ANCHOR_Z => Some(serde_json::json!(self.position()[2])),
            _ => self.features.read().get(column).cloned(),
        }
    }

    fn number(&self, column: &str) -> Option<f64> {
        match column {
            LABEL_ID => Some(self.label_id as f64),
            TIMEPOINT => Some(self.timepoint as f64),
            ANCHOR_X => Some(self.position()[0]),
            ANCHOR_Y => Some(self.position()[1]),
            ANCHOR_Z => Some(self.position()[2]),
            _ => self.features.read().get(column).and_then(|v| v.as_f64()),
        }
    }

    fn set_string(&self, column: &str, value: &str) {
        self.set_value(column, serde_json::Value::String(value.to_string()));
    }

    fn transform(&self, affine: &AffineTransform3D) {
        let mut anchor = self.anchor.write();
        *anchor = affine.apply(*anchor);
    }
}

impl PartialEq for SegmentAnnotation {
    fn eq(&self, other: &Self) -> bool {
        self.label_id == other.label_id
            && self.timepoint == other.timepoint
            && self.source == other.source
    }
}

impl Eq for SegmentAnnotation {}

impl Hash for SegmentAnnotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.label_id.hash(state);
        self.timepoint.hash(state);
    }
}

impl std::fmt::Debug for SegmentAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentAnnotation")
            .field("source", &self.source)
            .field("label_id", &self.label_id)
            .field("timepoint", &self.timepoint)
            .field("anchor", &self.position())
            .finish()
    }
}
