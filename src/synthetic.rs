//! Deterministic synthetic tables for tests and the generator binary.
//!
//! A [`SyntheticTableSource`] plays the role of an external backing-table
//! loader: it fabricates segment annotations with randomized anchors and
//! feature values, and serves lazy column groups on request. Everything is
//! seeded, so a given configuration always produces the same table.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::annotation::{SegmentAnnotation, ANCHOR_X, ANCHOR_Y, ANCHOR_Z, LABEL_ID, TIMEPOINT};
use crate::columns::Column;
use crate::source_table::{ColumnLoader, SourceAnnotationTableModel};
use crate::traits::AnnotationTableModel;

const DEFAULT_NUM_ANNOTATIONS: usize = 100;
const DEFAULT_SEED: u64 = 42;

const OBJECT_CLASSES: [&str; 3] = ["nucleus", "membrane", "vesicle"];

/// Base schema shared by all synthetic tables.
static BASE_COLUMNS: Lazy<Vec<Column>> = Lazy::new(|| {
    vec![
        Column::numeric(LABEL_ID),
        Column::numeric(TIMEPOINT),
        Column::numeric(ANCHOR_X),
        Column::numeric(ANCHOR_Y),
        Column::numeric(ANCHOR_Z),
        Column::numeric("volume"),
        Column::numeric("intensity_mean"),
        Column::categorical("object_class"),
    ]
});

/// Generator of populated single-source tables.
#[derive(Clone)]
pub struct SyntheticTableSource {
    source_name: String,
    num_annotations: usize,
    seed: u64,
}

impl SyntheticTableSource {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            num_annotations: DEFAULT_NUM_ANNOTATIONS,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_config(source_name: impl Into<String>, num_annotations: usize, seed: u64) -> Self {
        Self {
            source_name: source_name.into(),
            num_annotations,
            seed,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The schema every synthetic table starts with.
    pub fn base_columns() -> Vec<Column> {
        BASE_COLUMNS.clone()
    }

    /// Creates an empty table wired to this source's lazy column groups.
    pub fn create_table(&self) -> SourceAnnotationTableModel<SegmentAnnotation> {
        SourceAnnotationTableModel::new(self.source_name.clone(), Self::base_columns())
            .with_column_loader(Box::new(self.clone()))
    }

    /// Generates the full annotation set for this source.
    pub fn generate_annotations(&self) -> Vec<Arc<SegmentAnnotation>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.num_annotations)
            .map(|i| {
                let anchor = [
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..1000.0),
                    rng.gen_range(0.0..100.0),
                ];

                let mut features = serde_json::Map::new();
                features.insert(
                    "volume".to_string(),
                    serde_json::json!(rng.gen_range(10.0..5000.0)),
                );
                features.insert(
                    "intensity_mean".to_string(),
                    serde_json::json!(rng.gen_range(0.0..255.0)),
                );
                features.insert(
                    "object_class".to_string(),
                    serde_json::json!(OBJECT_CLASSES[rng.gen_range(0..OBJECT_CLASSES.len())]),
                );

                Arc::new(SegmentAnnotation::with_features(
                    self.source_name.clone(),
                    (i + 1) as u32,
                    0,
                    anchor,
                    features,
                ))
            })
            .collect()
    }

    /// Creates a table and publishes the full annotation set into it.
    pub fn populated_table(&self) -> SourceAnnotationTableModel<SegmentAnnotation> {
        let table = self.create_table();
        table.add_annotations(self.generate_annotations());
        table
    }
}

impl ColumnLoader<SegmentAnnotation> for SyntheticTableSource {
    /// Fabricates one column group, two numeric columns per path, with
    /// values seeded by (source seed, path) so repeated loads agree.
    fn load_columns(
        &self,
        column_path: &str,
        annotations: &[Arc<SegmentAnnotation>],
    ) -> anyhow::Result<Vec<Column>> {
        let mut hasher = DefaultHasher::new();
        column_path.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(self.seed ^ hasher.finish());

        let mean_name = format!("{}_mean", column_path);
        let stddev_name = format!("{}_stddev", column_path);
        for annotation in annotations {
            annotation.set_value(&mean_name, serde_json::json!(rng.gen_range(0.0..1.0)));
            annotation.set_value(&stddev_name, serde_json::json!(rng.gen_range(0.0..0.5)));
        }

        Ok(vec![
            Column::numeric(mean_name),
            Column::numeric(stddev_name),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Annotation;

    #[test]
    fn test_generation_is_deterministic() {
        let source = SyntheticTableSource::with_config("em-raw", 10, 7);
        let first = source.generate_annotations();
        let second = source.generate_annotations();

        assert_eq!(first.len(), 10);
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a, b);
            assert_eq!(a.position(), b.position());
            assert_eq!(a.number("volume"), b.number("volume"));
        }
    }

    #[test]
    fn test_populated_table_matches_config() {
        let source = SyntheticTableSource::with_config("em-raw", 25, 7);
        let table = source.populated_table();

        assert_eq!(table.num_annotations(), 25);
        assert_eq!(table.data_store(), "em-raw");
        assert_eq!(table.column_names().len(), SyntheticTableSource::base_columns().len());
        assert!(table.get_min_max("volume").is_some());
    }

    #[test]
    fn test_lazy_column_group_materialization() {
        let source = SyntheticTableSource::with_config("em-raw", 5, 7);
        let table = source.populated_table();

        table.request_columns("morphology");

        assert_eq!(table.loaded_column_paths(), vec!["morphology".to_string()]);
        assert!(table.column_names().contains(&"morphology_mean".to_string()));
        assert!(table.column_names().contains(&"morphology_stddev".to_string()));

        let annotation = table.annotation(0).unwrap();
        assert!(annotation.number("morphology_mean").is_some());
    }
}
