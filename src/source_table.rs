//! Single-source table variant.
//!
//! One [`SourceAnnotationTableModel`] holds the rows produced by one loader
//! for one data source. Row index equals arrival position; the reverse map
//! answers `row_index_of` without scanning.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::{trace, warn};
use parking_lot::RwLock;

use crate::affine::AffineTransform3D;
use crate::columns::{column_min_max, Column, ColumnClass, ColumnPathRegistry};
use crate::error::{Result, TableError};
use crate::listeners::{AnnotationListener, ListenerRegistry};
use crate::traits::{Annotation, AnnotationTableModel};

/// Materializes one lazy column group for a table.
///
/// Implementations write the group's values into the given annotations and
/// return the new column definitions to append to the schema.
pub trait ColumnLoader<A: Annotation>: Send + Sync {
    fn load_columns(&self, column_path: &str, annotations: &[Arc<A>]) -> anyhow::Result<Vec<Column>>;
}

/// Table of annotations from a single data source.
pub struct SourceAnnotationTableModel<A: Annotation> {
    data_store: String,
    columns: RwLock<Vec<Column>>,
    rows: RwLock<Vec<Arc<A>>>,
    row_indices: RwLock<HashMap<Arc<A>, usize>>,
    listeners: ListenerRegistry<A>,
    column_paths: ColumnPathRegistry,
    column_loader: Option<Box<dyn ColumnLoader<A>>>,
}

impl<A: Annotation> SourceAnnotationTableModel<A> {
    /// Creates an empty table with the given data-store locator and schema.
    pub fn new(data_store: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            data_store: data_store.into(),
            columns: RwLock::new(columns),
            rows: RwLock::new(Vec::new()),
            row_indices: RwLock::new(HashMap::new()),
            listeners: ListenerRegistry::new(),
            column_paths: ColumnPathRegistry::new(),
            column_loader: None,
        }
    }

    /// Attaches the loader that serves `request_columns` for this table.
    pub fn with_column_loader(mut self, loader: Box<dyn ColumnLoader<A>>) -> Self {
        self.column_loader = Some(loader);
        self
    }
}

impl<A: Annotation> AnnotationTableModel<A> for SourceAnnotationTableModel<A> {
    fn column_names(&self) -> Vec<String> {
        self.columns.read().iter().map(|c| c.name.clone()).collect()
    }

    fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .read()
            .iter()
            .filter(|c| c.class == ColumnClass::Numeric)
            .map(|c| c.name.clone())
            .collect()
    }

    fn column_class(&self, column: &str) -> Option<ColumnClass> {
        self.columns
            .read()
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.class)
    }

    fn num_annotations(&self) -> usize {
        self.rows.read().len()
    }

    fn row_index_of(&self, annotation: &A) -> Result<usize> {
        self.row_indices
            .read()
            .get(annotation)
            .copied()
            .ok_or_else(|| TableError::UnknownAnnotation(annotation.uuid()))
    }

    fn annotation(&self, row_index: usize) -> Result<Arc<A>> {
        let rows = self.rows.read();
        rows.get(row_index).cloned().ok_or(TableError::RowOutOfRange {
            index: row_index,
            rows: rows.len(),
        })
    }

    fn request_columns(&self, column_path: &str) {
        // First request claims the path; repeats are no-ops. A failed load is
        // logged and not retried.
        if !self.column_paths.mark_loaded(column_path) {
            return;
        }

        let Some(loader) = &self.column_loader else {
            trace!(
                "{}: no column loader attached, marking {} loaded as-is",
                self.data_store,
                column_path
            );
            return;
        };

        let annotations = self.rows.read().clone();
        match loader.load_columns(column_path, &annotations) {
            Ok(new_columns) => {
                let mut columns = self.columns.write();
                for column in new_columns {
                    if !columns.iter().any(|c| c.name == column.name) {
                        columns.push(column);
                    }
                }
            }
            Err(error) => {
                warn!(
                    "{}: failed to materialize column group {}: {:#}",
                    self.data_store, column_path, error
                );
            }
        }
    }

    fn set_available_column_paths(&self, paths: BTreeSet<String>) {
        self.column_paths.set_available(paths);
    }

    fn available_column_paths(&self) -> Vec<String> {
        self.column_paths.available()
    }

    fn loaded_column_paths(&self) -> Vec<String> {
        self.column_paths.loaded()
    }

    fn get_min_max(&self, column: &str) -> Option<(f64, f64)> {
        column_min_max(column, &self.rows.read())
    }

    fn annotations(&self) -> Vec<Arc<A>> {
        self.rows.read().clone()
    }

    fn add_string_column(&self, column: &str) -> Result<()> {
        {
            let mut columns = self.columns.write();
            if columns.iter().any(|c| c.name == column) {
                return Ok(());
            }
            columns.push(Column::string(column));
        }
        for annotation in self.rows.read().iter() {
            annotation.set_string(column, "");
        }
        Ok(())
    }

    fn data_store(&self) -> String {
        self.data_store.clone()
    }

    fn transform(&self, affine: &AffineTransform3D) {
        for annotation in self.rows.read().iter() {
            annotation.transform(affine);
        }
    }

    fn add_listener(&self, listener: Arc<dyn AnnotationListener<A>>) {
        let current = self.rows.read().clone();
        self.listeners.subscribe(listener, &current);
    }

    fn add_annotation(&self, annotation: Arc<A>) {
        let row = {
            let mut rows = self.rows.write();
            let mut indices = self.row_indices.write();
            let row = rows.len();
            rows.push(annotation.clone());
            indices.insert(annotation.clone(), row);
            row
        };
        trace!("{}: row {} <- {}", self.data_store, row, annotation.uuid());
        self.listeners.notify_added(&annotation);
    }

    fn add_annotations(&self, annotations: Vec<Arc<A>>) {
        for annotation in annotations {
            self.add_annotation(annotation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{SegmentAnnotation, ANCHOR_X, LABEL_ID, TIMEPOINT};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn segment_columns() -> Vec<Column> {
        vec![
            Column::numeric(LABEL_ID),
            Column::numeric(TIMEPOINT),
            Column::numeric(ANCHOR_X),
            Column::categorical("object_class"),
        ]
    }

    fn segment(label_id: u32, x: f64) -> Arc<SegmentAnnotation> {
        Arc::new(SegmentAnnotation::new("em-raw", label_id, 0, [x, 0.0, 0.0]))
    }

    struct CountingListener {
        count: AtomicUsize,
    }

    impl AnnotationListener<SegmentAnnotation> for CountingListener {
        fn annotation_added(&self, _annotation: &Arc<SegmentAnnotation>) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_row_indices_follow_arrival_order() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        let a1 = segment(1, 10.0);
        let a2 = segment(2, 20.0);
        table.add_annotations(vec![a1.clone(), a2.clone()]);

        assert_eq!(table.num_annotations(), 2);
        assert_eq!(table.row_index_of(&a1).unwrap(), 0);
        assert_eq!(table.row_index_of(&a2).unwrap(), 1);
        assert_eq!(table.annotation(0).unwrap(), a1);
        assert_eq!(table.annotation(1).unwrap(), a2);
    }

    #[test]
    fn test_lookup_misses() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        table.add_annotation(segment(1, 0.0));

        let stranger = SegmentAnnotation::new("em-raw", 99, 0, [0.0; 3]);
        assert!(matches!(
            table.row_index_of(&stranger),
            Err(TableError::UnknownAnnotation(_))
        ));
        assert!(matches!(
            table.annotation(5),
            Err(TableError::RowOutOfRange { index: 5, rows: 1 })
        ));
    }

    #[test]
    fn test_schema_queries() {
        let table: SourceAnnotationTableModel<SegmentAnnotation> =
            SourceAnnotationTableModel::new("em-raw", segment_columns());
        assert_eq!(
            table.column_names(),
            vec![LABEL_ID, TIMEPOINT, ANCHOR_X, "object_class"]
        );
        assert_eq!(
            table.numeric_column_names(),
            vec![LABEL_ID, TIMEPOINT, ANCHOR_X]
        );
        assert_eq!(table.column_class(LABEL_ID), Some(ColumnClass::Numeric));
        assert_eq!(
            table.column_class("object_class"),
            Some(ColumnClass::Categorical)
        );
        assert_eq!(table.column_class("no_such_column"), None);
    }

    #[test]
    fn test_late_listener_catches_up() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        table.add_annotations(vec![segment(1, 0.0), segment(2, 0.0), segment(3, 0.0)]);

        let listener = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });
        table.add_listener(listener.clone());
        assert_eq!(listener.count.load(Ordering::SeqCst), 3);

        table.add_annotation(segment(4, 0.0));
        assert_eq!(listener.count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_add_string_column_defaults_empty() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        let a = segment(1, 0.0);
        table.add_annotation(a.clone());

        table.add_string_column("note").unwrap();
        assert!(table.column_names().contains(&"note".to_string()));
        assert_eq!(table.column_class("note"), Some(ColumnClass::String));
        assert_eq!(a.value("note"), Some(serde_json::Value::String(String::new())));

        // Re-adding the same column leaves existing values alone.
        a.set_string("note", "bright");
        table.add_string_column("note").unwrap();
        assert_eq!(
            a.value("note"),
            Some(serde_json::Value::String("bright".to_string()))
        );
    }

    #[test]
    fn test_min_max_over_loaded_values() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        table.add_annotations(vec![segment(1, -5.0), segment(2, 17.5), segment(3, 3.0)]);

        assert_eq!(table.get_min_max(ANCHOR_X), Some((-5.0, 17.5)));
        assert_eq!(table.get_min_max(LABEL_ID), Some((1.0, 3.0)));
        assert_eq!(table.get_min_max("volume"), None);
    }

    #[test]
    fn test_transform_moves_all_rows() {
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns());
        let a1 = segment(1, 1.0);
        let a2 = segment(2, 2.0);
        table.add_annotations(vec![a1.clone(), a2.clone()]);

        table.transform(&AffineTransform3D::translation(100.0, 0.0, 0.0));
        assert_eq!(a1.position()[0], 101.0);
        assert_eq!(a2.position()[0], 102.0);
    }

    struct StubColumnLoader {
        calls: Arc<AtomicUsize>,
    }

    impl ColumnLoader<SegmentAnnotation> for StubColumnLoader {
        fn load_columns(
            &self,
            column_path: &str,
            annotations: &[Arc<SegmentAnnotation>],
        ) -> anyhow::Result<Vec<Column>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = format!("{}_score", column_path);
            for annotation in annotations {
                annotation.set_value(&name, serde_json::json!(1.0));
            }
            Ok(vec![Column::numeric(name)])
        }
    }

    #[test]
    fn test_request_columns_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let table = SourceAnnotationTableModel::new("em-raw", segment_columns())
            .with_column_loader(Box::new(StubColumnLoader {
                calls: calls.clone(),
            }));
        let a = segment(1, 0.0);
        table.add_annotation(a.clone());

        table.request_columns("morphology");
        table.request_columns("morphology");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.loaded_column_paths(), vec!["morphology".to_string()]);
        assert!(table.column_names().contains(&"morphology_score".to_string()));
        assert_eq!(a.number("morphology_score"), Some(1.0));
    }
}
