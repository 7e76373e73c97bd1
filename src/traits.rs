//! Core contracts for annotation tables.
//!
//! [`Annotation`] is the opaque row identity shared consistently across all
//! backing tables and their concatenations. [`AnnotationTableModel`] is the
//! capability every table variant implements. [`DynTableModel`] dispatches
//! over the concrete variants without trait objects, so collaborators can
//! hold a single shared handle regardless of where the rows come from.

use std::collections::BTreeSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::affine::AffineTransform3D;
use crate::columns::ColumnClass;
use crate::error::Result;
use crate::listeners::AnnotationListener;

/// Opaque, equality-comparable row identity.
///
/// Equality and hashing must depend only on immutable identity state.
/// `transform` mutates geometric metadata through interior mutability and
/// must leave the identity untouched, so an annotation keeps its row index
/// in every table that holds it.
pub trait Annotation: Eq + Hash + Send + Sync + 'static {
    /// Stable unique identifier, e.g. `"em-raw;0;42"`.
    fn uuid(&self) -> String;

    /// Name of the data source that produced this annotation.
    fn source(&self) -> &str;

    /// Current spatial anchor.
    fn position(&self) -> [f64; 3];

    /// Cell value for a column, if loaded.
    fn value(&self, column: &str) -> Option<serde_json::Value>;

    /// Numeric cell value for a column, if loaded and numeric.
    fn number(&self, column: &str) -> Option<f64>;

    /// Sets a string-valued cell, e.g. for user-defined columns.
    fn set_string(&self, column: &str, value: &str);

    /// Applies an affine transform to the anchor geometry.
    fn transform(&self, affine: &AffineTransform3D);
}

/// A logical table of per-annotation metadata: an ordered schema plus a
/// growing set of (row index, annotation) pairs.
///
/// Row indices are assigned in strict arrival order, starting at 0, gapless,
/// never reused and never reassigned. `num_annotations` is monotonically
/// non-decreasing; rows are never removed.
pub trait AnnotationTableModel<A: Annotation>: Send + Sync {
    /// Ordered column names, stable across calls for a given table.
    fn column_names(&self) -> Vec<String>;

    /// The subset of columns usable as continuous values.
    fn numeric_column_names(&self) -> Vec<String>;

    /// Semantic type of a column. Callers are expected to pass names from
    /// `column_names`; unknown names yield None.
    fn column_class(&self, column: &str) -> Option<ColumnClass>;

    /// Current row count. May increase between calls, never decreases.
    fn num_annotations(&self) -> usize;

    /// Row index assigned to `annotation`; fails if it was never published
    /// to this table.
    fn row_index_of(&self, annotation: &A) -> Result<usize>;

    /// The annotation at `row_index`. Callers should only ask for indices
    /// below a `num_annotations` value they already observed.
    fn annotation(&self, row_index: usize) -> Result<Arc<A>>;

    /// Triggers lazy materialization of a column group. Repeated requests
    /// for the same group are no-ops; completion is observable via
    /// `loaded_column_paths`, not through a return value.
    fn request_columns(&self, column_path: &str);

    /// Replaces the set of discoverable column groups.
    fn set_available_column_paths(&self, paths: BTreeSet<String>);

    /// Discoverable column groups.
    fn available_column_paths(&self) -> Vec<String>;

    /// Materialized column groups, in load order.
    fn loaded_column_paths(&self) -> Vec<String>;

    /// (min, max) over the currently loaded values of a numeric column.
    fn get_min_max(&self, column: &str) -> Option<(f64, f64)>;

    /// Snapshot of the current annotation set, in row order. The set grows
    /// as loaders publish; successive calls observe supersets.
    fn annotations(&self) -> Vec<Arc<A>>;

    /// Adds a user-defined string column, defaulting to `""` per row. Fails
    /// for variants with no single place to persist a synthesized column.
    fn add_string_column(&self, column: &str) -> Result<()>;

    /// Locator of the backing data store.
    fn data_store(&self) -> String;

    /// Applies a spatial transform to all per-annotation geometry, keeping
    /// overlays consistent with a moving display frame.
    fn transform(&self, affine: &AffineTransform3D);

    /// Registers a listener. Every annotation already present is replayed to
    /// it immediately, so late subscribers never miss earlier rows.
    fn add_listener(&self, listener: Arc<dyn AnnotationListener<A>>);

    /// Publishes one new row. Runs synchronously on the calling thread and
    /// returns only after bookkeeping and listener fan-out complete.
    fn add_annotation(&self, annotation: Arc<A>);

    /// Publishes a batch of rows in order.
    fn add_annotations(&self, annotations: Vec<Arc<A>>);
}

/// Enum dispatch over the table-model variants.
pub enum DynTableModel<A: Annotation> {
    Source(crate::source_table::SourceAnnotationTableModel<A>),
    Concatenated(crate::concatenated::ConcatenatedAnnotationTableModel<A>),
}

impl<A: Annotation> AnnotationTableModel<A> for DynTableModel<A> {
    #[inline]
    fn column_names(&self) -> Vec<String> {
        match self {
            DynTableModel::Source(t) => t.column_names(),
            DynTableModel::Concatenated(t) => t.column_names(),
        }
    }

    #[inline]
    fn numeric_column_names(&self) -> Vec<String> {
        match self {
            DynTableModel::Source(t) => t.numeric_column_names(),
            DynTableModel::Concatenated(t) => t.numeric_column_names(),
        }
    }

    #[inline]
    fn column_class(&self, column: &str) -> Option<ColumnClass> {
        match self {
            DynTableModel::Source(t) => t.column_class(column),
            DynTableModel::Concatenated(t) => t.column_class(column),
        }
    }

    #[inline]
    fn num_annotations(&self) -> usize {
        match self {
            DynTableModel::Source(t) => t.num_annotations(),
            DynTableModel::Concatenated(t) => t.num_annotations(),
        }
    }

    #[inline]
    fn row_index_of(&self, annotation: &A) -> Result<usize> {
        match self {
            DynTableModel::Source(t) => t.row_index_of(annotation),
            DynTableModel::Concatenated(t) => t.row_index_of(annotation),
        }
    }

    #[inline]
    fn annotation(&self, row_index: usize) -> Result<Arc<A>> {
        match self {
            DynTableModel::Source(t) => t.annotation(row_index),
            DynTableModel::Concatenated(t) => t.annotation(row_index),
        }
    }

    #[inline]
    fn request_columns(&self, column_path: &str) {
        match self {
            DynTableModel::Source(t) => t.request_columns(column_path),
            DynTableModel::Concatenated(t) => t.request_columns(column_path),
        }
    }

    #[inline]
    fn set_available_column_paths(&self, paths: BTreeSet<String>) {
        match self {
            DynTableModel::Source(t) => t.set_available_column_paths(paths),
            DynTableModel::Concatenated(t) => t.set_available_column_paths(paths),
        }
    }

    #[inline]
    fn available_column_paths(&self) -> Vec<String> {
        match self {
            DynTableModel::Source(t) => t.available_column_paths(),
            DynTableModel::Concatenated(t) => t.available_column_paths(),
        }
    }

    #[inline]
    fn loaded_column_paths(&self) -> Vec<String> {
        match self {
            DynTableModel::Source(t) => t.loaded_column_paths(),
            DynTableModel::Concatenated(t) => t.loaded_column_paths(),
        }
    }

    #[inline]
    fn get_min_max(&self, column: &str) -> Option<(f64, f64)> {
        match self {
            DynTableModel::Source(t) => t.get_min_max(column),
            DynTableModel::Concatenated(t) => t.get_min_max(column),
        }
    }

    #[inline]
    fn annotations(&self) -> Vec<Arc<A>> {
        match self {
            DynTableModel::Source(t) => t.annotations(),
            DynTableModel::Concatenated(t) => t.annotations(),
        }
    }

    #[inline]
    fn add_string_column(&self, column: &str) -> Result<()> {
        match self {
            DynTableModel::Source(t) => t.add_string_column(column),
            DynTableModel::Concatenated(t) => t.add_string_column(column),
        }
    }

    #[inline]
    fn data_store(&self) -> String {
        match self {
            DynTableModel::Source(t) => t.data_store(),
            DynTableModel::Concatenated(t) => t.data_store(),
        }
    }

    #[inline]
    fn transform(&self, affine: &AffineTransform3D) {
        match self {
            DynTableModel::Source(t) => t.transform(affine),
            DynTableModel::Concatenated(t) => t.transform(affine),
        }
    }

    #[inline]
    fn add_listener(&self, listener: Arc<dyn AnnotationListener<A>>) {
        match self {
            DynTableModel::Source(t) => t.add_listener(listener),
            DynTableModel::Concatenated(t) => t.add_listener(listener),
        }
    }

    #[inline]
    fn add_annotation(&self, annotation: Arc<A>) {
        match self {
            DynTableModel::Source(t) => t.add_annotation(annotation),
            DynTableModel::Concatenated(t) => t.add_annotation(annotation),
        }
    }

    #[inline]
    fn add_annotations(&self, annotations: Vec<Arc<A>>) {
        match self {
            DynTableModel::Source(t) => t.add_annotations(annotations),
            DynTableModel::Concatenated(t) => t.add_annotations(annotations),
        }
    }
}
