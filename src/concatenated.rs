//! Aggregation of independently loaded tables into one virtual table.
//!
//! A [`ConcatenatedAnnotationTableModel`] presents a fixed set of backing
//! tables as a single table with its own global row indexing. It never loads
//! anything itself: it subscribes to every member at construction, absorbs
//! each member's catch-up burst, and assigns a fresh global index to every
//! row that arrives afterwards, on whichever loader thread published it.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};

use crate::affine::AffineTransform3D;
use crate::columns::{column_min_max, ColumnClass};
use crate::error::{Result, TableError};
use crate::listeners::{AnnotationListener, ListenerRegistry};
use crate::traits::{Annotation, AnnotationTableModel, DynTableModel};

/// Global row bookkeeping shared between the concatenation and the listener
/// registrations it holds on its members.
struct GlobalIndex<A: Annotation> {
    annotation_rows: DashMap<Arc<A>, usize>,
    row_annotations: DashMap<usize, Arc<A>>,
    next_row: AtomicUsize,
    listeners: ListenerRegistry<A>,
}

impl<A: Annotation> GlobalIndex<A> {
    fn new() -> Self {
        Self {
            annotation_rows: DashMap::new(),
            row_annotations: DashMap::new(),
            next_row: AtomicUsize::new(0),
            listeners: ListenerRegistry::new(),
        }
    }

    /// Assigns the next global row index to `annotation` and fans the
    /// arrival out to subscribers.
    ///
    /// `fetch_add` makes the claimed index unique to this call, so both map
    /// entries are written under keys no other thread can hold; with entries
    /// never mutated or removed, any observed key has a complete value.
    fn ingest(&self, annotation: &Arc<A>) {
        let row = self.next_row.fetch_add(1, Ordering::SeqCst);
        self.annotation_rows.insert(annotation.clone(), row);
        self.row_annotations.insert(row, annotation.clone());
        trace!("global row {} <- {}", row, annotation.uuid());
        self.listeners.notify_added(annotation);
    }

    fn annotations_in_row_order(&self) -> Vec<Arc<A>> {
        let rows = self.next_row.load(Ordering::SeqCst);
        (0..rows)
            .filter_map(|row| self.row_annotations.get(&row).map(|entry| entry.value().clone()))
            .collect()
    }
}

impl<A: Annotation> AnnotationListener<A> for GlobalIndex<A> {
    fn annotation_added(&self, annotation: &Arc<A>) {
        self.ingest(annotation);
    }
}

/// A fixed, non-empty set of backing tables presented as one table.
///
/// The first member serves as the reference for all schema-level queries;
/// members are assumed, not verified, to share one schema. Global row order
/// is the cross-member arrival order of publish events: a single member's
/// own order is preserved, interleaving across members is unconstrained.
pub struct ConcatenatedAnnotationTableModel<A: Annotation> {
    tables: Vec<Arc<DynTableModel<A>>>,
    index: Arc<GlobalIndex<A>>,
}

impl<A: Annotation> ConcatenatedAnnotationTableModel<A> {
    /// Concatenates `tables`, subscribing to each member. Members that are
    /// already populated replay their rows during this call, so the new
    /// table starts out with every row published so far.
    pub fn new(tables: Vec<Arc<DynTableModel<A>>>) -> Result<Self> {
        if tables.is_empty() {
            return Err(TableError::EmptyTableSet);
        }

        debug!(
            "concatenating {} tables, schema reference: {}",
            tables.len(),
            tables[0].data_store()
        );

        let index = Arc::new(GlobalIndex::new());
        for table in &tables {
            table.add_listener(index.clone());
        }

        Ok(Self { tables, index })
    }

    /// The member answering all schema-level queries.
    fn reference(&self) -> &DynTableModel<A> {
        &self.tables[0]
    }

    /// The backing tables, in construction order.
    pub fn tables(&self) -> &[Arc<DynTableModel<A>>] {
        &self.tables
    }
}

impl<A: Annotation> AnnotationTableModel<A> for ConcatenatedAnnotationTableModel<A> {
    fn column_names(&self) -> Vec<String> {
        self.reference().column_names()
    }

    fn numeric_column_names(&self) -> Vec<String> {
        self.reference().numeric_column_names()
    }

    fn column_class(&self, column: &str) -> Option<ColumnClass> {
        self.reference().column_class(column)
    }

    fn num_annotations(&self) -> usize {
        self.index.next_row.load(Ordering::SeqCst)
    }

    fn row_index_of(&self, annotation: &A) -> Result<usize> {
        self.index
            .annotation_rows
            .get(annotation)
            .map(|entry| *entry.value())
            .ok_or_else(|| TableError::UnknownAnnotation(annotation.uuid()))
    }

    fn annotation(&self, row_index: usize) -> Result<Arc<A>> {
        self.index
            .row_annotations
            .get(&row_index)
            .map(|entry| entry.value().clone())
            .ok_or(TableError::RowOutOfRange {
                index: row_index,
                rows: self.num_annotations(),
            })
    }

    /// Lazy column groups are per-source resources, so the request goes to
    /// every member rather than to the union.
    fn request_columns(&self, column_path: &str) {
        for table in &self.tables {
            table.request_columns(column_path);
        }
    }

    fn set_available_column_paths(&self, paths: BTreeSet<String>) {
        for table in &self.tables {
            table.set_available_column_paths(paths.clone());
        }
    }

    fn available_column_paths(&self) -> Vec<String> {
        self.reference().available_column_paths()
    }

    fn loaded_column_paths(&self) -> Vec<String> {
        self.reference().loaded_column_paths()
    }

    /// Computed over the accumulated union; the union's range may exceed any
    /// single member's, so this is never delegated.
    fn get_min_max(&self, column: &str) -> Option<(f64, f64)> {
        column_min_max(column, &self.annotations())
    }

    fn annotations(&self) -> Vec<Arc<A>> {
        self.index.annotations_in_row_order()
    }

    fn add_string_column(&self, _column: &str) -> Result<()> {
        // No single member can authoritatively own a synthesized
        // cross-source column.
        Err(TableError::Unsupported(
            "adding a string column to a concatenated table",
        ))
    }

    fn data_store(&self) -> String {
        self.reference().data_store()
    }

    fn transform(&self, affine: &AffineTransform3D) {
        for table in &self.tables {
            table.transform(affine);
        }
    }

    fn add_listener(&self, listener: Arc<dyn AnnotationListener<A>>) {
        let current = self.annotations();
        self.index.listeners.subscribe(listener, &current);
    }

    fn add_annotation(&self, annotation: Arc<A>) {
        self.index.ingest(&annotation);
    }

    fn add_annotations(&self, annotations: Vec<Arc<A>>) {
        for annotation in annotations {
            self.index.ingest(&annotation);
        }
    }
}
