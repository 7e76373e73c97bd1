pub mod affine;
pub mod annotation;
pub mod columns;
pub mod concatenated;
pub mod error;
pub mod io;
pub mod listeners;
pub mod source_table;
pub mod synthetic;
pub mod traits;

// Export core contracts
pub use traits::{Annotation, AnnotationTableModel, DynTableModel};

// Export table variants
pub use concatenated::ConcatenatedAnnotationTableModel;
pub use source_table::{ColumnLoader, SourceAnnotationTableModel};

// Export supporting types
pub use affine::AffineTransform3D;
pub use annotation::SegmentAnnotation;
pub use columns::{column_min_max, Column, ColumnClass, ColumnPathRegistry};
pub use error::{Result, TableError};
pub use listeners::{AnnotationListener, ListenerRegistry};

// Export loading helpers
pub use io::{AsyncTableLoader, LoadResult, LoadingState};
pub use synthetic::SyntheticTableSource;
