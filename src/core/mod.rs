pub mod collector;
pub mod columns;
pub mod etl;
pub mod flatten;
pub mod sanitize;

pub use crate::domain::model::{AccumulatedTable, CanonicalTable, FlatRow, TableTarget};
pub use crate::domain::ports::{Pipeline, TableSink};
pub use crate::utils::error::Result;
