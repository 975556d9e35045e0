pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::PgSink;
pub use config::CollectorSettings;
pub use crate::core::{
    collector::{CollectorConfig, FeedbackCollector},
    etl::EtlEngine,
};
pub use domain::model::{AccumulatedTable, CanonicalTable, FlatRow, TableTarget};
pub use domain::ports::{Pipeline, TableSink};
pub use utils::error::{CollectorError, Result};
