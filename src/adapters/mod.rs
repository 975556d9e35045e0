// Adapters layer: concrete implementations of the domain ports.

pub mod postgres;

pub use postgres::PgSink;
