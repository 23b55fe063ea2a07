//! Simple ETL
//!
//! Extracts a delimited file into a table, title-cases its text cells and
//! loads the rows into a document store. Stages hand tables to each other
//! through a key-value buffer so each one can be retried on its own.

pub mod cli;
pub mod client;
pub mod config;
pub mod dag;
pub mod error;
pub mod etl;
pub mod notify;
pub mod storage;
pub mod table;
pub mod transform;

// Re-exports for convenience
pub use client::{MongoCollection, RedisBuffer};
pub use config::PipelineConfig;
pub use dag::Dag;
pub use error::{PipelineError, Service};
pub use etl::{Buffer, Extractor, Loader, Pipeline, RunReport, RunState, Stage, Transformer};
pub use storage::{CsvReader, MemoryBuffer, MemoryCollection};
pub use table::{Cell, Row, Table};
