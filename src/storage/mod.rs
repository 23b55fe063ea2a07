//! Local sources and in-process stand-ins for the external stores
//!
//! This module handles:
//! - Reading delimited source files
//! - An in-memory buffer and document collection with fault injection

mod csv;
mod memory;

pub use self::csv::CsvReader;
pub use self::memory::{MemoryBuffer, MemoryCollection};
