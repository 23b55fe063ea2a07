//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the stage traits, the buffer hand-off contract, the
//! three stage functions and the runner that sequences them.

mod buffer;
mod extract;
mod load;
mod pipeline;
mod retry;
mod stage;
mod state;
mod transform;

pub use buffer::{Buffer, BufferKeys, EXTRACTED_KEY, TRANSFORMED_KEY};
pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::{Pipeline, RunReport};
pub use retry::RetryPolicy;
pub use stage::{Stage, extract_data, load_data, transform_data};
pub use state::RunState;
pub use transform::{IdentityTransformer, Transformer, transform_table};
