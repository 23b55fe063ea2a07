//! Extractor trait for reading a source table

use crate::error::PipelineError;
use crate::table::Table;

/// Extractor trait for loading a whole source into a [`Table`]
///
/// Implementors define how to read a source such as a delimited file.
///
/// # Example
/// ```no_run
/// use simple_etl::etl::Extractor;
/// use simple_etl::{PipelineError, Table};
///
/// struct EmptySource;
///
/// impl Extractor for EmptySource {
///     async fn extract(&self) -> Result<Table, PipelineError> {
///         Ok(Table::default())
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// Read the source
    ///
    /// # Errors
    /// Returns [`PipelineError::SourceFormat`] if the source is unreadable or
    /// not rectangular.
    fn extract(&self) -> impl std::future::Future<Output = Result<Table, PipelineError>> + Send;
}
