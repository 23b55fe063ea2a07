//! Loader trait for writing rows to a destination

use crate::error::PipelineError;

/// Loader trait for loading items to a destination
///
/// Implementors perform one bulk write of all items. The write is not
/// required to be atomic: a loader that stops part way reports
/// [`PipelineError::PartialInsert`] and leaves written items in place.
///
/// # Example
/// ```no_run
/// use simple_etl::etl::Loader;
/// use simple_etl::{PipelineError, Row};
///
/// struct CountingLoader;
///
/// impl Loader for CountingLoader {
///     type Item = Row;
///
///     async fn load(&self, items: Vec<Self::Item>) -> Result<usize, PipelineError> {
///         Ok(items.len())
///     }
/// }
/// ```
pub trait Loader: Send + Sync {
    /// The type of items to load
    type Item: Send;

    /// Load items to the destination
    ///
    /// Returns the number of items written
    ///
    /// # Errors
    /// Returns [`PipelineError::Connectivity`] when nothing was written because
    /// the destination is unreachable, [`PipelineError::PartialInsert`] when the
    /// write stopped part way.
    fn load(
        &self,
        items: Vec<Self::Item>,
    ) -> impl std::future::Future<Output = Result<usize, PipelineError>> + Send;
}
