//! Transformer trait for data transformation

use crate::error::PipelineError;
use crate::table::{Cell, Table};

/// Transformer trait for transforming data items
///
/// # Example
/// ```
/// use simple_etl::etl::Transformer;
/// use simple_etl::{Cell, PipelineError};
///
/// struct Blank;
///
/// impl Transformer for Blank {
///     type Input = Cell;
///     type Output = Cell;
///
///     fn transform(&self, _input: Self::Input) -> Result<Self::Output, PipelineError> {
///         Ok(Cell::Null)
///     }
/// }
///
/// assert_eq!(Blank.transform(Cell::from("x")).unwrap(), Cell::Null);
/// ```
pub trait Transformer: Send + Sync {
    /// Input item type
    type Input: Send;

    /// Output item type after transformation
    type Output: Send;

    /// Transform a single item
    ///
    /// # Errors
    /// Returns an error if transformation fails
    fn transform(&self, input: Self::Input) -> Result<Self::Output, PipelineError>;

    /// Transform multiple items (default batch implementation)
    fn transform_many(&self, inputs: Vec<Self::Input>) -> Result<Vec<Self::Output>, PipelineError> {
        inputs.into_iter().map(|i| self.transform(i)).collect()
    }
}

/// Apply a cell transformer to every cell of a table
pub fn transform_table<T>(transformer: &T, table: Table) -> Result<Table, PipelineError>
where
    T: Transformer<Input = Cell, Output = Cell> + ?Sized,
{
    table.try_map_cells(|cell| transformer.transform(cell))
}

/// Identity transformer that passes cells through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransformer;

impl Transformer for IdentityTransformer {
    type Input = Cell;
    type Output = Cell;

    fn transform(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        Ok(input)
    }
}
