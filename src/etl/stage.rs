//! The three units of work
//!
//! Each stage is a function of its collaborators and the buffer keys. Stages
//! never call each other; the only thing they share is the buffer.

use super::{Buffer, BufferKeys, Extractor, Loader, Transformer, transform_table};
use crate::error::PipelineError;
use crate::table::{self, Cell, Row, Table};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "extract_data")]
    Extract,
    #[serde(rename = "transform_data")]
    Transform,
    #[serde(rename = "load_data")]
    Load,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Transform, Stage::Load];

    /// Task id the stage is declared under
    pub fn task_id(&self) -> &'static str {
        match self {
            Self::Extract => "extract_data",
            Self::Transform => "transform_data",
            Self::Load => "load_data",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.task_id())
    }
}

/// Read the source and write it to the extracted key
///
/// Returns the number of rows written.
pub async fn extract_data<E, B>(
    extractor: &E,
    buffer: &B,
    keys: &BufferKeys,
) -> Result<usize, PipelineError>
where
    E: Extractor,
    B: Buffer,
{
    let table = extractor.extract().await?;
    log::debug!(
        "Read {} rows with columns [{}]",
        table.len(),
        table.columns().join(", ")
    );

    buffer.set(&keys.extracted, table::encode(&table)?).await?;
    log::info!("Extracted {} rows into '{}'", table.len(), keys.extracted);

    Ok(table.len())
}

/// Normalize the extracted table and write it to the transformed key
pub async fn transform_data<T, B>(
    transformer: &T,
    buffer: &B,
    keys: &BufferKeys,
) -> Result<usize, PipelineError>
where
    T: Transformer<Input = Cell, Output = Cell>,
    B: Buffer,
{
    let table = read_table(buffer, &keys.extracted).await?;
    let rows = table.len();

    let transformed = transform_table(transformer, table)?;
    buffer
        .set(&keys.transformed, table::encode(&transformed)?)
        .await?;
    log::info!(
        "Transformed {} rows from '{}' into '{}'",
        rows,
        keys.extracted,
        keys.transformed
    );

    Ok(rows)
}

/// Insert every transformed row as a document in one bulk write
pub async fn load_data<L, B>(
    loader: &L,
    buffer: &B,
    keys: &BufferKeys,
) -> Result<usize, PipelineError>
where
    L: Loader<Item = Row>,
    B: Buffer,
{
    let table = read_table(buffer, &keys.transformed).await?;

    if table.is_empty() {
        log::warn!("'{}' holds no rows, nothing to load", keys.transformed);
        return Ok(0);
    }

    let attempted = table.len();
    let inserted = loader.load(table.into_rows()).await?;

    // A loader reporting fewer writes than rows without an error is still a partial insert
    if inserted != attempted {
        return Err(PipelineError::PartialInsert {
            inserted: Some(inserted),
            attempted,
            message: "destination acknowledged fewer documents than were sent".to_string(),
        });
    }

    log::info!("Loaded {} documents", inserted);
    Ok(inserted)
}

async fn read_table<B: Buffer>(buffer: &B, key: &str) -> Result<Table, PipelineError> {
    let bytes = buffer
        .get(key)
        .await?
        .ok_or_else(|| PipelineError::missing(key, "key not found in buffer"))?;
    let value = String::from_utf8(bytes)
        .map_err(|e| PipelineError::missing(key, format!("value is not UTF-8: {}", e)))?;

    table::decode(&value).map_err(|reason| PipelineError::missing(key, reason))
}
