//! MongoDB document store

use crate::config::StoreConfig;
use crate::error::{PipelineError, Service};
use crate::etl::Loader;
use crate::table::{Cell, Row};

use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, InsertManyError};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use std::time::Duration;

/// Loader inserting rows as documents into one MongoDB collection
///
/// All rows go out in a single unordered `insert_many`. The write is not
/// atomic: when the server rejects part of the batch the accepted documents
/// stay and the load fails with [`PipelineError::PartialInsert`]. No
/// deduplication is attempted, so loading the same rows twice stores them
/// twice.
pub struct MongoCollection {
    config: StoreConfig,
    timeout: Duration,
}

impl MongoCollection {
    pub fn new(config: StoreConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    /// `database.collection` this loader writes to
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.config.database, self.config.collection)
    }

    async fn client(&self) -> Result<Client, PipelineError> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(map_error)?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);
        Client::with_options(options).map_err(map_error)
    }

    async fn collection(&self) -> Result<Collection<Document>, PipelineError> {
        let client = self.client().await?;
        Ok(client
            .database(&self.config.database)
            .collection::<Document>(&self.config.collection))
    }

    /// Check the server answers `ping`
    pub async fn ping(&self) -> Result<(), PipelineError> {
        let client = self.client().await?;
        client
            .database(&self.config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_error)?;
        Ok(())
    }
}

impl Loader for MongoCollection {
    type Item = Row;

    async fn load(&self, items: Vec<Self::Item>) -> Result<usize, PipelineError> {
        if items.is_empty() {
            return Ok(0);
        }

        let attempted = items.len();
        let documents: Vec<Document> = items.iter().map(row_to_document).collect();
        let collection = self.collection().await?;

        log::debug!("Inserting {} documents into {}", attempted, self.namespace());
        match collection.insert_many(documents).ordered(false).await {
            Ok(result) => {
                let inserted = result.inserted_ids.len();
                log::info!("Inserted {} documents into {}", inserted, self.namespace());
                Ok(inserted)
            }
            Err(err) => {
                if let ErrorKind::InsertMany(failure) = err.kind.as_ref() {
                    return Err(partial_insert(attempted, failure));
                }
                Err(map_error(err))
            }
        }
    }
}

/// Map a row to a document, one field per column in column order
/// Describe a failed unordered bulk insert
///
/// Without a write concern error every document that has no write error was
/// applied, so the count is known. A write concern error means the writes
/// reached the primary but were not confirmed as replicated, and the count is
/// reported as unknown.
fn partial_insert(attempted: usize, failure: &InsertManyError) -> PipelineError {
    let write_errors = failure.write_errors.as_deref().unwrap_or_default();
    let mut messages: Vec<String> = write_errors
        .iter()
        .map(|e| format!("document {}: {}", e.index, e.message))
        .collect();

    let inserted = match &failure.write_concern_error {
        Some(concern) => {
            messages.push(format!("write concern not satisfied: {}", concern.message));
            None
        }
        None => Some(attempted.saturating_sub(write_errors.len())),
    };

    PipelineError::PartialInsert {
        inserted,
        attempted,
        message: messages.join("; "),
    }
}

pub fn row_to_document(row: &Row) -> Document {
    row.iter()
        .map(|(column, cell)| (column.clone(), cell_to_bson(cell)))
        .collect()
}

fn cell_to_bson(cell: &Cell) -> Bson {
    match cell {
        Cell::Null => Bson::Null,
        Cell::Boolean(b) => Bson::Boolean(*b),
        Cell::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Bson::Int64(i),
            (None, Some(f)) => Bson::Double(f),
            // u64 beyond i64::MAX
            (None, None) => Bson::String(n.to_string()),
        },
        Cell::Text(s) => Bson::String(s.clone()),
    }
}

/// Sort driver errors into transient and permanent failures
fn map_error(err: mongodb::error::Error) -> PipelineError {
    let transient = matches!(
        *err.kind,
        ErrorKind::Io { .. } | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    ) || err.contains_label(mongodb::error::RETRYABLE_WRITE_ERROR);

    if transient {
        PipelineError::connectivity(Service::DocumentStore, err.to_string())
    } else {
        PipelineError::Service {
            service: Service::DocumentStore,
            message: err.to_string(),
        }
    }
}
