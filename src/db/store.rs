use mongodb::{
    bson::Document,
    error::ErrorKind,
    options::InsertManyOptions,
    sync::{Client, Database},
    IndexModel,
};

use crate::{
    config::DatabaseConfig,
    error::{EtlError, EtlResult, InsertFailure},
};

/// The operations the loader needs from a document database.
pub trait DocumentStore {
    fn collection_names(&self) -> EtlResult<Vec<String>>;

    fn drop_collection(&self, collection: &str) -> EtlResult<()>;

    /// Create a `2dsphere` index on `field`.
    fn create_geo_index(&self, collection: &str, field: &str) -> EtlResult<()>;

    fn insert_one(&self, collection: &str, document: Document) -> EtlResult<()>;

    /// Insert all documents in one unordered bulk write, so a rejected document does not stop the
    /// others. Returns the number of inserted documents, or `EtlError::PartialInsertFailure` with
    /// every rejected document's index in `documents` if some were rejected.
    fn insert_many_unordered(&self, collection: &str, documents: Vec<Document>)
        -> EtlResult<usize>;
}

pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// The driver connects lazily, so an unreachable server surfaces with the first operation.
    pub fn connect(config: &DatabaseConfig) -> EtlResult<Self> {
        log::info!("Connecting to {}, database {}", config.uri(), config.database);
        let client = Client::with_uri_str(config.uri())?;
        Ok(Self {
            database: client.database(&config.database),
        })
    }
}

impl DocumentStore for MongoStore {
    fn collection_names(&self) -> EtlResult<Vec<String>> {
        Ok(self.database.list_collection_names(None)?)
    }

    fn drop_collection(&self, collection: &str) -> EtlResult<()> {
        self.database
            .collection::<Document>(collection)
            .drop(None)?;
        Ok(())
    }

    fn create_geo_index(&self, collection: &str, field: &str) -> EtlResult<()> {
        let mut keys = Document::new();
        keys.insert(field, "2dsphere");
        let index = IndexModel::builder().keys(keys).build();
        self.database
            .collection::<Document>(collection)
            .create_index(index, None)?;
        Ok(())
    }

    fn insert_one(&self, collection: &str, document: Document) -> EtlResult<()> {
        self.database
            .collection::<Document>(collection)
            .insert_one(document, None)?;
        Ok(())
    }

    fn insert_many_unordered(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> EtlResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let num_documents = documents.len();
        let options = InsertManyOptions::builder().ordered(false).build();
        match self
            .database
            .collection::<Document>(collection)
            .insert_many(documents, options)
        {
            Ok(result) => Ok(result.inserted_ids.len()),
            Err(err) => match insert_failures(&err) {
                Some(failures) => Err(EtlError::PartialInsertFailure {
                    collection: collection.to_string(),
                    inserted_count: num_documents.saturating_sub(failures.len()),
                    failures,
                }),
                None => Err(err.into()),
            },
        }
    }
}

/// Rejected documents of a failed bulk write. `None` if the error is not about single documents,
/// e.g. a lost connection or a write concern error.
fn insert_failures(err: &mongodb::error::Error) -> Option<Vec<InsertFailure>> {
    match err.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => match &failure.write_errors {
            Some(write_errors) if !write_errors.is_empty() => Some(
                write_errors
                    .iter()
                    .map(|write_error| InsertFailure {
                        index: write_error.index,
                        code: write_error.code,
                        message: write_error.message.clone(),
                    })
                    .collect(),
            ),
            _ => None,
        },
        _ => None,
    }
}
