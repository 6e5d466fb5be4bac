//! MongoDB driver-backed store

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions};
use mongodb::{Client, Collection};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::Result;

use super::{DatabaseInfo, DocumentStore, FindCursor, Namespace, UpdateOutcome};

/// Store backed by a pooled `mongodb::Client`.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
}

impl MongoStore {
    /// Build a client from configuration.
    ///
    /// The driver connects lazily, so an unreachable server surfaces on the
    /// first operation rather than here.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = Self::client_options(config).await?;
        let client = Client::with_options(options)?;
        info!("MongoDB client created for {}", redact_uri(&config.uri));
        Ok(Self { client })
    }

    async fn client_options(config: &ConnectionConfig) -> Result<ClientOptions> {
        let mut options = ClientOptions::parse(&config.uri).await?;

        let timeout = Duration::from_secs(config.timeout);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.max_pool_size = Some(config.max_pool_size);
        options.min_pool_size = Some(config.min_pool_size);
        options.max_idle_time = Some(Duration::from_secs(config.idle_timeout));

        if options.app_name.is_none() {
            options.app_name = Some(config.app_name.clone());
        }

        debug!(
            "Client options: timeout={}s, pool={}..{}",
            config.timeout, config.min_pool_size, config.max_pool_size
        );
        Ok(options)
    }

    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client
            .database(&ns.database)
            .collection(&ns.collection)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let specs = self.client.list_databases().await?;
        Ok(specs
            .into_iter()
            .map(|spec| DatabaseInfo {
                name: spec.name,
                size_on_disk: spec.size_on_disk,
                empty: spec.empty,
            })
            .collect())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let mut names = self
            .client
            .database(database)
            .list_collection_names()
            .await?;
        names.sort();
        Ok(names)
    }

    async fn find(&self, ns: &Namespace, cursor: &FindCursor) -> Result<Vec<Document>> {
        let mut find_opts = FindOptions::default();
        find_opts.projection = cursor.projection.clone();
        find_opts.sort = cursor.sort.clone();
        find_opts.skip = cursor.skip;
        find_opts.limit = cursor
            .limit
            .map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));

        let documents: Vec<Document> = self
            .collection(ns)
            .find(cursor.filter.clone())
            .with_options(find_opts)
            .await?
            .try_collect()
            .await?;

        debug!("Materialized {} documents from {}", documents.len(), ns);
        Ok(documents)
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.projection = projection;

        Ok(self
            .collection(ns)
            .find_one(filter)
            .with_options(options)
            .await?)
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let documents: Vec<Document> = self
            .collection(ns)
            .aggregate(pipeline)
            .await?
            .try_collect()
            .await?;
        Ok(documents)
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> Result<Bson> {
        let result = self.collection(ns).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>> {
        let result = self.collection(ns).insert_many(documents).await?;

        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        let result = self.collection(ns).update_one(filter, update).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        let result = self.collection(ns).update_many(filter, update).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        Ok(self.collection(ns).delete_one(filter).await?.deleted_count)
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        Ok(self.collection(ns).delete_many(filter).await?.deleted_count)
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        Ok(self.collection(ns).count_documents(filter).await?)
    }

    async fn distinct(&self, ns: &Namespace, field: &str, filter: Document) -> Result<Vec<Bson>> {
        Ok(self.collection(ns).distinct(field, filter).await?)
    }
}

/// Hide the password portion of a connection string for logging.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => uri.to_string(),
    }
}
