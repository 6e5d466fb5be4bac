//! In-process document store
//!
//! Collections live in memory behind a `tokio::sync::RwLock` and are queried
//! with the evaluator in [`eval`]. Databases and collections are created on
//! first insert, as the server does.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, oid::ObjectId};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};

use super::{DatabaseInfo, DocumentStore, FindCursor, Namespace, UpdateOutcome};

pub mod eval;

type Collections = BTreeMap<String, Vec<Document>>;

/// Document store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: RwLock<BTreeMap<String, Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection. Documents without `_id` get a generated ObjectId.
    pub fn with_documents(mut self, ns: &Namespace, documents: Vec<Document>) -> Self {
        let collection = self
            .databases
            .get_mut()
            .entry(ns.database.clone())
            .or_default()
            .entry(ns.collection.clone())
            .or_default();

        collection.extend(documents.into_iter().map(|mut doc| {
            ensure_id(&mut doc);
            doc
        }));
        self
    }

    /// Snapshot of one collection, in insertion order.
    pub async fn documents(&self, ns: &Namespace) -> Vec<Document> {
        let databases = self.databases.read().await;
        collection(&databases, ns).to_vec()
    }

    async fn update(
        &self,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
        multi: bool,
    ) -> Result<UpdateOutcome> {
        let mut databases = self.databases.write().await;
        let Some(docs) = collection_mut(&mut databases, ns) else {
            return Ok(UpdateOutcome::default());
        };

        let mut outcome = UpdateOutcome::default();
        for doc in docs.iter_mut() {
            if !eval::matches(doc, filter)? {
                continue;
            }
            let mut updated = doc.clone();
            outcome.matched += 1;
            if eval::apply_update(&mut updated, update)? {
                outcome.modified += 1;
                *doc = updated;
            }
            if !multi {
                break;
            }
        }
        Ok(outcome)
    }

    async fn delete(&self, ns: &Namespace, filter: &Document, multi: bool) -> Result<u64> {
        let mut databases = self.databases.write().await;
        let Some(docs) = collection_mut(&mut databases, ns) else {
            return Ok(0);
        };

        let mut doomed = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            if eval::matches(doc, filter)? {
                doomed.push(index);
                if !multi {
                    break;
                }
            }
        }

        for index in doomed.iter().rev() {
            docs.remove(*index);
        }
        Ok(doomed.len() as u64)
    }

    async fn matching(&self, ns: &Namespace, filter: &Document) -> Result<Vec<Document>> {
        let databases = self.databases.read().await;
        let mut out = Vec::new();
        for doc in collection(&databases, ns) {
            if eval::matches(doc, filter)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }
}

fn collection<'a>(databases: &'a BTreeMap<String, Collections>, ns: &Namespace) -> &'a [Document] {
    databases
        .get(&ns.database)
        .and_then(|db| db.get(&ns.collection))
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn collection_mut<'a>(
    databases: &'a mut BTreeMap<String, Collections>,
    ns: &Namespace,
) -> Option<&'a mut Vec<Document>> {
    databases
        .get_mut(&ns.database)
        .and_then(|db| db.get_mut(&ns.collection))
}

/// Put a generated `_id` first when the document has none.
fn ensure_id(doc: &mut Document) -> Bson {
    if let Some(id) = doc.get("_id") {
        return id.clone();
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    for (key, value) in std::mem::take(doc) {
        with_id.insert(key, value);
    }
    *doc = with_id;
    id
}

fn duplicate_key(ns: &Namespace, id: &Bson) -> crate::error::ConsoleError {
    StoreError::Backend(format!("duplicate key error collection: {ns} _id: {id}")).into()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let databases = self.databases.read().await;
        let mut infos = Vec::with_capacity(databases.len());

        for (name, collections) in databases.iter() {
            let mut size = 0u64;
            let mut count = 0usize;
            for doc in collections.values().flatten() {
                size += bson::to_vec(doc).map(|bytes| bytes.len() as u64).unwrap_or(0);
                count += 1;
            }
            infos.push(DatabaseInfo {
                name: name.clone(),
                size_on_disk: size,
                empty: count == 0,
            });
        }
        Ok(infos)
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let databases = self.databases.read().await;
        Ok(databases
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, ns: &Namespace, cursor: &FindCursor) -> Result<Vec<Document>> {
        let mut docs = self.matching(ns, &cursor.filter).await?;

        if let Some(sort) = &cursor.sort {
            eval::sort_documents(&mut docs, sort)?;
        }

        let skip = cursor.skip.map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let limit = cursor.limit.map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        let mut docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

        if let Some(projection) = &cursor.projection {
            docs = docs
                .iter()
                .map(|doc| eval::project(doc, projection))
                .collect::<Result<_>>()?;
        }

        debug!("Memory find on {} returned {} documents", ns, docs.len());
        Ok(docs)
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        let mut cursor = FindCursor::open(filter).with_projection(projection);
        cursor.limit(1);
        Ok(self.find(ns, &cursor).await?.into_iter().next())
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let docs = self.documents(ns).await;
        eval::run_pipeline(docs, &pipeline)
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> Result<Bson> {
        let mut ids = self.insert_many(ns, vec![document]).await?;
        ids.pop()
            .ok_or_else(|| StoreError::Backend("insert produced no id".to_string()).into())
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>> {
        let mut databases = self.databases.write().await;
        let docs = databases
            .entry(ns.database.clone())
            .or_default()
            .entry(ns.collection.clone())
            .or_default();

        let mut staged = Vec::with_capacity(documents.len());
        let mut ids: Vec<Bson> = Vec::with_capacity(documents.len());
        for mut doc in documents {
            let id = ensure_id(&mut doc);
            let taken = docs.iter().any(|existing| existing.get("_id") == Some(&id))
                || ids.contains(&id);
            if taken {
                return Err(duplicate_key(ns, &id));
            }
            ids.push(id);
            staged.push(doc);
        }

        docs.extend(staged);
        debug!("Memory insert into {}: {} documents", ns, ids.len());
        Ok(ids)
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        self.update(ns, &filter, &update, false).await
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        self.update(ns, &filter, &update, true).await
    }

    async fn delete_one(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.delete(ns, &filter, false).await
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.delete(ns, &filter, true).await
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        Ok(self.matching(ns, &filter).await?.len() as u64)
    }

    async fn distinct(&self, ns: &Namespace, field: &str, filter: Document) -> Result<Vec<Bson>> {
        let docs = self.matching(ns, &filter).await?;
        Ok(eval::distinct_values(&docs, field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn ns() -> Namespace {
        Namespace::new("shop", "items")
    }

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_documents(
            &ns(),
            vec![
                doc! { "_id": 1, "name": "pen", "qty": 10 },
                doc! { "_id": 2, "name": "ink", "qty": 0 },
                doc! { "_id": 3, "name": "pad", "qty": 4 },
            ],
        )
    }

    #[tokio::test]
    async fn test_find_with_cursor_options() {
        let store = seeded();
        let mut cursor = FindCursor::open(doc! { "qty": { "$gt": 0 } })
            .with_projection(Some(doc! { "name": 1, "_id": 0 }));
        cursor.sort(doc! { "qty": 1 });
        cursor.limit(1);

        let docs = store.find(&ns(), &cursor).await.unwrap();
        assert_eq!(docs, vec![doc! { "name": "pad" }]);
    }

    #[tokio::test]
    async fn test_missing_collection_is_empty() {
        let store = MemoryStore::new();
        let docs = store
            .find(&Namespace::new("nope", "nothing"), &FindCursor::default())
            .await
            .unwrap();
        assert!(docs.is_empty());
        assert!(store.list_collections("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_generates_object_id() {
        let store = MemoryStore::new();
        let id = store.insert_one(&ns(), doc! { "name": "cup" }).await.unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let docs = store.documents(&ns()).await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = seeded();
        let err = store
            .insert_many(&ns(), vec![doc! { "_id": 9 }, doc! { "_id": 1 }])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "store");
        assert_eq!(store.documents(&ns()).await.len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = seeded();
        let outcome = store
            .update_many(&ns(), doc! {}, doc! { "$inc": { "qty": 1 } })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 3, modified: 3 });

        let outcome = store
            .update_one(&ns(), doc! { "name": "pen" }, doc! { "$set": { "qty": 11 } })
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0 });

        assert_eq!(store.delete_one(&ns(), doc! {}).await.unwrap(), 1);
        assert_eq!(store.delete_many(&ns(), doc! {}).await.unwrap(), 2);
        assert_eq!(store.count_documents(&ns(), doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_databases() {
        let store = seeded().with_documents(&Namespace::new("empty", "c"), Vec::new());
        let infos = store.list_databases().await.unwrap();

        assert_eq!(infos.len(), 2);
        let shop = infos.iter().find(|i| i.name == "shop").unwrap();
        assert!(!shop.empty);
        assert!(shop.size_on_disk > 0);
        assert!(infos.iter().find(|i| i.name == "empty").unwrap().empty);
    }

    #[tokio::test]
    async fn test_distinct_and_aggregate() {
        let store = seeded();
        let values = store
            .distinct(&ns(), "name", doc! { "qty": { "$gt": 0 } })
            .await
            .unwrap();
        assert_eq!(values, vec![Bson::String("pad".into()), Bson::String("pen".into())]);

        let out = store
            .aggregate(&ns(), vec![doc! { "$match": { "qty": 0 } }, doc! { "$count": "n" }])
            .await
            .unwrap();
        assert_eq!(out, vec![doc! { "n": 1 }]);
    }
}
