//! End-to-end chain execution tests against an in-memory store

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use serde_json::{Value as JsonValue, json};

use crate::error::{ConsoleError, ParseError, PolicyError, Result, UsageError};
use crate::executor::{CommandRouter, ReadOnlyFlag, ResultData};
use crate::store::{
    DatabaseInfo, DocumentStore, FindCursor, MemoryStore, Namespace, UpdateOutcome,
};

/// Wraps a store and counts every call that reaches it.
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.hit();
        self.inner.list_databases().await
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.hit();
        self.inner.list_collections(database).await
    }

    async fn find(&self, ns: &Namespace, cursor: &FindCursor) -> Result<Vec<Document>> {
        self.hit();
        self.inner.find(ns, cursor).await
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> Result<Option<Document>> {
        self.hit();
        self.inner.find_one(ns, filter, projection).await
    }

    async fn aggregate(&self, ns: &Namespace, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.hit();
        self.inner.aggregate(ns, pipeline).await
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> Result<Bson> {
        self.hit();
        self.inner.insert_one(ns, document).await
    }

    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>) -> Result<Vec<Bson>> {
        self.hit();
        self.inner.insert_many(ns, documents).await
    }

    async fn update_one(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        self.hit();
        self.inner.update_one(ns, filter, update).await
    }

    async fn update_many(
        &self,
        ns: &Namespace,
        filter: Document,
        update: Document,
    ) -> Result<UpdateOutcome> {
        self.hit();
        self.inner.update_many(ns, filter, update).await
    }

    async fn delete_one(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.hit();
        self.inner.delete_one(ns, filter).await
    }

    async fn delete_many(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.hit();
        self.inner.delete_many(ns, filter).await
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> Result<u64> {
        self.hit();
        self.inner.count_documents(ns, filter).await
    }

    async fn distinct(&self, ns: &Namespace, field: &str, filter: Document) -> Result<Vec<Bson>> {
        self.hit();
        self.inner.distinct(ns, field, filter).await
    }
}

struct Fixture {
    store: Arc<CountingStore>,
    flag: ReadOnlyFlag,
    router: CommandRouter,
}

impl Fixture {
    fn new() -> Self {
        let inner = MemoryStore::new()
            .with_documents(
                &Namespace::new("shop", "products"),
                vec![
                    doc! { "name": "lamp", "price": 120 },
                    doc! { "name": "desk", "price": 450 },
                    doc! { "name": "chair", "price": 210.5 },
                    doc! { "name": "pen", "price": 3 },
                    doc! { "name": "monitor", "price": 300_i64 },
                    doc! { "name": "shelf", "price": 101 },
                ],
            )
            .with_documents(
                &Namespace::new("shop", "orders"),
                vec![
                    doc! { "status": "paid", "total": 10, "tags": ["gift"] },
                    doc! { "status": "paid", "total": 25, "tags": ["gift", "rush"] },
                    doc! { "status": "open", "total": 7 },
                ],
            )
            .with_documents(&Namespace::new("admin", "system.version"), vec![doc! { "v": 1 }])
            .with_documents(&Namespace::new("local", "startup_log"), vec![doc! { "s": 1 }]);

        let store = Arc::new(CountingStore {
            inner,
            calls: AtomicUsize::new(0),
        });
        let flag = ReadOnlyFlag::new(false);
        let router = CommandRouter::new(store.clone(), Arc::new(flag.clone()));
        Self {
            store,
            flag,
            router,
        }
    }

    async fn run(&self, input: &str) -> Result<JsonValue> {
        self.run_in(input, None).await
    }

    async fn run_in(&self, input: &str, database: Option<&str>) -> Result<JsonValue> {
        Ok(self.router.execute(input, database).await?.to_json())
    }

    async fn count(&self, collection: &str) -> u64 {
        self.store
            .inner
            .count_documents(&Namespace::new("shop", collection), doc! {})
            .await
            .unwrap()
    }
}

fn names(result: &JsonValue) -> Vec<&str> {
    result["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_show_dbs_excludes_system_databases() {
    let fx = Fixture::new();
    let result = fx.run("show dbs").await.unwrap();

    let entries = result.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], json!("shop"));
    assert_eq!(entries[0]["empty"], json!(false));
    assert!(entries[0]["sizeOnDisk"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_find_sort_limit_returns_top_documents() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.products.find({price:{$gt:100}}).sort({price:-1}).limit(2)")
        .await
        .unwrap();

    assert_eq!(result["count"], json!(2));
    assert_eq!(names(&result), vec!["desk", "monitor"]);

    let id = result["documents"][0]["_id"].as_str().unwrap();
    assert_eq!(id.len(), 24);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn test_chain_matches_native_query() {
    let fx = Fixture::new();
    let ns = Namespace::new("shop", "products");

    let mut cursor = FindCursor::open(doc! { "price": { "$gte": 101 } });
    cursor.sort(doc! { "price": 1 });
    cursor.skip(1);
    cursor.limit(3);
    let native = fx.store.inner.find(&ns, &cursor).await.unwrap();

    let result = fx
        .router
        .execute(
            "db.shop.products.find({price: {$gte: 101}}).sort({price: 1}).skip(1).limit(3)",
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.data, ResultData::Documents(native));
    assert_eq!(result.stats.documents_returned, 3);
}

#[tokio::test]
async fn test_read_only_blocks_delete_many() {
    let fx = Fixture::new();
    fx.flag.set(true);

    let err = fx.run("db.shop.orders.deleteMany({})").await.unwrap_err();
    match err {
        ConsoleError::Policy(PolicyError::ReadOnly { operation }) => {
            assert_eq!(operation, "deleteMany");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fx.store.calls(), 0);
    assert_eq!(fx.count("orders").await, 3);
}

#[tokio::test]
async fn test_read_only_allows_reads() {
    let fx = Fixture::new();
    fx.flag.set(true);
    assert_eq!(
        fx.run("db.shop.orders.countDocuments({status: 'paid'})").await.unwrap(),
        json!(2)
    );
}

#[tokio::test]
async fn test_insert_one_relaxed_literal() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.users.insertOne({name:'Ana', tags:['a','b']})")
        .await
        .unwrap();

    assert_eq!(result["acknowledged"], json!(true));
    let id = result["insertedId"].as_str().unwrap();
    assert_eq!(id.len(), 24);

    let stored = fx
        .store
        .inner
        .documents(&Namespace::new("shop", "users"))
        .await;
    assert_eq!(stored.len(), 1);
    assert_eq!(
        stored[0].get_array("tags").unwrap(),
        &vec![Bson::String("a".into()), Bson::String("b".into())]
    );
    assert_eq!(stored[0].get_object_id("_id").unwrap().to_hex(), id);
}

#[tokio::test]
async fn test_string_values_are_stored_verbatim() {
    let fx = Fixture::new();
    fx.run(r#"db.shop.notes.insertOne({t: "see db.getCollection('x').find()"})"#)
        .await
        .unwrap();
    fx.run(concat!(
        r#"db.shop.notes.insertOne({t: "__oid_placeholder_0__", "#,
        r#"ref: ObjectId("65a1b2c3d4e5f60718293a4b")})"#
    ))
    .await
    .unwrap();

    let stored = fx
        .store
        .inner
        .documents(&Namespace::new("shop", "notes"))
        .await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].get_str("t").unwrap(), "see db.getCollection('x').find()");
    assert_eq!(stored[1].get_str("t").unwrap(), "__oid_placeholder_0__");
    assert_eq!(
        stored[1].get_object_id("ref").unwrap().to_hex(),
        "65a1b2c3d4e5f60718293a4b"
    );
}

#[tokio::test]
async fn test_update_through_array_leaves_document_intact() {
    let fx = Fixture::new();
    let err = fx
        .run("db.shop.orders.updateOne({total: 10}, {$set: {'tags.0': 'x'}})")
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::Store(_)));

    let order = fx.run("db.shop.orders.findOne({total: 10})").await.unwrap();
    assert_eq!(order["tags"], json!(["gift"]));
}

#[tokio::test]
async fn test_malformed_literal_never_reaches_store() {
    let fx = Fixture::new();
    let err = fx.run(r#"db.shop.users.find({name:"Ana")"#).await.unwrap_err();

    assert!(matches!(
        err,
        ConsoleError::Parse(ParseError::UnterminatedLiteral(_))
    ));
    assert_eq!(fx.store.calls(), 0);
}

#[tokio::test]
async fn test_find_one_is_idempotent() {
    let fx = Fixture::new();
    let inserted = fx
        .run("db.shop.users.insertOne({name: 'Bo', age: 31})")
        .await
        .unwrap();
    let id = inserted["insertedId"].as_str().unwrap().to_string();

    let query = format!("db.shop.users.findOne({{_id: ObjectId('{id}')}})");
    let first = fx.run(&query).await.unwrap();
    let second = fx.run(&query).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first["_id"], json!(id));
    assert_eq!(first["name"], json!("Bo"));
}

#[tokio::test]
async fn test_find_one_without_match_is_null() {
    let fx = Fixture::new();
    assert_eq!(
        fx.run("db.shop.products.findOne({name: 'sofa'})").await.unwrap(),
        JsonValue::Null
    );
}

#[tokio::test]
async fn test_limit_zero_is_empty_without_store_call() {
    let fx = Fixture::new();
    let result = fx.run("db.shop.products.find().limit(0)").await.unwrap();

    assert_eq!(result, json!({ "documents": [], "count": 0 }));
    assert_eq!(fx.store.calls(), 0);
}

#[tokio::test]
async fn test_skip_beyond_size_is_empty() {
    let fx = Fixture::new();
    let result = fx.run("db.shop.products.find().skip(100)").await.unwrap();
    assert_eq!(result, json!({ "documents": [], "count": 0 }));
}

#[tokio::test]
async fn test_limit_coercion() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.products.find().sort({price: 1}).limit('2')")
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["pen", "shelf"]);

    let result = fx
        .run("db.shop.products.find().sort({price: 1}).limit(-1)")
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["pen"]);
}

#[tokio::test]
async fn test_projection_and_no_op_cursor_calls() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.products.find({name: 'pen'}, {_id: 0, name: 1}).toArray()")
        .await
        .unwrap();
    assert_eq!(result, json!({ "documents": [{ "name": "pen" }], "count": 1 }));

    let result = fx.run("db.shop.products.find({name: 'pen'}).pretty()").await.unwrap();
    assert_eq!(result["count"], json!(1));
}

#[tokio::test]
async fn test_second_find_is_rejected() {
    let fx = Fixture::new();
    let err = fx.run("db.shop.products.find({}).find({})").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Usage(UsageError::CursorAlreadyOpen)));
}

#[tokio::test]
async fn test_cursor_method_requires_find() {
    let fx = Fixture::new();
    let err = fx.run("db.shop.products.sort({price: 1})").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Usage(UsageError::CursorRequired(m)) if m == "sort"));
}

#[tokio::test]
async fn test_terminal_must_be_last() {
    let fx = Fixture::new();
    let err = fx
        .run("db.shop.products.countDocuments({}).limit(1)")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Usage(UsageError::TerminalNotLast { .. })
    ));
    assert_eq!(fx.store.calls(), 0);
}

#[tokio::test]
async fn test_unsupported_methods() {
    let fx = Fixture::new();
    let err = fx.run("db.shop.products.drop()").await.unwrap_err();
    match &err {
        ConsoleError::Usage(UsageError::UnsupportedMethod { method, supported }) => {
            assert_eq!(method, "drop");
            assert!(supported.contains(&"insertMany"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("countDocuments"));

    let err = fx.run("db.shop.products.find().count()").await.unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Usage(UsageError::UnsupportedMethod { .. })
    ));
}

#[tokio::test]
async fn test_aggregate() {
    let fx = Fixture::new();
    let result = fx
        .run(concat!(
            "db.shop.orders.aggregate([{$match: {status: 'paid'}}, ",
            "{$sort: {total: -1}}, {$project: {_id: 0, total: 1}}])"
        ))
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "documents": [{ "total": 25 }, { "total": 10 }], "count": 2 })
    );

    let err = fx
        .run("db.shop.orders.aggregate({$match: {}})")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConsoleError::Usage(UsageError::InvalidArguments { .. })
    ));
}

#[tokio::test]
async fn test_update_and_delete() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.orders.updateMany({status: 'paid'}, {$set: {status: 'shipped'}})")
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({ "acknowledged": true, "matchedCount": 2, "modifiedCount": 2 })
    );

    let result = fx
        .run("db.shop.orders.updateOne({status: 'open'}, {$inc: {total: 3}})")
        .await
        .unwrap();
    assert_eq!(result["modifiedCount"], json!(1));

    let result = fx.run("db.shop.orders.deleteOne({status: 'shipped'})").await.unwrap();
    assert_eq!(result, json!({ "acknowledged": true, "deletedCount": 1 }));
    assert_eq!(fx.count("orders").await, 2);
}

#[tokio::test]
async fn test_write_argument_checks() {
    let fx = Fixture::new();
    for input in [
        "db.shop.orders.deleteMany()",
        "db.shop.orders.insertOne()",
        "db.shop.orders.insertOne([{a: 1}])",
        "db.shop.orders.insertMany([])",
        "db.shop.orders.updateOne({status: 'open'})",
        "db.shop.orders.distinct()",
    ] {
        let err = fx.run(input).await.unwrap_err();
        assert!(
            matches!(err, ConsoleError::Usage(UsageError::InvalidArguments { .. })),
            "{input}: {err:?}"
        );
    }
    assert_eq!(fx.count("orders").await, 3);
}

#[tokio::test]
async fn test_insert_many_returns_text_ids() {
    let fx = Fixture::new();
    let result = fx
        .run("db.shop.tags.insertMany([{_id: 'a'}, {_id: 'b'}, {label: 'c'}])")
        .await
        .unwrap();
    assert_eq!(result["insertedCount"], json!(3));

    let ids = result["insertedIds"].as_array().unwrap();
    assert_eq!(ids[0], json!("a"));
    assert_eq!(ids[1], json!("b"));
    assert_eq!(ids[2].as_str().unwrap().len(), 24);
}

#[tokio::test]
async fn test_count_and_distinct() {
    let fx = Fixture::new();
    assert_eq!(fx.run("db.shop.orders.countDocuments()").await.unwrap(), json!(3));
    assert_eq!(
        fx.run("db.shop.orders.distinct('tags')").await.unwrap(),
        json!(["gift", "rush"])
    );
    assert_eq!(
        fx.run("db.shop.orders.distinct('status', {total: {$lt: 20}})")
            .await
            .unwrap(),
        json!(["open", "paid"])
    );
}

#[tokio::test]
async fn test_current_database_shorthand() {
    let fx = Fixture::new();
    let result = fx
        .run_in("db.products.find({price: {$lt: 10}})", Some("shop"))
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["pen"]);

    assert_eq!(
        fx.run_in("db.getCollectionNames()", Some("shop")).await.unwrap(),
        json!(["orders", "products"])
    );
    assert!(matches!(
        fx.run_in("show collections", Some("shop")).await.unwrap_err(),
        ConsoleError::Usage(UsageError::DatabaseRequired(_))
    ));
    assert_eq!(
        fx.run_in("db.getCollection('orders').countDocuments()", Some("shop"))
            .await
            .unwrap(),
        json!(3)
    );
}

#[tokio::test]
async fn test_use_database() {
    let fx = Fixture::new();
    assert_eq!(
        fx.run("use shop").await.unwrap(),
        json!({ "database": "shop", "message": "switched to db shop" })
    );
    assert!(matches!(
        fx.run("use nowhere").await.unwrap_err(),
        ConsoleError::Usage(UsageError::UnknownDatabase(_))
    ));
}

#[tokio::test]
async fn test_execution_time_is_recorded() {
    let fx = Fixture::new();
    let result = fx.router.execute("db.shop.orders.find()", None).await.unwrap();
    assert_eq!(result.stats.documents_returned, 3);
    assert!(result.stats.execution_time_ms < 60_000);
}
