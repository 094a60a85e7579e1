/// Base collection client
use crate::error::Result;
use crate::executor::{Executor, Operation};
use crate::query::{Query, QueryRequest, QueryResponse};
use crate::update::Update;
use crate::Record;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

const KEY: &str = "key";
const ITEMS: &str = "items";
const QUERY: &str = "query";

/// A stored record together with its `key`
///
/// On the wire this is the record object with `key` among its fields. The
/// record is decoded from the whole object, `key` included, so a `T` that
/// declares its own `key` field receives it too.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyed<T> {
    pub key: String,
    pub item: T,
}

impl<T: Serialize> Serialize for Keyed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error as _;

        let mut fields = match serde_json::to_value(&self.item).map_err(S::Error::custom)? {
            Value::Object(fields) => fields,
            other => {
                let message = format!("record must serialize to a JSON object, got {}", other);
                return Err(S::Error::custom(message));
            }
        };
        fields.insert(KEY.to_string(), Value::String(self.key.clone()));
        fields.serialize(serializer)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Keyed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let key = match fields.get(KEY) {
            Some(Value::String(key)) => key.clone(),
            Some(other) => return Err(D::Error::custom(format!("key must be a string, got {}", other))),
            None => return Err(D::Error::missing_field(KEY)),
        };
        let item = T::deserialize(Value::Object(fields)).map_err(D::Error::custom)?;
        Ok(Self { key, item })
    }
}

impl<T> Keyed<T> {
    pub fn into_inner(self) -> T {
        self.item
    }
}

impl<T> Deref for Keyed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> DerefMut for Keyed<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

/// One or many items, always sent as a list
#[derive(Debug, Clone, PartialEq)]
pub struct Items<T>(Vec<T>);

impl<T> Items<T> {
    pub fn into_vec(self) -> Vec<T> {
        self.0
    }
}

impl<T> From<T> for Items<T> {
    fn from(item: T) -> Self {
        Self(vec![item])
    }
}

impl<T> From<Vec<T>> for Items<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

impl<T, const N: usize> From<[T; N]> for Items<T> {
    fn from(items: [T; N]) -> Self {
        Self(items.into())
    }
}

/// Body of `PUT /items`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PutRequest<T> {
    pub items: Vec<T>,
}

impl<T> PutRequest<T> {
    pub fn new(items: impl Into<Items<T>>) -> Self {
        Self {
            items: items.into().into_vec(),
        }
    }
}

/// Body of `POST /items`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsertRequest<T> {
    pub item: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> ItemList<T> {
    fn empty() -> Self {
        Self { items: Vec::new() }
    }
}

/// Partial-success report of a batch put.
///
/// Items the service refused are listed in `failed`; this is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct PutResponse<T> {
    #[serde(default = "ItemList::empty")]
    pub processed: ItemList<Keyed<T>>,
    #[serde(default = "ItemList::empty")]
    pub failed: ItemList<T>,
}

impl<T> PutResponse<T> {
    pub fn all_processed(&self) -> bool {
        self.failed.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub key: String,
}

/// The applied update object plus the item's key
pub type UpdateResponse = Keyed<Update>;

/// Client for one Base collection.
///
/// `T` is the record type; it defaults to a schemaless JSON object. Cloning
/// is cheap and clones share the underlying connection pool.
pub struct Base<T = Record> {
    name: Arc<str>,
    executor: Executor,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Base<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            executor: self.executor.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Base<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("name", &self.name)
            .field("base_url", &self.executor.base_url().as_str())
            .finish()
    }
}

impl<T> Base<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(name: &str, executor: Executor) -> Self {
        Self {
            name: Arc::from(name),
            executor,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<endpoint>/v1/<projectId>/<name>`
    pub fn base_url(&self) -> &Url {
        self.executor.base_url()
    }

    /// Store one or many items, overwriting existing keys
    ///
    /// # Example
    /// ```no_run
    /// # use dena_client::{Base, Dena};
    /// # use serde_json::json;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let dena = Dena::new("project_secret")?;
    /// let users: Base = dena.base("users")?;
    ///
    /// let alice = json!({ "key": "alice", "age": 30 }).as_object().cloned().unwrap();
    /// let response = users.put(alice).await?;
    /// if !response.all_processed() {
    ///     println!("{} items were rejected", response.failed.items.len());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn put(&self, items: impl Into<Items<T>>) -> Result<PutResponse<T>> {
        let body = PutRequest::new(items);
        let operation = Operation::new(Method::PUT).segment(ITEMS).json(&body)?;
        self.executor.execute(operation).await
    }

    /// Get a stored item. A missing key fails with the service's 404 payload.
    pub async fn get(&self, key: &str) -> Result<Keyed<T>> {
        let operation = Operation::default().segment(ITEMS).segment(key);
        self.executor.execute(operation).await
    }

    /// Delete an item. Deleting a missing key also succeeds.
    pub async fn delete(&self, key: &str) -> Result<DeleteResponse> {
        let operation = Operation::new(Method::DELETE).segment(ITEMS).segment(key);
        self.executor.execute(operation).await
    }

    /// Create an item only if its key is not taken
    pub async fn insert(&self, item: T) -> Result<Keyed<T>> {
        let body = InsertRequest { item };
        let operation = Operation::new(Method::POST).segment(ITEMS).json(&body)?;
        self.executor.execute(operation).await
    }

    /// Apply an update object to an existing item
    ///
    /// # Example
    /// ```no_run
    /// # use dena_client::{Base, Dena, Update};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let dena = Dena::new("project_secret")?;
    /// let users: Base = dena.base("users")?;
    ///
    /// let update = Update::new()
    ///     .set("profile.active", true)
    ///     .increment("visits", 1)
    ///     .append("tags", "rust")
    ///     .delete("temporary");
    ///
    /// users.update("alice", &update).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update(&self, key: &str, update: &Update) -> Result<UpdateResponse> {
        update.validate()?;
        let operation = Operation::new(Method::PATCH)
            .segment(ITEMS)
            .segment(key)
            .json(update)?;
        self.executor.execute(operation).await
    }

    /// Fetch one page of items matching `query`
    ///
    /// # Example
    /// ```no_run
    /// # use dena_client::{Base, Dena, Filter};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let dena = Dena::new("project_secret")?;
    /// let users: Base = dena.base("users")?;
    ///
    /// let mut last = None;
    /// loop {
    ///     let page = users
    ///         .query(Filter::new().gte("age", 18), Some(100), last.as_deref())
    ///         .await?;
    ///     println!("Fetched {} items", page.paging.size);
    ///     match page.paging.last {
    ///         Some(cursor) => last = Some(cursor),
    ///         None => break,
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query(
        &self,
        query: impl Into<Query>,
        limit: Option<usize>,
        last: Option<&str>,
    ) -> Result<QueryResponse<T>> {
        let body = QueryRequest::new(query, limit, last);
        let operation = Operation::new(Method::POST).segment(QUERY).json(&body)?;
        self.executor.execute(operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_single_item_normalized_to_list() {
        let item = record(json!({ "key": "a", "n": 1 }));
        let single = PutRequest::new(item.clone());
        let list = PutRequest::new(vec![item.clone()]);
        let array = PutRequest::new([item]);

        assert_eq!(single, list);
        assert_eq!(single, array);
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            json!({ "items": [{ "key": "a", "n": 1 }] })
        );
    }

    #[test]
    fn test_insert_body_shape() {
        let body = InsertRequest {
            item: User { name: "alice".into(), age: 30 },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "item": { "name": "alice", "age": 30 } })
        );
    }

    #[test]
    fn test_keyed_flattens_record() {
        let keyed: Keyed<User> =
            serde_json::from_value(json!({ "key": "u1", "name": "bob", "age": 41 })).unwrap();
        assert_eq!(keyed.key, "u1");
        assert_eq!(keyed.name, "bob");
        assert_eq!(
            serde_json::to_value(&keyed).unwrap(),
            json!({ "key": "u1", "name": "bob", "age": 41 })
        );
        assert_eq!(keyed.into_inner(), User { name: "bob".into(), age: 41 });
    }

    #[test]
    fn test_keyed_record_declaring_key() {
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        struct Account {
            key: String,
            name: String,
        }

        let keyed: Keyed<Account> =
            serde_json::from_value(json!({ "key": "acc1", "name": "main" })).unwrap();
        assert_eq!(keyed.key, "acc1");
        assert_eq!(keyed.item, Account { key: "acc1".into(), name: "main".into() });
        assert_eq!(
            serde_json::to_value(&keyed).unwrap(),
            json!({ "key": "acc1", "name": "main" })
        );
    }

    #[test]
    fn test_keyed_schemaless_record_keeps_key() {
        let stored = record(json!({ "key": "a", "n": 1 }));
        let keyed: Keyed<Record> = serde_json::from_value(json!(stored.clone())).unwrap();

        assert_eq!(keyed.key, "a");
        assert_eq!(keyed.into_inner(), stored);
    }

    #[test]
    fn test_keyed_requires_string_key() {
        let missing = serde_json::from_value::<Keyed<Record>>(json!({ "n": 1 })).unwrap_err();
        assert!(missing.to_string().contains("missing field `key`"));

        let numeric = serde_json::from_value::<Keyed<Record>>(json!({ "key": 7 })).unwrap_err();
        assert!(numeric.to_string().contains("key must be a string"));
    }

    #[test]
    fn test_put_response_partial_failure() {
        let response: PutResponse<Record> = serde_json::from_value(json!({
            "processed": { "items": [{ "key": "a", "n": 1 }] },
            "failed": { "items": [{ "key": "b", "n": 2 }] }
        }))
        .unwrap();

        assert!(!response.all_processed());
        assert_eq!(response.processed.items[0].key, "a");
        assert_eq!(response.failed.items[0].get("key"), Some(&json!("b")));
    }

    #[test]
    fn test_put_response_failed_absent() {
        let response: PutResponse<User> = serde_json::from_value(json!({
            "processed": { "items": [{ "key": "u1", "name": "x", "age": 1 }] }
        }))
        .unwrap();

        assert!(response.all_processed());
        assert_eq!(response.processed.items.len(), 1);
    }

    #[test]
    fn test_update_response_shape() {
        let response: UpdateResponse = serde_json::from_value(json!({
            "key": "u1",
            "set": { "age": 31 },
            "delete": ["nickname"]
        }))
        .unwrap();

        assert_eq!(response.key, "u1");
        assert_eq!(response.item, Update::new().set("age", 31).delete("nickname"));
    }

    #[tokio::test]
    async fn test_update_validated_before_sending() {
        // nothing listens on port 1; reaching the network would be a transport error
        let config = crate::ClientConfig::new().with_base_endpoint("http://127.0.0.1:1");
        let users: Base = crate::Dena::with_config("proj_key", config)
            .unwrap()
            .base("users")
            .unwrap();

        let update = Update::new().delete("a").delete("a");
        let err = users.update("k", &update).await.unwrap_err();
        assert!(matches!(err, crate::ClientError::InvalidArgument(_)));
    }
}
