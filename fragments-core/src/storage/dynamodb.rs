/*!
DynamoDB metadata store.

One item per fragment in a table keyed by `ownerId` (partition key) and `id`
(sort key). Every attribute of the persisted record is stored as a top-level
item attribute.
*/

use super::aws::{call, map_sdk_error};
use super::MetadataStore;
use crate::metadata::FragmentMetadata;
use crate::{FragmentError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use fragments_retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const STORE: &str = "dynamodb";
const OWNER_KEY: &str = "ownerId";
const ID_KEY: &str = "id";
const TABLE_READY_TIMEOUT: Duration = Duration::from_secs(60);

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed implementation of [`MetadataStore`]
#[derive(Debug, Clone)]
pub struct DynamoMetadataStore {
    client: Client,
    table_name: String,
    retry: RetryPolicy,
}

impl DynamoMetadataStore {
    pub fn new(client: Client, table_name: impl Into<String>, retry: RetryPolicy) -> Self {
        let table_name = table_name.into();
        info!(table = %table_name, "Initialized DynamoDB metadata store");
        Self {
            client,
            table_name,
            retry,
        }
    }

    /// Build a client from a loaded SDK configuration
    pub fn from_sdk_config(
        sdk_config: &SdkConfig,
        table_name: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self::new(Client::new(sdk_config), table_name, retry)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the table if it does not exist and wait for it to become active
    ///
    /// A table that already exists counts as success.
    pub async fn ensure_table(&self) -> Result<()> {
        let owner_key = KeySchemaElement::builder()
            .attribute_name(OWNER_KEY)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| FragmentError::storage(format!("invalid key schema: {e}")))?;
        let id_key = KeySchemaElement::builder()
            .attribute_name(ID_KEY)
            .key_type(KeyType::Range)
            .build()
            .map_err(|e| FragmentError::storage(format!("invalid key schema: {e}")))?;
        let owner_attr = AttributeDefinition::builder()
            .attribute_name(OWNER_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| FragmentError::storage(format!("invalid attribute definition: {e}")))?;
        let id_attr = AttributeDefinition::builder()
            .attribute_name(ID_KEY)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| FragmentError::storage(format!("invalid attribute definition: {e}")))?;

        let (owner_key, id_key) = (&owner_key, &id_key);
        let (owner_attr, id_attr) = (&owner_attr, &id_attr);
        call(STORE, "create_table", &self.retry, || async move {
            let result = self
                .client
                .create_table()
                .table_name(&self.table_name)
                .key_schema(owner_key.clone())
                .key_schema(id_key.clone())
                .attribute_definitions(owner_attr.clone())
                .attribute_definitions(id_attr.clone())
                .billing_mode(BillingMode::PayPerRequest)
                .send()
                .await;

            match result {
                Ok(_) => {
                    info!(table = %self.table_name, "Created DynamoDB table");
                    Ok(())
                }
                Err(err)
                    if err
                        .as_service_error()
                        .is_some_and(|e| e.is_resource_in_use_exception()) =>
                {
                    info!(table = %self.table_name, "DynamoDB table already exists");
                    Ok(())
                }
                Err(err) => Err(map_sdk_error("create_table", err, FragmentError::Storage)),
            }
        })
        .await?;

        self.client
            .wait_until_table_exists()
            .table_name(&self.table_name)
            .wait(TABLE_READY_TIMEOUT)
            .await
            .map_err(|e| {
                FragmentError::storage(format!(
                    "table {} did not become active: {e}",
                    self.table_name
                ))
            })?;

        Ok(())
    }
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    async fn put(&self, owner_id: &str, id: &str, metadata: &FragmentMetadata) -> Result<()> {
        debug!(table = %self.table_name, owner_id, fragment_id = id, "Putting fragment metadata");
        let item = &to_item(owner_id, id, metadata);

        call(STORE, "put_item", &self.retry, || async move {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item.clone()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("put_item", e, FragmentError::Storage))
        })
        .await
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<Option<FragmentMetadata>> {
        debug!(table = %self.table_name, owner_id, fragment_id = id, "Getting fragment metadata");

        let output = call(STORE, "get_item", &self.retry, || async move {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key(OWNER_KEY, AttributeValue::S(owner_id.to_string()))
                .key(ID_KEY, AttributeValue::S(id.to_string()))
                .consistent_read(true)
                .send()
                .await
                .map_err(|e| map_sdk_error("get_item", e, FragmentError::Storage))
        })
        .await?;

        output.item().map(from_item).transpose()
    }

    async fn query_by_owner(&self, owner_id: &str) -> Result<Vec<FragmentMetadata>> {
        debug!(table = %self.table_name, owner_id, "Querying fragment metadata by owner");

        let items = call(STORE, "query", &self.retry, || async move {
            let mut items: Vec<Item> = Vec::new();
            let mut exclusive_start_key = None;

            loop {
                let response = self
                    .client
                    .query()
                    .table_name(&self.table_name)
                    .key_condition_expression("#owner = :owner")
                    .expression_attribute_names("#owner", OWNER_KEY)
                    .expression_attribute_values(":owner", AttributeValue::S(owner_id.to_string()))
                    .consistent_read(true)
                    .set_exclusive_start_key(exclusive_start_key)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error("query", e, FragmentError::Storage))?;

                items.extend(response.items().iter().cloned());

                exclusive_start_key = response.last_evaluated_key().cloned();
                if exclusive_start_key.is_none() {
                    break;
                }
            }

            Ok(items)
        })
        .await?;

        items.iter().map(from_item).collect()
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        debug!(table = %self.table_name, owner_id, fragment_id = id, "Deleting fragment metadata");

        call(STORE, "delete_item", &self.retry, || async move {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key(OWNER_KEY, AttributeValue::S(owner_id.to_string()))
                .key(ID_KEY, AttributeValue::S(id.to_string()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("delete_item", e, FragmentError::Storage))
        })
        .await
    }
}

fn to_item(owner_id: &str, id: &str, metadata: &FragmentMetadata) -> Item {
    use crate::metadata::format_timestamp;

    HashMap::from([
        (OWNER_KEY.to_string(), AttributeValue::S(owner_id.to_string())),
        (ID_KEY.to_string(), AttributeValue::S(id.to_string())),
        ("type".to_string(), AttributeValue::S(metadata.media_type.clone())),
        ("size".to_string(), AttributeValue::N(metadata.size.to_string())),
        (
            "created".to_string(),
            AttributeValue::S(format_timestamp(&metadata.created)),
        ),
        (
            "updated".to_string(),
            AttributeValue::S(format_timestamp(&metadata.updated)),
        ),
    ])
}

fn from_item(item: &Item) -> Result<FragmentMetadata> {
    let string = |name: &str| match item.get(name) {
        Some(AttributeValue::S(value)) => Ok(value.clone()),
        _ => Err(FragmentError::storage(format!(
            "metadata item is missing string attribute '{name}'"
        ))),
    };
    let size = match item.get("size") {
        Some(AttributeValue::N(value)) => value.parse::<u64>().map_err(|e| {
            FragmentError::storage(format!("metadata item has invalid size '{value}': {e}"))
        })?,
        _ => {
            return Err(FragmentError::storage(
                "metadata item is missing numeric attribute 'size'",
            ))
        }
    };

    let record = serde_json::json!({
        "id": string(ID_KEY)?,
        "ownerId": string(OWNER_KEY)?,
        "type": string("type")?,
        "size": size,
        "created": string("created")?,
        "updated": string("updated")?,
    });
    Ok(serde_json::from_value(record)?)
}
