//! DynamoDB reader over a JSON export of table descriptions and sampled items.
//!
//! Expected layout (the `Table` object of `DescribeTable`, plus a sample):
//!
//! ```json
//! { "Tables": [ {
//!     "TableName": "orders",
//!     "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}],
//!     "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "S"}],
//!     "GlobalSecondaryIndexes": [...],
//!     "LocalSecondaryIndexes": [...],
//!     "Items": [{"id": {"S": "a"}, "total": {"N": "10"}}]
//! } ] }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::builder::{ColumnDraft, IndexDraft, SchemaBuilder, TableDraft};
use super::SchemaReader;
use crate::core::{IssueCategory, IssueTarget, SourceDialect, SourceType};
use crate::error::{ConvertError, Result};

/// Share of non-null sampled values one type needs to be chosen without an issue.
pub const DOMINANT_TYPE_THRESHOLD: f64 = 0.9;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Export {
    tables: Vec<TableExport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableExport {
    table_name: String,
    #[serde(default)]
    key_schema: Vec<KeyElement>,
    #[serde(default)]
    attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default)]
    global_secondary_indexes: Vec<SecondaryIndex>,
    #[serde(default)]
    local_secondary_indexes: Vec<SecondaryIndex>,
    #[serde(default)]
    items: Vec<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyElement {
    attribute_name: String,
    key_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeDefinition {
    attribute_name: String,
    attribute_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecondaryIndex {
    index_name: String,
    key_schema: Vec<KeyElement>,
}

/// Type tally for one attribute across the sample.
#[derive(Debug, Default)]
struct AttributeStats {
    counts: BTreeMap<String, usize>,
}

impl AttributeStats {
    /// Dominant type and whether it clears the threshold.
    fn dominant(&self) -> Option<(String, bool)> {
        let non_null: usize = self.counts.values().sum();
        if non_null == 0 {
            return None;
        }
        let (ty, count) = self
            .counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))?;
        let share = *count as f64 / non_null as f64;
        Some((ty.clone(), share >= DOMINANT_TYPE_THRESHOLD))
    }
}

/// Reads a DynamoDB JSON export.
pub struct DynamoDbReader {
    path: PathBuf,
}

impl DynamoDbReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse already-loaded export text into `builder`.
    pub fn read_str(&self, json: &str, builder: &mut SchemaBuilder) -> Result<()> {
        let export: Export = serde_json::from_str(json)
            .map_err(|e| ConvertError::source_parse(self.path.display().to_string(), e.to_string()))?;

        for table in export.tables {
            if builder.should_stop() {
                break;
            }
            self.read_table(table, builder)?;
        }
        Ok(())
    }

    fn read_table(&self, table: TableExport, builder: &mut SchemaBuilder) -> Result<()> {
        let mut draft = TableDraft::new(None, table.table_name.clone());

        let mut declared: BTreeMap<String, String> = BTreeMap::new();
        let mut order: Vec<String> = Vec::new();
        for def in &table.attribute_definitions {
            declared.insert(def.attribute_name.clone(), def.attribute_type.clone());
        }

        // Keys first: HASH then RANGE
        let mut keys: Vec<&KeyElement> = table.key_schema.iter().collect();
        keys.sort_by_key(|k| if k.key_type.eq_ignore_ascii_case("HASH") { 0 } else { 1 });
        if keys.is_empty() {
            return Err(ConvertError::source_parse(
                table.table_name.clone(),
                "table has no KeySchema",
            ));
        }
        for key in &keys {
            if !declared.contains_key(&key.attribute_name) {
                return Err(ConvertError::source_parse(
                    table.table_name.clone(),
                    format!(
                        "key attribute '{}' has no AttributeDefinition",
                        key.attribute_name
                    ),
                ));
            }
            order.push(key.attribute_name.clone());
        }
        for def in &table.attribute_definitions {
            if !order.contains(&def.attribute_name) {
                order.push(def.attribute_name.clone());
            }
        }

        let mut stats: BTreeMap<String, AttributeStats> = BTreeMap::new();
        for item in &table.items {
            for (name, value) in item {
                let entry = stats.entry(name.clone()).or_default();
                if let Some(ty) = attribute_type(value) {
                    *entry.counts.entry(ty).or_insert(0) += 1;
                }
            }
        }
        for name in stats.keys() {
            if !order.contains(name) {
                order.push(name.clone());
            }
        }

        let mut ambiguous = Vec::new();
        for name in &order {
            let is_key = keys.iter().any(|k| &k.attribute_name == name);
            let ty = match declared.get(name) {
                Some(ty) => ty.clone(),
                None => match stats.get(name).and_then(|s| s.dominant()) {
                    Some((ty, true)) => ty,
                    Some((_, false)) => {
                        ambiguous.push(format!(
                            "Attribute {}.{} has mixed types in the sample ({}); mapped as string.",
                            table.table_name,
                            name,
                            describe_counts(&stats[name])
                        ));
                        "S".to_string()
                    }
                    None => {
                        ambiguous.push(format!(
                            "Attribute {}.{} is only null in the sample; mapped as string.",
                            table.table_name, name
                        ));
                        "S".to_string()
                    }
                },
            };
            let mut column = ColumnDraft::new(name.clone(), SourceType::simple(&ty));
            // Attributes are optional except for key attributes
            column.nullable = !is_key;
            draft.columns.push(column);
        }

        draft.primary_key = keys
            .iter()
            .map(|k| (k.attribute_name.clone(), false))
            .collect();

        for index in table
            .global_secondary_indexes
            .iter()
            .chain(&table.local_secondary_indexes)
        {
            let mut keys: Vec<&KeyElement> = index.key_schema.iter().collect();
            keys.sort_by_key(|k| if k.key_type.eq_ignore_ascii_case("HASH") { 0 } else { 1 });
            draft.indexes.push(IndexDraft {
                name: Some(index.index_name.clone()),
                columns: keys
                    .iter()
                    .map(|k| (k.attribute_name.clone(), false))
                    .collect(),
                unique: false,
            });
        }

        debug!(
            "DynamoDB table {}: {} attributes from {} sampled items",
            table.table_name,
            draft.columns.len(),
            table.items.len()
        );

        if let Some(id) = builder.add_table(draft)? {
            for detail in ambiguous {
                builder.issue(
                    IssueCategory::AmbiguousMapping,
                    IssueTarget::Table { table: id },
                    detail,
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SchemaReader for DynamoDbReader {
    fn dialect(&self) -> SourceDialect {
        SourceDialect::DynamoDb
    }

    async fn read(&mut self, builder: &mut SchemaBuilder) -> Result<()> {
        info!("Reading DynamoDB export {}", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;

        let audit = builder.audit_mut();
        audit.bytes_read = bytes.len() as u64;
        audit.source_digest = Some(hex::encode(Sha256::digest(&bytes)));

        let json = String::from_utf8_lossy(&bytes);
        self.read_str(&json, builder)?;
        info!("Read {} tables from export", builder.table_count());
        Ok(())
    }
}

/// Type descriptor of an attribute value such as `{"N": "1"}`; `None` for NULL.
fn attribute_type(value: &serde_json::Value) -> Option<String> {
    let object = value.as_object()?;
    let (ty, _) = object.iter().next()?;
    if ty == "NULL" {
        return None;
    }
    Some(ty.clone())
}

fn describe_counts(stats: &AttributeStats) -> String {
    stats
        .counts
        .iter()
        .map(|(ty, n)| format!("{} x{}", ty, n))
        .collect::<Vec<_>>()
        .join(", ")
}
