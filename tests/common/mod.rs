#![allow(dead_code)]

use schema_sync_rs::es::MemoryStore;
use schema_sync_rs::models::{AliasDefinition, DesiredIndex, IndexSchema, ObservedIndex};
use schema_sync_rs::schema::{ActionPlanner, ElasticsearchDialect, SchemaManager, SimpleLayout};
use serde_json::{Value, json};
use std::sync::Arc;

pub fn manager(store: &Arc<MemoryStore>) -> SchemaManager {
    let planner = ActionPlanner::new(Arc::new(SimpleLayout), Arc::new(ElasticsearchDialect::default()));
    SchemaManager::new(store.clone(), planner)
}

pub fn schema(value: Value) -> IndexSchema {
    serde_json::from_value(value).expect("valid schema document")
}

/// A desired schema touching every section the differ walks.
pub fn books_schema() -> IndexSchema {
    schema(json!({
        "mappings": {
            "dynamic": "strict",
            "dynamic_templates": [
                { "ids": { "match": "*_id", "mapping": { "type": "keyword" } } },
                { "strings": { "match_mapping_type": "string", "mapping": { "type": "text" } } }
            ],
            "properties": {
                "title": { "type": "text", "analyzer": "folding" },
                "isbn": { "type": "keyword", "normalizer": "lower" },
                "published": { "type": "date", "format": ["uuuu-MM-dd", "epoch_millis"] },
                "pages": { "type": "integer", "index": false }
            }
        },
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1,
            "analysis": {
                "analyzer": {
                    "folding": { "type": "custom", "tokenizer": "grams", "filter": ["lowercase", "asciifolding"] }
                },
                "normalizer": {
                    "lower": { "type": "custom", "filter": ["lowercase"] }
                },
                "tokenizer": {
                    "grams": { "type": "edge_ngram", "min_gram": 2, "max_gram": 10, "token_chars": ["letter", "digit"] }
                }
            }
        }
    }))
}

pub fn books() -> DesiredIndex {
    DesiredIndex::new("books", books_schema())
}

/// Seeds `books-000001` with the given schema and the aliases of the simple layout.
pub fn seed_books(store: &MemoryStore, schema: IndexSchema) {
    store.insert_index(
        "books-000001",
        ObservedIndex {
            aliases: [
                ("books-write".to_owned(), AliasDefinition::write()),
                ("books-read".to_owned(), AliasDefinition::read()),
            ]
            .into_iter()
            .collect(),
            schema,
        },
    );
}
