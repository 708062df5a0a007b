//! Initial document collections with `$jsonSchema` validators and indexes.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use tracing::info;

use strata_core::{Error, Result};

use super::DocumentMigration;

/// Creates the strategy, indicator, logging, event, model, and optimiser
/// collections.
pub struct CollectionsSchema;

struct CollectionSpec {
    name: &'static str,
    validator: Document,
    indexes: Vec<IndexModel>,
}

fn index(keys: Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec {
            name: "strategy_configs",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["strategy_id", "config", "version"],
                    "properties": {
                        "strategy_id": { "bsonType": "string" },
                        "strategy_name": { "bsonType": "string" },
                        "config": { "bsonType": "object" },
                        "version": { "bsonType": "int" },
                        "indicators": { "bsonType": "array" },
                        "entry_conditions": { "bsonType": "object" },
                        "exit_conditions": { "bsonType": "object" },
                        "risk_management": { "bsonType": "object" },
                        "created_at": { "bsonType": "date" },
                        "updated_at": { "bsonType": "date" }
                    }
                }
            },
            indexes: vec![
                unique_index(doc! { "strategy_id": 1 }),
                index(doc! { "strategy_name": 1 }),
                index(doc! { "created_at": -1 }),
            ],
        },
        CollectionSpec {
            name: "indicator_metadata",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["indicator_id", "name", "category"],
                    "properties": {
                        "indicator_id": { "bsonType": "string" },
                        "name": { "bsonType": "string" },
                        "category": {
                            "bsonType": "string",
                            "enum": ["trend", "momentum", "volatility", "volume", "custom", "ml"]
                        },
                        "description": { "bsonType": "string" },
                        "parameters": { "bsonType": "array" },
                        "default_params": { "bsonType": "object" },
                        "computation_complexity": {
                            "bsonType": "string",
                            "enum": ["low", "medium", "high", "very_high"]
                        },
                        "supports_simd": { "bsonType": "bool" },
                        "version": { "bsonType": "string" }
                    }
                }
            },
            indexes: vec![
                unique_index(doc! { "indicator_id": 1 }),
                index(doc! { "category": 1 }),
                index(doc! { "name": 1 }),
            ],
        },
        CollectionSpec {
            name: "system_logs",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["timestamp", "level", "message"],
                    "properties": {
                        "timestamp": { "bsonType": "date" },
                        "level": {
                            "bsonType": "string",
                            "enum": ["debug", "info", "warn", "error", "critical"]
                        },
                        "service": { "bsonType": "string" },
                        "message": { "bsonType": "string" },
                        "context": { "bsonType": "object" },
                        "error_stack": { "bsonType": "string" }
                    }
                }
            },
            indexes: vec![
                index(doc! { "timestamp": -1 }),
                index(doc! { "level": 1, "timestamp": -1 }),
                index(doc! { "service": 1, "timestamp": -1 }),
            ],
        },
        CollectionSpec {
            name: "event_store",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["event_id", "event_type", "timestamp"],
                    "properties": {
                        "event_id": { "bsonType": "string" },
                        "event_type": { "bsonType": "string" },
                        "aggregate_id": { "bsonType": "string" },
                        "aggregate_type": { "bsonType": "string" },
                        "payload": { "bsonType": "object" },
                        "metadata": { "bsonType": "object" },
                        "timestamp": { "bsonType": "date" },
                        "user_id": { "bsonType": "string" }
                    }
                }
            },
            indexes: vec![
                unique_index(doc! { "event_id": 1 }),
                index(doc! { "aggregate_id": 1, "timestamp": 1 }),
                index(doc! { "event_type": 1, "timestamp": -1 }),
            ],
        },
        CollectionSpec {
            name: "ml_models",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["model_id", "model_type", "version"],
                    "properties": {
                        "model_id": { "bsonType": "string" },
                        "model_name": { "bsonType": "string" },
                        "model_type": {
                            "bsonType": "string",
                            "enum": ["classifier", "regressor", "clustering", "reinforcement"]
                        },
                        "architecture": { "bsonType": "string" },
                        "hyperparameters": { "bsonType": "object" },
                        "training_config": { "bsonType": "object" },
                        "performance_metrics": { "bsonType": "object" },
                        "version": { "bsonType": "string" },
                        "status": {
                            "bsonType": "string",
                            "enum": ["training", "trained", "deployed", "archived"]
                        },
                        "trained_at": { "bsonType": "date" },
                        "deployed_at": { "bsonType": "date" }
                    }
                }
            },
            indexes: vec![
                unique_index(doc! { "model_id": 1 }),
                index(doc! { "status": 1 }),
                index(doc! { "trained_at": -1 }),
            ],
        },
        CollectionSpec {
            name: "genetic_algorithm_config",
            validator: doc! {
                "$jsonSchema": {
                    "bsonType": "object",
                    "required": ["config_id", "algorithm_type"],
                    "properties": {
                        "config_id": { "bsonType": "string" },
                        "algorithm_type": {
                            "bsonType": "string",
                            "enum": ["simple_ga", "nsga2", "nsga3", "custom"]
                        },
                        "population_size": { "bsonType": "int" },
                        "generations": { "bsonType": "int" },
                        "mutation_rate": { "bsonType": "double" },
                        "crossover_rate": { "bsonType": "double" },
                        "selection_method": {
                            "bsonType": "string",
                            "enum": ["tournament", "roulette", "rank", "elitist"]
                        },
                        "fitness_function": { "bsonType": "object" },
                        "objectives": { "bsonType": "array" }
                    }
                }
            },
            indexes: vec![unique_index(doc! { "config_id": 1 })],
        },
    ]
}

#[async_trait]
impl DocumentMigration for CollectionsSchema {
    fn name(&self) -> &'static str {
        "001_collections_schema"
    }

    async fn apply(&self, db: &Database) -> Result<()> {
        for spec in collections() {
            let index_count = spec.indexes.len();

            db.create_collection(spec.name)
                .validator(spec.validator)
                .await
                .map_err(|e| {
                    Error::Document(format!("Failed to create collection {}: {}", spec.name, e))
                })?;

            db.collection::<Document>(spec.name)
                .create_indexes(spec.indexes)
                .await
                .map_err(|e| {
                    Error::Document(format!("Failed to create {} indexes: {}", spec.name, e))
                })?;

            info!(
                subsystem = "mongodb",
                collection = spec.name,
                index_count,
                "Collection created"
            );
        }
        Ok(())
    }
}
