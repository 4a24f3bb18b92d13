//! Fixtures shared by unit tests: the sample schema and a seeded in-memory store.

use crate::config::{resolve, ApiConfig, FullConfig, ModelConfig, Registry};
use crate::store::MemoryStore;
use std::sync::Arc;

const MODELS: &str = include_str!("../sample/models.json");
const SEED: &str = include_str!("../sample/seed.json");

pub fn sample_config() -> FullConfig {
    let models: Vec<ModelConfig> = serde_json::from_str(MODELS).expect("sample models.json");
    FullConfig {
        api: ApiConfig::default(),
        models,
    }
}

pub fn sample_registry() -> Registry {
    resolve(&sample_config()).expect("sample registry")
}

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new(Arc::new(sample_registry()));
    store
        .seed_from_value(serde_json::from_str(SEED).expect("sample seed.json"))
        .expect("seed");
    store
}
