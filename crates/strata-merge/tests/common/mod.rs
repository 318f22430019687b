//! Shared fixture: a primary `core` storage and two overlays, `merge1` and
//! `merge2`, with `fr` and `de` collections.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use strata_memory::InMemoryStorage;
use strata_storage::{ConfigItem, DynStorage, Payload};

pub const CORE_HASH: &str = "R4IF-ClDHXxblLcG0L7MgsLvfBIMAvi_skumNFQwkDc";

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn item(name: &str, value: Value) -> ConfigItem {
    ConfigItem::new(name, payload(value))
}

pub struct Fixture {
    pub core: InMemoryStorage,
    pub merge1: InMemoryStorage,
    pub merge2: InMemoryStorage,
}

impl Fixture {
    pub fn new() -> Self {
        let core = InMemoryStorage::with_items([
            item("foo.bar", json!({"value": "core"})),
            item(
                "core.extension",
                json!({
                    "module": {"contact": 0, "minimal_plus": 1000},
                    "theme": {"bartik": 0},
                    "profile": "minimal_plus",
                    "_core": {"default_config_hash": CORE_HASH},
                }),
            ),
            item("foo.bar", json!({"value": "fr-core"})).in_collection("fr"),
        ]);

        let merge1 = InMemoryStorage::with_items([
            item("bar.foo", json!({"value": "merge1"})),
            item("foo.bar", json!({"value": "merge1"})),
            item(
                "core.extension",
                json!({
                    "module": {
                        "block": 0,
                        "dblog": 0,
                        "dynamic_page_cache": 0,
                        "field": 0,
                        "file": 0,
                        "filter": 0,
                        "node": 0,
                        "page_cache": 0,
                        "simpletest": 0,
                        "system": 0,
                        "text": 0,
                        "update": 0,
                        "user": 0,
                        "minimal": 1000,
                    },
                    "theme": {"classy": 0, "stark": 0},
                    "profile": "minimal",
                    "_core": {"default_config_hash": CORE_HASH},
                }),
            ),
            item("bar.foo", json!({"value": "fr-merge1"})).in_collection("fr"),
        ]);

        let merge2 = InMemoryStorage::with_items([
            item("baa.baa", json!({"value": "merge2"})),
            item("foo.bar", json!({"value": "merge2"})),
            item("baa.baa", json!({"value": "de-merge2"})).in_collection("de"),
        ]);

        Self {
            core,
            merge1,
            merge2,
        }
    }

    /// `core` followed by the named overlays, in order.
    pub fn stack(&self, overlays: &[&str]) -> Vec<DynStorage> {
        let mut layers: Vec<DynStorage> = vec![Arc::new(self.core.clone())];
        for name in overlays {
            layers.push(self.overlay(name));
        }
        layers
    }

    pub fn overlay(&self, name: &str) -> DynStorage {
        match name {
            "core" => Arc::new(self.core.clone()),
            "merge1" => Arc::new(self.merge1.clone()),
            "merge2" => Arc::new(self.merge2.clone()),
            other => panic!("unknown fixture storage {other}"),
        }
    }
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn keys(data: &Payload, field: &str) -> Vec<String> {
    data[field]
        .as_object()
        .map(|list| list.keys().cloned().collect())
        .unwrap_or_default()
}
