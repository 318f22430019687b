mod common;

use std::sync::Arc;

use assert_json_diff::assert_json_eq;
use common::{CORE_HASH, Fixture, keys, names, payload};
use serde_json::{Value, json};
use strata_merge::{
    AdapterRegistry, CORE_EXTENSION, CoreExtensionAdapter, DataAdapter, ExtensionKind,
    LayeredStorage, MergeError, WriteOutcome,
};
use strata_storage::{ConfigStorage, Payload};

const MERGED_MODULES: &[&str] = &[
    "block",
    "contact",
    "dblog",
    "dynamic_page_cache",
    "field",
    "file",
    "filter",
    "node",
    "page_cache",
    "simpletest",
    "system",
    "text",
    "update",
    "user",
    "minimal_plus",
];

fn remove(data: &mut Payload, field: &str, name: &str) {
    if let Some(Value::Object(list)) = data.get_mut(field) {
        list.shift_remove(name);
    }
}

fn insert(data: &mut Payload, field: &str, name: &str, weight: i64) {
    if let Some(Value::Object(list)) = data.get_mut(field) {
        list.insert(name.to_string(), json!(weight));
    }
}

#[test]
fn test_applies() {
    let adapter = CoreExtensionAdapter::new();
    assert!(adapter.applies("core.extension"));
    assert!(!adapter.applies("system.site"));
    assert!(adapter.applies_to_any(&names(&["core.extension", "system.site"])));
    assert!(!adapter.applies_to_any(&names(&["system.file", "system.site"])));
}

#[test]
fn test_read_primary_only() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();

    let data = adapter.read(CORE_EXTENSION, &fixture.stack(&[])).unwrap().unwrap();
    assert_eq!(keys(&data, "module"), names(&["contact", "minimal_plus"]));
    assert_json_eq!(data["module"], json!({"contact": 0, "minimal_plus": 1000}));
    assert_json_eq!(data["theme"], json!({"bartik": 0}));
    assert_eq!(data["profile"], json!("minimal_plus"));
}

#[test]
fn test_read_merges_overlays() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();

    // merge1 uses the minimal profile, but the primary's profile wins and
    // minimal is not merged in as a module.
    let data = adapter
        .read(CORE_EXTENSION, &fixture.stack(&["merge1"]))
        .unwrap()
        .unwrap();
    assert_eq!(keys(&data, "module"), names(MERGED_MODULES));
    assert_eq!(data["module"]["minimal_plus"], json!(1000));
    assert_eq!(keys(&data, "theme"), names(&["bartik", "classy", "stark"]));
    assert_eq!(data["profile"], json!("minimal_plus"));
}

#[test]
fn test_read_missing_everywhere() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();
    let stack = vec![fixture.overlay("merge2")];
    assert!(adapter.read(CORE_EXTENSION, &stack).unwrap().is_none());
    assert!(
        adapter
            .read_multiple(&names(&[CORE_EXTENSION]), &stack)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_read_multiple_only_returns_extension_list() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();

    let data = adapter
        .read_multiple(&names(&["core.extension", "foo.bar"]), &fixture.stack(&["merge1"]))
        .unwrap();
    assert_eq!(data.len(), 1);
    assert!(!data.contains_key("foo.bar"));
    assert_eq!(keys(&data[CORE_EXTENSION], "module"), names(MERGED_MODULES));

    let data = adapter
        .read_multiple(&names(&["foo.bar"]), &fixture.stack(&["merge1"]))
        .unwrap();
    assert!(data.is_empty());
}

#[test]
fn test_write_deltas() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();
    let mut stack = fixture.stack(&["merge1"]);

    let mut current = adapter.read(CORE_EXTENSION, &stack).unwrap().unwrap();
    let mut expected = fixture.core.read(CORE_EXTENSION).unwrap().unwrap();

    // Nothing to change.
    assert!(adapter.write(CORE_EXTENSION, &current, &stack).unwrap().is_none());

    // Remove a module the primary owns.
    remove(&mut current, "module", "contact");
    remove(&mut expected, "module", "contact");
    let delta = adapter.write(CORE_EXTENSION, &current, &stack).unwrap().unwrap();
    assert_json_eq!(json!(delta), json!(expected));

    // Remove a theme the primary owns.
    remove(&mut current, "theme", "bartik");
    remove(&mut expected, "theme", "bartik");
    let delta = adapter.write(CORE_EXTENSION, &current, &stack).unwrap().unwrap();
    assert_json_eq!(json!(delta), json!(expected));

    // Add modules and themes.
    insert(&mut current, "module", "page_manager", 0);
    insert(&mut current, "module", "devel", 10);
    insert(&mut current, "theme", "seven", 0);
    insert(&mut current, "theme", "bartik", 0);
    let delta = adapter.write(CORE_EXTENSION, &current, &stack).unwrap().unwrap();
    assert_json_eq!(
        json!(delta),
        json!({
            "module": {"page_manager": 0, "devel": 10, "minimal_plus": 1000},
            "theme": {"bartik": 0, "seven": 0},
            "profile": "minimal_plus",
            "_core": {"default_config_hash": CORE_HASH},
        })
    );
    assert_eq!(
        keys(&delta, "module"),
        names(&["page_manager", "devel", "minimal_plus"])
    );
    assert_eq!(keys(&delta, "theme"), names(&["bartik", "seven"]));

    // A primary without an extension list of its own.
    let mut current = fixture.merge1.read(CORE_EXTENSION).unwrap().unwrap();
    stack[0] = fixture.overlay("merge2");
    assert!(adapter.write(CORE_EXTENSION, &current, &stack).unwrap().is_none());

    insert(&mut current, "module", "page_manager", 0);
    insert(&mut current, "module", "devel", 10);
    insert(&mut current, "theme", "seven", 0);
    insert(&mut current, "theme", "bartik", 0);
    let delta = adapter.write(CORE_EXTENSION, &current, &stack).unwrap().unwrap();
    assert_json_eq!(
        json!(delta),
        json!({
            "module": {"page_manager": 0, "devel": 10},
            "theme": {"bartik": 0, "seven": 0},
            "profile": "minimal",
            "_core": {"default_config_hash": CORE_HASH},
        })
    );
    assert_eq!(keys(&delta, "module"), names(&["page_manager", "devel"]));
}

#[test]
fn test_first_write_keeps_only_extensions() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();
    let stack = vec![fixture.overlay("merge2")];

    let proposed = payload(json!({
        "module": {"node": 0, "devel": 10},
        "theme": {"stark": 0},
        "profile": "standard",
        "_core": {"default_config_hash": CORE_HASH},
    }));
    let delta = adapter.write(CORE_EXTENSION, &proposed, &stack).unwrap().unwrap();
    assert_json_eq!(
        json!(delta),
        json!({"module": {"node": 0, "devel": 10}, "theme": {"stark": 0}})
    );

    // Once the lists are stored, the missing fields alone are not a change.
    fixture.merge2.write(CORE_EXTENSION, &delta).unwrap();
    assert!(adapter.write(CORE_EXTENSION, &proposed, &stack).unwrap().is_none());
}

#[test]
fn test_write_rejects_module_removal_from_overlay() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();
    let stack = fixture.stack(&["merge1"]);

    let mut current = adapter.read(CORE_EXTENSION, &stack).unwrap().unwrap();
    remove(&mut current, "module", "node");
    remove(&mut current, "module", "text");

    let err = adapter.write(CORE_EXTENSION, &current, &stack).unwrap_err();
    assert_eq!(err.to_string(), "Unexpected module removal: node, text");
    assert!(matches!(
        err,
        MergeError::UnexpectedRemoval {
            kind: ExtensionKind::Module,
            ..
        }
    ));
}

#[test]
fn test_write_rejects_theme_removal_from_overlay() {
    let fixture = Fixture::new();
    let adapter = CoreExtensionAdapter::new();
    let stack = fixture.stack(&["merge1"]);

    let mut current = adapter.read(CORE_EXTENSION, &stack).unwrap().unwrap();
    remove(&mut current, "theme", "classy");
    remove(&mut current, "theme", "stark");

    let err = adapter.write(CORE_EXTENSION, &current, &stack).unwrap_err();
    assert_eq!(err.to_string(), "Unexpected theme removal: classy, stark");
    assert!(err.is_conflict());
}

#[test]
fn test_layered_storage_uses_adapter() {
    let fixture = Fixture::new();
    let storage = LayeredStorage::with_adapters(
        fixture.stack(&["merge1"]),
        AdapterRegistry::with_defaults(),
        "",
    )
    .unwrap();

    let mut current = storage.read(CORE_EXTENSION).unwrap().unwrap();
    assert_eq!(keys(&current, "module"), names(MERGED_MODULES));

    let all = storage
        .read_multiple(&names(&["core.extension", "foo.bar"]))
        .unwrap();
    assert_eq!(all[CORE_EXTENSION], current);
    assert_eq!(all["foo.bar"], payload(json!({"value": "core"})));

    // Writing back the merged value leaves the primary untouched.
    let outcome = storage.write(CORE_EXTENSION, &current).unwrap();
    assert_eq!(outcome, WriteOutcome::Unchanged);

    insert(&mut current, "module", "devel", 10);
    let outcome = storage.write(CORE_EXTENSION, &current).unwrap();
    assert_eq!(outcome, WriteOutcome::Written);

    let primary = fixture.core.read(CORE_EXTENSION).unwrap().unwrap();
    assert_eq!(
        keys(&primary, "module"),
        names(&["contact", "devel", "minimal_plus"])
    );
    // merge1 still holds its own list.
    let overlay = fixture.merge1.read(CORE_EXTENSION).unwrap().unwrap();
    assert!(overlay["module"].get("devel").is_none());

    // The merged view picks up the new module.
    let merged = storage.read(CORE_EXTENSION).unwrap().unwrap();
    assert_eq!(merged["module"]["devel"], json!(10));
}

#[test]
fn test_layered_storage_surfaces_conflict() {
    let fixture = Fixture::new();
    let storage: Arc<dyn ConfigStorage> = Arc::new(
        LayeredStorage::with_adapters(
            fixture.stack(&["merge1"]),
            AdapterRegistry::with_defaults(),
            "",
        )
        .unwrap(),
    );

    let mut current = storage.read(CORE_EXTENSION).unwrap().unwrap();
    remove(&mut current, "module", "node");

    let err = storage.write(CORE_EXTENSION, &current).unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(err.to_string(), "Unexpected module removal: node");
    assert!(fixture.core.read(CORE_EXTENSION).unwrap().unwrap()["module"]
        .get("node")
        .is_none());
}
