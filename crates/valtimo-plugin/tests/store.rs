//! Configuration store behavior against the in-memory and file repositories

mod common;

use common::{properties, Fixture, SECRET};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;
use valtimo_definitions::{ActivityType, EventType};
use valtimo_plugin::codec::GCM_PREFIX;
use valtimo_plugin::placeholder::MapSource;
use valtimo_plugin::{
    ChangeSet, ConfigurationEvent, ConfigurationFilter, ConfigurationRepository,
    ConfigurationStore, Encryptor, FileConfigurationRepository, StoreError,
    StoredConfiguration,
};

fn create_test(fixture: &Fixture, title: &str, props: Value) -> Uuid {
    fixture
        .store
        .create(None, title, properties(props), "test-plugin")
        .unwrap()
        .id
}

#[test]
fn test_missing_required_property_message() {
    let fixture = Fixture::new();

    let err = fixture
        .store
        .create(None, "t", properties(json!({"count": 1})), "test-plugin")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Plugin property with name 'name' is required for plugin 'Test Plugin'"
    );

    let empty = fixture
        .store
        .create(None, "t", properties(json!({"name": ""})), "test-plugin")
        .unwrap_err();
    assert!(matches!(empty, StoreError::PropertyRequired { .. }));
    assert!(fixture.repository.find_all().unwrap().is_empty());
}

#[test]
fn test_unparseable_property_message() {
    let fixture = Fixture::new();

    let err = fixture
        .store
        .create(None, "t", properties(json!({"name": ["a", "b"]})), "test-plugin")
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Plugin property with name 'name' failed to parse for plugin 'Test Plugin': expected string, got array"
    );
}

#[test]
fn test_create_coerces_and_encrypts() {
    let fixture = Fixture::new();
    let created = fixture
        .store
        .create(
            None,
            "My Test",
            properties(json!({"name": "alpha", "count": "7", "token": "s3cret"})),
            "test-plugin",
        )
        .unwrap();

    assert_eq!(created.properties["count"], json!(7));
    assert_eq!(created.properties["token"], json!("s3cret"));

    let row = fixture.repository.find(created.id).unwrap().unwrap();
    let stored = row.properties["token"].as_str().unwrap();
    assert!(stored.starts_with(GCM_PREFIX));
    assert_eq!(row.properties["name"], json!("alpha"));

    assert_eq!(fixture.store.get(created.id).unwrap(), created);
    assert_eq!(fixture.hooks.get(EventType::Create), 1);
    assert!(matches!(
        fixture.events.events().as_slice(),
        [ConfigurationEvent::Created(configuration)] if configuration.id == created.id
    ));
}

#[test]
fn test_create_with_existing_id_fails() {
    let fixture = Fixture::new();
    let id = create_test(&fixture, "one", json!({"name": "a"}));

    let err = fixture
        .store
        .create(Some(id), "two", properties(json!({"name": "b"})), "test-plugin")
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(existing) if existing == id));
}

#[test]
fn test_unknown_definition() {
    let fixture = Fixture::new();
    let err = fixture
        .store
        .create(None, "t", properties(json!({})), "nope")
        .unwrap_err();
    assert!(matches!(err, StoreError::DefinitionNotFound(key) if key == "nope"));
}

#[test]
fn test_failed_create_hook_leaves_nothing_behind() {
    let fixture = Fixture::new();

    let err = fixture
        .store
        .create(
            None,
            "t",
            properties(json!({"name": "alpha", "failHooks": true})),
            "test-plugin",
        )
        .unwrap_err();

    match err {
        StoreError::PluginEventInvocation { hook, event, .. } => {
            assert_eq!(hook, "track");
            assert_eq!(event, EventType::Create);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(fixture.repository.find_all().unwrap().is_empty());
    assert!(fixture.events.events().is_empty());
    assert_eq!(fixture.hooks.get(EventType::Create), 0);
}

#[test]
fn test_update_keeps_omitted_secrets() {
    let fixture = Fixture::new();
    let id = create_test(&fixture, "t", json!({"name": "alpha", "token": "s3cret"}));

    let updated = fixture
        .store
        .update(id, None, "renamed", properties(json!({"name": "beta", "token": null})))
        .unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(updated.properties["token"], json!("s3cret"));

    let updated = fixture
        .store
        .update(id, None, "renamed", properties(json!({"name": "beta"})))
        .unwrap();
    assert_eq!(updated.properties["token"], json!("s3cret"));

    let replaced = fixture
        .store
        .update(id, None, "renamed", properties(json!({"name": "beta", "token": "n3w"})))
        .unwrap();
    assert_eq!(fixture.store.get(id).unwrap().properties["token"], json!("n3w"));
    assert_eq!(replaced.properties["name"], json!("beta"));
    assert_eq!(fixture.hooks.get(EventType::Update), 3);
}

#[test]
fn test_update_moves_id_and_rewrites_references() {
    let fixture = Fixture::new();
    let old_id = create_test(&fixture, "target", json!({"name": "alpha"}));
    let linked = fixture
        .store
        .create(
            None,
            "linked",
            properties(json!({"target": old_id.to_string()})),
            "linked-plugin",
        )
        .unwrap();
    let new_id = Uuid::new_v4();

    let moved = fixture
        .store
        .update(old_id, Some(new_id), "target", properties(json!({"name": "alpha"})))
        .unwrap();

    assert_eq!(moved.id, new_id);
    assert!(fixture.store.find(old_id).unwrap().is_none());
    assert_eq!(fixture.store.get(new_id).unwrap().title, "target");
    assert_eq!(
        fixture.store.get(linked.id).unwrap().properties["target"],
        json!(new_id.to_string())
    );
    assert!(matches!(
        fixture.events.events().last(),
        Some(ConfigurationEvent::Updated { previous_id, configuration })
            if *previous_id == old_id && configuration.id == new_id
    ));
}

#[test]
fn test_update_to_taken_id_fails() {
    let fixture = Fixture::new();
    let first = create_test(&fixture, "one", json!({"name": "a"}));
    let second = create_test(&fixture, "two", json!({"name": "b"}));

    let err = fixture
        .store
        .update(first, Some(second), "one", properties(json!({"name": "a"})))
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(id) if id == second));
    assert_eq!(fixture.repository.find_all().unwrap().len(), 2);
}

#[test]
fn test_failed_update_hook_restores_previous_rows() {
    let fixture = Fixture::new();
    let old_id = create_test(&fixture, "target", json!({"name": "alpha"}));
    let linked = fixture
        .store
        .create(
            None,
            "linked",
            properties(json!({"target": old_id.to_string()})),
            "linked-plugin",
        )
        .unwrap();
    let new_id = Uuid::new_v4();

    let err = fixture
        .store
        .update(
            old_id,
            Some(new_id),
            "target",
            properties(json!({"name": "beta", "failHooks": true})),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::PluginEventInvocation { .. }));

    assert!(fixture.store.find(new_id).unwrap().is_none());
    let restored = fixture.store.get(old_id).unwrap();
    assert_eq!(restored.properties["name"], json!("alpha"));
    assert_eq!(
        fixture.store.get(linked.id).unwrap().properties["target"],
        json!(old_id.to_string())
    );
}

#[test]
fn test_delete_runs_hooks_once() {
    let fixture = Fixture::new();
    let id = create_test(&fixture, "t", json!({"name": "alpha"}));

    let removed = fixture.store.delete(id).unwrap();
    assert_eq!(removed.id, id);
    assert_eq!(fixture.hooks.get(EventType::Delete), 1);
    assert!(fixture.store.find(id).unwrap().is_none());
    assert!(matches!(
        fixture.events.events().last(),
        Some(ConfigurationEvent::Deleted(configuration)) if configuration.id == id
    ));

    assert!(matches!(
        fixture.store.delete(id),
        Err(StoreError::ConfigurationNotFound(missing)) if missing == id
    ));
    assert_eq!(fixture.hooks.get(EventType::Delete), 1);
}

#[test]
fn test_failed_delete_hook_keeps_row() {
    let fixture = Fixture::new();
    let id = fixture
        .store
        .create(None, "t", properties(json!({"name": "alpha"})), "test-plugin")
        .unwrap()
        .id;
    // Flip the flag behind the store's back so the delete hook refuses.
    let mut row = fixture.repository.find(id).unwrap().unwrap();
    row.properties.insert("failHooks".to_string(), json!(true));
    fixture.repository.commit(ChangeSet::new().save(row)).unwrap();

    assert!(matches!(
        fixture.store.delete(id),
        Err(StoreError::PluginEventInvocation { event: EventType::Delete, .. })
    ));
    assert!(fixture.store.find(id).unwrap().is_some());
}

#[test]
fn test_search_filters_and_reports_failures() {
    let fixture = Fixture::new();
    let test_id = create_test(&fixture, "t", json!({"name": "alpha", "token": "x"}));
    let linked = fixture
        .store
        .create(
            None,
            "linked",
            properties(json!({"target": test_id.to_string()})),
            "linked-plugin",
        )
        .unwrap();

    let broken = StoredConfiguration {
        id: Uuid::new_v4(),
        title: "broken".to_string(),
        definition_key: "test-plugin".to_string(),
        properties: properties(json!({"name": "b", "token": format!("{GCM_PREFIX}AAAA")})),
    };
    fixture
        .repository
        .commit(ChangeSet::new().save(broken.clone()))
        .unwrap();

    let by_category = fixture
        .store
        .search(&ConfigurationFilter::default().category("linked"))
        .unwrap();
    assert_eq!(by_category.items.len(), 1);
    assert_eq!(by_category.items[0].id, linked.id);
    assert!(by_category.is_complete());

    let by_activity = fixture
        .store
        .search(&ConfigurationFilter::default().activity_type(ActivityType::ServiceTaskStart))
        .unwrap();
    assert_eq!(by_activity.items.len(), 1);
    assert_eq!(by_activity.items[0].id, test_id);
    assert_eq!(by_activity.failures.len(), 1);
    assert_eq!(by_activity.failures[0].id, broken.id);
    assert!(matches!(by_activity.failures[0].error, StoreError::Codec { .. }));

    let everything = fixture.store.list().unwrap();
    assert_eq!(everything.items.len(), 2);
    assert_eq!(everything.failures.len(), 1);
}

#[test]
fn test_export_replaces_secrets_with_tokens() {
    let fixture = Fixture::new();
    let id = create_test(&fixture, "My Test", json!({"name": "alpha", "token": "s3cret"}));
    create_test(&fixture, "No Token", json!({"name": "beta"}));

    let batch = fixture.store.export().unwrap();
    assert!(batch.is_complete());
    let entry = batch.items.iter().find(|entry| entry.id == Some(id)).unwrap();
    assert_eq!(entry.plugin_definition_key, "test-plugin");
    assert_eq!(entry.properties["token"], json!("${MY_TEST_TOKEN}"));
    assert_eq!(entry.properties["name"], json!("alpha"));

    let without = batch.items.iter().find(|entry| entry.title == "No Token").unwrap();
    assert!(!without.properties.contains_key("token"));
}

#[test]
fn test_deploy_expands_placeholders() {
    let fixture = Fixture::new();
    let source = MapSource::new([
        ("MY_URL_PLACEHOLDER", "https://example.com/"),
        ("MY_TEST_TOKEN", "s3cret"),
    ]);
    let id = Uuid::new_v4();
    let document = json!([{
        "id": id.to_string(),
        "title": "My Test",
        "pluginDefinitionKey": "test-plugin",
        "properties": {
            "name": "${MY_URL_PLACEHOLDER}api/v1/something",
            "token": "${MY_TEST_TOKEN}",
            "count": "${MISSING_COUNT:3}"
        }
    }]);

    let deployed = fixture.store.deploy(&document, &source).unwrap();
    assert_eq!(deployed.len(), 1);
    let configuration = fixture.store.get(id).unwrap();
    assert_eq!(
        configuration.properties["name"],
        json!("https://example.com/api/v1/something")
    );
    assert_eq!(configuration.properties["token"], json!("s3cret"));
    assert_eq!(configuration.properties["count"], json!(3));

    // A second deployment of the same entry updates in place.
    fixture.store.deploy(&document, &source).unwrap();
    assert_eq!(fixture.repository.find_all().unwrap().len(), 1);
    assert_eq!(fixture.hooks.get(EventType::Update), 1);
}

#[test]
fn test_deploy_rejects_unresolved_and_mismatched_entries() {
    let fixture = Fixture::new();
    let source = MapSource::new(Vec::<(String, String)>::new());

    let unresolved = fixture
        .store
        .deploy(
            &json!({"title": "t", "pluginDefinitionKey": "test-plugin", "properties": {"name": "${NOPE}"}}),
            &source,
        )
        .unwrap_err();
    assert_eq!(
        unresolved.to_string(),
        "Placeholder '${NOPE}' could not be resolved"
    );

    let id = create_test(&fixture, "t", json!({"name": "a"}));
    let mismatched = fixture
        .store
        .deploy(
            &json!({"id": id.to_string(), "title": "t", "pluginDefinitionKey": "linked-plugin"}),
            &source,
        )
        .unwrap_err();
    assert!(matches!(mismatched, StoreError::InvalidEntry(_)));

    assert!(matches!(
        fixture.store.deploy(&json!("text"), &source),
        Err(StoreError::InvalidEntry(_))
    ));
}

#[test]
fn test_file_repository_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("configurations.json");
    let fixture = Fixture::new();
    let open = |path: &std::path::Path| {
        ConfigurationStore::new(
            fixture.store.registry().clone(),
            Arc::new(FileConfigurationRepository::new(path)),
            Arc::new(Encryptor::new(SECRET).unwrap()),
        )
    };

    let id = open(&path)
        .create(
            None,
            "t",
            properties(json!({"name": "alpha", "token": "s3cret"})),
            "test-plugin",
        )
        .unwrap()
        .id;

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("configurations"));
    assert!(!contents.contains("s3cret"));

    let reopened = open(&path);
    assert_eq!(reopened.get(id).unwrap().properties["token"], json!("s3cret"));
}

#[test]
fn test_concurrent_updates_and_move_keep_every_change() {
    let fixture = Fixture::new();
    let source = create_test(&fixture, "Source", json!({"name": "source"}));
    let referrers: Vec<Uuid> = (0..4)
        .map(|i| {
            fixture
                .store
                .create(
                    None,
                    &format!("Referrer {i}"),
                    properties(json!({"target": source.to_string()})),
                    "linked-plugin",
                )
                .unwrap()
                .id
        })
        .collect();
    let others: Vec<Uuid> = (0..4)
        .map(|i| create_test(&fixture, &format!("Other {i}"), json!({"name": format!("other-{i}")})))
        .collect();
    fixture.events.take();

    let target = Uuid::new_v4();
    std::thread::scope(|scope| {
        for (i, id) in others.iter().enumerate() {
            let store = &fixture.store;
            scope.spawn(move || {
                for count in 0..20 {
                    store
                        .update(
                            *id,
                            None,
                            &format!("Other {i}"),
                            properties(json!({"name": format!("other-{i}"), "count": count})),
                        )
                        .unwrap();
                }
            });
        }
        for (i, id) in referrers.iter().take(2).enumerate() {
            let store = &fixture.store;
            scope.spawn(move || {
                for revision in 0..20 {
                    store
                        .update(
                            *id,
                            None,
                            &format!("Referrer {i}"),
                            properties(json!({"target": target.to_string(), "revision": revision})),
                        )
                        .unwrap();
                }
            });
        }
        scope.spawn(|| {
            fixture
                .store
                .update(source, Some(target), "Source", properties(json!({"name": "source"})))
                .unwrap();
        });
    });

    assert!(fixture.store.find(source).unwrap().is_none());
    assert_eq!(fixture.store.get(target).unwrap().properties["name"], json!("source"));
    for id in &referrers {
        assert_eq!(
            fixture.store.get(*id).unwrap().properties["target"],
            json!(target.to_string())
        );
    }
    for id in referrers.iter().take(2) {
        assert_eq!(fixture.store.get(*id).unwrap().properties["revision"], json!(19));
    }
    for id in &others {
        assert_eq!(fixture.store.get(*id).unwrap().properties["count"], json!(19));
    }
    assert_eq!(fixture.hooks.get(EventType::Update), 4 * 20 + 1);
    assert_eq!(fixture.events.events().len(), 6 * 20 + 1);
    assert_eq!(fixture.repository.find_all().unwrap().len(), 1 + 4 + 4);
}

#[test]
fn test_update_racing_delete_is_serialized() {
    for _ in 0..10 {
        let fixture = Fixture::new();
        let id = create_test(&fixture, "Racer", json!({"name": "racer"}));
        fixture.events.take();

        let (updated, failed) = std::thread::scope(|scope| {
            let updates = scope.spawn(|| {
                let mut updated = 0;
                let mut failed = 0;
                for count in 0..30 {
                    match fixture.store.update(
                        id,
                        None,
                        "Racer",
                        properties(json!({"name": "racer", "count": count})),
                    ) {
                        Ok(_) => updated += 1,
                        Err(StoreError::ConfigurationNotFound(missing)) => {
                            assert_eq!(missing, id);
                            failed += 1;
                        }
                        Err(other) => panic!("unexpected store error: {other}"),
                    }
                }
                (updated, failed)
            });
            scope.spawn(|| {
                fixture.store.delete(id).unwrap();
            });
            updates.join().unwrap()
        });

        assert_eq!(updated + failed, 30);
        assert!(fixture.store.find(id).unwrap().is_none());
        assert!(fixture.repository.find_all().unwrap().is_empty());
        assert_eq!(fixture.hooks.get(EventType::Update), updated);
        assert_eq!(fixture.hooks.get(EventType::Delete), 1);

        let events = fixture.events.events();
        assert_eq!(events.len(), updated + 1);
        assert!(matches!(events.last(), Some(ConfigurationEvent::Deleted(c)) if c.id == id));
    }
}
