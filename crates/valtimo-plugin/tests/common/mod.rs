//! Shared fixtures for the valtimo-plugin integration tests

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use valtimo_definitions::{
    ActionCall, ActionParameter, ActivityType, EventType, PluginActionDefinition,
    PluginDescriptor, PluginProperty, PluginRegistry, ValueType,
};
use valtimo_plugin::{
    ConfigurationStore, Encryptor, InMemoryConfigurationRepository, PluginService,
    RecordingEventPublisher, ValueResolverService,
};

pub const SECRET: &[u8] = b"0123456789abcdef";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPlugin {
    pub name: String,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub fail_hooks: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedPlugin {
    pub target: String,
}

#[derive(Debug, Default)]
pub struct HookCounts {
    pub created: AtomicUsize,
    pub updated: AtomicUsize,
    pub deleted: AtomicUsize,
}

impl HookCounts {
    pub fn get(&self, event: EventType) -> usize {
        match event {
            EventType::Create => self.created.load(Ordering::SeqCst),
            EventType::Update => self.updated.load(Ordering::SeqCst),
            EventType::Delete => self.deleted.load(Ordering::SeqCst),
        }
    }
}

fn test_plugin(hooks: &Arc<HookCounts>) -> PluginDescriptor {
    let counts = hooks.clone();
    PluginDescriptor::builder::<TestPlugin>("test-plugin", "Test Plugin")
        .description("Plugin used by the integration tests")
        .category("test")
        .property(PluginProperty::new("name", ValueType::String).title("Name").required())
        .property(PluginProperty::new("count", ValueType::Integer))
        .property(PluginProperty::new("token", ValueType::String).secret())
        .property(PluginProperty::new("failHooks", ValueType::Boolean))
        .action(
            PluginActionDefinition::new("echo", "Echo")
                .method("echo")
                .activity(ActivityType::ServiceTaskStart)
                .activity(ActivityType::UserTaskCreate)
                .parameter(ActionParameter::required("value", ValueType::String))
                .parameter(ActionParameter::optional("times", ValueType::Integer)),
            |plugin: &TestPlugin, call: &ActionCall<'_>| {
                let value: String = call.get("value")?;
                let times: i64 = call.get_optional("times")?.unwrap_or(1);
                Ok(Some(json!({
                    "name": plugin.name,
                    "value": value.repeat(usize::try_from(times)?),
                    "extra": call.argument("extra").cloned().unwrap_or(Value::Null),
                })))
            },
        )
        .action(
            PluginActionDefinition::new("silent", "Silent").activity(ActivityType::ServiceTaskStart),
            |_, _| Ok(None),
        )
        .action(
            PluginActionDefinition::new("explode", "Explode").activity(ActivityType::ServiceTaskStart),
            |_, _| Err(anyhow::anyhow!("remote system rejected the request")),
        )
        .action(
            PluginActionDefinition::new("twice", "Twice").activity(ActivityType::ServiceTaskStart),
            |_, _| Ok(Some(json!(1))),
        )
        .action(
            PluginActionDefinition::new("twice", "Twice").activity(ActivityType::ServiceTaskStart),
            |_, _| Ok(Some(json!(2))),
        )
        .on_event(
            "track",
            &[EventType::Create, EventType::Update, EventType::Delete],
            |plugin: &TestPlugin| {
                if plugin.fail_hooks {
                    anyhow::bail!("hook refused configuration '{}'", plugin.name);
                }
                Ok(())
            },
        )
        .on_event("count-create", &[EventType::Create], {
            let counts = counts.clone();
            move |_| {
                counts.created.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_event("count-update", &[EventType::Update], {
            let counts = counts.clone();
            move |_| {
                counts.updated.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .on_event("count-delete", &[EventType::Delete], move |_| {
            counts.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .deserialize_properties()
        .build()
        .unwrap()
}

fn linked_plugin() -> PluginDescriptor {
    PluginDescriptor::builder::<LinkedPlugin>("linked-plugin", "Linked Plugin")
        .category("linked")
        .property(PluginProperty::new("target", ValueType::Configuration).required())
        .action(
            PluginActionDefinition::new("notify", "Notify").activity(ActivityType::UserTaskComplete),
            |plugin: &LinkedPlugin, _| Ok(Some(json!(plugin.target))),
        )
        .deserialize_properties()
        .build()
        .unwrap()
}

pub struct Fixture {
    pub store: Arc<ConfigurationStore>,
    pub repository: Arc<InMemoryConfigurationRepository>,
    pub events: Arc<RecordingEventPublisher>,
    pub hooks: Arc<HookCounts>,
}

impl Fixture {
    pub fn new() -> Self {
        let hooks = Arc::new(HookCounts::default());
        let registry = PluginRegistry::builder()
            .register(test_plugin(&hooks))
            .register(linked_plugin())
            .build()
            .unwrap();
        let repository = Arc::new(InMemoryConfigurationRepository::new());
        let events = Arc::new(RecordingEventPublisher::new());
        let store = ConfigurationStore::new(
            Arc::new(registry),
            repository.clone(),
            Arc::new(Encryptor::new(SECRET).unwrap()),
        )
        .with_publisher(events.clone());

        Fixture {
            store: Arc::new(store),
            repository,
            events,
            hooks,
        }
    }

    pub fn service(&self) -> PluginService {
        PluginService::new(self.store.clone(), ValueResolverService::with_defaults())
    }
}

pub fn properties(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
