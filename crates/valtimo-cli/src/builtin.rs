//! Plugins compiled into the command line tool
//!
//! These give the CLI something real to configure and invoke: a chat
//! notification plugin and a document store client that can point at another
//! configuration for its authentication.

use anyhow::bail;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;
use valtimo_definitions::{
    ActionCall, ActionParameter, ActivityType, DefinitionError, EventType,
    PluginActionDefinition, PluginDescriptor, PluginProperty, PluginRegistry, ValueType,
};

pub const NOTIFICATION_KEY: &str = "notification";
pub const DOCUMENT_STORE_KEY: &str = "document-store";

/// Registry with every built-in plugin
pub fn registry() -> Result<PluginRegistry, DefinitionError> {
    PluginRegistry::builder()
        .register(notification()?)
        .register(document_store()?)
        .build()
}

// =============================================================================
// NOTIFICATION
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPlugin {
    webhook_url: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

impl NotificationPlugin {
    fn compose_message(&self, call: &ActionCall<'_>) -> anyhow::Result<Option<Value>> {
        let message: String = call.get("message")?;
        let priority = call
            .get_optional::<String>("priority")?
            .unwrap_or_else(|| "normal".to_string());

        Ok(Some(json!({
            "url": self.webhook_url,
            "channel": self.channel,
            "priority": priority,
            "text": message,
            "authorized": self.token.is_some(),
            "processInstanceId": call.process_instance_id,
        })))
    }

    fn verify_webhook(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.webhook_url)?;
        if url.scheme() != "https" {
            bail!("webhook URL must use https, got '{}'", url.scheme());
        }
        Ok(())
    }
}

fn notification() -> Result<PluginDescriptor, DefinitionError> {
    PluginDescriptor::builder::<NotificationPlugin>(NOTIFICATION_KEY, "Notification")
        .description("Posts messages to a chat webhook")
        .category("notification")
        .property(
            PluginProperty::new("webhookUrl", ValueType::Uri)
                .title("Webhook URL")
                .required(),
        )
        .property(PluginProperty::new("token", ValueType::String).title("Token").secret())
        .property(PluginProperty::new("channel", ValueType::String).title("Channel"))
        .action(
            PluginActionDefinition::new("compose-message", "Compose message")
                .description("Build the webhook payload for a message")
                .method("compose_message")
                .activity(ActivityType::ServiceTaskStart)
                .activity(ActivityType::SendTaskStart)
                .activity(ActivityType::UserTaskCreate)
                .parameter(ActionParameter::required("message", ValueType::String))
                .parameter(ActionParameter::optional(
                    "priority",
                    ValueType::enumeration(&["low", "normal", "high"]),
                )),
            NotificationPlugin::compose_message,
        )
        .on_event(
            "verify-webhook",
            &[EventType::Create, EventType::Update],
            NotificationPlugin::verify_webhook,
        )
        .deserialize_properties()
        .build()
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStorePlugin {
    url: String,
    #[serde(default)]
    authentication_configuration: Option<Uuid>,
    #[serde(default)]
    client_secret: Option<String>,
}

impl DocumentStorePlugin {
    fn link_document(&self, call: &ActionCall<'_>) -> anyhow::Result<Option<Value>> {
        let document_id: Uuid = call.get("documentId")?;
        let tags: Vec<String> = call.get_optional("tags")?.unwrap_or_default();

        Ok(Some(json!({
            "document": format!("{}/documents/{}", self.url.trim_end_matches('/'), document_id),
            "tags": tags,
            "authenticationConfiguration": self.authentication_configuration,
            "signed": self.client_secret.is_some(),
        })))
    }
}

fn document_store() -> Result<PluginDescriptor, DefinitionError> {
    PluginDescriptor::builder::<DocumentStorePlugin>(DOCUMENT_STORE_KEY, "Document store")
        .description("Links documents from a document registration API to a case")
        .category("documenten-api")
        .property(PluginProperty::new("url", ValueType::Uri).title("API URL").required())
        .property(
            PluginProperty::new("authenticationConfiguration", ValueType::Configuration)
                .title("Authentication plugin configuration"),
        )
        .property(
            PluginProperty::new("clientSecret", ValueType::String)
                .title("Client secret")
                .secret(),
        )
        .action(
            PluginActionDefinition::new("link-document", "Link document")
                .method("link_document")
                .activity(ActivityType::ServiceTaskStart)
                .activity(ActivityType::UserTaskComplete)
                .parameter(ActionParameter::required("documentId", ValueType::Uuid))
                .parameter(ActionParameter::optional("tags", ValueType::list(ValueType::String))),
            DocumentStorePlugin::link_document,
        )
        .deserialize_properties()
        .build()
}
