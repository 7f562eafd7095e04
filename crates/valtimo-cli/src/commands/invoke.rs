//! Run plugin actions from a request file
//!
//! ```json
//! {
//!   "context": {"kind": "execution", "processInstanceId": "...", ...},
//!   "link": {"processDefinitionId": "...", "activityId": "...", ...}
//! }
//! ```
//!
//! With `links` instead of `link`, every link is registered and all links of
//! the context's activity run in order.

use crate::app::App;
use crate::commands::{print_json, read_document};
use crate::errors::CliError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use valtimo_plugin::{ActivityContext, PluginProcessLink};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvocationRequest {
    context: ActivityContext,
    #[serde(default)]
    link: Option<PluginProcessLink>,
    #[serde(default)]
    links: Vec<PluginProcessLink>,
}

pub fn handle_invoke(file: &Path, app: &App) -> anyhow::Result<()> {
    let document = read_document(file)?;
    let request: InvocationRequest =
        serde_json::from_value(document).map_err(|source| CliError::Json {
            what: file.display().to_string(),
            source,
        })?;
    let service = &app.service;

    if let Some(link) = request.link {
        let link = service.links().create(link)?;
        let result = service.invoke(&request.context, &link)?;
        return print_json(&result.unwrap_or(Value::Null));
    }

    for link in request.links {
        service.links().create(link)?;
    }
    let outcomes = service.invoke_activity(&request.context)?;
    let report: Vec<Value> = outcomes
        .into_iter()
        .map(|outcome| {
            json!({
                "linkId": outcome.link_id,
                "action": outcome.action,
                "result": outcome.result,
            })
        })
        .collect();
    print_json(&report)
}
