use logfwd_api::constants::keys;
use logfwd_api::{Dialect, GclResource};

use super::Store;
use crate::fluentd::element::{quoted_path, Element};
use crate::{GeneratorError, Result};

pub(super) fn elements(store: &Store<'_>) -> Result<Vec<Element>> {
    let output = store.output;
    let gcl = output.spec.google_cloud_logging.clone().unwrap_or_default();
    // The fluentd plugin only bills against projects
    let project = match gcl.resources().first() {
        Some(GclResource::Project(id)) => id.to_string(),
        _ => {
            return Err(GeneratorError::Unsupported {
                entity: output.name.clone(),
                kind: "googleCloudLogging resource other than a project".to_string(),
                dialect: Dialect::Fluentd,
            })
        }
    };

    let mut body = vec![
        Element::kv("@type", "google_cloud"),
        Element::kv("@id", store.id()),
        Element::kv("project_id", project),
        Element::kv("use_metadata_service", "false"),
    ];
    if let Some(log_id) = gcl.log_id.as_deref() {
        body.push(Element::kv("log_name", log_id));
    }
    if let Some(path) = output.key_path(keys::GOOGLE_APPLICATION_CREDENTIALS) {
        body.push(Element::kv("keyfile", quoted_path(&path)));
    }
    body.push(store.buffer(&[]));
    Ok(vec![Element::matcher("**", body)])
}
