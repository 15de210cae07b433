//! Sources, transforms and sinks as TOML tables.
//!
//! Every component is a table under its section keyed by id. Field keys
//! given to [`Component::set`] are dotted paths into nested tables, so
//! `set("tls.ca_file", ..)` lands in `[sinks.<id>.tls]`.

use toml::{Table, Value};

use logfwd_api::constants::{SECRET_MOUNT_ROOT, SERVICE_ACCOUNT_TOKEN_PATH, VECTOR_DATA_ROOT};

use crate::{GeneratorError, Result};

/// Backend resolving `SECRET[kubernetes_secret.<secret>/<key>]`
pub const SECRET_BACKEND: &str = "kubernetes_secret";
/// Backend resolving the collector's own service account token
pub const SERVICE_ACCOUNT_BACKEND: &str = "service_account";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Sources,
    Transforms,
    Sinks,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Sources => "sources",
            Section::Transforms => "transforms",
            Section::Sinks => "sinks",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub id: String,
    pub section: Section,
    fields: Table,
}

impl Component {
    fn new(section: Section, id: impl Into<String>, kind: &str) -> Self {
        let mut fields = Table::new();
        fields.insert("type".to_string(), Value::from(kind));
        Self {
            id: id.into(),
            section,
            fields,
        }
    }

    pub fn source(id: impl Into<String>, kind: &str) -> Self {
        Self::new(Section::Sources, id, kind)
    }

    pub fn transform<I, S>(id: impl Into<String>, kind: &str, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Section::Transforms, id, kind).with_inputs(inputs)
    }

    pub fn sink<I, S>(id: impl Into<String>, kind: &str, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(Section::Sinks, id, kind).with_inputs(inputs)
    }

    /// A `remap` transform running `source`
    pub fn remap<I, S>(id: impl Into<String>, inputs: I, source: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::transform(id, "remap", inputs).set("source", source.into())
    }

    fn with_inputs<I, S>(self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let inputs: Vec<Value> = inputs.into_iter().map(|i| Value::String(i.into())).collect();
        self.set("inputs", inputs)
    }

    pub fn kind(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        insert_path(&mut self.fields, path, value.into());
        self
    }

    pub fn set_opt<V: Into<Value>>(self, path: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(path, value),
            None => self,
        }
    }

    /// Merge a prepared table into the field at `path`; its keys are
    /// taken verbatim, dots included
    pub fn merge(mut self, path: &str, table: Table) -> Self {
        insert_path(&mut self.fields, path, Value::Table(Table::new()));
        if let Some(Value::Table(target)) = self.get_mut(path) {
            target.extend(table);
        }
        self
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop()?;
        let mut current = &mut self.fields;
        for segment in segments {
            current = current.get_mut(segment)?.as_table_mut()?;
        }
        current.get_mut(last)
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.fields;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let value = current.get(segment)?;
            if segments.peek().is_none() {
                return Some(value);
            }
            current = value.as_table()?;
        }
        None
    }

    pub fn into_table(self) -> Table {
        self.fields
    }
}

fn insert_path(table: &mut Table, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            table.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if !entry.is_table() {
                *entry = Value::Table(Table::new());
            }
            if let Value::Table(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// `SECRET[...]` reference to a mounted secret key
pub fn secret_ref(secret: &str, key: &str) -> String {
    format!("SECRET[{}.{}/{}]", SECRET_BACKEND, secret, key)
}

/// `SECRET[...]` reference to the collector's service account token
pub fn service_account_token_ref() -> String {
    format!("SECRET[{}.token]", SERVICE_ACCOUNT_BACKEND)
}

/// A complete configuration document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    components: Vec<Component>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    fn references(&self, prefix: &str) -> bool {
        fn walk(value: &Value, prefix: &str) -> bool {
            match value {
                Value::String(s) => s.contains(prefix),
                Value::Array(items) => items.iter().any(|v| walk(v, prefix)),
                Value::Table(table) => table.values().any(|v| walk(v, prefix)),
                _ => false,
            }
        }
        self.components
            .iter()
            .any(|c| c.fields.values().any(|v| walk(v, prefix)))
    }

    fn secret_backends(&self) -> Table {
        let mut backends = Table::new();
        if self.references(&format!("SECRET[{}.", SECRET_BACKEND)) {
            backends.insert(SECRET_BACKEND.to_string(), directory_backend(SECRET_MOUNT_ROOT));
        }
        if self.references(&format!("SECRET[{}.", SERVICE_ACCOUNT_BACKEND)) {
            let dir = SERVICE_ACCOUNT_TOKEN_PATH
                .rsplit_once('/')
                .map(|(dir, _)| dir)
                .unwrap_or(SERVICE_ACCOUNT_TOKEN_PATH);
            backends.insert(SERVICE_ACCOUNT_BACKEND.to_string(), directory_backend(dir));
        }
        backends
    }

    /// The document as a TOML table; duplicate ids are rejected
    pub fn to_table(&self) -> Result<Table> {
        let mut root = Table::new();
        root.insert("data_dir".to_string(), Value::from(VECTOR_DATA_ROOT));
        let backends = self.secret_backends();
        if !backends.is_empty() {
            root.insert("secret".to_string(), Value::Table(backends));
        }
        for component in &self.components {
            let section = root
                .entry(component.section.as_str().to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            if let Value::Table(section) = section {
                if section.contains_key(&component.id) {
                    return Err(GeneratorError::DuplicateComponent(component.id.clone()));
                }
                section.insert(component.id.clone(), Value::Table(component.fields.clone()));
            }
        }
        Ok(root)
    }

    pub fn render(&self) -> Result<String> {
        Ok(toml::to_string(&self.to_table()?)?)
    }
}

fn directory_backend(path: &str) -> Value {
    let mut table = Table::new();
    table.insert("type".to_string(), Value::from("directory"));
    table.insert("path".to_string(), Value::from(path));
    Value::Table(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dotted_paths_nest() {
        let sink = Component::sink("output_es", "elasticsearch", ["pipeline_a"])
            .set("tls.ca_file", "/ca")
            .set("tls.verify_certificate", false)
            .set_opt("compression", None::<String>);
        assert_eq!(sink.get("tls.ca_file").and_then(Value::as_str), Some("/ca"));
        assert_eq!(sink.get("tls.verify_certificate").and_then(Value::as_bool), Some(false));
        assert!(sink.get("compression").is_none());
        assert_eq!(sink.kind(), Some("elasticsearch"));
    }

    #[test]
    fn test_render_sections_and_backends() {
        let mut config = Config::new();
        config.push(Component::source("input_a_journal", "journald"));
        config.push(
            Component::sink("output_h", "http", ["input_a_journal"])
                .set("auth.password", secret_ref("creds", "password")),
        );
        let text = config.render().unwrap();
        let table: Table = toml::from_str(&text).unwrap();
        assert_eq!(table["data_dir"].as_str(), Some("/var/lib/vector"));
        assert_eq!(
            table["secret"]["kubernetes_secret"]["path"].as_str(),
            Some("/var/run/ocp-collector/secrets")
        );
        assert!(table["secret"].get("service_account").is_none());
        assert_eq!(
            table["sinks"]["output_h"]["auth"]["password"].as_str(),
            Some("SECRET[kubernetes_secret.creds/password]")
        );
        assert_eq!(table["sources"]["input_a_journal"]["type"].as_str(), Some("journald"));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let mut config = Config::new();
        config.push(Component::source("x", "journald"));
        config.push(Component::source("x", "journald"));
        assert!(matches!(
            config.render(),
            Err(GeneratorError::DuplicateComponent(id)) if id == "x"
        ));
    }
}
