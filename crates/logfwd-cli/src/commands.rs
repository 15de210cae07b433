//! CLI command definitions and handlers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use logfwd_api::constants::{ANNOTATION_CONVERTED, DEFAULT_COLLECTOR_NAME, OPENSHIFT_LOGGING_NS};
use logfwd_api::{ClusterLogForwarder, Dialect, NamedConditions, Secrets};
use logfwd_generator::{generate, GeneratorOptions};
use logfwd_migrate::{migrate, MigrationContext, MigrationResult};
use logfwd_operator::OperatorBuilder;
use logfwd_validation::{validate, ValidationContext, ValidationReport};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::manifests::{load_manifests, load_secrets, Manifests};

/// Main CLI structure
#[derive(Parser, Debug)]
#[command(name = "logfwd")]
#[command(about = "Compile ClusterLogForwarder resources into collector configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Report rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Where the resources come from
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ManifestArgs {
    /// YAML manifest with a ClusterLogForwarder and optionally a ClusterLogging
    #[arg(short, long)]
    pub file: PathBuf,

    /// Namespace for resources that carry none
    #[arg(short, long, env = "LOGFWD_NAMESPACE", default_value = OPENSHIFT_LOGGING_NS)]
    pub namespace: String,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Rewrite a forwarder into canonical form
    Migrate {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Write the migrated resource here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a forwarder and print its status
    Validate {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Directory laid out as <dir>/<secret>/<key>
        #[arg(short, long)]
        secrets: Option<PathBuf>,

        /// Collector dialect; defaults to the ClusterLogging collector type
        #[arg(short, long, env = "LOGFWD_DIALECT")]
        dialect: Option<Dialect>,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate collector configuration for the ready pipelines.
    ///
    /// Exits non-zero when some pipeline is not ready.
    Generate {
        #[command(flatten)]
        manifest: ManifestArgs,

        /// Directory laid out as <dir>/<secret>/<key>
        #[arg(short, long)]
        secrets: Option<PathBuf>,

        /// Collector dialect; defaults to the ClusterLogging collector type
        #[arg(short, long, env = "LOGFWD_DIALECT")]
        dialect: Option<Dialect>,

        /// Replace every destination with stdout
        #[arg(long)]
        debug_outputs: bool,

        /// Write the configuration here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the operator against the current cluster
    Operator {
        /// Namespace for resources that carry none
        #[arg(short, long, env = "LOGFWD_NAMESPACE", default_value = OPENSHIFT_LOGGING_NS)]
        namespace: String,

        /// Only watch this namespace
        #[arg(long)]
        watch_namespace: Option<String>,

        /// Dialect used when ClusterLogging names no collector type
        #[arg(short, long, env = "LOGFWD_DIALECT", default_value = "vector")]
        dialect: Dialect,

        #[arg(long, default_value = DEFAULT_COLLECTOR_NAME)]
        collector_name: String,

        /// Seconds between periodic reconciliations
        #[arg(long, default_value_t = 300)]
        requeue_secs: u64,
    },
}

/// Command execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    /// Printed to stdout
    pub message: String,
}

impl CommandResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Migrated, validated forwarder ready for generation
#[derive(Debug, Clone)]
pub struct Prepared {
    pub manifests: Manifests,
    pub namespace: String,
    pub dialect: Dialect,
    pub migration: MigrationResult,
    pub secrets: Secrets,
    pub report: ValidationReport,
}

fn namespace_of(manifests: &Manifests, fallback: &str) -> String {
    manifests
        .forwarder
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

/// Load, migrate and validate the way one reconciliation would
pub fn prepare(
    manifest: &ManifestArgs,
    secrets_dir: Option<&Path>,
    dialect: Option<Dialect>,
) -> Result<Prepared> {
    let manifests = load_manifests(&manifest.file)?;
    let namespace = namespace_of(&manifests, &manifest.namespace);
    let logging = manifests.logging.as_ref().map(|l| &l.spec);

    let ctx = MigrationContext::new(&namespace).with_logging(logging);
    let migration = migrate(&manifests.forwarder.spec, &ctx);
    let dialect = dialect
        .or_else(|| logging.and_then(|l| l.collector_type()).map(Dialect::from))
        .unwrap_or_default();

    let secrets = match secrets_dir {
        Some(dir) => load_secrets(dir)?,
        None => Secrets::new(),
    };
    debug!(secrets = secrets.len(), %dialect, "inputs loaded");

    let validation_ctx = ValidationContext::new(dialect).with_managed_store(ctx.managed_store());
    let mut report = validate(&migration.spec, &secrets, &validation_ctx);
    if !migration.conditions.is_empty() {
        report
            .status
            .outputs
            .get_or_insert_with(NamedConditions::new)
            .extend(migration.conditions.clone());
    }

    Ok(Prepared {
        manifests,
        namespace,
        dialect,
        migration,
        secrets,
        report,
    })
}

fn write_or_return(output: Option<&Path>, content: String) -> Result<CommandResult> {
    match output {
        Some(path) => {
            fs::write(path, &content)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = content.len(), "written");
            Ok(CommandResult::ok(String::new()))
        }
        None => Ok(CommandResult::ok(content)),
    }
}

/// Execute CLI commands
#[derive(Debug, Default)]
pub struct CommandExecutor;

impl CommandExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: Commands) -> Result<CommandResult> {
        match command {
            Commands::Migrate { manifest, output } => self.execute_migrate(&manifest, output),
            Commands::Validate {
                manifest,
                secrets,
                dialect,
                format,
            } => self.execute_validate(&manifest, secrets.as_deref(), dialect, format),
            Commands::Generate {
                manifest,
                secrets,
                dialect,
                debug_outputs,
                output,
            } => self.execute_generate(
                &manifest,
                secrets.as_deref(),
                dialect,
                debug_outputs,
                output.as_deref(),
            ),
            Commands::Operator {
                namespace,
                watch_namespace,
                dialect,
                collector_name,
                requeue_secs,
            } => {
                let manager = OperatorBuilder::new()
                    .namespace(namespace)
                    .watch_namespace(watch_namespace)
                    .dialect(dialect)
                    .collector_name(collector_name)
                    .requeue_interval(Duration::from_secs(requeue_secs))
                    .build()
                    .await
                    .context("failed to start the operator")?;
                manager.run().await.context("operator failed")?;
                Ok(CommandResult::ok(String::new()))
            }
        }
    }

    fn execute_migrate(
        &self,
        manifest: &ManifestArgs,
        output: Option<PathBuf>,
    ) -> Result<CommandResult> {
        let manifests = load_manifests(&manifest.file)?;
        let namespace = namespace_of(&manifests, &manifest.namespace);
        let logging = manifests.logging.as_ref().map(|l| &l.spec);
        let migration = migrate(
            &manifests.forwarder.spec,
            &MigrationContext::new(&namespace).with_logging(logging),
        );
        for name in migration.conditions.names() {
            info!(output = %name, "output dropped");
        }

        let mut migrated = ClusterLogForwarder::new(
            manifests.forwarder.metadata.name.as_deref().unwrap_or_default(),
            migration.spec,
        );
        migrated.metadata.namespace = Some(namespace);
        let mut annotations = manifests
            .forwarder
            .metadata
            .annotations
            .clone()
            .unwrap_or_default();
        annotations.insert(ANNOTATION_CONVERTED.to_string(), "true".to_string());
        migrated.metadata.annotations = Some(annotations);
        migrated.metadata.labels = manifests.forwarder.metadata.labels.clone();

        let text = serde_yaml::to_string(&migrated)
            .context("failed to serialise the migrated resource")?;
        write_or_return(output.as_deref(), text)
    }

    fn execute_validate(
        &self,
        manifest: &ManifestArgs,
        secrets: Option<&Path>,
        dialect: Option<Dialect>,
        format: OutputFormat,
    ) -> Result<CommandResult> {
        let prepared = prepare(manifest, secrets, dialect)?;
        let report = &prepared.report;
        let message = match format {
            OutputFormat::Text => report.to_simple_string(),
            OutputFormat::Json => serde_json::to_string_pretty(report)?,
            OutputFormat::Yaml => serde_yaml::to_string(report)?,
        };
        Ok(CommandResult {
            success: report.is_usable(),
            message,
        })
    }

    fn execute_generate(
        &self,
        manifest: &ManifestArgs,
        secrets: Option<&Path>,
        dialect: Option<Dialect>,
        debug_outputs: bool,
        output: Option<&Path>,
    ) -> Result<CommandResult> {
        let prepared = prepare(manifest, secrets, dialect)?;
        for message in prepared.report.messages() {
            warn!(%message, "not generated");
        }

        let options = GeneratorOptions::new(prepared.dialect)
            .with_debug_outputs(debug_outputs)
            .with_namespace(prepared.namespace.as_str());
        let content = generate(
            &prepared.migration.spec,
            &prepared.secrets,
            &prepared.report,
            &options,
        )
        .context("failed to generate collector configuration")?;
        let mut result = write_or_return(output, content)?;
        result.success = prepared.report.is_usable();
        Ok(result)
    }
}
