//! Command dispatch: thin wrappers connecting parsed args to domain calls

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{self, Settings};
use crate::domain::{fif, FieldList, FieldRegistry, FlatMap, Form};

pub fn execute_command(cli: &Cli, settings: &Settings) -> CliResult<()> {
    let namespace = cli.namespace.as_deref().or(settings.namespace.as_deref());
    match &cli.command {
        Some(Commands::Tree { schema, input }) => {
            let schema = schema_path(schema.as_deref(), settings)?;
            _tree(&schema, input.as_deref(), namespace)
        }
        Some(Commands::Fields { schema }) => {
            let schema = schema_path(schema.as_deref(), settings)?;
            _fields(&schema, namespace)
        }
        Some(Commands::Types) => _types(),
        Some(Commands::Flatten { input }) => _flatten(input.as_deref()),
        Some(Commands::Unflatten { input }) => _unflatten(input.as_deref()),
        Some(Commands::Check {
            schema,
            input,
            values,
        }) => {
            let schema = schema_path(schema.as_deref(), settings)?;
            _check(&schema, input.as_deref(), *values, namespace)
        }
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Show => _config_show(settings),
            ConfigCommands::Init => _config_init(),
            ConfigCommands::Path => _config_path(),
        },
        Some(Commands::Completion { shell }) => _completion(*shell),
        None => Ok(()),
    }
}

#[instrument]
fn _tree(schema: &Path, input: Option<&Path>, namespace: Option<&str>) -> CliResult<()> {
    debug!("schema: {:?}", schema);
    let mut form = build_form(schema, namespace)?;
    if let Some(input) = input {
        let value = read_value(Some(input))?;
        form.load_fif(&fif::flatten(&value))?;
    }
    output::info(form.dump().trim_end());
    Ok(())
}

#[instrument]
fn _fields(schema: &Path, namespace: Option<&str>) -> CliResult<()> {
    debug!("schema: {:?}", schema);
    let form = build_form(schema, namespace)?;
    for field in form.sorted_fields() {
        let marker = if field.required { "  required" } else { "" };
        output::info(&format!("{:<20} {}{}", field.name, field.type_name, marker));
    }
    Ok(())
}

#[instrument]
fn _types() -> CliResult<()> {
    let registry = FieldRegistry::default();
    for name in registry.type_names() {
        // '+' pins the lookup to the fully-qualified name.
        if let Some((_, ftype)) = registry.resolve(&format!("+{}", name)) {
            output::info(&format!("{:<12} {}", name, ftype.kind()));
        }
    }
    Ok(())
}

#[instrument]
fn _flatten(input: Option<&Path>) -> CliResult<()> {
    let value = read_value(input)?;
    let flat = fif::flatten(&value);
    output::info(&serde_json::to_string_pretty(&flat)?);
    Ok(())
}

#[instrument]
fn _unflatten(input: Option<&Path>) -> CliResult<()> {
    let value = read_value(input)?;
    let flat: FlatMap = match value {
        Value::Object(entries) => entries.into_iter().collect(),
        _ => {
            return Err(CliError::InvalidArgs(
                "expected a flat JSON object".to_string(),
            ))
        }
    };
    let nested = fif::unflatten(&flat)?;
    output::info(&serde_json::to_string_pretty(&nested)?);
    Ok(())
}

#[instrument]
fn _check(
    schema: &Path,
    input: Option<&Path>,
    print_values: bool,
    namespace: Option<&str>,
) -> CliResult<()> {
    debug!("schema: {:?}, input: {:?}", schema, input);
    let mut form = build_form(schema, namespace)?;
    let value = read_value(input)?;

    if form.process(&value) {
        output::success("all fields valid");
        if print_values {
            output::info(&serde_json::to_string_pretty(&form.values())?);
        }
        return Ok(());
    }

    let errors = form.errors();
    for (path, message) in &errors {
        output::failure(&format!("{}: {}", path, message));
    }
    Err(CliError::ValidationFailed(errors.len()))
}

#[instrument(skip(settings))]
fn _config_show(settings: &Settings) -> CliResult<()> {
    output::info(settings.to_toml()?.trim_end());
    Ok(())
}

#[instrument]
fn _config_init() -> CliResult<()> {
    let path = config::global_config_path()
        .ok_or_else(|| CliError::InvalidArgs("cannot determine config directory".to_string()))?;
    if path.exists() {
        output::warning(&format!("config already exists: {}", path.display()));
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CliError::io(format!("create {}", parent.display()), e))?;
    }
    fs::write(&path, Settings::template())
        .map_err(|e| CliError::io(format!("write {}", path.display()), e))?;
    output::action("Created", &path.display());
    Ok(())
}

#[instrument]
fn _config_path() -> CliResult<()> {
    match config::global_config_path() {
        Some(path) => output::info(&path.display()),
        None => output::warning("cannot determine config directory"),
    }
    Ok(())
}

#[instrument]
fn _completion(shell: clap_complete::Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

/// Explicit argument wins, then the configured default.
fn schema_path(arg: Option<&Path>, settings: &Settings) -> CliResult<PathBuf> {
    arg.map(Path::to_path_buf)
        .or_else(|| settings.schema_path.clone())
        .ok_or_else(|| CliError::InvalidArgs("no schema file given and none configured".to_string()))
}

fn build_form(schema: &Path, namespace: Option<&str>) -> CliResult<Form> {
    let list = load_schema(schema)?;
    let mut registry = FieldRegistry::default();
    if let Some(ns) = namespace {
        registry.set_namespace(ns);
    }
    Ok(Form::with_registry(&list, &registry)?)
}

/// Parse a schema file as TOML or JSON, chosen by extension.
fn load_schema(path: &Path) -> CliResult<FieldList> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("read {}", path.display()), e))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str(&content)?),
        _ => Ok(serde_json::from_str(&content)?),
    }
}

/// Read a JSON value from a file, or stdin when no path is given.
fn read_value(input: Option<&Path>) -> CliResult<Value> {
    let content = match input {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| CliError::io(format!("read {}", path.display()), e))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::io("read stdin", e))?;
            buf
        }
    };
    Ok(serde_json::from_str(&content)?)
}
