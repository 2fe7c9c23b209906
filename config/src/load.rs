use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Name of the directory, relative to the working directory, holding the configuration layers.
const CONFIG_DIR_NAME: &str = "configuration";

/// File extensions probed for every layer, in order of preference.
const LAYER_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Environment variables starting with `APP_` override file values.
const ENV_VAR_PREFIX: &str = "APP";

/// Nested keys are joined with a double underscore: `APP_BATCH__MAX_SIZE`.
const ENV_VAR_NESTING: &str = "__";

/// Configuration structures that can be produced by [`load_config`].
pub trait Config: DeserializeOwned {
    /// Keys holding comma-separated lists when overridden through environment variables.
    const LIST_KEYS: &'static [&'static str] = &[];

    /// Checks invariants serde cannot express. Runs after all layers were merged.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// A configuration file merged into the final settings.
#[derive(Debug, Clone, Copy)]
enum Layer {
    Base,
    Environment(Environment),
}

impl Layer {
    fn file_stem(self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Environment(environment) => environment.as_str(),
        }
    }

    /// Returns the first existing file for this layer, or every probed path when none exists.
    fn locate(self, directory: &Path) -> Result<PathBuf, Vec<PathBuf>> {
        let candidates: Vec<PathBuf> = LAYER_EXTENSIONS
            .iter()
            .map(|extension| directory.join(format!("{}.{extension}", self.file_stem())))
            .collect();

        match candidates.iter().find(|path| path.is_file()) {
            Some(path) => Ok(path.clone()),
            None => Err(candidates),
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layer::Base => f.write_str("base layer"),
            Layer::Environment(environment) => write!(f, "`{environment}` layer"),
        }
    }
}

/// Errors returned by [`load_config`] and [`load_config_from`].
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("could not read the working directory: {0}")]
    WorkingDirectory(#[source] io::Error),

    #[error("configuration directory `{}` not found", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no file for the {layer} in `{}` (looked for {candidates})", .directory.display())]
    LayerNotFound {
        layer: String,
        directory: PathBuf,
        candidates: String,
    },

    #[error("{layer} at `{}` is invalid: {source}", .path.display())]
    LayerParse {
        layer: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("could not merge configuration layers: {0}")]
    Merge(#[source] rust_cli_config::ConfigError),

    #[error("configuration does not match the expected shape: {0}")]
    Deserialize(#[source] rust_cli_config::ConfigError),

    #[error("configuration is invalid: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid `APP_ENVIRONMENT`: {0}")]
    Environment(#[from] io::Error),
}

/// Loads `T` from `./configuration`, picking the environment layer from `APP_ENVIRONMENT`.
pub fn load_config<T: Config>() -> Result<T, LoadConfigError> {
    let working_dir = std::env::current_dir().map_err(LoadConfigError::WorkingDirectory)?;

    load_config_from(&working_dir.join(CONFIG_DIR_NAME), Environment::load()?)
}

/// Loads `T` from the layers found in `directory` and validates it.
///
/// Layers are merged in this order, later ones winning:
///
/// 1. `base.{yaml,yml,json}`, required.
/// 2. `{environment}.{yaml,yml,json}`, optional.
/// 3. `APP_`-prefixed environment variables.
pub fn load_config_from<T: Config>(
    directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError> {
    if !directory.is_dir() {
        return Err(LoadConfigError::DirectoryNotFound(directory.to_path_buf()));
    }

    let base = Layer::Base
        .locate(directory)
        .map_err(|candidates| layer_not_found(Layer::Base, directory, &candidates))?;
    let mut builder = add_layer(rust_cli_config::Config::builder(), Layer::Base, &base)?;

    let environment_layer = Layer::Environment(environment);
    if let Ok(path) = environment_layer.locate(directory) {
        builder = add_layer(builder, environment_layer, &path)?;
    }

    let mut env_vars = rust_cli_config::Environment::with_prefix(ENV_VAR_PREFIX)
        .prefix_separator("_")
        .separator(ENV_VAR_NESTING)
        .try_parsing(true);
    if !T::LIST_KEYS.is_empty() {
        env_vars = env_vars.list_separator(",");
        for key in T::LIST_KEYS {
            env_vars = env_vars.with_list_parse_key(key);
        }
    }

    let config: T = builder
        .add_source(env_vars)
        .build()
        .map_err(LoadConfigError::Merge)?
        .try_deserialize()
        .map_err(LoadConfigError::Deserialize)?;
    config.validate()?;

    Ok(config)
}

/// Adds a file layer, building eagerly so a syntax error is reported against that file.
fn add_layer(
    builder: ConfigBuilder<DefaultState>,
    layer: Layer,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, LoadConfigError> {
    let builder = builder.add_source(rust_cli_config::File::from(path));

    match builder.build_cloned() {
        Ok(_) => Ok(builder),
        Err(source) => Err(LoadConfigError::LayerParse {
            layer: layer.to_string(),
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn layer_not_found(layer: Layer, directory: &Path, candidates: &[PathBuf]) -> LoadConfigError {
    let candidates = candidates
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| format!("`{}`", name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(", ");

    LoadConfigError::LayerNotFound {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        candidates,
    }
}
