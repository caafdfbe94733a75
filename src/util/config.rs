//! Layered configuration store.
//!
//! Drydock reads configuration from five layers, least to most specific:
//!
//! - Defaults: baked-in values
//! - Platform: per-OS defaults
//! - UserGlobal: `~/.config/drydock/config.toml`
//! - Workspace: `<workspace>/drydock.toml`
//! - UserWorkspace: `<workspace>/drydock.user.toml`
//!
//! Lookup walks layers from most to least specific and returns the first
//! layer where the *entire* key path resolves to a concrete value. A partial
//! table match inside a layer does not count; lookup falls through to the
//! next layer.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value;

/// The configuration layers, in priority order (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Defaults,
    Platform,
    UserGlobal,
    Workspace,
    UserWorkspace,
}

impl Layer {
    /// All layers from most to least specific.
    const PRIORITY: [Layer; 5] = [
        Layer::UserWorkspace,
        Layer::Workspace,
        Layer::UserGlobal,
        Layer::Platform,
        Layer::Defaults,
    ];

    fn index(self) -> usize {
        match self {
            Layer::Defaults => 0,
            Layer::Platform => 1,
            Layer::UserGlobal => 2,
            Layer::Workspace => 3,
            Layer::UserWorkspace => 4,
        }
    }
}

/// Layered key/value configuration.
///
/// Mutation happens only during startup merge; after that the store is
/// read-only and safe to share across compile workers without locking.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    layers: [Value; 5],
}

impl Default for ConfigStore {
    fn default() -> Self {
        ConfigStore {
            layers: std::array::from_fn(|_| Value::Table(Default::default())),
        }
    }
}

impl ConfigStore {
    /// Create a store with Drydock's built-in defaults.
    pub fn with_defaults() -> Self {
        let defaults = r#"
            [paths]
            output = "$WORKSPACE_DIR/out/$PROJECT_NAME"
            int = "$WORKSPACE_DIR/out/int/$PROJECT_NAME"

            [mt]
            maxThreads = 16
            minThreadMem = 536870912

            [builder]
            compileCmds = false
            combineCmds = false

            [build]
            configs = ["debug", "release"]

            [log]
            level = "info"
        "#;

        let mut store = ConfigStore::default();
        // Baked-in TOML is known-good.
        store.layers[Layer::Defaults.index()] =
            defaults.parse().unwrap_or(Value::Table(Default::default()));
        store
    }

    /// Look up a full key path, walking layers from most to least specific.
    ///
    /// Returns the value from the first layer where every path segment
    /// resolves and the final segment is a concrete value.
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        for layer in Layer::PRIORITY {
            if let Some(value) = resolve_path(&self.layers[layer.index()], path) {
                return Some(value);
            }
        }
        None
    }

    /// Look up a string value.
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(|v| v.as_str())
    }

    /// Look up an integer value.
    pub fn get_i64(&self, path: &[&str]) -> Option<i64> {
        self.get(path).and_then(|v| v.as_integer())
    }

    /// Look up a boolean value.
    pub fn get_bool(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(|v| v.as_bool())
    }

    /// Look up an array of strings.
    pub fn get_str_array(&self, path: &[&str]) -> Vec<String> {
        self.get(path)
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the contents of one layer.
    pub fn set_layer(&mut self, layer: Layer, value: Value) {
        self.layers[layer.index()] = value;
    }

    /// Get the raw table for one layer.
    pub fn layer(&self, layer: Layer) -> &Value {
        &self.layers[layer.index()]
    }

    /// Mutable access to one layer, for startup merging only.
    pub fn layer_mut(&mut self, layer: Layer) -> &mut Value {
        &mut self.layers[layer.index()]
    }

    /// Load one layer from a TOML file. A missing file leaves the layer
    /// empty; a malformed file is an error.
    pub fn load_layer_file(&mut self, layer: Layer, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let value: Value = contents
            .parse()
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        self.set_layer(layer, value);
        Ok(())
    }

    /// Load the standard layer files for a workspace rooted at `root`.
    pub fn load_standard_layers(&mut self, root: &Path) -> Result<()> {
        if let Some(global) = user_global_config_path() {
            self.load_layer_file(Layer::UserGlobal, &global)?;
        }
        self.load_layer_file(Layer::Workspace, &root.join("drydock.toml"))?;
        self.load_layer_file(Layer::UserWorkspace, &root.join("drydock.user.toml"))?;
        Ok(())
    }
}

/// Resolve a key path through nested tables. Returns `None` if any segment
/// is missing or the final segment is itself a table (partial match).
fn resolve_path<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.as_table()?.get(*segment)?;
    }
    if current.is_table() {
        return None;
    }
    Some(current)
}

/// The per-user global config path (`~/.config/drydock/config.toml`).
pub fn user_global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "drydock")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
