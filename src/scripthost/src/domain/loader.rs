//! Script discovery
//!
//! The domain never inspects script types itself. A [`ScriptLoader`] turns
//! a scripts directory into records, each carrying a factory.

use crate::config::Config;
use crate::script::{panic_message, Script};
use crate::Result;

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub type ScriptFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Script>> + Send + Sync>;

/// A discovered, not yet instantiated script type
#[derive(Clone)]
pub struct ScriptRecord {
    /// Source file the script came from, if any
    pub path: Option<PathBuf>,
    pub type_name: String,
    /// Type names that must be started first
    pub dependencies: Vec<String>,
    pub factory: ScriptFactory,
}

impl fmt::Debug for ScriptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRecord")
            .field("path", &self.path)
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

impl ScriptRecord {
    /// Run the factory; a panicking factory is reported as an error
    pub fn instantiate(&self) -> anyhow::Result<Box<dyn Script>> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.factory)())) {
            Ok(result) => result,
            Err(payload) => Err(anyhow::anyhow!(
                "constructor panicked: {}",
                panic_message(payload.as_ref())
            )),
        }
    }

    /// `<source>.ini` next to the source file, else `<dir>/<type>.ini`
    pub fn settings_path(&self, scripts_dir: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.with_extension("ini"),
            None => scripts_dir.join(format!("{}.ini", self.type_name)),
        }
    }
}

pub trait ScriptLoader {
    fn discover(&self, dir: &Path) -> Result<Vec<ScriptRecord>>;
}

/// A compiled-in script type and the source file that enables it
#[derive(Clone)]
pub struct ScriptDescriptor {
    type_name: String,
    source: Option<String>,
    dependencies: Vec<String>,
    factory: ScriptFactory,
}

impl ScriptDescriptor {
    /// Descriptor for a default-constructible script
    pub fn new<S: Script + Default>(type_name: &str) -> Self {
        Self::with_factory(type_name, || Ok(Box::new(S::default()) as Box<dyn Script>))
    }

    pub fn with_factory<F>(type_name: &str, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Script>> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.to_string(),
            source: None,
            dependencies: Vec::new(),
            factory: Arc::new(factory),
        }
    }

    /// Only load when this file exists in the scripts directory
    pub fn source(mut self, file_name: &str) -> Self {
        self.source = Some(file_name.to_string());
        self
    }

    pub fn depends_on(mut self, type_name: &str) -> Self {
        self.dependencies.push(type_name.to_string());
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn record(&self, path: Option<PathBuf>) -> ScriptRecord {
        ScriptRecord {
            path,
            type_name: self.type_name.clone(),
            dependencies: self.dependencies.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

/// Loader over script types linked into the host binary
#[derive(Clone)]
pub struct ScriptRegistry {
    descriptors: Vec<ScriptDescriptor>,
    extensions: Vec<String>,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
            extensions: Config::default().script_extensions,
        }
    }

    /// Use the extension list from `config`
    pub fn with_config(mut self, config: &Config) -> Self {
        self.extensions = config.script_extensions.clone();
        self
    }

    pub fn add(&mut self, descriptor: ScriptDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn register<S: Script + Default>(&mut self, type_name: &str) -> &mut Self {
        self.add(ScriptDescriptor::new::<S>(type_name))
    }

    pub fn register_with<F>(
        &mut self,
        type_name: &str,
        source: Option<&str>,
        dependencies: &[&str],
        factory: F,
    ) -> &mut Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Script>> + Send + Sync + 'static,
    {
        let mut descriptor = ScriptDescriptor::with_factory(type_name, factory);
        if let Some(source) = source {
            descriptor = descriptor.source(source);
        }
        for dep in dependencies {
            descriptor = descriptor.depends_on(dep);
        }
        self.add(descriptor)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn is_script_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// Script files under `dir`, keyed by lowercased file name
    fn script_files(&self, dir: &Path) -> HashMap<String, PathBuf> {
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "scripts directory not found");
            return HashMap::new();
        }

        WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.is_script_file(entry.path()))
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
                (name, entry.into_path())
            })
            .collect()
    }
}

impl ScriptLoader for ScriptRegistry {
    fn discover(&self, dir: &Path) -> Result<Vec<ScriptRecord>> {
        let files = self.script_files(dir);
        let mut seen = std::collections::HashSet::new();
        let mut records = Vec::new();

        for descriptor in &self.descriptors {
            if !seen.insert(descriptor.type_name.clone()) {
                tracing::warn!(script = %descriptor.type_name, "duplicate script type ignored");
                continue;
            }

            match &descriptor.source {
                None => records.push(descriptor.record(None)),
                Some(source) => match files.get(&source.to_ascii_lowercase()) {
                    Some(path) => records.push(descriptor.record(Some(path.clone()))),
                    None => tracing::debug!(
                        script = %descriptor.type_name,
                        source = %source,
                        "source file not present; script not loaded"
                    ),
                },
            }
        }

        tracing::info!(dir = %dir.display(), found = records.len(), "script discovery finished");
        Ok(records)
    }
}
