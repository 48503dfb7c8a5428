//! Configuration for plansync.
//!
//! The phase-to-document mapping and the module weight table are data, not
//! behavior: they live in [`SyncConfig`] and are passed explicitly to every
//! component, so tests can swap in alternate tables.
//!
//! # Configuration Levels
//!
//! Configurations are loaded from three levels with increasing priority:
//!
//! 1. **Defaults** - built in (the nine delivery phases, six module weights)
//! 2. **User** - `~/.config/plansync/config.toml`
//! 3. **Project** - `plansync.toml` in the project root, or `--config <path>`
//!
//! Each level overrides individual fields of the one below it. List-valued
//! fields (`phases`, `modules`) are replaced as a whole.
//!
//! # Example plansync.toml
//!
//! ```toml
//! docs_dir = "docs"
//! model_file = "docs/project-plan-structured.json"
//!
//! [parser]
//! grammar = "heading"
//! heading_level = 3
//!
//! [[phases]]
//! name = "阶段一：认证系统完善"
//! document = "02-phase-1-auth-system.md"
//! priority = "high"
//!
//! [[modules]]
//! name = "前端应用"
//! weight = 0.30
//!
//! [tracker]
//! repo = "acme/iot-monitor"
//! ```

pub mod validation;

pub use validation::{validate_consistency, ConsistencyReport};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::issues::Priority;
use crate::tasks::{Grammar, ParseOptions};

/// Project-level config file name.
pub const PROJECT_CONFIG_FILE: &str = "plansync.toml";

// ============================================================================
// Configuration Types
// ============================================================================

/// One phase and the Markdown document that backs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMapping {
    /// Phase name as it appears in `phaseDetails[].phase`
    pub name: String,
    /// Document file name, relative to the docs directory
    pub document: String,
    /// Issue priority; derived from the phase name when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl PhaseMapping {
    #[must_use]
    pub fn new(name: &str, document: &str) -> Self {
        Self {
            name: name.to_string(),
            document: document.to_string(),
            priority: None,
        }
    }
}

/// Weight of one module in the overall progress figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleWeight {
    pub name: String,
    pub weight: f64,
}

impl ModuleWeight {
    #[must_use]
    pub fn new(name: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            weight,
        }
    }
}

/// Issue tracker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// `owner/name`; falls back to `GITHUB_REPOSITORY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Prefix of the label linking an issue to its phase
    pub phase_label_prefix: String,
    /// Longest issue title the tracker accepts
    pub max_title_len: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repo: None,
            phase_label_prefix: "phase-".to_string(),
            max_title_len: 250,
        }
    }
}

/// Resolved configuration consumed by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory holding the phase documents, relative to the project root
    pub docs_dir: PathBuf,
    /// Authoritative model path, relative to the project root
    pub model_file: PathBuf,
    /// Allowed deviation of the weight sum from 1.0
    pub weight_tolerance: f64,
    pub parser: ParseOptions,
    pub phases: Vec<PhaseMapping>,
    pub modules: Vec<ModuleWeight>,
    pub tracker: TrackerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("docs"),
            model_file: PathBuf::from("docs/project-plan-structured.json"),
            parser: ParseOptions::default(),
            phases: default_phases(),
            modules: default_module_weights(),
            weight_tolerance: 0.01,
            tracker: TrackerConfig::default(),
        }
    }
}

/// The nine delivery phases and their documents.
#[must_use]
pub fn default_phases() -> Vec<PhaseMapping> {
    [
        ("阶段一：认证系统完善", "02-phase-1-auth-system.md"),
        ("阶段二：核心监控功能", "03-phase-2-core-monitoring.md"),
        ("阶段三：数据展示与处理", "04-phase-3-data-processing.md"),
        ("阶段四：用户体验优化", "05-phase-4-ux-optimization.md"),
        ("阶段五：API 与数据流", "06-phase-5-api-dataflow.md"),
        ("阶段六：后端服务完善", "07-phase-6-backend-enhancement.md"),
        ("阶段七：安全增强", "08-phase-7-security.md"),
        ("阶段八：测试与质量", "09-phase-8-testing.md"),
        ("阶段九：部署与运维", "10-phase-9-deployment.md"),
    ]
    .into_iter()
    .map(|(name, document)| PhaseMapping::new(name, document))
    .collect()
}

/// Module weights; they sum to 1.0.
#[must_use]
pub fn default_module_weights() -> Vec<ModuleWeight> {
    vec![
        ModuleWeight::new("前端应用", 0.30),
        ModuleWeight::new("后端应用", 0.30),
        ModuleWeight::new("共享类型", 0.05),
        ModuleWeight::new("UI 组件库", 0.10),
        ModuleWeight::new("部署配置", 0.15),
        ModuleWeight::new("知识库", 0.10),
    ]
}

impl SyncConfig {
    /// Look up a configured phase by name.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&PhaseMapping> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Absolute docs directory for a project.
    #[must_use]
    pub fn docs_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.docs_dir)
    }

    /// Absolute model path for a project.
    #[must_use]
    pub fn model_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.model_file)
    }

    /// Absolute path of a phase document.
    #[must_use]
    pub fn document_path(&self, project_root: &Path, phase: &PhaseMapping) -> PathBuf {
        self.docs_path(project_root).join(&phase.document)
    }

    /// Sum of all module weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.modules.iter().map(|m| m.weight).sum()
    }

    /// Reject configurations the core cannot work with.
    ///
    /// The weight sum is deliberately not checked here; a skewed table is a
    /// consistency warning, not a reason to refuse to run.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=6).contains(&self.parser.heading_level) {
            return Err(SyncError::InvalidConfig {
                field: "parser.heading_level".to_string(),
                reason: format!("must be between 1 and 6, got {}", self.parser.heading_level),
            });
        }

        let mut seen = HashSet::new();
        for phase in &self.phases {
            if phase.name.trim().is_empty() || phase.document.trim().is_empty() {
                return Err(SyncError::InvalidConfig {
                    field: "phases".to_string(),
                    reason: "phase name and document must not be empty".to_string(),
                });
            }
            if !seen.insert(phase.name.as_str()) {
                return Err(SyncError::InvalidConfig {
                    field: "phases".to_string(),
                    reason: format!("duplicate phase '{}'", phase.name),
                });
            }
        }

        if let Some(module) = self.modules.iter().find(|m| m.weight < 0.0) {
            return Err(SyncError::InvalidConfig {
                field: "modules".to_string(),
                reason: format!("negative weight for '{}'", module.name),
            });
        }

        if self.tracker.max_title_len < 4 {
            return Err(SyncError::InvalidConfig {
                field: "tracker.max_title_len".to_string(),
                reason: "must be at least 4".to_string(),
            });
        }

        Ok(())
    }

    /// Apply one config file on top of this configuration.
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(docs_dir) = file.docs_dir {
            self.docs_dir = docs_dir;
        }
        if let Some(model_file) = file.model_file {
            self.model_file = model_file;
        }
        if let Some(parser) = file.parser {
            if let Some(grammar) = parser.grammar {
                self.parser.grammar = grammar;
            }
            if let Some(level) = parser.heading_level {
                self.parser.heading_level = level;
            }
        }
        if let Some(phases) = file.phases {
            self.phases = phases;
        }
        if let Some(modules) = file.modules {
            self.modules = modules;
        }
        if let Some(tolerance) = file.weight_tolerance {
            self.weight_tolerance = tolerance;
        }
        if let Some(tracker) = file.tracker {
            if tracker.repo.is_some() {
                self.tracker.repo = tracker.repo;
            }
            if let Some(prefix) = tracker.phase_label_prefix {
                self.tracker.phase_label_prefix = prefix;
            }
            if let Some(len) = tracker.max_title_len {
                self.tracker.max_title_len = len;
            }
        }
    }
}

// ============================================================================
// Config Files
// ============================================================================

/// Parser section of a config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserFile {
    pub grammar: Option<Grammar>,
    pub heading_level: Option<usize>,
}

/// Tracker section of a config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerFile {
    pub repo: Option<String>,
    pub phase_label_prefix: Option<String>,
    pub max_title_len: Option<usize>,
}

/// On-disk shape of one config level; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub docs_dir: Option<PathBuf>,
    pub model_file: Option<PathBuf>,
    pub parser: Option<ParserFile>,
    pub phases: Option<Vec<PhaseMapping>>,
    pub modules: Option<Vec<ModuleWeight>>,
    pub weight_tolerance: Option<f64>,
    pub tracker: Option<TrackerFile>,
}

impl ConfigFile {
    /// Read and parse a TOML config file.
    ///
    /// # Errors
    ///
    /// [`SyncError::Config`] with the path if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config_with_path(format!("cannot read {}: {}", path.display(), e), path.into())
        })?;
        toml::from_str(&text).map_err(|e| {
            SyncError::config_with_path(format!("cannot parse {}: {}", path.display(), e), path.into())
        })
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Configuration level in the inheritance hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLevel {
    Defaults,
    User,
    Project,
}

impl std::fmt::Display for ConfigLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "defaults"),
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

/// A configuration level that was considered while loading.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub level: ConfigLevel,
    /// `None` for the built-in defaults
    pub path: Option<PathBuf>,
    pub loaded: bool,
}

/// Loads [`SyncConfig`] across levels.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    user_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader using the platform user config directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_path: dirs::config_dir().map(|dir| dir.join("plansync").join("config.toml")),
            explicit_path: None,
        }
    }

    /// Override (or disable) the user-level config path.
    #[must_use]
    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_path = path;
        self
    }

    /// Use an explicit project config file instead of `plansync.toml`.
    ///
    /// Unlike the default location, an explicit file must exist.
    #[must_use]
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Resolve the configuration for a project.
    ///
    /// # Errors
    ///
    /// [`SyncError::Config`] if a present file is unreadable or malformed, or
    /// an explicit file is missing; [`SyncError::InvalidConfig`] if the merged
    /// result fails [`SyncConfig::validate`].
    pub fn load(&self, project_root: &Path) -> Result<(SyncConfig, Vec<ConfigSource>)> {
        let mut config = SyncConfig::default();
        let mut sources = vec![ConfigSource {
            level: ConfigLevel::Defaults,
            path: None,
            loaded: true,
        }];

        if let Some(user_path) = &self.user_path {
            let loaded = user_path.is_file();
            if loaded {
                config.apply(ConfigFile::load(user_path)?);
            }
            sources.push(ConfigSource {
                level: ConfigLevel::User,
                path: Some(user_path.clone()),
                loaded,
            });
        }

        let (project_path, required) = match &self.explicit_path {
            Some(path) => (path.clone(), true),
            None => (project_root.join(PROJECT_CONFIG_FILE), false),
        };
        let loaded = project_path.is_file();
        if loaded {
            config.apply(ConfigFile::load(&project_path)?);
        } else if required {
            return Err(SyncError::config_with_path(
                format!("config file not found: {}", project_path.display()),
                project_path,
            ));
        }
        sources.push(ConfigSource {
            level: ConfigLevel::Project,
            path: Some(project_path),
            loaded,
        });

        config.validate()?;
        tracing::debug!(
            sources = sources.iter().filter(|s| s.loaded).count(),
            "Resolved configuration"
        );
        Ok((config, sources))
    }
}

// ============================================================================
// Tests
// ============================================================================
