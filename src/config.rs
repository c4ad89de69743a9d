use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use vantage_relevance::ChunkLoadRule;
use vantage_runtime::PipelineConfig;
use vantage_world::ViewDistance;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config io: {}", e),
            ConfigError::Parse(e) => write!(f, "config parse: {}", e),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Parse(value)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)] pub view: View,
    #[serde(default)] pub load: Load,
    #[serde(default)] pub mesh: Mesh,
    #[serde(default)] pub world: World,
    #[serde(default)] pub sim: Sim,
}

#[derive(Clone, Debug, Deserialize)]
pub struct View {
    #[serde(default = "default_view_h")] pub horizontal: i32,
    #[serde(default = "default_view_v")] pub vertical: i32,
}
fn default_view_h() -> i32 { 4 }
fn default_view_v() -> i32 { 2 }
impl Default for View { fn default() -> Self { Self { horizontal: default_view_h(), vertical: default_view_v() } } }

#[derive(Clone, Debug, Deserialize)]
pub struct Load {
    #[serde(default = "default_load_h")] pub horizontal: i32,
    #[serde(default = "default_load_v")] pub vertical: i32,
}
fn default_load_h() -> i32 { 7 }
fn default_load_v() -> i32 { 3 }
impl Default for Load { fn default() -> Self { Self { horizontal: default_load_h(), vertical: default_load_v() } } }

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind { Fifo, Nearest }

/// `worker_threads = 0` builds meshes on the main loop, once per tick.
#[derive(Clone, Debug, Deserialize)]
pub struct Mesh {
    #[serde(default = "default_workers")] pub worker_threads: usize,
    #[serde(default = "default_idle_poll")] pub idle_poll_ms: u64,
    #[serde(default = "default_order")] pub order: OrderKind,
}
fn default_workers() -> usize { 3 }
fn default_idle_poll() -> u64 { 20 }
fn default_order() -> OrderKind { OrderKind::Nearest }
impl Default for Mesh { fn default() -> Self { Self { worker_threads: default_workers(), idle_poll_ms: default_idle_poll(), order: default_order() } } }

#[derive(Clone, Debug, Deserialize)]
pub struct World {
    #[serde(default = "default_world_id")] pub id: String,
    #[serde(default = "default_ground")] pub ground_height: i32,
}
fn default_world_id() -> String { "overworld".into() }
fn default_ground() -> i32 { 4 }
impl Default for World { fn default() -> Self { Self { id: default_world_id(), ground_height: default_ground() } } }

#[derive(Clone, Debug, Deserialize)]
pub struct Sim {
    #[serde(default = "default_observers")] pub observers: u32,
    #[serde(default = "default_ticks")] pub ticks: u64,
    #[serde(default = "default_tick_ms")] pub tick_ms: u64,
    #[serde(default = "default_stats_every")] pub stats_every: u64,
    /// Rebuild the mesh under every observer this often; 0 disables.
    #[serde(default)] pub rebuild_every: u64,
}
fn default_observers() -> u32 { 2 }
fn default_ticks() -> u64 { 600 }
fn default_tick_ms() -> u64 { 16 }
fn default_stats_every() -> u64 { 120 }
impl Default for Sim { fn default() -> Self { Self { observers: default_observers(), ticks: default_ticks(), tick_ms: default_tick_ms(), stats_every: default_stats_every(), rebuild_every: 0 } } }

impl ServerConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: ServerConfig = toml::from_str(toml_str)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.view.horizontal < 0 || self.view.vertical < 0 {
            return Err(ConfigError::Invalid("view distances must be non-negative".into()));
        }
        if self.load.horizontal < 0 || self.load.vertical < 0 {
            return Err(ConfigError::Invalid("load distances must be non-negative".into()));
        }
        if self.world.id.is_empty() {
            return Err(ConfigError::Invalid("world id is empty".into()));
        }
        Ok(())
    }

    pub fn view_distance(&self) -> ViewDistance {
        ViewDistance::new(self.view.horizontal, self.view.vertical)
    }

    pub fn load_rule(&self) -> ChunkLoadRule {
        ChunkLoadRule::new(self.load.horizontal, self.load.vertical)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            worker_threads: self.mesh.worker_threads,
            idle_poll: Duration::from_millis(self.mesh.idle_poll_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.view_distance(), ViewDistance::new(4, 2));
        assert_eq!(cfg.load_rule(), ChunkLoadRule::new(7, 3));
        assert_eq!(cfg.mesh.worker_threads, 3);
        assert_eq!(cfg.mesh.order, OrderKind::Nearest);
        assert_eq!(cfg.world.id, "overworld");
        assert_eq!(cfg.sim.ticks, 600);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ServerConfig::from_toml_str(
            "[view]\nhorizontal = 2\n[mesh]\norder = \"fifo\"\nworker_threads = 0\n",
        )
        .unwrap();
        assert_eq!(cfg.view_distance(), ViewDistance::new(2, 2));
        assert_eq!(cfg.mesh.order, OrderKind::Fifo);
        assert_eq!(cfg.pipeline_config().worker_threads, 0);
        assert_eq!(cfg.pipeline_config().idle_poll, Duration::from_millis(20));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ServerConfig::from_toml_str("[view]\nvertical = -1\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml_str("[mesh]\norder = \"random\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
