//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Global configuration instance / 全局配置实例
static CONFIG: OnceCell<Arc<RwLock<AppConfig>>> = OnceCell::new();

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Document index configuration / 文档索引配置
    pub index: IndexConfig,
    /// Response cache configuration / 响应缓存配置
    pub cache: CacheConfig,
    /// Search behaviour configuration / 搜索行为配置
    pub search: SearchConfig,
}

/// Document index configuration / 文档索引配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index node / 索引节点地址
    pub base_url: String,
    /// Index (or alias) queried for finding aids / 检索用索引名
    pub index_name: String,
    /// minimum_should_match applied to non-advanced text queries / 文本查询的最小匹配率
    pub minimum_should_match: String,
    /// Ask the engine for exact hit totals / 是否精确统计命中总数
    pub track_total_hits: bool,
    /// Per-query timeout in seconds / 单次查询超时（秒）
    pub request_timeout_secs: u64,
}

/// Response cache configuration / 响应缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Number of shards, keeps lock contention down / 分片数量
    pub shards: usize,
    /// Entry lifetime in minutes, 0 keeps entries forever / 条目存活时间（分钟），0 表示永不过期
    pub life_window_minutes: u64,
    /// Minimum interval between expired-entry sweeps / 过期清理的最小间隔（分钟）
    pub clean_window_minutes: u64,
    /// Largest cacheable response in KB / 单条目上限（KB）
    pub max_entry_size_kb: usize,
    /// Total capacity in MB before eviction kicks in / 总容量上限（MB）
    pub hard_max_cache_size_mb: usize,
}

/// Search behaviour configuration / 搜索行为配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Facet fields added to every cluster request / 聚类检索默认附加的 facet 字段
    pub default_facet_fields: Vec<String>,
    /// Entry label marking description-only filters / 描述过滤器的标签
    pub description_label: String,
    /// Child documents fetched per collapsed group / 每个折叠组取回的子文档数
    pub collapse_inner_hits: usize,
    /// Concurrent group fetches inside the engine / 引擎内并发折叠组数
    pub collapse_max_concurrent: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            index_name: "eadlist".to_string(),
            minimum_should_match: "2<70%".to_string(),
            track_total_hits: true,
            request_timeout_secs: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shards: 1024,
            life_window_minutes: 10,
            clean_window_minutes: 5,
            max_entry_size_kb: 512,
            hard_max_cache_size_mb: 64,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_facet_fields: vec![
                "tree.hasDigitalObject".to_string(),
                "tree.mimeType".to_string(),
                "ead-rdf_genreform".to_string(),
            ],
            description_label: "ead-rdf_periodDesc".to_string(),
            collapse_inner_hits: 1,
            collapse_max_concurrent: 4,
        }
    }
}

impl IndexConfig {
    /// Get the per-query timeout / 获取单次查询超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CacheConfig {
    /// Get the entry lifetime / 获取条目存活时间
    pub fn life_window(&self) -> Duration {
        Duration::from_secs(self.life_window_minutes * 60)
    }

    /// Get the sweep interval / 获取清理间隔
    pub fn clean_window(&self) -> Duration {
        Duration::from_secs(self.clean_window_minutes * 60)
    }

    /// Get the per-entry byte cap / 获取单条目字节上限
    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_size_kb * 1024
    }

    /// Get the total byte capacity / 获取总字节容量
    pub fn hard_max_bytes(&self) -> usize {
        self.hard_max_cache_size_mb * 1024 * 1024
    }
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    load_config_from(&get_config_path())
}

/// Load configuration from a specific path / 从指定路径加载配置
pub fn load_config_from(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config_to(&config, config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config: &AppConfig) -> Result<(), String> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to a specific path / 保存配置到指定路径
pub fn save_config_to(config: &AppConfig, config_path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

/// Initialize global configuration / 初始化全局配置
pub fn init_config() -> Result<Arc<RwLock<AppConfig>>, String> {
    let config = load_config()?;

    let config_arc = Arc::new(RwLock::new(config));

    CONFIG
        .set(config_arc.clone())
        .map_err(|_| "Config already initialized".to_string())?;

    Ok(config_arc)
}

/// Get global configuration instance / 获取全局配置实例
pub fn get_config() -> Arc<RwLock<AppConfig>> {
    CONFIG
        .get_or_init(|| {
            let config = load_config().unwrap_or_default();
            Arc::new(RwLock::new(config))
        })
        .clone()
}

/// Get a read-only snapshot of current config / 获取当前配置的只读快照
pub fn config() -> AppConfig {
    get_config().read().clone()
}
