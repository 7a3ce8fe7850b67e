pub mod config;
pub mod parser;

pub use config::{
    duration_millis, AlertRuleConfig, EngineConfig, EngineConfigBuilder, RollupWindow, StoreConfig,
    MAX_DURATION,
};
pub use parser::{parse_config_from_file, parse_config_from_str};
