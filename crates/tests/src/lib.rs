use std::path::PathBuf;

use medbot_agents::AgentConfig;

/// The catalog shipped in `data/`, used by the integration tests.
pub fn sample_catalog_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/intents.json")
}

pub fn sample_agent_config() -> AgentConfig {
    AgentConfig {
        catalog_path: sample_catalog_path(),
        ..AgentConfig::default()
    }
}
