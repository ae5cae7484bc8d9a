//! Public event topic names.

pub const PHASE_PREFIX: &str = "phase:";

pub const FILE_FOUND: &str = "file:found";
pub const FILE_DELETED: &str = "file:deleted";
pub const FILE_GENERATED: &str = "file:generated";

pub const CERTS_GENERATE: &str = "certs:generate";
pub const CERTS_AVAILABLE: &str = "certs:available";

pub const BINARY_REGISTERED: &str = "binary:registered";

pub const DOCKER_COMPOSE_CONFIG: &str = "docker:docker-compose-config";
pub const DOCKER_BINARY: &str = "docker:binary";

pub const MAIN_START: &str = "main:start";
pub const MAIN_TERMINATE: &str = "main:terminate";
pub const MAIN_VERSION: &str = "main:version";

pub const CONFIG_RELOADED: &str = "config:reloaded";

/// Topic emitted when the phase `name` runs.
pub fn phase(name: &str) -> String {
  format!("{}{}", PHASE_PREFIX, name)
}
