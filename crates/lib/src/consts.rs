//! Crate-wide constants.

/// Application name, used for directory names and log targets.
pub const APP_NAME: &str = "ddb";

/// Prefix of every environment variable the tool reads.
pub const ENV_PREFIX: &str = "DDB";

/// Prefix of environment variables that override configuration values
/// after plain `DDB_` overrides have been applied.
pub const ENV_OVERRIDE_PREFIX: &str = "DDB_OVERRIDE";

/// Environment variable holding the serialized environment saved by `activate`.
pub const SHELL_ENVIRON_BACKUP: &str = "DDB_SHELL_ENVIRON_BACKUP";

/// Configuration file base names, in merge order.
pub const CONFIG_FILENAMES: [&str; 2] = ["ddb", "ddb.local"];

/// Configuration file extensions, in merge order.
pub const CONFIG_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Hard bound on template autofix retries for a single render.
pub const AUTOFIX_MAX_RETRIES: usize = 50;

/// Default marker used to delimit the managed block of `.gitignore` files.
pub const GITIGNORE_MARKER: &str = "ddb";

/// Length of the hash suffix used in project cache slugs.
pub const SLUG_HASH_LEN: usize = 12;

/// Version of the on-disk cache file format.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Version reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
