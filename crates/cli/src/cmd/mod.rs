mod execute;
mod watch;

pub use execute::cmd_main;
pub use watch::cmd_watch;
