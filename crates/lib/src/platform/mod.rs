pub mod paths;
pub mod permissions;
