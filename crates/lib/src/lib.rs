//! ddb-lib: the kernel of the ddb developer environment tool.
//!
//! A project is configured from layered YAML files. Features contribute
//! commands, phases and actions; running a command emits one phase event per
//! phase on the event bus, and actions bound to those events walk the
//! project, render templates, link environment files and keep `.gitignore`
//! in sync with what was generated.
//!
//! - [`kernel::Kernel`]: owns configuration, registries, caches and the bus
//! - [`feature`]: the feature contract and dependency ordering
//! - [`template`]: the render protocol shared by template features
//! - [`watch`]: re-emits file events while files change

pub mod action;
pub mod binary;
pub mod cache;
pub mod command;
pub mod config;
pub mod consts;
pub mod event;
pub mod feature;
pub mod features;
pub mod gitignore;
pub mod kernel;
pub mod platform;
pub mod process;
pub mod registry;
pub mod service;
pub mod template;
pub mod util;
pub mod walker;
pub mod watch;
