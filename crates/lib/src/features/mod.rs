//! Built-in features.

pub mod core;
pub mod file;
pub mod gitignore;
pub mod jinja;
pub mod jsonnet;
pub mod permissions;
pub mod run;
pub mod shell;
pub mod symlinks;
pub mod ytt;

use std::rc::Rc;

use crate::feature::Feature;

/// Every feature shipped with the tool, in no particular order.
pub fn builtin_features() -> Vec<Rc<dyn Feature>> {
  vec![
    Rc::new(self::core::CoreFeature),
    Rc::new(file::FileFeature),
    Rc::new(jinja::JinjaFeature),
    Rc::new(jsonnet::JsonnetFeature),
    Rc::new(ytt::YttFeature),
    Rc::new(symlinks::SymlinksFeature),
    Rc::new(gitignore::GitignoreFeature),
    Rc::new(permissions::PermissionsFeature),
    Rc::new(run::RunFeature),
    Rc::new(shell::ShellFeature),
  ]
}

fn strings(values: &[&str]) -> Vec<String> {
  values.iter().map(|v| v.to_string()).collect()
}
