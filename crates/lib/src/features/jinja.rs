//! The `jinja` feature: renders `*.jinja` templates with the configuration.
//!
//! The engine covers the subset templates in projects actually use:
//!
//! - `{{ core.env.current }}` substitutes a configuration value
//! - `{{ app.port | default(8080) }}` with the `default`, `upper`, `lower`
//!   and `trim` filters
//! - `{{ 'literal' }}`
//! - `{# comment #}`
//!
//! Undefined values are errors.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;
use crate::config::{Config, ConfigError, Schema, path};
use crate::feature::Feature;
use crate::kernel::Kernel;
use crate::template::{RenderError, Rendered, Renderer, TemplateAction};

use super::strings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JinjaSchema {
  pub suffixes: Vec<String>,
  pub extensions: Vec<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub autofix: bool,
}

impl Default for JinjaSchema {
  fn default() -> Self {
    Self {
      suffixes: strings(&[".jinja"]),
      extensions: strings(&[".*", ""]),
      includes: Vec::new(),
      excludes: Vec::new(),
      autofix: false,
    }
  }
}

impl Schema for JinjaSchema {}

pub struct JinjaFeature;

impl Feature for JinjaFeature {
  fn name(&self) -> &str {
    "jinja"
  }

  fn dependencies(&self) -> Vec<String> {
    strings(&["core", "file"])
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<JinjaSchema>("jinja")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(TemplateAction::new("jinja", JinjaRenderer))]
  }
}

pub struct JinjaRenderer;

impl Renderer for JinjaRenderer {
  fn name(&self) -> &str {
    "jinja"
  }

  fn priority(&self) -> i32 {
    10
  }

  fn render(&self, kernel: &Kernel, template: &Path, target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError> {
    let source = fs::read_to_string(template).map_err(|e| RenderError::Read {
      path: template.display().to_string(),
      source: e,
    })?;
    let rendered = render(&source, kernel.config().tree(), &template.display().to_string())?;
    Ok(vec![(Rendered::Text(rendered), target.to_path_buf())])
  }
}

/// Render `source` against `context`. `name` identifies the template in errors.
pub fn render(source: &str, context: &Value, name: &str) -> Result<String, RenderError> {
  let syntax = |message: &str| RenderError::Syntax {
    template: name.to_string(),
    message: message.to_string(),
  };

  let mut out = String::with_capacity(source.len());
  let mut rest = source;
  while let Some(start) = rest.find('{') {
    let (before, tail) = rest.split_at(start);
    out.push_str(before);

    if let Some(body) = tail.strip_prefix("{{") {
      let end = body.find("}}").ok_or_else(|| syntax("unclosed '{{'"))?;
      out.push_str(&evaluate(&body[..end], context, name)?);
      rest = &body[end + 2..];
    } else if let Some(body) = tail.strip_prefix("{#") {
      let end = body.find("#}").ok_or_else(|| syntax("unclosed '{#'"))?;
      rest = &body[end + 2..];
    } else if tail.starts_with("{%") {
      return Err(syntax("block statements ('{% ... %}') are not supported"));
    } else {
      out.push('{');
      rest = &tail[1..];
    }
  }
  out.push_str(rest);
  Ok(out)
}

fn evaluate(expression: &str, context: &Value, name: &str) -> Result<String, RenderError> {
  let syntax = |message: String| RenderError::Syntax {
    template: name.to_string(),
    message,
  };

  let mut parts = expression.split('|').map(str::trim);
  let term = parts.next().unwrap_or_default();
  if term.is_empty() {
    return Err(syntax("empty expression".to_string()));
  }

  let mut value = literal(term).or_else(|| path::lookup(context, &path::parse(term)).cloned());
  for filter in parts {
    let (filter, argument) = match filter.split_once('(') {
      Some((filter, argument)) => (filter.trim(), argument.strip_suffix(')').map(str::trim)),
      None => (filter, None),
    };
    value = match filter {
      "default" => match value {
        Some(v) if !v.is_null() => Some(v),
        _ => Some(
          argument
            .and_then(literal)
            .ok_or_else(|| syntax(format!("'default' needs a literal argument in '{}'", expression.trim())))?,
        ),
      },
      "upper" => value.map(|v| Value::String(display(&v).to_uppercase())),
      "lower" => value.map(|v| Value::String(display(&v).to_lowercase())),
      "trim" => value.map(|v| Value::String(display(&v).trim().to_string())),
      other => return Err(syntax(format!("unknown filter '{}'", other))),
    };
  }

  match value {
    Some(value) => Ok(display(&value)),
    None => Err(RenderError::Undefined {
      template: name.to_string(),
      name: term.to_string(),
    }),
  }
}

fn literal(term: &str) -> Option<Value> {
  let quoted = |q: char| term.len() >= 2 && term.starts_with(q) && term.ends_with(q);
  if quoted('\'') || quoted('"') {
    return Some(Value::String(term[1..term.len() - 1].to_string()));
  }
  match term {
    "true" | "True" => return Some(Value::Bool(true)),
    "false" | "False" => return Some(Value::Bool(false)),
    "none" | "None" => return Some(Value::Null),
    _ => {}
  }
  serde_json::from_str::<serde_json::Number>(term).ok().map(Value::Number)
}

fn display(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn context() -> Value {
    json!({
      "core": {"env": {"current": "dev"}, "project": {"name": "shop"}},
      "app": {"hosts": ["a.test", "b.test"], "debug": true, "port": null}
    })
  }

  #[test]
  fn substitutes_dotted_keys() {
    let out = render("env={{ core.env.current }} name={{core.project.name}}", &context(), "t").unwrap();
    assert_eq!(out, "env=dev name=shop");
  }

  #[test]
  fn indexes_and_scalars() {
    let out = render("{{ app.hosts[1] }} {{ app.debug }}", &context(), "t").unwrap();
    assert_eq!(out, "b.test true");
  }

  #[test]
  fn filters() {
    let out = render(
      "{{ app.port | default(8080) }} {{ core.env.current | upper }} {{ missing | default('x') | upper }}",
      &context(),
      "t",
    )
    .unwrap();
    assert_eq!(out, "8080 DEV X");
  }

  #[test]
  fn comments_and_lone_braces() {
    let out = render("{# note #}{ \"json\": {{ 'v' }} }", &context(), "t").unwrap();
    assert_eq!(out, "{ \"json\": v }");
  }

  #[test]
  fn undefined_is_an_error() {
    let err = render("{{ nope.value }}", &context(), "app.yml.jinja").unwrap_err();
    assert_eq!(err.to_string(), "app.yml.jinja: 'nope.value' is undefined");
  }

  #[test]
  fn syntax_errors() {
    assert!(matches!(render("{{ open", &context(), "t"), Err(RenderError::Syntax { .. })));
    assert!(matches!(render("{% if x %}", &context(), "t"), Err(RenderError::Syntax { .. })));
    assert!(matches!(render("{{ x | shout }}", &context(), "t"), Err(RenderError::Syntax { .. })));
    assert!(matches!(render("{{ }}", &context(), "t"), Err(RenderError::Syntax { .. })));
  }
}
