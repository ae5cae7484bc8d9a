//! Dependency ordering of features.
//!
//! Features form a graph with an edge from each dependency to its dependent.
//! The order is Kahn's algorithm, always taking the ready feature with the
//! smallest name so the result does not depend on input order. When every
//! remaining feature waits on another, the optional edges into the smallest
//! feature that only waits on optional dependencies are dropped; if there is
//! no such feature the graph has a real cycle.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

use super::{Feature, FeatureError, OPTIONAL};

/// A parsed entry of [`Feature::dependencies`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
  pub name: String,
  pub optional: bool,
}

impl Dependency {
  pub fn parse(entry: &str) -> Self {
    let entry = entry.trim();
    match entry.strip_suffix(OPTIONAL) {
      Some(name) => Self {
        name: name.trim().to_string(),
        optional: true,
      },
      None => Self {
        name: entry.to_string(),
        optional: false,
      },
    }
  }
}

fn add_edge(graph: &mut DiGraph<String, bool>, from: NodeIndex, to: NodeIndex, optional: bool) {
  match graph.find_edge(from, to) {
    // A required declaration wins over an optional one.
    Some(edge) if !optional => graph[edge] = false,
    Some(_) => {}
    None => {
      graph.add_edge(from, to, optional);
    }
  }
}

/// Order `features` so that every feature follows its dependencies.
///
/// Later features replace earlier ones with the same name. `extra` adds
/// optional edges from configuration, keyed by dependent feature.
pub fn sort(
  features: Vec<Rc<dyn Feature>>,
  extra: &IndexMap<String, Vec<String>>,
) -> Result<Vec<Rc<dyn Feature>>, FeatureError> {
  let mut unique: IndexMap<String, Rc<dyn Feature>> = IndexMap::new();
  for feature in features {
    let name = feature.name().to_string();
    if unique.insert(name.clone(), feature).is_some() {
      debug!(feature = %name, "feature replaced by a later definition");
    }
  }

  let mut graph: DiGraph<String, bool> = DiGraph::new();
  let nodes: HashMap<String, NodeIndex> = unique
    .keys()
    .map(|name| (name.clone(), graph.add_node(name.clone())))
    .collect();

  for (name, feature) in &unique {
    for dependency in feature.dependencies().iter().map(|d| Dependency::parse(d)) {
      match nodes.get(&dependency.name) {
        Some(&from) => add_edge(&mut graph, from, nodes[name], dependency.optional),
        None if dependency.optional => {
          debug!(feature = %name, dependency = %dependency.name, "optional dependency not available");
        }
        None => {
          return Err(FeatureError::MissingDependency {
            feature: name.clone(),
            dependency: dependency.name,
          });
        }
      }
    }
  }

  for (name, dependencies) in extra {
    let Some(&to) = nodes.get(name) else {
      warn!(feature = %name, "configured dependencies for an unknown feature");
      continue;
    };
    for dependency in dependencies {
      match nodes.get(dependency) {
        Some(&from) => add_edge(&mut graph, from, to, true),
        None => warn!(feature = %name, dependency = %dependency, "configured dependency on an unknown feature"),
      }
    }
  }

  let order = topological_order(&graph)?;
  Ok(
    order
      .into_iter()
      .filter_map(|node| unique.get(&graph[node]).cloned())
      .collect(),
  )
}

fn topological_order(graph: &DiGraph<String, bool>) -> Result<Vec<NodeIndex>, FeatureError> {
  let mut indegree: HashMap<NodeIndex, usize> = graph
    .node_indices()
    .map(|n| (n, graph.edges_directed(n, Direction::Incoming).count()))
    .collect();
  let mut ready: BTreeSet<(&str, NodeIndex)> = graph
    .node_indices()
    .filter(|n| indegree[n] == 0)
    .map(|n| (graph[n].as_str(), n))
    .collect();
  let mut dropped: HashSet<EdgeIndex> = HashSet::new();
  let mut done: HashSet<NodeIndex> = HashSet::new();
  let mut order = Vec::with_capacity(graph.node_count());

  while order.len() < graph.node_count() {
    if let Some((_, node)) = ready.pop_first() {
      done.insert(node);
      order.push(node);
      for edge in graph.edges_directed(node, Direction::Outgoing) {
        if dropped.contains(&edge.id()) {
          continue;
        }
        let target = edge.target();
        if let Some(count) = indegree.get_mut(&target) {
          *count -= 1;
          if *count == 0 {
            ready.insert((graph[target].as_str(), target));
          }
        }
      }
      continue;
    }

    let mut stalled: Vec<NodeIndex> = graph.node_indices().filter(|n| !done.contains(n)).collect();
    stalled.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

    let pending = |node: NodeIndex| {
      graph
        .edges_directed(node, Direction::Incoming)
        .filter(|e| !dropped.contains(&e.id()) && !done.contains(&e.source()))
        .collect::<Vec<_>>()
    };

    let Some(&breakable) = stalled.iter().find(|&&n| pending(n).iter().all(|e| *e.weight())) else {
      return Err(FeatureError::Cycle {
        features: stalled.iter().map(|n| graph[*n].clone()).collect(),
      });
    };

    for edge in pending(breakable) {
      warn!(
        feature = %graph[breakable],
        dependency = %graph[edge.source()],
        "ignoring optional dependency to break a cycle"
      );
      dropped.insert(edge.id());
    }
    indegree.insert(breakable, 0);
    ready.insert((graph[breakable].as_str(), breakable));
  }

  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Stub {
    name: &'static str,
    deps: Vec<&'static str>,
  }

  impl Feature for Stub {
    fn name(&self) -> &str {
      self.name
    }

    fn dependencies(&self) -> Vec<String> {
      self.deps.iter().map(|d| d.to_string()).collect()
    }
  }

  fn stub(name: &'static str, deps: &[&'static str]) -> Rc<dyn Feature> {
    Rc::new(Stub {
      name,
      deps: deps.to_vec(),
    })
  }

  fn names(features: &[Rc<dyn Feature>]) -> Vec<String> {
    features.iter().map(|f| f.name().to_string()).collect()
  }

  #[test]
  fn dependencies_come_first() {
    let sorted = sort(
      vec![stub("jinja", &["core", "file"]), stub("file", &["core"]), stub("core", &[])],
      &IndexMap::new(),
    )
    .unwrap();
    assert_eq!(names(&sorted), ["core", "file", "jinja"]);
  }

  #[test]
  fn order_is_independent_of_input_order() {
    let a = sort(vec![stub("b", &[]), stub("a", &[]), stub("c", &["b"])], &IndexMap::new()).unwrap();
    let b = sort(vec![stub("c", &["b"]), stub("a", &[]), stub("b", &[])], &IndexMap::new()).unwrap();
    assert_eq!(names(&a), ["a", "b", "c"]);
    assert_eq!(names(&a), names(&b));
  }

  #[test]
  fn missing_optional_dependency_is_ignored() {
    let sorted = sort(vec![stub("shell", &["core", "run[optional]"]), stub("core", &[])], &IndexMap::new()).unwrap();
    assert_eq!(names(&sorted), ["core", "shell"]);
  }

  #[test]
  fn missing_required_dependency_is_an_error() {
    let err = sort(vec![stub("jinja", &["file"])], &IndexMap::new()).err().unwrap();
    assert!(matches!(
      err,
      FeatureError::MissingDependency { ref feature, ref dependency } if feature == "jinja" && dependency == "file"
    ));
  }

  #[test]
  fn optional_cycle_is_broken() {
    let sorted = sort(
      vec![stub("a", &["b[optional]"]), stub("b", &["a"])],
      &IndexMap::new(),
    )
    .unwrap();
    assert_eq!(names(&sorted), ["a", "b"]);
  }

  #[test]
  fn required_cycle_is_an_error() {
    let err = sort(vec![stub("a", &["b"]), stub("b", &["a"]), stub("c", &[])], &IndexMap::new())
      .err()
      .unwrap();
    match err {
      FeatureError::Cycle { features } => assert_eq!(features, ["a", "b"]),
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn later_definition_replaces_earlier() {
    let sorted = sort(vec![stub("jinja", &["file"]), stub("jinja", &[])], &IndexMap::new()).unwrap();
    assert_eq!(names(&sorted), ["jinja"]);
    assert!(sorted[0].dependencies().is_empty());
  }

  #[test]
  fn configured_dependencies_add_order() {
    let mut extra = IndexMap::new();
    extra.insert("a".to_string(), vec!["b".to_string(), "ghost".to_string()]);
    extra.insert("ghost".to_string(), vec!["a".to_string()]);
    let sorted = sort(vec![stub("a", &[]), stub("b", &[])], &extra).unwrap();
    assert_eq!(names(&sorted), ["b", "a"]);
  }

  #[test]
  fn dependency_parsing() {
    assert_eq!(
      Dependency::parse("run[optional]"),
      Dependency {
        name: "run".to_string(),
        optional: true
      }
    );
    assert_eq!(
      Dependency::parse("core"),
      Dependency {
        name: "core".to_string(),
        optional: false
      }
    );
  }
}
