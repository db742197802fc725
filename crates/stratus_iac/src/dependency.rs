//! Dependency analysis over a discovered batch.
//!
//! Edges come from metadata attributes that carry another resource's id.
//! Unresolved well-known references and cycles are reported so the engine
//! can turn them into warnings; nothing here is fatal to generation.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use stratus_core::Resource;

use crate::error::{IacError, IacResult};

/// Attributes that always name another resource.
pub const WELL_KNOWN_REFERENCE_KEYS: &[&str] = &[
    "vpc_id",
    "subnet_id",
    "subnet_ids",
    "security_group_ids",
    "vpc_security_group_ids",
    "security_groups",
    "internet_gateway_id",
    "route_table_id",
    "instance_id",
    "network_interface_id",
];

/// Resource id to the ids it depends on.
pub type DependencyMap = BTreeMap<String, Vec<String>>;

/// A reference whose target is not part of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub resource_id: String,
    pub attribute: String,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub attribute: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// Whether a metadata key may hold a reference.
pub fn is_reference_key(key: &str) -> bool {
    key.ends_with("_id") || key.ends_with("_ids") || key == "security_groups"
}

fn referenced_ids(resource: &Resource, key: &str) -> Vec<String> {
    resource
        .metadata_value(key)
        .and_then(|v| v.as_string_list())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| !id.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

#[derive(Debug, Default)]
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Map every resource id to the batch ids it references. Self-references
    /// and targets outside the batch are ignored.
    pub fn analyze_dependencies(&self, resources: &[Resource]) -> DependencyMap {
        let ids: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        let mut deps = DependencyMap::new();

        for resource in resources {
            let entry = deps.entry(resource.id.clone()).or_default();
            for key in resource.metadata.keys().filter(|k| is_reference_key(k)) {
                for target in referenced_ids(resource, key) {
                    if target != resource.id && ids.contains(target.as_str()) && !entry.contains(&target) {
                        entry.push(target);
                    }
                }
            }
        }

        debug!(
            resources = resources.len(),
            edges = deps.values().map(Vec::len).sum::<usize>(),
            "Analyzed dependencies"
        );
        deps
    }

    /// Well-known references whose target is not in the batch.
    pub fn dangling_references(&self, resources: &[Resource]) -> Vec<DanglingReference> {
        let ids: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        let mut dangling = Vec::new();

        for resource in resources {
            for key in WELL_KNOWN_REFERENCE_KEYS {
                for target in referenced_ids(resource, key) {
                    if !ids.contains(target.as_str()) {
                        dangling.push(DanglingReference {
                            resource_id: resource.id.clone(),
                            attribute: key.to_string(),
                            target_id: target,
                        });
                    }
                }
            }
        }
        dangling
    }

    pub fn dependency_graph(&self, resources: &[Resource]) -> DependencyGraph {
        let ids: HashSet<&str> = resources.iter().map(|r| r.id.as_str()).collect();
        let mut graph = DependencyGraph::default();
        let mut seen = HashSet::new();

        for resource in resources {
            if !seen.insert(resource.id.as_str()) {
                continue;
            }
            graph.nodes.push(GraphNode {
                id: resource.id.clone(),
                resource_type: resource.resource_type.clone(),
            });
            for key in resource.metadata.keys().filter(|k| is_reference_key(k)) {
                for target in referenced_ids(resource, key) {
                    if target != resource.id && ids.contains(target.as_str()) {
                        graph.edges.push(GraphEdge {
                            from: resource.id.clone(),
                            to: target,
                            attribute: key.clone(),
                        });
                    }
                }
            }
        }
        graph
    }

    /// Fail on the first cycle found.
    pub fn validate_dependencies(&self, deps: &DependencyMap) -> IacResult<()> {
        match self.find_cycles(deps).into_iter().next() {
            Some(cycle) => Err(IacError::CyclicDependency(cycle.join(" -> "))),
            None => Ok(()),
        }
    }

    /// Every cycle reachable by depth-first search, each as a path that
    /// starts and ends at the same id.
    pub fn find_cycles(&self, deps: &DependencyMap) -> Vec<Vec<String>> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut cycles = Vec::new();

        for start in deps.keys() {
            if !marks.contains_key(start.as_str()) {
                visit(start, deps, &mut marks, &mut stack, &mut cycles);
            }
        }
        cycles
    }
}

fn visit<'a>(
    node: &'a str,
    deps: &'a DependencyMap,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
    cycles: &mut Vec<Vec<String>>,
) {
    marks.insert(node, Mark::Visiting);
    stack.push(node);

    for next in deps.get(node).into_iter().flatten() {
        match marks.get(next.as_str()) {
            Some(Mark::Visiting) => {
                if let Some(start) = stack.iter().position(|n| *n == next.as_str()) {
                    let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(next.clone());
                    cycles.push(cycle);
                }
            }
            Some(Mark::Done) => {}
            None => visit(next, deps, marks, stack, cycles),
        }
    }

    stack.pop();
    marks.insert(node, Mark::Done);
}
