// src/dag/graph.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::warn;

use crate::types::Role;

/// Dependency graph between the worker roles of one instrument.
///
/// Edge direction: dependency -> dependent. The generator reads what the
/// trainer produces and the trader consumes the generator's signals, so:
///
/// `Trainer -> Generator -> Trader`
///
/// Launch order is a topological sort; teardown is the exact reverse.
#[derive(Debug, Clone)]
pub struct RoleGraph {
    graph: DiGraphMap<Role, ()>,
    launch: Vec<Role>,
}

impl RoleGraph {
    pub fn new() -> Self {
        let mut graph: DiGraphMap<Role, ()> = DiGraphMap::new();
        for role in Role::ALL {
            graph.add_node(role);
        }
        graph.add_edge(Role::Trainer, Role::Generator, ());
        graph.add_edge(Role::Generator, Role::Trader, ());

        let launch = match toposort(&graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                warn!(role = %cycle.node_id(), "role graph has a cycle; using declaration order");
                Role::ALL.to_vec()
            }
        };

        Self { graph, launch }
    }

    /// Roles in dependency order (trainer first).
    pub fn launch_order(&self) -> &[Role] {
        &self.launch
    }

    /// Roles in reverse dependency order (trader first).
    pub fn teardown_order(&self) -> Vec<Role> {
        self.launch.iter().rev().copied().collect()
    }

    /// The role that must be up (and, for the generator, ready) before `role` starts.
    pub fn dependency_of(&self, role: Role) -> Option<Role> {
        self.graph
            .neighbors_directed(role, petgraph::Direction::Incoming)
            .next()
    }
}

impl Default for RoleGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_follows_dependencies_and_teardown_reverses_it() {
        let graph = RoleGraph::new();
        assert_eq!(
            graph.launch_order(),
            &[Role::Trainer, Role::Generator, Role::Trader]
        );
        assert_eq!(
            graph.teardown_order(),
            vec![Role::Trader, Role::Generator, Role::Trainer]
        );
    }

    #[test]
    fn each_role_waits_on_its_upstream() {
        let graph = RoleGraph::default();
        assert_eq!(graph.dependency_of(Role::Trainer), None);
        assert_eq!(graph.dependency_of(Role::Generator), Some(Role::Trainer));
        assert_eq!(graph.dependency_of(Role::Trader), Some(Role::Generator));
    }
}
