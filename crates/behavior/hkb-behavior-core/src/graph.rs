//! Reference graph over pointer fields.
//!
//! Built on demand from a root object and never updated: any change to the
//! behavior makes a built graph stale.

use std::collections::VecDeque;

use hashbrown::HashSet;
use petgraph::algo::{astar, tarjan_scc};
use petgraph::graphmap::DiGraphMap;
use petgraph::Direction;

use crate::behavior::Behavior;
use crate::error::LookupKind;
use crate::path::FieldPath;
use crate::{BehaviorError, Result};

/// A pointer whose target is not in the behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef<'a> {
    pub source: &'a str,
    pub path: FieldPath,
    pub target: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReferenceGraph<'a> {
    root: &'a str,
    /// Edge weights are the field paths of every pointer between the two nodes.
    graph: DiGraphMap<&'a str, Vec<FieldPath>>,
    /// Nodes in discovery order.
    order: Vec<&'a str>,
    keys: HashSet<&'a str>,
    dangling: Vec<DanglingRef<'a>>,
}

impl<'a> ReferenceGraph<'a> {
    /// Breadth-first walk over every pointer reachable from `root_id`.
    pub fn build(behavior: &'a Behavior, root_id: &str) -> Result<Self> {
        let root = behavior
            .get(root_id)
            .and_then(|r| r.id())
            .ok_or_else(|| BehaviorError::lookup(LookupKind::Object, root_id))?;

        let mut graph: DiGraphMap<&'a str, Vec<FieldPath>> = DiGraphMap::new();
        let mut order = vec![root];
        let mut keys: HashSet<&'a str> = HashSet::new();
        let mut dangling = Vec::new();
        let mut queue = VecDeque::from([root]);
        graph.add_node(root);
        keys.insert(root);

        while let Some(source) = queue.pop_front() {
            let Some(record) = behavior.get(source) else {
                continue;
            };
            for (path, pointer) in record.pointers() {
                let Some(target) = pointer.target() else {
                    continue;
                };
                let Some(target) = behavior.get(target).and_then(|r| r.id()) else {
                    dangling.push(DanglingRef {
                        source,
                        path,
                        target,
                    });
                    continue;
                };
                if keys.insert(target) {
                    order.push(target);
                    queue.push_back(target);
                }
                match graph.edge_weight_mut(source, target) {
                    Some(paths) => paths.push(path),
                    None => {
                        graph.add_edge(source, target, vec![path]);
                    }
                }
            }
        }

        Ok(ReferenceGraph {
            root,
            graph,
            order,
            keys,
            dangling,
        })
    }

    pub fn root(&self) -> &'a str {
        self.root
    }

    fn key(&self, id: &str) -> Option<&'a str> {
        self.keys.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains(id)
    }

    /// Reachable object ids, root first, in breadth-first discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.order.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.all_edges().map(|(_, _, paths)| paths.len()).sum()
    }

    /// `(source, target, field path)` for every pointer between reachable objects.
    pub fn edges(&self) -> Vec<(&'a str, &'a str, &FieldPath)> {
        self.graph
            .all_edges()
            .flat_map(|(s, t, paths)| paths.iter().map(move |p| (s, t, p)))
            .collect()
    }

    /// Objects `id` points at.
    pub fn children(&self, id: &str) -> Vec<&'a str> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Reachable objects pointing at `id`.
    pub fn parents(&self, id: &str) -> Vec<&'a str> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, dir: Direction) -> Vec<&'a str> {
        match self.key(id) {
            Some(node) => self.graph.neighbors_directed(node, dir).collect(),
            None => Vec::new(),
        }
    }

    /// Ids in `all_ids` the root cannot reach.
    pub fn orphans<'b>(&self, all_ids: impl IntoIterator<Item = &'b str>) -> Vec<&'b str> {
        all_ids.into_iter().filter(|id| !self.contains(id)).collect()
    }

    /// Reference cycles: strongly connected components with more than one
    /// node, plus objects pointing at themselves.
    pub fn cycles(&self) -> Vec<Vec<&'a str>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| match scc.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            })
            .collect()
    }

    /// Fewest-hops path from `from` to `to`, both included.
    pub fn shortest_path(&self, from: &str, to: &str) -> Option<Vec<&'a str>> {
        let start = self.key(from)?;
        let goal = self.key(to)?;
        astar(&self.graph, start, |n| n == goal, |_| 1usize, |_| 0)
            .map(|(_, path)| path)
    }

    /// Pointers from reachable objects to ids the behavior does not contain.
    pub fn dangling(&self) -> &[DanglingRef<'a>] {
        &self.dangling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::record::Record;
    use crate::registry::{TypeInfo, TypeRegistry};
    use crate::value::{Pointer, Value};

    /// One object per entry, pointing at the space separated targets.
    fn behavior(links: &[(&str, &str)]) -> Behavior {
        let mut reg = TypeRegistry::new();
        reg.insert(TypeInfo::new("type1", "T*").with_format(6));
        reg.insert(TypeInfo::new("type2", "hkArray").with_format(8).with_subtype("type1"));
        reg.insert(TypeInfo::new("type3", "hkbNode").with_format(7).with_field("children", "type2"));
        let mut beh = Behavior::new(reg.clone(), Config::default());
        for (id, targets) in links {
            let mut rec = Record::new(&reg, "type3", Vec::<(&str, Value)>::new(), Some(id.to_string()))
                .unwrap();
            for t in targets.split_whitespace() {
                rec.insert_item("children", None, Pointer::to(t)).unwrap();
            }
            beh.add(rec).unwrap();
        }
        beh
    }

    #[test]
    fn reachability_orphans_and_dangling() {
        let beh = behavior(&[
            ("object1", "object2 object9"),
            ("object2", "object3"),
            ("object3", ""),
            ("object4", "object1"),
        ]);
        let g = beh.build_reference_graph("object1").unwrap();
        assert_eq!(g.nodes().collect::<Vec<_>>(), vec!["object1", "object2", "object3"]);
        assert!(!g.contains("object4"));
        assert_eq!(g.orphans(beh.ids()), vec!["object4"]);
        assert_eq!(g.dangling().len(), 1);
        assert_eq!(g.dangling()[0].target, "object9");
        assert_eq!(g.dangling()[0].path.to_string(), "children:1");
        assert_eq!(g.edges().len(), 2);
        assert_eq!(g.parents("object3"), vec!["object2"]);
        assert_eq!(
            g.shortest_path("object1", "object3"),
            Some(vec!["object1", "object2", "object3"])
        );
        assert!(g.shortest_path("object3", "object1").is_none());
        assert!(g.cycles().is_empty());
    }

    #[test]
    fn cycles_include_self_loops() {
        let beh = behavior(&[
            ("object1", "object2 object1"),
            ("object2", "object3"),
            ("object3", "object2"),
        ]);
        let g = beh.build_reference_graph("object1").unwrap();
        let mut cycles: Vec<Vec<&str>> = g
            .cycles()
            .into_iter()
            .map(|mut c| {
                c.sort_unstable();
                c
            })
            .collect();
        cycles.sort();
        assert_eq!(cycles, vec![vec!["object1"], vec!["object2", "object3"]]);
    }

    #[test]
    fn missing_root_is_a_lookup_miss() {
        let beh = behavior(&[]);
        assert!(beh.build_reference_graph("object1").unwrap_err().is_recoverable());
    }
}
