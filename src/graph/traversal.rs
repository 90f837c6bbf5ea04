//! BFS traversal over the graph index.

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use super::index::GraphIndex;

impl GraphIndex {
    fn sorted_neighbors(&self, node: NodeIndex, undirected: bool) -> Vec<NodeIndex> {
        let mut found: Vec<NodeIndex> = if undirected {
            self.graph.neighbors_undirected(node).collect()
        } else {
            self.graph.neighbors_directed(node, Direction::Outgoing).collect()
        };
        found.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        found.dedup();
        found
    }

    /// Direct successors of `name`, sorted and deduplicated across relation types.
    pub fn successors(&self, name: &str) -> Vec<&str> {
        let Some(&node) = self.nodes.get(name) else {
            return Vec::new();
        };
        self.sorted_neighbors(node, false)
            .into_iter()
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    /// Entities reachable from `start` along outgoing edges within `max_hops`,
    /// each with its minimum hop distance. `start` itself is never included.
    pub fn neighbors_by_hop(&self, start: &str, max_hops: usize) -> BTreeMap<String, usize> {
        let mut found = BTreeMap::new();
        let Some(&origin) = self.nodes.get(start) else {
            return found;
        };

        let mut visited = BTreeSet::from([origin]);
        let mut queue = VecDeque::from([(origin, 0usize)]);

        while let Some((node, hop)) = queue.pop_front() {
            if hop >= max_hops {
                continue;
            }
            for next in self.sorted_neighbors(node, false) {
                if visited.insert(next) {
                    found.insert(self.graph[next].clone(), hop + 1);
                    queue.push_back((next, hop + 1));
                }
            }
        }

        found
    }

    /// Shortest path between two entities ignoring edge direction, inclusive of
    /// both ends. Ties resolve to the lexicographically smallest neighbor first.
    pub fn shortest_path_undirected(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let (&origin, &goal) = (self.nodes.get(from)?, self.nodes.get(to)?);
        if origin == goal {
            return Some(vec![from.to_string()]);
        }

        let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut queue = VecDeque::from([origin]);
        previous.insert(origin, origin);

        while let Some(node) = queue.pop_front() {
            for next in self.sorted_neighbors(node, true) {
                if previous.contains_key(&next) {
                    continue;
                }
                previous.insert(next, node);
                if next == goal {
                    let mut path = vec![self.graph[goal].clone()];
                    let mut cursor = goal;
                    while cursor != origin {
                        cursor = previous[&cursor];
                        path.push(self.graph[cursor].clone());
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }
}
