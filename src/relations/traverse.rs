use crate::errors::AppResult;
use crate::models::{Record, RelationKind, TraceNode, TraceResult};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Breadth-first walk over `kinds` (every kind when empty) starting at `start_id`.
///
/// Each record is visited once; reaching a visited record again through another path is
/// plain re-convergence. Cycles are found afterwards on the visited subgraph with every
/// edge pointed in its forward direction (`implemented-by` counts as `implements` the
/// other way), so a record reached from both sides of a diamond is not a cycle. Targets
/// whose document is missing are listed in `missing` and the walk continues.
pub fn walk<F>(start_id: &str, kinds: &[RelationKind], max_depth: usize, mut load: F) -> AppResult<TraceResult>
where
    F: FnMut(&str) -> AppResult<Record>,
{
    let start = load(start_id)?;
    let follow = |kind: RelationKind| kinds.is_empty() || kinds.contains(&kind);

    let mut result = TraceResult::default();
    let mut visited = HashSet::from([start.id.clone()]);
    result.nodes.push(TraceNode {
        id: start.id.clone(),
        depth: 0,
        via: None,
    });

    let mut loaded: HashMap<String, Record> = HashMap::new();
    let mut queue: VecDeque<(Record, usize)> = VecDeque::new();
    queue.push_back((start, 0));

    while let Some((record, depth)) = queue.pop_front() {
        for (kind, targets) in record.linked_items.iter() {
            if !follow(kind) {
                continue;
            }
            for target_id in targets {
                if visited.contains(target_id) {
                    continue;
                }
                if depth >= max_depth {
                    result.truncated = true;
                    continue;
                }
                visited.insert(target_id.clone());
                match load(target_id) {
                    Ok(target) => {
                        result.nodes.push(TraceNode {
                            id: target.id.clone(),
                            depth: depth + 1,
                            via: Some((record.id.clone(), kind)),
                        });
                        queue.push_back((target, depth + 1));
                    }
                    Err(error) if error.is_not_found() => {
                        tracing::warn!(from = %record.id, missing = %target_id, "skipping missing linked item");
                        result.missing.push(target_id.clone());
                    }
                    Err(error) => return Err(error),
                }
            }
        }
        loaded.insert(record.id.clone(), record);
    }

    let order: Vec<&str> = result.nodes.iter().map(|node| node.id.as_str()).collect();
    let edges = forward_edges(&loaded, &follow);
    let cycles = find_cycles(&order, &edges);
    if !cycles.is_empty() {
        tracing::debug!(start = %start_id, cycles = cycles.len(), "relation cycles found");
    }
    result.cycles = cycles;
    Ok(result)
}

/// Forward edges between visited records plus the pairs joined by a symmetric kind.
struct ForwardEdges {
    adjacency: HashMap<String, BTreeSet<String>>,
    symmetric: HashSet<(String, String)>,
}

/// Of each inverse pair, the kind declared first is the forward one.
fn is_reversed(kind: RelationKind) -> bool {
    kind > kind.inverse()
}

fn forward_edges(loaded: &HashMap<String, Record>, follow: &impl Fn(RelationKind) -> bool) -> ForwardEdges {
    let mut edges = ForwardEdges {
        adjacency: HashMap::new(),
        symmetric: HashSet::new(),
    };
    for record in loaded.values() {
        for (kind, targets) in record.linked_items.iter() {
            if !follow(kind) {
                continue;
            }
            for target_id in targets.iter().filter(|id| loaded.contains_key(id.as_str())) {
                let (from, to) = if is_reversed(kind) {
                    (target_id.clone(), record.id.clone())
                } else {
                    (record.id.clone(), target_id.clone())
                };
                if kind == kind.inverse() {
                    edges.symmetric.insert((from.clone(), to.clone()));
                    edges.symmetric.insert((to.clone(), from.clone()));
                    edges.adjacency.entry(to.clone()).or_default().insert(from.clone());
                }
                edges.adjacency.entry(from).or_default().insert(to);
            }
        }
    }
    edges
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Depth-first search in walk order; an edge into a record still on the current path
/// closes a cycle. Stepping straight back over a symmetric edge does not.
fn find_cycles(order: &[&str], edges: &ForwardEdges) -> Vec<(String, String)> {
    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut cycles = Vec::new();
    for id in order {
        if !marks.contains_key(*id) {
            visit(id, None, edges, &mut marks, &mut cycles);
        }
    }
    cycles
}

fn visit(
    id: &str,
    parent: Option<&str>,
    edges: &ForwardEdges,
    marks: &mut HashMap<String, Mark>,
    cycles: &mut Vec<(String, String)>,
) {
    marks.insert(id.to_string(), Mark::OnPath);
    if let Some(targets) = edges.adjacency.get(id) {
        for target in targets {
            match marks.get(target.as_str()).copied() {
                Some(Mark::OnPath) => {
                    let steps_back = parent == Some(target.as_str())
                        && edges.symmetric.contains(&(id.to_string(), target.clone()));
                    if !steps_back {
                        cycles.push((id.to_string(), target.clone()));
                    }
                }
                Some(Mark::Done) => {}
                None => visit(target, Some(id), edges, marks, cycles),
            }
        }
    }
    marks.insert(id.to_string(), Mark::Done);
}
