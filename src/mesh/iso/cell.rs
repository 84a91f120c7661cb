//! Partition of the loop nodes by grid cell, used to complete the
//! connections locally once the iso-aligned bridges are placed.

use std::collections::BTreeMap;

use crate::mesh::bowyer_watson::BowyerWatson;
use crate::mesh::config::BridgePolicy;
use crate::mesh::iso::node::IsoNode;
use crate::mesh::iso::slope::iso_deviation;

#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub i: usize,
    pub j: usize,
    /// Maximal runs of consecutive loop nodes lying in this cell.
    pub sub_loops: Vec<Vec<usize>>,
    /// Inner nodes at the corners of the cell.
    pub corners: Vec<usize>,
}

impl Cell {
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.sub_loops.iter().map(Vec::len).sum()
    }
}

/// Groups the nodes of every loop, given in loop order, by cell.
/// `corner_of` maps a grid point `(i, j)` to its inner node, if any.
#[must_use]
pub fn build_cells(
    nodes: &[IsoNode],
    loops: &[Vec<usize>],
    corner_of: impl Fn(usize, usize) -> Option<usize>,
) -> Vec<Cell> {
    let mut cells: BTreeMap<(usize, usize), Cell> = BTreeMap::new();
    for loop_nodes in loops {
        let mut runs: Vec<((usize, usize), Vec<usize>)> = Vec::new();
        for n in loop_nodes {
            let Some(cell) = nodes[*n].cell else {
                continue;
            };
            match runs.last_mut() {
                Some((c, run)) if *c == cell => run.push(*n),
                _ => runs.push((cell, vec![*n])),
            }
        }
        if runs.len() > 1 && runs[0].0 == runs[runs.len() - 1].0 {
            if let Some((_, mut tail)) = runs.pop() {
                tail.append(&mut runs[0].1);
                runs[0].1 = tail;
            }
        }
        for (key, run) in runs {
            cells
                .entry(key)
                .or_insert_with(|| Cell { i: key.0, j: key.1, ..Cell::default() })
                .sub_loops
                .push(run);
        }
    }
    for cell in cells.values_mut() {
        for (di, dj) in [(0, 0), (1, 0), (1, 1), (0, 1)] {
            if let Some(corner) = corner_of(cell.i + di, cell.j + dj) {
                cell.corners.push(corner);
            }
        }
    }
    cells.into_values().collect()
}

/// Candidate segments joining two different sub-loops of a cell, ordered by
/// the bridging policy. Delaunay edges of the cell nodes are used when they
/// can be computed, every pair otherwise.
#[must_use]
pub fn sub_loop_candidates(nodes: &[IsoNode], cell: &Cell, policy: BridgePolicy) -> Vec<[usize; 2]> {
    let members: Vec<(usize, usize)> = cell
        .sub_loops
        .iter()
        .enumerate()
        .flat_map(|(k, run)| run.iter().map(move |n| (*n, k)))
        .collect();
    let points: Vec<_> = members.iter().map(|(n, _)| nodes[*n].uv).collect();

    let mut pairs: Vec<[usize; 2]> = match BowyerWatson::new(&points).triangulate() {
        Ok(t) => t.inner_edges().iter().chain(t.outer_edges()).map(|[a, b]| [(*a).min(*b), (*a).max(*b)]).collect(),
        Err(_) => (0..members.len()).flat_map(|a| (a + 1..members.len()).map(move |b| [a, b])).collect(),
    };
    pairs.sort_unstable();
    pairs.dedup();

    let mut candidates: Vec<(f64, f64, [usize; 2])> = pairs
        .into_iter()
        .filter(|[a, b]| members[*a].1 != members[*b].1)
        .map(|[a, b]| {
            let (na, nb) = (members[a].0, members[b].0);
            let length = nodes[na].uv.distance(nodes[nb].uv);
            (iso_deviation(nodes[na].uv, nodes[nb].uv), length, [na, nb])
        })
        .collect();
    match policy {
        BridgePolicy::Shortest => candidates.sort_by(|x, y| x.1.total_cmp(&y.1)),
        BridgePolicy::MostIso => candidates.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.total_cmp(&y.1))),
    }
    candidates.into_iter().map(|c| c.2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::UvPoint;

    fn loop_nodes(points: &[((f64, f64), (usize, usize))]) -> Vec<IsoNode> {
        points
            .iter()
            .enumerate()
            .map(|(k, ((u, v), cell))| IsoNode::loop_node(0, k, UvPoint::new(*u, *v), k, *cell))
            .collect()
    }

    #[test]
    fn runs_wrapping_around_the_loop_are_merged() {
        let nodes = loop_nodes(&[
            ((0.1, 0.1), (0, 0)),
            ((0.6, 0.1), (1, 0)),
            ((0.6, 0.6), (1, 1)),
            ((0.1, 0.6), (0, 1)),
            ((0.1, 0.2), (0, 0)),
        ]);
        let cells = build_cells(&nodes, &[vec![0, 1, 2, 3, 4]], |_, _| None);
        assert_eq!(cells.len(), 4);
        let first = &cells[0];
        assert_eq!((first.i, first.j), (0, 0));
        assert_eq!(first.sub_loops, vec![vec![4, 0]]);
    }

    #[test]
    fn candidates_join_different_sub_loops_shortest_first() {
        let nodes = loop_nodes(&[
            ((0.0, 0.0), (0, 0)),
            ((0.0, 1.0), (0, 0)),
            ((0.3, 0.5), (0, 0)),
            ((0.8, 0.5), (0, 0)),
        ]);
        let cell = Cell { i: 0, j: 0, sub_loops: vec![vec![0, 1], vec![2, 3]], corners: Vec::new() };
        let candidates = sub_loop_candidates(&nodes, &cell, BridgePolicy::Shortest);
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|[a, b]| (*a < 2) != (*b < 2)));
        let first = candidates[0];
        assert!(first.contains(&2));

        let iso = sub_loop_candidates(&nodes, &cell, BridgePolicy::MostIso);
        assert!(iso_deviation(nodes[iso[0][0]].uv, nodes[iso[0][1]].uv) <= iso_deviation(nodes[first[0]].uv, nodes[first[1]].uv));
    }
}
