//! Chain partition into recurrent and transient classes.
//!
//! A recurrent class is a strongly connected component with no outgoing
//! edge; once the walk enters it, it never leaves. Recurrent classes are
//! the macro-states of the chain: stable cell identities the
//! differentiation process commits to.

use crate::transition::TransitionMatrix;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Recurrent/transient decomposition of the chain's state space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPartition {
    /// Recurrent classes (macro-states), each a sorted list of cell indices.
    recurrent_classes: Vec<Vec<usize>>,
    /// Transient cells, sorted.
    transient: Vec<usize>,
    /// Per cell: index into `recurrent_classes`, or `None` if transient.
    state_class: Vec<Option<usize>>,
    /// Whether the chain consists of a single communicating class.
    irreducible: bool,
}

impl ChainPartition {
    /// Recurrent classes, each a sorted list of cell indices.
    pub fn recurrent_classes(&self) -> &[Vec<usize>] {
        &self.recurrent_classes
    }

    /// Transient cells, sorted.
    pub fn transient_states(&self) -> &[usize] {
        &self.transient
    }

    /// Number of recurrent classes (macro-states).
    pub fn n_recurrent_classes(&self) -> usize {
        self.recurrent_classes.len()
    }

    /// Recurrent-class index of a cell, `None` if the cell is transient.
    pub fn class_of(&self, cell: usize) -> Option<usize> {
        self.state_class[cell]
    }

    /// Whether a cell belongs to a recurrent class.
    pub fn is_recurrent(&self, cell: usize) -> bool {
        self.state_class[cell].is_some()
    }

    /// Whether the chain is a single communicating class.
    pub fn is_irreducible(&self) -> bool {
        self.irreducible
    }
}

/// Partition the chain's states via strongly connected components.
pub fn partition(transition: &TransitionMatrix) -> ChainPartition {
    let graph = transition.matrix();
    let n = transition.n_cells();

    // Adjacency over non-zero transitions only.
    let adjacency: Vec<Vec<usize>> = graph
        .outer_iterator()
        .map(|row| {
            row.iter()
                .filter(|(_, &val)| val != 0.0)
                .map(|(col, _)| col)
                .collect()
        })
        .collect();

    let components = tarjan_scc(&adjacency);
    let n_components = components.len();

    let mut comp_of = vec![0usize; n];
    for (c, comp) in components.iter().enumerate() {
        for &v in comp {
            comp_of[v] = c;
        }
    }

    // A component is recurrent iff no edge leaves it.
    let mut leaves = vec![false; n_components];
    for (v, targets) in adjacency.iter().enumerate() {
        for &w in targets {
            if comp_of[w] != comp_of[v] {
                leaves[comp_of[v]] = true;
            }
        }
    }

    let mut recurrent_classes = Vec::new();
    let mut recurrent_of_comp = vec![None; n_components];
    let mut transient = Vec::new();
    for (c, comp) in components.iter().enumerate() {
        if leaves[c] {
            transient.extend(comp.iter().copied());
        } else {
            recurrent_of_comp[c] = Some(recurrent_classes.len());
            let mut class = comp.clone();
            class.sort_unstable();
            recurrent_classes.push(class);
        }
    }
    transient.sort_unstable();

    let state_class: Vec<Option<usize>> = comp_of.iter().map(|&c| recurrent_of_comp[c]).collect();

    debug!(
        n_recurrent = recurrent_classes.len(),
        n_transient = transient.len(),
        "chain partition computed"
    );

    ChainPartition {
        recurrent_classes,
        transient,
        state_class,
        irreducible: n_components == 1,
    }
}

/// Iterative Tarjan strongly-connected-components over an adjacency list.
///
/// Iterative so that chains with hundreds of thousands of cells cannot
/// overflow the call stack.
fn tarjan_scc(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;
    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut next_index = 0usize;

    for start in 0..n {
        if index[start] != UNVISITED {
            continue;
        }
        // (vertex, next-edge position) call frames.
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = next_index;
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(&(v, edge)) = frames.last() {
            if edge < adjacency[v].len() {
                if let Some(frame) = frames.last_mut() {
                    frame.1 += 1;
                }
                let w = adjacency[v][edge];
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    frames.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                frames.pop();
                if lowlink[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
                if let Some(&(parent, _)) = frames.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
            }
        }
    }
    components
}
