//! Iterative Tarjan strongly connected components.
//!
//! Components are emitted in reverse topological order of the successor
//! relation: a component is emitted only after every component reachable
//! from it.

use hashbrown::{HashMap, HashSet};
use std::hash::Hash;

/// Tarjan's algorithm over an implicit graph given by a successor function.
pub struct Tarjan<T, F> {
    successors: F,
    index: usize,
    dfn: HashMap<T, usize>,
    low_link: HashMap<T, usize>,
    on_stack: HashSet<T>,
    stack: Vec<T>,
    components: Vec<Vec<T>>,
}

impl<T, F> Tarjan<T, F>
where
    T: Copy + Eq + Hash,
    F: FnMut(T) -> Vec<T>,
{
    pub fn new(successors: F) -> Self {
        Self {
            successors,
            index: 0,
            dfn: HashMap::new(),
            low_link: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Runs the search from every vertex not yet visited and returns the components.
    pub fn invoke<I: IntoIterator<Item = T>>(mut self, vertices: I) -> Vec<Vec<T>> {
        for v in vertices {
            if !self.dfn.contains_key(&v) {
                self.strong_connect(v);
            }
        }
        self.components
    }

    fn visit(&mut self, v: T) -> (T, Vec<T>, usize) {
        self.index += 1;
        self.dfn.insert(v, self.index);
        self.low_link.insert(v, self.index);
        self.stack.push(v);
        self.on_stack.insert(v);
        (v, (self.successors)(v), 0)
    }

    fn lower(&mut self, v: T, value: usize) {
        if let Some(low) = self.low_link.get_mut(&v) {
            *low = (*low).min(value);
        }
    }

    fn strong_connect(&mut self, root: T) {
        let mut frames = vec![self.visit(root)];

        while let Some((v, successors, next)) = frames.last_mut() {
            let v = *v;
            if *next < successors.len() {
                let w = successors[*next];
                *next += 1;
                match self.dfn.get(&w).copied() {
                    None => {
                        let frame = self.visit(w);
                        frames.push(frame);
                    }
                    Some(dfn) if self.on_stack.contains(&w) => self.lower(v, dfn),
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            let low = self.low_link[&v];
            if let Some((parent, _, _)) = frames.last() {
                let parent = *parent;
                self.lower(parent, low);
            }

            if low == self.dfn[&v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.remove(&w);
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}
