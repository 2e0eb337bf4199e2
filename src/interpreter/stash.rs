//! Heap-allocated scope records
//!
//! Bindings captured by closures live in stashes instead of frame locals.
//! Each stash links to the scope that encloses it; `Slot::Stash { depth, .. }`
//! walks `depth` parents from the innermost stash of the running frame.

use crate::gc::{Gc, Traceable, Tracer};
use crate::value::JsValue;

/// One captured scope. `None` slots are lexical bindings in their TDZ.
pub struct Stash {
    pub slots: Vec<Option<JsValue>>,
    pub parent: Option<Gc<Stash>>,
}

impl Stash {
    pub fn new(size: usize, parent: Option<Gc<Stash>>) -> Self {
        Stash {
            slots: vec![None; size],
            parent,
        }
    }
}

impl Traceable for Stash {
    fn trace(&self, t: &mut Tracer<'_>) {
        for v in self.slots.iter().flatten() {
            t.value(v);
        }
        if let Some(p) = &self.parent {
            t.edge(p);
        }
    }

    fn clear(&mut self) {
        self.slots = Vec::new();
        self.parent = None;
    }
}

/// The stash `depth` links up from `start`
pub fn ancestor(start: &Option<Gc<Stash>>, depth: u32) -> Option<Gc<Stash>> {
    let mut current = start.clone()?;
    for _ in 0..depth {
        let parent = current.borrow().parent.clone()?;
        current = parent;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::Heap;

    #[test]
    fn ancestor_walks_parents() {
        let heap = Heap::new(0);
        let outer = heap.alloc(Stash::new(1, None));
        outer.borrow_mut().slots[0] = Some(JsValue::from(1));
        let inner = heap.alloc(Stash::new(2, Some(outer.clone())));
        let found = ancestor(&Some(inner.clone()), 1);
        assert!(found.is_some_and(|s| s.ptr_eq(&outer)));
        assert!(ancestor(&Some(inner), 2).is_none());
    }

    #[test]
    fn fresh_slots_are_uninitialized() {
        let stash = Stash::new(3, None);
        assert!(stash.slots.iter().all(Option::is_none));
    }
}
