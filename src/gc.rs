//! Reference-counted heap with a cycle collector.
//!
//! Every heap value lives in an `Rc<RefCell<T>>`. Plain reference counting
//! frees acyclic garbage immediately; the heap keeps a weak registry of all
//! allocations so `collect` can find cycles by trial deletion:
//!
//! 1. trace every live node and count the strong edges that come from other
//!    heap nodes,
//! 2. a node whose strong count exceeds those internal edges is referenced
//!    from outside the heap (operand stack, host handles, native locals) and
//!    is a root,
//! 3. everything reachable from a root survives; the rest only references
//!    itself and is cleared, which breaks the cycles and lets the counts
//!    drop to zero.
//!
//! No root registration is needed and a collection is safe at any point:
//! nodes that are borrowed while collecting count as roots.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

// ============================================================================
// Traceable
// ============================================================================

/// Visitor handed to `Traceable::trace`
pub struct Tracer<'a> {
    visit: &'a mut dyn FnMut(usize),
}

impl Tracer<'_> {
    /// Report a strong edge. Only strong `Gc` handles stored inline may be
    /// reported; reporting anything else makes the collector under-count
    /// external references.
    pub fn edge<T: ?Sized>(&mut self, gc: &Gc<T>) {
        (self.visit)(gc.addr());
    }
}

/// Types stored in the heap
pub trait Traceable {
    /// Visit every `Gc` held directly by this value
    fn trace(&self, tracer: &mut Tracer<'_>);

    /// Drop every `Gc` held by this value. Called on unreachable cycles.
    fn clear(&mut self);
}

// ============================================================================
// Gc handle
// ============================================================================

/// Shared handle to a heap value
pub struct Gc<T: ?Sized>(Rc<RefCell<T>>);

impl<T: ?Sized> Gc<T> {
    #[inline]
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Option<Ref<'_, T>> {
        self.0.try_borrow().ok()
    }

    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, T>> {
        self.0.try_borrow_mut().ok()
    }

    /// Identity comparison
    #[inline]
    pub fn ptr_eq(&self, other: &Gc<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity for the lifetime of the allocation
    #[inline]
    pub fn id(&self) -> usize {
        self.addr()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Number of strong handles (diagnostics and tests)
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl<T: ?Sized> Clone for Gc<T> {
    fn clone(&self) -> Self {
        Gc(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> crate::value::CheapClone for Gc<T> {}

impl<T: ?Sized> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gc({:#x})", self.addr())
    }
}

// ============================================================================
// Heap
// ============================================================================

type Node = Rc<RefCell<dyn Traceable>>;
type WeakNode = Weak<RefCell<dyn Traceable>>;

/// Statistics about the garbage collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Allocations still alive at the last registry sweep
    pub tracked_objects: usize,
    /// Completed cycle collections
    pub collections: usize,
    /// Nodes cleared by the last collection
    pub last_freed: usize,
    /// Nodes cleared by all collections
    pub total_freed: usize,
}

/// Registry of heap allocations
pub struct Heap {
    nodes: RefCell<Vec<WeakNode>>,
    allocated_since_collect: Cell<usize>,
    threshold: Cell<usize>,
    compact_at: Cell<usize>,
    stats: Cell<GcStats>,
}

const MIN_COMPACT: usize = 1024;

impl Heap {
    pub fn new(threshold: usize) -> Self {
        Heap {
            nodes: RefCell::new(Vec::new()),
            allocated_since_collect: Cell::new(0),
            threshold: Cell::new(threshold),
            compact_at: Cell::new(MIN_COMPACT),
            stats: Cell::new(GcStats::default()),
        }
    }

    /// Allocate a tracked value
    pub fn alloc<T: Traceable + 'static>(&self, value: T) -> Gc<T> {
        let rc = Rc::new(RefCell::new(value));
        let weak: WeakNode = Rc::downgrade(&rc) as Weak<RefCell<dyn Traceable>>;
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(weak);
        if nodes.len() >= self.compact_at.get() {
            nodes.retain(|w| w.strong_count() > 0);
            self.compact_at.set((nodes.len() * 2).max(MIN_COMPACT));
        }
        self.allocated_since_collect
            .set(self.allocated_since_collect.get() + 1);
        Gc(rc)
    }

    /// True once enough allocations happened since the last collection
    pub fn should_collect(&self) -> bool {
        let threshold = self.threshold.get();
        threshold > 0 && self.allocated_since_collect.get() >= threshold
    }

    pub fn set_gc_threshold(&self, threshold: usize) {
        self.threshold.set(threshold);
    }

    pub fn gc_threshold(&self) -> usize {
        self.threshold.get()
    }

    pub fn stats(&self) -> GcStats {
        self.stats.get()
    }

    /// Run a cycle collection. Returns the number of nodes cleared.
    pub fn collect(&self) -> usize {
        self.allocated_since_collect.set(0);
        let live: Vec<Node> = {
            let mut nodes = self.nodes.borrow_mut();
            nodes.retain(|w| w.strong_count() > 0);
            self.compact_at.set((nodes.len() * 2).max(MIN_COMPACT));
            nodes.iter().filter_map(Weak::upgrade).collect()
        };
        let count = live.len();

        let index: FxHashMap<usize, usize> = live
            .iter()
            .enumerate()
            .map(|(i, rc)| (Rc::as_ptr(rc) as *const () as usize, i))
            .collect();

        let mut internal = vec![0usize; count];
        let mut edges: Vec<Vec<usize>> = Vec::with_capacity(count);
        let mut traced = vec![false; count];
        for (i, rc) in live.iter().enumerate() {
            let mut out = Vec::new();
            if let Ok(node) = rc.try_borrow() {
                if let Some(flag) = traced.get_mut(i) {
                    *flag = true;
                }
                let mut visit = |addr: usize| {
                    if let Some(&j) = index.get(&addr) {
                        out.push(j);
                    }
                };
                node.trace(&mut Tracer { visit: &mut visit });
            }
            for &j in &out {
                if let Some(n) = internal.get_mut(j) {
                    *n += 1;
                }
            }
            edges.push(out);
        }

        // Mark from everything referenced outside the heap
        let mut marked = vec![false; count];
        let mut stack = Vec::new();
        for (i, rc) in live.iter().enumerate() {
            // One strong count is our temporary handle in `live`
            let external = Rc::strong_count(rc)
                .saturating_sub(1)
                .saturating_sub(internal.get(i).copied().unwrap_or(0));
            let untraced = !traced.get(i).copied().unwrap_or(false);
            if external > 0 || untraced {
                if let Some(m) = marked.get_mut(i) {
                    *m = true;
                }
                stack.push(i);
            }
        }
        while let Some(i) = stack.pop() {
            for &j in edges.get(i).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(m) = marked.get_mut(j) {
                    if !*m {
                        *m = true;
                        stack.push(j);
                    }
                }
            }
        }

        let mut freed = 0;
        for (i, rc) in live.iter().enumerate() {
            if marked.get(i).copied().unwrap_or(true) {
                continue;
            }
            if let Ok(mut node) = rc.try_borrow_mut() {
                node.clear();
                freed += 1;
            }
        }
        drop(live);

        let mut stats = self.stats.get();
        stats.collections += 1;
        stats.last_freed = freed;
        stats.total_freed += freed;
        stats.tracked_objects = count.saturating_sub(freed);
        self.stats.set(stats);
        tracing::debug!(scanned = count, freed, "cycle collection");
        freed
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
