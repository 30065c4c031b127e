//! Root subscription and the anchor chain
//!
//! A [`Subscription`] observes the root of a nested record tree. Because
//! records are immutable, a field update on any node allocates a new node
//! and the change must be spliced upward level by level until a new root
//! exists. The splice machinery is a chain of *anchors*: one persistent
//! anchor per tree level, each tracking the current live record at that
//! level and holding the single listener slot that routes replacements of
//! that node toward the root.
//!
//! Anchors survive node replacement, which is what makes stale references
//! safe: a consumer holding an outdated child record may still call `set`
//! on it, the old instance's listener routes through the same anchor, and
//! the replacement is applied to the *current* parent rather than the
//! parent the caller last saw.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use cereal_core::{Record, Value};

/// Callback invoked with each new root record.
pub type RootCallback = Box<dyn Fn(&Record)>;

/// State shared by every anchor of one subscription.
struct Shared {
    /// Listener-slot key this subscription occupies on every node.
    key: String,
    on_root: RootCallback,
    /// Nesting depth of active `batch` calls.
    batch_depth: Cell<u32>,
    /// Whether the root changed while a batch was active.
    batch_dirty: Cell<bool>,
}

/// One level of the anchor chain.
///
/// `current` is the live record at this level right now; it moves forward
/// every time the node is replaced, while the anchor itself stays put.
struct Anchor {
    shared: Rc<Shared>,
    /// Parent anchor and the field name this node occupies in it.
    /// `None` at the root.
    parent: Option<(Weak<Anchor>, String)>,
    current: RefCell<Record>,
    /// Child anchors keyed by field name, for nested record fields.
    children: RefCell<HashMap<String, Rc<Anchor>>>,
}

impl Anchor {
    /// Register this anchor's listener on its current record and bring the
    /// child anchor map in line with the record's nested record fields.
    ///
    /// Called once at attach time and again after every replacement, so
    /// each live node carries exactly one listener per subscription key.
    fn wire(self: &Rc<Anchor>) {
        let current = self.current.borrow().clone();

        let weak = Rc::downgrade(self);
        current.set_listener(
            self.shared.key.clone(),
            Rc::new(move |next| {
                if let Some(anchor) = weak.upgrade() {
                    anchor.replaced(next.clone());
                }
            }),
        );

        // Re-point child anchors at the current child instances. Anchors
        // persist across replacements; only anchors whose field no longer
        // holds a record are dropped.
        let mut live: Vec<String> = Vec::new();
        {
            let mut children = self.children.borrow_mut();
            for (name, value) in current.children() {
                let Some(child) = value.as_record() else {
                    continue;
                };
                let child_anchor = children.entry(name.to_string()).or_insert_with(|| {
                    Rc::new(Anchor {
                        shared: self.shared.clone(),
                        parent: Some((Rc::downgrade(self), name.to_string())),
                        current: RefCell::new(child.clone()),
                        children: RefCell::new(HashMap::new()),
                    })
                });
                *child_anchor.current.borrow_mut() = child.clone();
                live.push(name.to_string());
            }
            children.retain(|name, _| live.contains(name));
        }

        // Wire children outside the map borrow; a child's wiring touches
        // only its own state.
        let children: Vec<Rc<Anchor>> =
            self.children.borrow().values().cloned().collect();
        for child in children {
            child.wire();
        }
    }

    /// The node at this level was replaced. Advance the anchor, rewire the
    /// subtree, then splice the new node into the current parent. The
    /// parent's own `set` fires the parent listener, which recurses here
    /// one level up until the root is reached.
    fn replaced(self: &Rc<Anchor>, next: Record) {
        tracing::trace!(
            target: "cereal::reactive",
            key = %self.shared.key,
            type_name = next.type_name(),
            "node replaced"
        );
        *self.current.borrow_mut() = next.clone();
        self.wire();

        match &self.parent {
            Some((weak_parent, field)) => {
                let Some(parent) = weak_parent.upgrade() else {
                    return;
                };
                let parent_record = parent.current.borrow().clone();
                if let Err(err) =
                    parent_record.replace_child(field, Value::Record(next))
                {
                    tracing::warn!(
                        target: "cereal::reactive",
                        field = %field,
                        error = %err,
                        "dropping child replacement"
                    );
                }
            }
            None => {
                if self.shared.batch_depth.get() > 0 {
                    self.shared.batch_dirty.set(true);
                } else {
                    (self.shared.on_root)(&next);
                }
            }
        }
    }

    /// Remove this subscription's listener from the whole live subtree.
    fn unwire(&self) {
        self.current.borrow().clear_listener(&self.shared.key);
        for child in self.children.borrow().values() {
            child.unwire();
        }
    }
}

/// A live observation of a record tree's root.
///
/// Attaching walks the tree and plants one anchor per nested record.
/// From then on, a `set` on any node (current or stale) produces a new
/// root and invokes the callback with it.
pub struct Subscription {
    root: Rc<Anchor>,
}

impl Subscription {
    /// Observe `root` under the listener-slot key `key`.
    ///
    /// `on_root` is invoked with every new root produced by updates
    /// anywhere in the tree, except while a [`batch`](Self::batch) is
    /// active.
    pub fn attach(
        root: &Record,
        key: impl Into<String>,
        on_root: impl Fn(&Record) + 'static,
    ) -> Subscription {
        let key = key.into();
        tracing::debug!(
            target: "cereal::reactive",
            key = %key,
            type_name = root.type_name(),
            "attaching subscription"
        );
        let shared = Rc::new(Shared {
            key,
            on_root: Box::new(on_root),
            batch_depth: Cell::new(0),
            batch_dirty: Cell::new(false),
        });
        let anchor = Rc::new(Anchor {
            shared,
            parent: None,
            current: RefCell::new(root.clone()),
            children: RefCell::new(HashMap::new()),
        });
        anchor.wire();
        Subscription { root: anchor }
    }

    /// The live root record as of the most recent propagation.
    pub fn current_root(&self) -> Record {
        self.root.current.borrow().clone()
    }

    /// Run `f` with root notifications suppressed, then fire the callback
    /// at most once with the final root, and only if it changed.
    ///
    /// Batches nest; only the outermost one flushes.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        let shared = &self.root.shared;
        shared.batch_depth.set(shared.batch_depth.get() + 1);
        let result = f();
        shared.batch_depth.set(shared.batch_depth.get() - 1);
        if shared.batch_depth.get() == 0 && shared.batch_dirty.replace(false) {
            let root = self.root.current.borrow().clone();
            (shared.on_root)(&root);
        }
        result
    }

    /// Stop observing: clear this subscription's listener slot on every
    /// node of the live tree and drop the anchor chain.
    pub fn detach(self) {
        tracing::debug!(
            target: "cereal::reactive",
            key = %self.root.shared.key,
            "detaching subscription"
        );
        self.root.unwire();
    }
}
