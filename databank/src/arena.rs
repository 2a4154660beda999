//! Append-only node storage
//!
//! Nodes are allocated once and never freed. They are addressed by a [NodeId], which is a
//! slot in the arena plus the id of the bank that owns the arena, so a handle can never be
//! silently used with the wrong bank.
//!
//! Tree links are atomics and the payload sits behind a short-lived lock, so any node can be
//! read while a walk holds a lock further up the tree and some other thread mutates below.
//!
//! [NodeId]: struct.NodeId.html
use crate::{
    error::{Error, Result},
    linkage::{Link, TreeLinks},
    value::{Value, ValueKind},
};
use derive_more::Display;
use parking_lot::{RwLock, RwLockReadGuard};
use std::{
    convert::TryFrom,
    mem,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};

/// sentinel for an absent link
const NIL: u32 = u32::MAX;

/// Handle to a node of a bank
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "{}:{}", bank, slot)]
pub struct NodeId {
    pub(crate) bank: u32,
    pub(crate) slot: u32,
}

impl NodeId {
    /// the arena slot, unique within one bank
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

#[derive(Debug)]
pub(crate) struct Payload {
    pub value: Value,
    pub display: Option<Box<str>>,
}

/// A root, record or data point
#[derive(Debug)]
pub(crate) struct DataNode {
    key: Box<str>,
    kind: ValueKind,
    payload: RwLock<Payload>,
    /// guards the child list, present for the root and records only
    children: Option<RwLock<()>>,
    links: [AtomicU32; 5],
}

impl DataNode {
    pub fn new(key: &str, value: Value, display: Option<&str>) -> Self {
        let kind = value.kind();
        let children = if matches!(kind, ValueKind::Record | ValueKind::Root) {
            Some(RwLock::new(()))
        } else {
            None
        };
        Self {
            key: key.into(),
            kind,
            payload: RwLock::new(Payload {
                value,
                display: display.filter(|x| !x.is_empty()).map(Into::into),
            }),
            children,
            links: [
                AtomicU32::new(NIL),
                AtomicU32::new(NIL),
                AtomicU32::new(NIL),
                AtomicU32::new(NIL),
                AtomicU32::new(NIL),
            ],
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_record(&self) -> bool {
        self.kind == ValueKind::Record
    }

    /// the primary key of a record, `u64::MAX` for the root
    pub fn primary_key(&self) -> Option<u64> {
        match self.kind {
            ValueKind::Record => self.payload.read().value.as_u64(),
            ValueKind::Root => Some(u64::MAX),
            _ => None,
        }
    }

    pub fn payload(&self) -> RwLockReadGuard<'_, Payload> {
        self.payload.read()
    }

    pub fn value(&self) -> Value {
        self.payload.read().value.clone()
    }

    /// Replace the value in place. An empty or missing label keeps the old one.
    pub fn replace_value(&self, value: Value, display: Option<&str>) {
        let mut payload = self.payload.write();
        payload.value = value;
        if let Some(display) = display.filter(|x| !x.is_empty()) {
            payload.display = Some(display.into());
        }
    }

    pub fn children_lock(&self) -> Option<&RwLock<()>> {
        self.children.as_ref()
    }

    fn link(&self, which: Link) -> Option<u32> {
        match self.links[which as usize].load(Ordering::Acquire) {
            NIL => None,
            slot => Some(slot),
        }
    }

    fn set_link(&self, which: Link, to: Option<u32>) {
        self.links[which as usize].store(to.unwrap_or(NIL), Ordering::Release);
    }

    /// bytes charged against the arena budget for this node
    fn footprint(&self) -> u64 {
        let payload = self.payload.read();
        (mem::size_of::<Self>()
            + self.key.len()
            + payload.value.heap_size()
            + payload.display.as_ref().map(|x| x.len()).unwrap_or_default()) as u64
    }
}

/// The slot for a node appended to `len` nodes, none once slots would reach [`NIL`].
fn next_slot(len: usize) -> Option<u32> {
    u32::try_from(len).ok().filter(|slot| *slot != NIL)
}

/// Append-only slab of nodes with a byte budget
#[derive(Debug)]
pub(crate) struct Arena {
    bank: u32,
    nodes: RwLock<Vec<Arc<DataNode>>>,
    used: AtomicU64,
    /// 0 means unbounded
    cap: u64,
}

impl Arena {
    pub fn new(bank: u32, cap: u64) -> Self {
        Self {
            bank,
            nodes: RwLock::new(Vec::new()),
            used: AtomicU64::new(0),
            cap,
        }
    }

    pub fn bank(&self) -> u32 {
        self.bank
    }

    /// Charge `bytes` against the budget without allocating a node.
    pub fn charge(&self, bytes: u64) -> Result<()> {
        let cap = self.cap;
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let total = used.checked_add(bytes)?;
                if cap != 0 && total > cap {
                    None
                } else {
                    Some(total)
                }
            })
            .map(|_| ())
            .map_err(|used| Error::ArenaExhausted {
                requested: bytes,
                used,
                cap,
            })
    }

    pub fn alloc(&self, node: DataNode) -> Result<NodeId> {
        let footprint = node.footprint();
        self.charge(footprint)?;
        let mut nodes = self.nodes.write();
        let slot = match next_slot(nodes.len()) {
            Some(slot) => slot,
            None => {
                let used = self.used.fetch_sub(footprint, Ordering::AcqRel) - footprint;
                return Err(Error::ArenaExhausted {
                    requested: footprint,
                    used,
                    cap: self.cap,
                });
            }
        };
        nodes.push(Arc::new(node));
        Ok(NodeId {
            bank: self.bank,
            slot,
        })
    }

    /// Resolve a handle, rejecting handles of other banks.
    pub fn get(&self, id: NodeId) -> Result<Arc<DataNode>> {
        if id.bank != self.bank {
            return Err(Error::ForeignNode(id));
        }
        self.node(id.slot).ok_or(Error::UnknownNode(id))
    }

    pub fn node(&self, slot: u32) -> Option<Arc<DataNode>> {
        self.nodes.read().get(slot as usize).cloned()
    }

    pub fn id(&self, slot: u32) -> NodeId {
        NodeId {
            bank: self.bank,
            slot,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn links(&self) -> NodeLinks<'_> {
        NodeLinks(self)
    }

    fn with_node<R>(&self, slot: u32, f: impl FnOnce(&DataNode) -> R) -> Option<R> {
        self.nodes.read().get(slot as usize).map(|node| f(node.as_ref()))
    }
}

/// The tree links of all nodes of an arena, addressed by slot.
///
/// Writing links needs the caller to hold the child-list locks of every parent involved.
pub(crate) struct NodeLinks<'a>(&'a Arena);

impl<'a> TreeLinks for NodeLinks<'a> {
    type Id = u32;

    fn link(&self, id: u32, which: Link) -> Option<u32> {
        self.0.with_node(id, |node| node.link(which)).flatten()
    }

    fn set_link(&mut self, id: u32, which: Link, to: Option<u32>) {
        self.0.with_node(id, |node| node.set_link(which, to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linkage::link_last_child;

    #[test]
    fn budget_is_enforced() {
        let arena = Arena::new(7, 2 * mem::size_of::<DataNode>() as u64 + 4);
        let a = arena.alloc(DataNode::new("ab", Value::Root, None)).unwrap();
        assert_eq!(a.to_string(), "7:0");
        arena.alloc(DataNode::new("cd", Value::Record(1), None)).unwrap();
        let err = arena.alloc(DataNode::new("", Value::Record(2), None)).unwrap_err();
        assert!(matches!(err, Error::ArenaExhausted { .. }));
        assert_eq!(arena.len(), 2);
        // a failed allocation does not consume anything
        assert_eq!(arena.used(), 2 * mem::size_of::<DataNode>() as u64 + 4);
    }

    #[test]
    fn slots_never_reach_nil() {
        assert_eq!(next_slot(0), Some(0));
        assert_eq!(next_slot(NIL as usize - 1), Some(NIL - 1));
        assert_eq!(next_slot(NIL as usize), None);
        assert_eq!(next_slot(usize::MAX), None);
    }

    #[test]
    fn foreign_and_unknown_handles() {
        let arena = Arena::new(1, 0);
        let a = arena.alloc(DataNode::new("x", Value::Root, None)).unwrap();
        assert!(arena.get(a).is_ok());
        assert!(matches!(
            arena.get(NodeId { bank: 2, slot: 0 }),
            Err(Error::ForeignNode(_))
        ));
        assert!(matches!(
            arena.get(NodeId { bank: 1, slot: 5 }),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn links_through_arena() {
        let arena = Arena::new(0, 0);
        let root = arena.alloc(DataNode::new("", Value::Root, None)).unwrap();
        let a = arena.alloc(DataNode::new("a", Value::U32(1), None)).unwrap();
        let b = arena.alloc(DataNode::new("b", Value::from("x"), Some("B"))).unwrap();
        let mut links = arena.links();
        link_last_child(&mut links, root.slot, a.slot);
        link_last_child(&mut links, root.slot, b.slot);
        assert_eq!(links.link(root.slot, Link::FirstChild), Some(a.slot));
        assert_eq!(links.link(a.slot, Link::Next), Some(b.slot));
        assert_eq!(links.link(b.slot, Link::Parent), Some(root.slot));
        let b = arena.get(b).unwrap();
        assert_eq!(b.payload().display.as_deref(), Some("B"));
        assert!(b.children_lock().is_none());
        assert!(arena.get(root).unwrap().children_lock().is_some());
    }
}
