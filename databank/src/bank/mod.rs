//! Creation of banks, records and data points
//!
//! A [Bank] is a cheap to clone handle. All operations take `&self` and can be called from
//! any number of threads.
//!
//! There are two kinds of locks. The bank lock guards the primary key counter and the hash
//! index. Every root and record has a lock guarding its own child list. Whenever both are
//! needed, the record lock is taken first.
//!
//! [Bank]: struct.Bank.html
use crate::{
    arena::{Arena, DataNode, NodeId},
    error::{Error, Result},
    linkage::{is_within, link_last_child, unlink, Descendants, Link, TreeLinks},
    value::{TypeMask, Value, ValueKind},
};
use parking_lot::RwLock;
use std::{
    ops::Deref,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};
use tracing::{debug, info, info_span, Span};

mod index;
#[cfg(feature = "metrics")]
mod prom;

pub(crate) use index::PrimaryKeyIndex;
#[cfg(feature = "metrics")]
pub(crate) use prom::*;

/// The primary key of the root, never assigned to a record
pub const ROOT_PRIMARY_KEY: u64 = u64::MAX;

/// Number of hash index buckets when the config does not say otherwise
pub const DEFAULT_SLOT_COUNT: u64 = 128 * 1024;

/// Key of the data point that [Bank::copy_subtree] stamps on copied records
///
/// [Bank::copy_subtree]: struct.Bank.html#method.copy_subtree
pub const ORIGINAL_PK_KEY: &str = "original_pk";

/// Upper bound for the number of hash index buckets
pub const MAX_SLOT_COUNT: u64 = 1 << 24;

static NEXT_BANK_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Configuration for a bank
pub struct BankConfig {
    /// name used in log spans
    pub name: Option<String>,
    /// maximum bytes taken by nodes and the index, 0 means unbounded
    pub total_memory_cap: u64,
    /// number of hash index buckets. Must be a power of two, 0 means [DEFAULT_SLOT_COUNT]
    ///
    /// [DEFAULT_SLOT_COUNT]: constant.DEFAULT_SLOT_COUNT.html
    pub primary_key_hash_table_slot_count: u64,
    /// first primary key to hand out
    pub primary_key_index: u64,
    /// value kinds that can not be stored as data points
    pub disabled_types: TypeMask,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            name: None,
            total_memory_cap: 0,
            primary_key_hash_table_slot_count: DEFAULT_SLOT_COUNT,
            primary_key_index: 0,
            disabled_types: TypeMask::empty(),
        }
    }
}

impl BankConfig {
    /// config with a tiny hash table, so that buckets get long chains even for small banks
    pub fn debug() -> Self {
        Self {
            name: Some("debug".into()),
            primary_key_hash_table_slot_count: 16,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// the slot count with the default filled in
    pub fn slot_count(&self) -> u64 {
        match self.primary_key_hash_table_slot_count {
            0 => DEFAULT_SLOT_COUNT,
            n => n,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let slots = self.slot_count();
        if !slots.is_power_of_two() {
            return Err(Error::InvalidConfig("slot count must be a power of two"));
        }
        if slots > MAX_SLOT_COUNT {
            return Err(Error::InvalidConfig("slot count must be at most 2^24"));
        }
        Ok(())
    }
}

/// Options for new nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOptions {
    /// human readable label
    pub display: Option<String>,
}

impl NodeOptions {
    pub fn display(label: impl Into<String>) -> Self {
        Self {
            display: Some(label.into()),
        }
    }
}

fn display_of(options: Option<&NodeOptions>) -> Option<&str> {
    options.and_then(|o| o.display.as_deref())
}

/// Everything a bank consists of
#[derive(Debug)]
pub struct BankInner {
    pub(crate) arena: Arena,
    /// the bank lock
    pub(crate) index: RwLock<PrimaryKeyIndex>,
    pub(crate) root: NodeId,
    pub(crate) disabled_types: TypeMask,
    name: Option<String>,
    span: Span,
}

#[derive(Debug, Clone)]
pub struct Bank(Arc<BankInner>);

impl Deref for Bank {
    type Target = BankInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Bank {
    pub fn create(config: BankConfig) -> Result<Self> {
        config.validate().map_err(Error::report)?;
        let id = NEXT_BANK_ID.fetch_add(1, Ordering::Relaxed);
        let slot_count = config.slot_count();
        let arena = Arena::new(id, config.total_memory_cap);
        arena
            .charge(PrimaryKeyIndex::table_size(slot_count))
            .map_err(Error::report)?;
        let root = arena
            .alloc(DataNode::new("", Value::Root, None))
            .map_err(Error::report)?;
        let span = info_span!("bank", id, name = config.name.as_deref().unwrap_or_default());
        info!(
            parent: &span,
            "created bank, {} slots, counter at {}, disabled {:?}",
            slot_count,
            config.primary_key_index,
            config.disabled_types
        );
        Ok(Self(Arc::new(BankInner {
            arena,
            index: RwLock::new(PrimaryKeyIndex::new(slot_count, config.primary_key_index)),
            root,
            disabled_types: config.disabled_types,
            name: config.name,
            span,
        })))
    }

    /// the root of the tree, parent of all top level records
    pub fn root(&self) -> NodeId {
        let _bank = self.index.read();
        self.root
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// hand out a fresh primary key
    pub fn next_primary_key(&self) -> Result<u64> {
        self.index.write().take_primary_key().map_err(Error::report)
    }

    /// the hash bucket of a primary key
    pub fn bucket_of(&self, primary_key: u64) -> usize {
        self.index.read().bucket_of(primary_key)
    }

    pub fn add_record(
        &self,
        parent: NodeId,
        key: &str,
        options: Option<&NodeOptions>,
    ) -> Result<NodeId> {
        // fail on a bad parent before burning a key
        Self::child_list(parent, &*self.node(parent)?)?;
        let primary_key = self.next_primary_key()?;
        self.add_record_with_pk(parent, key, primary_key, options)
    }

    /// Add a record with a caller chosen primary key as the last child of `parent`.
    ///
    /// `parent` must be the root or a record. The key is not checked for uniqueness, a lookup
    /// returns whichever record with that key was indexed first.
    pub fn add_record_with_pk(
        &self,
        parent: NodeId,
        key: &str,
        primary_key: u64,
        options: Option<&NodeOptions>,
    ) -> Result<NodeId> {
        let _span = self.span.enter();
        if primary_key == ROOT_PRIMARY_KEY {
            return Err(Error::ReservedPrimaryKey.report());
        }
        let parent_node = self.node(parent)?;
        let _children = Self::child_list(parent, &parent_node)?.write();
        let mut index = self.index.write();
        let node = self.alloc_record(&mut index, key, primary_key, display_of(options))?;
        link_last_child(&mut self.arena.links(), parent.slot, node.slot);
        debug!("added record {} {:?} under {}", primary_key, key, parent);
        Ok(node)
    }

    /// Allocate and index a record without linking it anywhere.
    fn alloc_record(
        &self,
        index: &mut PrimaryKeyIndex,
        key: &str,
        primary_key: u64,
        display: Option<&str>,
    ) -> Result<NodeId> {
        let node = self
            .arena
            .alloc(DataNode::new(key, Value::Record(primary_key), display))
            .map_err(Error::report)?;
        index.insert(primary_key, node.slot);
        Ok(node)
    }

    /// Set a data point of a record.
    ///
    /// The first child with the same key and the same value kind is overwritten in place,
    /// otherwise a new data point is appended.
    pub fn set_data_point(
        &self,
        record: NodeId,
        key: &str,
        value: impl Into<Value>,
        options: Option<&NodeOptions>,
    ) -> Result<NodeId> {
        self.insert_data_point(record, key, value.into(), display_of(options), true)
    }

    /// Append or overwrite a data point. Appending without overwrite keeps duplicates, which
    /// is what copying a subtree needs.
    pub(crate) fn insert_data_point(
        &self,
        record: NodeId,
        key: &str,
        value: Value,
        display: Option<&str>,
        overwrite: bool,
    ) -> Result<NodeId> {
        let _span = self.span.enter();
        let kind = value.kind();
        if !kind.is_data_point() {
            return Err(Error::InvalidDataPointKind(kind).report());
        }
        let record_node = self.record(record)?;
        if self.disabled_types.contains_kind(kind) {
            return Err(Error::TypeDisabled(kind).report());
        }
        let _children = Self::child_list(record, &record_node)?.write();
        let mut links = self.arena.links();
        if overwrite {
            let mut current = links.link(record.slot, Link::FirstChild);
            while let Some(slot) = current {
                if let Some(child) = self.arena.node(slot) {
                    if child.kind() == kind && child.key() == key {
                        let extra = value.heap_size() + display.map(str::len).unwrap_or_default();
                        self.arena.charge(extra as u64).map_err(Error::report)?;
                        child.replace_value(value, display);
                        debug!("overwrote data point {:?} of {}", key, record);
                        return Ok(self.arena.id(slot));
                    }
                }
                current = links.link(slot, Link::Next);
            }
        }
        let node = self
            .arena
            .alloc(DataNode::new(key, value, display))
            .map_err(Error::report)?;
        link_last_child(&mut links, record.slot, node.slot);
        debug!("added data point {:?} of kind {} to {}", key, kind, record);
        Ok(node)
    }

    /// the first child of `record` with the given key
    pub fn get_data_point(&self, record: NodeId, key: &str) -> Result<Option<NodeId>> {
        Ok(self.find_child(record, key)?.map(|(id, _)| id))
    }

    /// The value of the first child of `record` with the given key, `Value::None` if there is
    /// no such child.
    pub fn get_value(&self, record: NodeId, key: &str) -> Result<Value> {
        Ok(self
            .find_child(record, key)?
            .map(|(_, node)| node.value())
            .unwrap_or_default())
    }

    fn find_child(&self, record: NodeId, key: &str) -> Result<Option<(NodeId, Arc<DataNode>)>> {
        let record_node = self.record(record)?;
        let _children = Self::child_list(record, &record_node)?.read();
        let links = self.arena.links();
        let mut current = links.link(record.slot, Link::FirstChild);
        while let Some(slot) = current {
            if let Some(child) = self.arena.node(slot) {
                if child.key() == key {
                    return Ok(Some((self.arena.id(slot), child)));
                }
            }
            current = links.link(slot, Link::Next);
        }
        Ok(None)
    }

    /// Look up a record by primary key.
    ///
    /// Deleted records stay in the index, so this can return a record that is no longer
    /// attached to the tree. See [is_attached].
    ///
    /// [is_attached]: #method.is_attached
    pub fn get_record_with_id(&self, primary_key: u64) -> Option<NodeId> {
        let index = self.index.read();
        self.lookup(&index, primary_key)
    }

    fn lookup(&self, index: &PrimaryKeyIndex, primary_key: u64) -> Option<NodeId> {
        index
            .candidates(primary_key)
            .iter()
            .copied()
            .find(|slot| {
                self.arena
                    .node(*slot)
                    .map(|node| node.is_record() && node.primary_key() == Some(primary_key))
                    .unwrap_or_default()
            })
            .map(|slot| self.arena.id(slot))
    }

    /// Detach a record and its subtree from the tree.
    ///
    /// Nothing is freed and the index entry stays, so [get_record_with_id] still finds the
    /// detached record afterwards. Deleting a record that is already detached does nothing.
    ///
    /// [get_record_with_id]: #method.get_record_with_id
    pub fn delete_record_by_id(&self, primary_key: u64) -> Result<NodeId> {
        let _span = self.span.enter();
        let id = self
            .get_record_with_id(primary_key)
            .ok_or_else(|| Error::RecordNotFound(primary_key).report())?;
        let mut links = self.arena.links();
        loop {
            let parent = match links.link(id.slot, Link::Parent) {
                Some(parent) => parent,
                None => return Ok(id),
            };
            let parent_node = self.node(self.arena.id(parent))?;
            let _children = Self::child_list(self.arena.id(parent), &parent_node)?.write();
            // the record might have moved while we were waiting for the lock
            if links.link(id.slot, Link::Parent) != Some(parent) {
                continue;
            }
            let _bank = self.index.write();
            unlink(&mut links, id.slot);
            debug!("deleted record {}", primary_key);
            return Ok(id);
        }
    }

    /// Copy the subtree of `src_root` to a new last child of `dest_parent`.
    ///
    /// All copied records get fresh primary keys. With `include_original_pk`, every copied
    /// record gets a first data point [ORIGINAL_PK_KEY] holding the key of the record it was
    /// copied from. Returns the copy of `src_root`.
    ///
    /// The copy is built detached and only linked under `dest_parent` once it is complete,
    /// so a failed copy leaves the tree unchanged. The nodes it allocated stay in the arena.
    ///
    /// [ORIGINAL_PK_KEY]: constant.ORIGINAL_PK_KEY.html
    pub fn copy_subtree(
        &self,
        dest_parent: NodeId,
        src_root: NodeId,
        include_original_pk: bool,
    ) -> Result<NodeId> {
        let _span = self.span.enter();
        let src = self.record(src_root)?;
        let dest = self.node(dest_parent)?;
        Self::child_list(dest_parent, &dest)?;
        let links = self.arena.links();
        if is_within(&links, dest_parent.slot, src_root.slot) {
            return Err(Error::CopyIntoSelf(src_root).report());
        }
        if include_original_pk && self.disabled_types.contains_kind(ValueKind::U64) {
            return Err(Error::TypeDisabled(ValueKind::U64).report());
        }
        let nodes = {
            let _src = Self::child_list(src_root, &src)?.read();
            Descendants::new(&links, src_root.slot).collect::<Vec<_>>()
        };
        // at most one child list is locked at any time from here on
        let top = self.copy_detached(&src, include_original_pk)?;
        let mut stack = vec![top];
        for (slot, depth) in nodes {
            stack.truncate(depth);
            let parent = match stack.last() {
                Some(parent) => *parent,
                None => break,
            };
            let node = self.node(self.arena.id(slot))?;
            if node.is_record() {
                stack.push(self.copy_record(parent, &node, include_original_pk)?);
            } else {
                let payload = node.payload();
                let value = payload.value.clone();
                let display = payload.display.clone();
                drop(payload);
                self.insert_data_point(parent, node.key(), value, display.as_deref(), false)?;
            }
        }
        let _children = Self::child_list(dest_parent, &dest)?.write();
        let _bank = self.index.write();
        link_last_child(&mut self.arena.links(), dest_parent.slot, top.slot);
        debug!("copied {} into {} as {}", src_root, dest_parent, top);
        Ok(top)
    }

    /// A parentless copy of the record `src`, the top of a copied subtree.
    fn copy_detached(&self, src: &DataNode, include_original_pk: bool) -> Result<NodeId> {
        let display = src.payload().display.clone();
        let copy = {
            let mut index = self.index.write();
            let primary_key = index.take_primary_key().map_err(Error::report)?;
            self.alloc_record(&mut index, src.key(), primary_key, display.as_deref())?
        };
        self.copy_original_pk(copy, src, include_original_pk)?;
        Ok(copy)
    }

    fn copy_record(&self, parent: NodeId, src: &DataNode, include_original_pk: bool) -> Result<NodeId> {
        let options = NodeOptions {
            display: src.payload().display.as_deref().map(Into::into),
        };
        let copy = self.add_record(parent, src.key(), Some(&options))?;
        self.copy_original_pk(copy, src, include_original_pk)?;
        Ok(copy)
    }

    fn copy_original_pk(
        &self,
        copy: NodeId,
        src: &DataNode,
        include_original_pk: bool,
    ) -> Result<()> {
        if include_original_pk {
            if let Some(pk) = src.primary_key() {
                self.insert_data_point(copy, ORIGINAL_PK_KEY, Value::U64(pk), None, false)?;
            }
        }
        Ok(())
    }

    /// First record with the given key in the subtree of `start`, in preorder, not counting
    /// `start` itself.
    pub fn find_record(&self, start: NodeId, key: &str) -> Result<Option<NodeId>> {
        let start_node = self.node(start)?;
        let _children = start_node.children_lock().map(|lock| lock.read());
        let links = self.arena.links();
        Ok(Descendants::new(&links, start.slot)
            .map(|(slot, _)| slot)
            .find(|slot| {
                self.arena
                    .node(*slot)
                    .map(|node| node.is_record() && node.key() == key)
                    .unwrap_or_default()
            })
            .map(|slot| self.arena.id(slot)))
    }

    /// Snapshot of the subtree below `start` in preorder, with depth relative to `start`.
    pub fn walk(&self, start: NodeId) -> Result<Vec<(NodeId, usize)>> {
        let start_node = self.node(start)?;
        let _children = start_node.children_lock().map(|lock| lock.read());
        let links = self.arena.links();
        Ok(Descendants::new(&links, start.slot)
            .map(|(slot, depth)| (self.arena.id(slot), depth))
            .collect())
    }

    /// primary key of a record, [ROOT_PRIMARY_KEY] for the root
    ///
    /// [ROOT_PRIMARY_KEY]: constant.ROOT_PRIMARY_KEY.html
    pub fn primary_key(&self, node: NodeId) -> Result<u64> {
        let data = self.node(node)?;
        data.primary_key().ok_or_else(|| {
            Error::NotARecord {
                node,
                kind: data.kind(),
            }
            .report()
        })
    }

    pub fn key(&self, node: NodeId) -> Result<String> {
        Ok(self.node(node)?.key().to_owned())
    }

    pub fn display(&self, node: NodeId) -> Result<Option<String>> {
        Ok(self.node(node)?.payload().display.as_deref().map(Into::into))
    }

    pub fn value(&self, node: NodeId) -> Result<Value> {
        Ok(self.node(node)?.value())
    }

    pub fn kind(&self, node: NodeId) -> Result<ValueKind> {
        Ok(self.node(node)?.kind())
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        self.node(node)?;
        Ok(self
            .arena
            .links()
            .link(node.slot, Link::Parent)
            .map(|slot| self.arena.id(slot)))
    }

    /// the children of a node, in order
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>> {
        let data = self.node(node)?;
        let _children = data.children_lock().map(|lock| lock.read());
        let links = self.arena.links();
        let mut res = Vec::new();
        let mut current = links.link(node.slot, Link::FirstChild);
        while let Some(slot) = current {
            res.push(self.arena.id(slot));
            current = links.link(slot, Link::Next);
        }
        Ok(res)
    }

    /// true if the node can be reached from the root
    pub fn is_attached(&self, node: NodeId) -> Result<bool> {
        self.node(node)?;
        Ok(is_within(&self.arena.links(), node.slot, self.root.slot))
    }

    /// number of indexed records, including detached ones
    pub fn record_count(&self) -> usize {
        self.index.read().len()
    }

    /// number of allocated nodes, including the root and detached nodes
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// bytes charged against the memory cap so far
    pub fn memory_used(&self) -> u64 {
        self.arena.used()
    }

    pub fn disabled_types(&self) -> TypeMask {
        self.disabled_types
    }

    /// the next primary key that would be handed out
    pub fn primary_key_index(&self) -> u64 {
        self.index.read().next_primary_key()
    }

    pub fn slot_count(&self) -> u64 {
        self.index.read().slot_count()
    }

    /// lengths of all hash buckets
    pub fn bucket_lengths(&self) -> Vec<usize> {
        self.index.read().bucket_lengths().collect()
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<Arc<DataNode>> {
        self.arena.get(id).map_err(Error::report)
    }

    /// resolve a node that must be a record
    pub(crate) fn record(&self, id: NodeId) -> Result<Arc<DataNode>> {
        let node = self.node(id)?;
        if !node.is_record() {
            return Err(Error::NotARecord {
                node: id,
                kind: node.kind(),
            }
            .report());
        }
        Ok(node)
    }

    /// the child list lock of the root or a record
    pub(crate) fn child_list(id: NodeId, node: &DataNode) -> Result<&RwLock<()>> {
        node.children_lock().ok_or_else(|| {
            Error::NotARecord {
                node: id,
                kind: node.kind(),
            }
            .report()
        })
    }

    pub(crate) fn span(&self) -> &Span {
        &self.span
    }
}
