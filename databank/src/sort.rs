//! Reordering of sibling generations
use crate::{
    arena::NodeId,
    bank::Bank,
    error::{Error, Result},
    linkage::{relink_children, Link, TreeLinks},
    value::Value,
};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortRule {
    Ascending,
    Descending,
}

impl Default for SortRule {
    fn default() -> Self {
        SortRule::Ascending
    }
}

/// Compare two sort values. A missing value is greater than any value, values that can not
/// be compared are equal.
fn compare(a: &Option<Value>, b: &Option<Value>, rule: SortRule) -> Ordering {
    let ordering = match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    };
    match rule {
        SortRule::Ascending => ordering,
        SortRule::Descending => ordering.reverse(),
    }
}

/// Stable merge sort that tolerates comparators which are not a total order.
///
/// `compare` treats mismatched kinds and NaN as equal to everything, which is not transitive,
/// and the sorts of the standard library are allowed to panic on such comparators. Items are
/// copied, so sort indices or slots rather than the values themselves.
fn merge_sort_by<T: Copy>(items: &mut [T], compare: &impl Fn(&T, &T) -> Ordering) {
    let mut scratch = items.to_vec();
    sort_run(items, &mut scratch, compare);
}

/// Sort `items` using `scratch`, which has the same length, as the merge buffer.
fn sort_run<T: Copy>(items: &mut [T], scratch: &mut [T], compare: &impl Fn(&T, &T) -> Ordering) {
    let len = items.len();
    if len < 2 {
        return;
    }
    let mid = len / 2;
    sort_run(&mut items[..mid], &mut scratch[..mid], compare);
    sort_run(&mut items[mid..], &mut scratch[mid..], compare);
    let (mut i, mut j) = (0, mid);
    for out in scratch.iter_mut() {
        let take_right = j < len && (i == mid || compare(&items[j], &items[i]) == Ordering::Less);
        if take_right {
            *out = items[j];
            j += 1;
        } else {
            *out = items[i];
            i += 1;
        }
    }
    items.copy_from_slice(scratch);
}

impl Bank {
    /// Sort a generation of siblings.
    ///
    /// The siblings with the same key and kind as `any_sibling` are sorted by the value of
    /// their first data point named `sort_on_key` and moved to the front. All other siblings
    /// follow in their original order. Siblings without the data point go last when
    /// ascending and first when descending.
    pub fn sort_generation(
        &self,
        any_sibling: NodeId,
        sort_on_key: &str,
        rule: SortRule,
    ) -> Result<()> {
        let sibling = self.node(any_sibling)?;
        let mut links = self.arena.links();
        loop {
            let parent = links
                .link(any_sibling.slot, Link::Parent)
                .ok_or_else(|| Error::Detached(any_sibling).report())?;
            let parent_id = self.arena.id(parent);
            let parent_node = self.node(parent_id)?;
            let _children = Self::child_list(parent_id, &parent_node)?.write();
            if links.link(any_sibling.slot, Link::Parent) != Some(parent) {
                continue;
            }
            let mut matches = Vec::new();
            let mut keys = Vec::new();
            let mut others = Vec::new();
            let mut current = links.link(parent, Link::FirstChild);
            while let Some(slot) = current {
                match self.arena.node(slot) {
                    Some(node) if node.kind() == sibling.kind() && node.key() == sibling.key() => {
                        matches.push(slot);
                        keys.push(self.sort_value(slot, sort_on_key));
                    }
                    _ => others.push(slot),
                }
                current = links.link(slot, Link::Next);
            }
            let mut ranks = (0..matches.len()).collect::<Vec<_>>();
            merge_sort_by(&mut ranks, &|a: &usize, b: &usize| {
                compare(&keys[*a], &keys[*b], rule)
            });
            let order = ranks
                .iter()
                .map(|rank| matches[*rank])
                .chain(others.iter().copied())
                .collect::<Vec<_>>();
            relink_children(&mut links, parent, &order);
            debug!(
                "sorted {} of {} children of {} by {:?}",
                matches.len(),
                order.len(),
                parent_id,
                sort_on_key
            );
            return Ok(());
        }
    }

    /// value of the first data point child of `slot` named `key`
    fn sort_value(&self, slot: u32, key: &str) -> Option<Value> {
        let links = self.arena.links();
        let mut current = links.link(slot, Link::FirstChild);
        while let Some(child) = current {
            if let Some(node) = self.arena.node(child) {
                if node.kind().is_data_point() && node.key() == key {
                    return Some(node.value());
                }
            }
            current = links.link(child, Link::Next);
        }
        None
    }
}
