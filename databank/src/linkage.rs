//! Parent/child/sibling linkage shared by the data tree and filter trees
//!
//! A tree here is a set of nodes addressed by some copyable id, where every node has five
//! optional links: `parent`, `first_child`, `last_child`, `next` and `prev`. Storage of the
//! links is left to the implementor of [TreeLinks], the algorithms in this module only read
//! and write links through it. None of this does any locking.
//!
//! [TreeLinks]: trait.TreeLinks.html
use std::fmt::Debug;

/// One of the five links of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Link {
    Parent = 0,
    FirstChild = 1,
    LastChild = 2,
    Next = 3,
    Prev = 4,
}

/// Link storage for a tree
pub trait TreeLinks {
    type Id: Copy + Eq + Debug;

    fn link(&self, id: Self::Id, which: Link) -> Option<Self::Id>;

    fn set_link(&mut self, id: Self::Id, which: Link, to: Option<Self::Id>);
}

/// link `child` as the last child of `parent`
///
/// `child` must not currently be linked anywhere.
pub fn link_last_child<L: TreeLinks>(links: &mut L, parent: L::Id, child: L::Id) {
    let last = links.link(parent, Link::LastChild);
    links.set_link(child, Link::Parent, Some(parent));
    links.set_link(child, Link::Prev, last);
    links.set_link(child, Link::Next, None);
    match last {
        Some(last) => links.set_link(last, Link::Next, Some(child)),
        None => links.set_link(parent, Link::FirstChild, Some(child)),
    }
    links.set_link(parent, Link::LastChild, Some(child));
}

/// link `child` as the first child of `parent`
///
/// `child` must not currently be linked anywhere.
pub fn link_first_child<L: TreeLinks>(links: &mut L, parent: L::Id, child: L::Id) {
    let first = links.link(parent, Link::FirstChild);
    links.set_link(child, Link::Parent, Some(parent));
    links.set_link(child, Link::Next, first);
    links.set_link(child, Link::Prev, None);
    match first {
        Some(first) => links.set_link(first, Link::Prev, Some(child)),
        None => links.set_link(parent, Link::LastChild, Some(child)),
    }
    links.set_link(parent, Link::FirstChild, Some(child));
}

/// Remove `node` from its sibling list and from its parent.
///
/// The node keeps its children, but all of its own five links are cleared, so the
/// subtree below it is no longer reachable by walking from the node.
pub fn unlink<L: TreeLinks>(links: &mut L, node: L::Id) {
    let parent = links.link(node, Link::Parent);
    let next = links.link(node, Link::Next);
    let prev = links.link(node, Link::Prev);
    if let Some(parent) = parent {
        if links.link(parent, Link::FirstChild) == Some(node) {
            links.set_link(parent, Link::FirstChild, next);
        }
        if links.link(parent, Link::LastChild) == Some(node) {
            links.set_link(parent, Link::LastChild, prev);
        }
    }
    if let Some(prev) = prev {
        links.set_link(prev, Link::Next, next);
    }
    if let Some(next) = next {
        links.set_link(next, Link::Prev, prev);
    }
    for which in [
        Link::Parent,
        Link::FirstChild,
        Link::LastChild,
        Link::Next,
        Link::Prev,
    ]
    .iter()
    {
        links.set_link(node, *which, None);
    }
}

/// Replace the child list of `parent` with `children`, in order.
///
/// All of `children` must currently be children of `parent`, and they must be all of them.
pub fn relink_children<L: TreeLinks>(links: &mut L, parent: L::Id, children: &[L::Id]) {
    links.set_link(parent, Link::FirstChild, children.first().copied());
    links.set_link(parent, Link::LastChild, children.last().copied());
    for (i, child) in children.iter().enumerate() {
        let prev = if i > 0 { Some(children[i - 1]) } else { None };
        links.set_link(*child, Link::Prev, prev);
        links.set_link(*child, Link::Next, children.get(i + 1).copied());
    }
}

/// one preorder step
///
/// Descends to the first child if there is one, otherwise moves to the next sibling,
/// otherwise walks up until an ancestor has a next sibling and moves there.
pub fn advance<L: TreeLinks>(links: &L, node: L::Id) -> Option<L::Id> {
    let mut depth = 0;
    advance_tracked(links, node, &mut depth)
}

/// A preorder step like [advance] that also tracks depth.
///
/// `depth` is incremented when descending and decremented once per ascended level,
/// moving to a sibling leaves it unchanged.
///
/// [advance]: fn.advance.html
pub fn advance_tracked<L: TreeLinks>(links: &L, node: L::Id, depth: &mut isize) -> Option<L::Id> {
    if let Some(child) = links.link(node, Link::FirstChild) {
        *depth += 1;
        return Some(child);
    }
    let mut current = node;
    loop {
        if let Some(next) = links.link(current, Link::Next) {
            return Some(next);
        }
        current = links.link(current, Link::Parent)?;
        *depth -= 1;
    }
}

/// The node a preorder walk reaches right after leaving the subtree of `start`, if any.
///
/// Comparing against this sentinel bounds a walk to the subtree.
pub fn subtree_end<L: TreeLinks>(links: &L, start: L::Id) -> Option<L::Id> {
    let mut current = start;
    loop {
        if let Some(next) = links.link(current, Link::Next) {
            return Some(next);
        }
        current = links.link(current, Link::Parent)?;
    }
}

/// true if `node` is `ancestor` or lies in its subtree
pub fn is_within<L: TreeLinks>(links: &L, node: L::Id, ancestor: L::Id) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = links.link(id, Link::Parent);
    }
    false
}

/// Iterator over the strict descendants of a node in preorder
///
/// Yields `(id, depth)` where the children of the start node have depth 1.
pub struct Descendants<'a, L: TreeLinks> {
    links: &'a L,
    current: Option<L::Id>,
    end: Option<L::Id>,
    depth: isize,
}

impl<'a, L: TreeLinks> Descendants<'a, L> {
    pub fn new(links: &'a L, start: L::Id) -> Self {
        let end = subtree_end(links, start);
        let mut depth = 0;
        let current = links
            .link(start, Link::FirstChild)
            .map(|child| {
                depth = 1;
                child
            });
        Self {
            links,
            current,
            end,
            depth,
        }
    }
}

impl<'a, L: TreeLinks> Iterator for Descendants<'a, L> {
    type Item = (L::Id, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        if Some(current) == self.end || self.depth <= 0 {
            self.current = None;
            return None;
        }
        let result = (current, self.depth as usize);
        self.current = advance_tracked(self.links, current, &mut self.depth);
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plain vec backed link storage
    #[derive(Debug, Default)]
    struct VecTree(Vec<[Option<usize>; 5]>);

    impl VecTree {
        fn add(&mut self) -> usize {
            self.0.push([None; 5]);
            self.0.len() - 1
        }

        fn children(&self, parent: usize) -> Vec<usize> {
            let mut res = Vec::new();
            let mut current = self.link(parent, Link::FirstChild);
            while let Some(id) = current {
                res.push(id);
                current = self.link(id, Link::Next);
            }
            res
        }

        fn children_rev(&self, parent: usize) -> Vec<usize> {
            let mut res = Vec::new();
            let mut current = self.link(parent, Link::LastChild);
            while let Some(id) = current {
                res.push(id);
                current = self.link(id, Link::Prev);
            }
            res.reverse();
            res
        }
    }

    impl TreeLinks for VecTree {
        type Id = usize;

        fn link(&self, id: usize, which: Link) -> Option<usize> {
            self.0[id][which as usize]
        }

        fn set_link(&mut self, id: usize, which: Link, to: Option<usize>) {
            self.0[id][which as usize] = to;
        }
    }

    /// 0 -> (1 -> (3, 4 -> (6)), 2 -> (5))
    fn sample() -> VecTree {
        let mut t = VecTree::default();
        for _ in 0..7 {
            t.add();
        }
        link_last_child(&mut t, 0, 1);
        link_last_child(&mut t, 0, 2);
        link_last_child(&mut t, 1, 3);
        link_last_child(&mut t, 1, 4);
        link_last_child(&mut t, 2, 5);
        link_last_child(&mut t, 4, 6);
        t
    }

    #[test]
    fn link_children_in_order() {
        let mut t = VecTree::default();
        let p = t.add();
        let a = t.add();
        let b = t.add();
        let c = t.add();
        link_last_child(&mut t, p, b);
        link_first_child(&mut t, p, a);
        link_last_child(&mut t, p, c);
        assert_eq!(t.children(p), vec![a, b, c]);
        assert_eq!(t.children_rev(p), vec![a, b, c]);
        assert_eq!(t.link(b, Link::Parent), Some(p));
    }

    #[test]
    fn unlink_endpoints_and_middle() {
        let mut t = sample();
        unlink(&mut t, 3);
        assert_eq!(t.children(1), vec![4]);
        assert_eq!(t.children_rev(1), vec![4]);
        unlink(&mut t, 4);
        assert_eq!(t.children(1), Vec::<usize>::new());
        assert_eq!(t.link(1, Link::LastChild), None);
        // the unlinked node keeps nothing
        assert_eq!(t.link(4, Link::Parent), None);
        assert_eq!(t.link(4, Link::FirstChild), None);

        let mut t = sample();
        let x = t.add();
        link_last_child(&mut t, 0, x);
        unlink(&mut t, 2);
        assert_eq!(t.children(0), vec![1, x]);
        assert_eq!(t.children_rev(0), vec![1, x]);
    }

    #[test]
    fn preorder_walk() {
        let t = sample();
        let mut res = vec![0];
        let mut current = advance(&t, 0);
        while let Some(id) = current {
            res.push(id);
            current = advance(&t, id);
        }
        assert_eq!(res, vec![0, 1, 3, 4, 6, 2, 5]);
    }

    #[test]
    fn tracked_depth() {
        let t = sample();
        let mut depth = 0;
        assert_eq!(advance_tracked(&t, 4, &mut depth), Some(6));
        assert_eq!(depth, 1);
        // 6 has no next, 4 has no next, 1 has next 2
        assert_eq!(advance_tracked(&t, 6, &mut depth), Some(2));
        assert_eq!(depth, -1);
        assert_eq!(advance_tracked(&t, 5, &mut depth), None);
    }

    #[test]
    fn descendants_bounded_to_subtree() {
        let t = sample();
        assert_eq!(
            Descendants::new(&t, 1).collect::<Vec<_>>(),
            vec![(3, 1), (4, 1), (6, 2)]
        );
        assert_eq!(
            Descendants::new(&t, 0).map(|(id, _)| id).collect::<Vec<_>>(),
            vec![1, 3, 4, 6, 2, 5]
        );
        assert_eq!(Descendants::new(&t, 6).count(), 0);
        assert_eq!(Descendants::new(&t, 2).collect::<Vec<_>>(), vec![(5, 1)]);
        assert_eq!(subtree_end(&t, 1), Some(2));
        assert_eq!(subtree_end(&t, 2), None);
    }

    #[test]
    fn relink_reorders() {
        let mut t = sample();
        relink_children(&mut t, 0, &[2, 1]);
        assert_eq!(t.children(0), vec![2, 1]);
        assert_eq!(t.children_rev(0), vec![2, 1]);
        assert!(is_within(&t, 6, 1));
        assert!(!is_within(&t, 5, 1));
    }
}
