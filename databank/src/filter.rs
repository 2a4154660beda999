//! Structural filters
//!
//! A [Filter] is a small tree of patterns mirroring the shape of the data it should match.
//! The root pattern matches the start node by key, every other pattern has to be matched by a
//! distinct node somewhere below the start node whose own key and kind, and whose parent's
//! key and kind, equal those of the pattern and the pattern's parent.
//!
//! ```
//! use databank::{Bank, BankConfig, Filter, FilterRule};
//!
//! let bank = Bank::create(BankConfig::debug()).unwrap();
//! let team = bank.add_record(bank.root(), "team", None).unwrap();
//! let member = bank.add_record(team, "member", None).unwrap();
//! bank.set_data_point(member, "age", 25u32, None).unwrap();
//!
//! let mut filter = Filter::new("team");
//! let m = filter.push_record(filter.root(), "member").unwrap();
//! filter.push(m, "age", 18u32, FilterRule::GreaterThan).unwrap();
//! assert!(bank.evaluate(&filter, team, true).unwrap());
//! ```
//!
//! [Filter]: struct.Filter.html
use crate::{
    arena::NodeId,
    bank::Bank,
    error::{Error, Result},
    linkage::{link_last_child, Descendants, Link, TreeLinks},
    value::{Value, ValueKind},
};
use derive_more::Display;
use fnv::FnvHashMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use tracing::trace;

/// How the value of a data node is compared to the value of a pattern
///
/// Comparisons read as `data value <rule> pattern value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterRule {
    /// matches any value
    None,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Equals,
    NotEquals,
    /// substring match, strings only
    Contains,
    DoesNotContain,
}

impl FilterRule {
    pub fn is_ordered(self) -> bool {
        matches!(
            self,
            FilterRule::GreaterThan
                | FilterRule::LessThan
                | FilterRule::GreaterOrEqual
                | FilterRule::LessOrEqual
        )
    }

    pub fn is_substring(self) -> bool {
        matches!(self, FilterRule::Contains | FilterRule::DoesNotContain)
    }

    /// true if `data` relates to `expected` as this rule demands
    pub fn holds(self, data: &Value, expected: &Value, case_sensitive: bool) -> bool {
        if self == FilterRule::None {
            return true;
        }
        if data.kind() != expected.kind() {
            return false;
        }
        if let (Value::String(a), Value::String(b)) = (data, expected) {
            if !case_sensitive {
                return self.holds_str(&a.to_lowercase(), &b.to_lowercase());
            }
            return self.holds_str(a, b);
        }
        let ordering = data.compare(expected);
        match self {
            FilterRule::Equals => ordering == Some(Ordering::Equal),
            FilterRule::NotEquals => ordering != Some(Ordering::Equal),
            FilterRule::GreaterThan => ordering == Some(Ordering::Greater),
            FilterRule::LessThan => ordering == Some(Ordering::Less),
            FilterRule::GreaterOrEqual => {
                matches!(ordering, Some(Ordering::Greater) | Some(Ordering::Equal))
            }
            FilterRule::LessOrEqual => {
                matches!(ordering, Some(Ordering::Less) | Some(Ordering::Equal))
            }
            FilterRule::None | FilterRule::Contains | FilterRule::DoesNotContain => false,
        }
    }

    fn holds_str(self, a: &str, b: &str) -> bool {
        match self {
            FilterRule::None => true,
            FilterRule::Equals => a == b,
            FilterRule::NotEquals => a != b,
            FilterRule::Contains => a.contains(b),
            FilterRule::DoesNotContain => !a.contains(b),
            FilterRule::GreaterThan => a.as_bytes() > b.as_bytes(),
            FilterRule::LessThan => a.as_bytes() < b.as_bytes(),
            FilterRule::GreaterOrEqual => a.as_bytes() >= b.as_bytes(),
            FilterRule::LessOrEqual => a.as_bytes() <= b.as_bytes(),
        }
    }
}

/// Handle to a pattern of a [Filter](struct.Filter.html)
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[display(fmt = "pattern {}", _0)]
pub struct FilterId(u32);

#[derive(Debug, Clone)]
struct Pattern {
    key: String,
    kind: ValueKind,
    value: Value,
    rule: FilterRule,
    links: [Option<u32>; 5],
}

#[derive(Debug, Clone, Default)]
struct Patterns(Vec<Pattern>);

impl TreeLinks for Patterns {
    type Id = u32;

    fn link(&self, id: u32, which: Link) -> Option<u32> {
        self.0.get(id as usize).and_then(|p| p.links[which as usize])
    }

    fn set_link(&mut self, id: u32, which: Link, to: Option<u32>) {
        if let Some(p) = self.0.get_mut(id as usize) {
            p.links[which as usize] = to;
        }
    }
}

/// A tree of patterns
#[derive(Debug, Clone)]
pub struct Filter {
    patterns: Patterns,
}

impl Filter {
    /// a filter whose root pattern matches a record with the given key
    pub fn new(key: &str) -> Self {
        Self {
            patterns: Patterns(vec![Pattern {
                key: key.into(),
                kind: ValueKind::Record,
                value: Value::None,
                rule: FilterRule::None,
                links: [None; 5],
            }]),
        }
    }

    pub fn root(&self) -> FilterId {
        FilterId(0)
    }

    /// Add a data point pattern below a record pattern.
    pub fn push(
        &mut self,
        parent: FilterId,
        key: &str,
        value: impl Into<Value>,
        rule: FilterRule,
    ) -> Result<FilterId> {
        let value = value.into();
        let kind = value.kind();
        self.check_parent(parent)?;
        if !kind.is_data_point() {
            return Err(Error::InvalidFilter("pattern value must be a data point kind").report());
        }
        if rule.is_ordered() && !kind.is_ordered() {
            return Err(Error::InvalidFilter("ordering rule on a kind without order").report());
        }
        if rule.is_substring() && kind != ValueKind::String {
            return Err(Error::InvalidFilter("substring rule on a non string value").report());
        }
        Ok(self.add(parent, key, kind, value, rule))
    }

    /// Add a record pattern, which matches on existence alone.
    pub fn push_record(&mut self, parent: FilterId, key: &str) -> Result<FilterId> {
        self.check_parent(parent)?;
        Ok(self.add(parent, key, ValueKind::Record, Value::None, FilterRule::None))
    }

    pub fn key(&self, id: FilterId) -> Option<&str> {
        self.patterns.0.get(id.0 as usize).map(|p| p.key.as_str())
    }

    /// number of patterns, including the root
    pub fn len(&self) -> usize {
        self.patterns.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.0.is_empty()
    }

    fn check_parent(&self, parent: FilterId) -> Result<()> {
        match self.patterns.0.get(parent.0 as usize) {
            Some(p) if p.kind == ValueKind::Record => Ok(()),
            Some(_) => Err(Error::InvalidFilter("parent must be a record pattern").report()),
            None => Err(Error::InvalidFilter("unknown parent pattern").report()),
        }
    }

    fn add(
        &mut self,
        parent: FilterId,
        key: &str,
        kind: ValueKind,
        value: Value,
        rule: FilterRule,
    ) -> FilterId {
        let id = self.patterns.0.len() as u32;
        self.patterns.0.push(Pattern {
            key: key.into(),
            kind,
            value,
            rule,
            links: [None; 5],
        });
        link_last_child(&mut self.patterns, parent.0, id);
        FilterId(id)
    }

    /// (parent, pattern) pairs of all patterns below the root, in preorder
    fn pairs(&self) -> Vec<(&Pattern, &Pattern)> {
        let patterns = &self.patterns;
        Descendants::new(patterns, 0)
            .filter_map(|(id, _)| {
                let parent = patterns.link(id, Link::Parent)?;
                Some((&patterns.0[parent as usize], &patterns.0[id as usize]))
            })
            .collect()
    }
}

impl Bank {
    /// Match a filter against the subtree of `node`.
    ///
    /// Matching is greedy. Data nodes are visited in preorder, and each one satisfies at most
    /// the first unmatched pattern it fits. There is no backtracking, so a filter whose
    /// patterns overlap can fail even though some other assignment would have matched.
    pub fn evaluate(&self, filter: &Filter, node: NodeId, case_sensitive: bool) -> Result<bool> {
        #[cfg(feature = "metrics")]
        let _timer = crate::bank::FILTER_EVAL_HIST.start_timer();
        let start = self.node(node)?;
        let root = &filter.patterns.0[0];
        if start.key() != root.key {
            return Ok(false);
        }
        let pairs = filter.pairs();
        // candidate pairs by the key and kind of the pattern
        let mut by_key: FnvHashMap<(&str, ValueKind), SmallVec<[usize; 4]>> = FnvHashMap::default();
        for (i, (_, pattern)) in pairs.iter().enumerate() {
            by_key
                .entry((pattern.key.as_str(), pattern.kind))
                .or_default()
                .push(i);
        }
        let mut matched = vec![false; pairs.len()];
        let mut remaining = pairs.len();
        let _children = start.children_lock().map(|lock| lock.read());
        let links = self.arena.links();
        for (slot, _) in Descendants::new(&links, node.slot) {
            if remaining == 0 {
                break;
            }
            let data = match self.arena.node(slot) {
                Some(data) => data,
                None => continue,
            };
            let candidates = match by_key.get(&(data.key(), data.kind())) {
                Some(candidates) => candidates,
                None => continue,
            };
            let parent = match links.link(slot, Link::Parent).and_then(|p| self.arena.node(p)) {
                Some(parent) => parent,
                None => continue,
            };
            let value = data.value();
            for i in candidates.iter().copied() {
                let (parent_pattern, pattern) = pairs[i];
                if matched[i]
                    || parent.key() != parent_pattern.key
                    || parent.kind() != parent_pattern.kind
                {
                    continue;
                }
                let hit = pattern.kind == ValueKind::Record
                    || pattern.rule.holds(&value, &pattern.value, case_sensitive);
                if hit {
                    trace!("{:?} matched pattern {}", data.key(), i);
                    matched[i] = true;
                    remaining -= 1;
                    break;
                }
            }
        }
        Ok(remaining == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules() {
        use FilterRule::*;
        let a = Value::from(25u32);
        assert!(GreaterThan.holds(&a, &Value::from(18u32), true));
        assert!(!GreaterThan.holds(&a, &Value::from(30u32), true));
        assert!(GreaterOrEqual.holds(&a, &a, true));
        assert!(LessOrEqual.holds(&a, &a, true));
        assert!(!LessThan.holds(&a, &a, true));
        assert!(NotEquals.holds(&a, &Value::from(1u32), true));
        // kinds must agree
        assert!(!Equals.holds(&a, &Value::from(25u64), true));
        assert!(None.holds(&a, &Value::from(25u64), true));
        let nan = Value::from(f64::NAN);
        assert!(!Equals.holds(&nan, &nan, true));
        assert!(!GreaterThan.holds(&nan, &Value::from(1.0), true));
    }

    #[test]
    fn string_rules_and_case() {
        use FilterRule::*;
        let s = Value::from("Hello World");
        assert!(Contains.holds(&s, &Value::from("World"), true));
        assert!(!Contains.holds(&s, &Value::from("world"), true));
        assert!(Contains.holds(&s, &Value::from("world"), false));
        assert!(DoesNotContain.holds(&s, &Value::from("world"), true));
        assert!(Equals.holds(&s, &Value::from("hello world"), false));
        assert!(!Equals.holds(&s, &Value::from("hello world"), true));
    }

    #[test]
    fn push_validation() {
        let mut filter = Filter::new("team");
        let root = filter.root();
        let age = filter.push(root, "age", 3u32, FilterRule::LessThan).unwrap();
        assert!(matches!(
            filter.push(age, "x", 1u32, FilterRule::Equals),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            filter.push(root, "x", "a", FilterRule::GreaterThan),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            filter.push(root, "x", 1u32, FilterRule::Contains),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            filter.push(root, "x", Value::Record(1), FilterRule::None),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            filter.push(FilterId(9), "x", 1u32, FilterRule::None),
            Err(Error::InvalidFilter(_))
        ));
        let m = filter.push_record(root, "member").unwrap();
        filter.push(m, "name", "bob", FilterRule::Contains).unwrap();
        assert_eq!(filter.len(), 4);
        assert_eq!(filter.key(m), Some("member"));
        let pairs = filter
            .pairs()
            .into_iter()
            .map(|(p, c)| (p.key.clone(), c.key.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("team".to_owned(), "age".to_owned()),
                ("team".to_owned(), "member".to_owned()),
                ("member".to_owned(), "name".to_owned()),
            ]
        );
    }
}
