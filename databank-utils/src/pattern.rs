//! Textual filter patterns for the command line
//!
//! A pattern is a `/` separated path of record keys below the filter root, optionally ending
//! in a data point condition:
//!
//! ```text
//! member                  a member record exists
//! member/age>u32:18       a member whose u32 age is greater than 18
//! member/name~ada         a member whose name contains "ada"
//! ```
//!
//! Patterns that share a record path share the record pattern, so `member/age>u32:18` and
//! `member/name=ada` must hold for the same member.
use std::{collections::BTreeMap, str::FromStr};

use anyhow::Context;
use databank::{Filter, FilterId, FilterRule, Value, ValueKind};

use crate::config::kind_by_name;

/// Operators, longest first so that `>=` is not read as `>`
const OPERATORS: &[(&str, FilterRule)] = &[
    (">=", FilterRule::GreaterOrEqual),
    ("<=", FilterRule::LessOrEqual),
    ("!=", FilterRule::NotEquals),
    ("!~", FilterRule::DoesNotContain),
    (">", FilterRule::GreaterThan),
    ("<", FilterRule::LessThan),
    ("=", FilterRule::Equals),
    ("~", FilterRule::Contains),
    ("?", FilterRule::None),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub rule: FilterRule,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub records: Vec<String>,
    pub condition: Option<Condition>,
}

impl FromStr for Pattern {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut segments = s.split('/').map(str::to_owned).collect::<Vec<_>>();
        let last = segments.pop().unwrap_or_default();
        let condition = OPERATORS
            .iter()
            .filter_map(|(op, rule)| last.find(op).map(|at| (at, *op, *rule)))
            // the leftmost operator wins, ties go to the longer one
            .min_by_key(|(at, op, _)| (*at, usize::MAX - op.len()));
        let condition = match condition {
            Some((at, op, rule)) => Some(Condition {
                key: last[..at].to_owned(),
                rule,
                value: parse_value(&last[at + op.len()..])
                    .with_context(|| format!("in pattern {:?}", s))?,
            }),
            None => {
                segments.push(last);
                None
            }
        };
        if segments.iter().any(String::is_empty)
            || condition.as_ref().map(|c| c.key.is_empty()) == Some(true)
        {
            anyhow::bail!("empty key in pattern {:?}", s);
        }
        Ok(Pattern {
            records: segments,
            condition,
        })
    }
}

/// Parse `kind:text`, or plain text as a string.
pub fn parse_value(text: &str) -> anyhow::Result<Value> {
    let (kind, text) = match text.find(':') {
        Some(at) => match kind_by_name(&text[..at]) {
            Ok(kind) => (kind, &text[at + 1..]),
            Err(_) => (ValueKind::String, text),
        },
        None => (ValueKind::String, text),
    };
    let bad = || format!("{:?} is not a valid {}", text, kind);
    Ok(match kind {
        ValueKind::String => Value::from(text),
        ValueKind::Bin => Value::Bin(hex::decode(text.trim_start_matches("0x")).with_context(bad)?),
        ValueKind::U64 => Value::U64(text.parse().with_context(bad)?),
        ValueKind::U32 => Value::U32(text.parse().with_context(bad)?),
        ValueKind::B32 => Value::B32(text.parse().with_context(bad)?),
        ValueKind::C8 => match text.as_bytes() {
            [c] => Value::C8(*c),
            _ => anyhow::bail!(bad()),
        },
        ValueKind::I64 => Value::I64(text.parse().with_context(bad)?),
        ValueKind::I32 => Value::I32(text.parse().with_context(bad)?),
        ValueKind::F32 => Value::F32(text.parse().with_context(bad)?),
        ValueKind::F64 => Value::F64(text.parse().with_context(bad)?),
        ValueKind::None | ValueKind::Record | ValueKind::Root => anyhow::bail!(bad()),
    })
}

/// Build a filter from a root key and a list of patterns.
pub fn build_filter(root_key: &str, patterns: &[Pattern]) -> anyhow::Result<Filter> {
    let mut filter = Filter::new(root_key);
    let mut records: BTreeMap<Vec<String>, FilterId> = BTreeMap::new();
    for pattern in patterns {
        let mut parent = filter.root();
        for depth in 1..=pattern.records.len() {
            let path = pattern.records[..depth].to_vec();
            parent = match records.get(&path) {
                Some(id) => *id,
                None => {
                    let id = filter.push_record(parent, &pattern.records[depth - 1])?;
                    records.insert(path, id);
                    id
                }
            };
        }
        if let Some(condition) = &pattern.condition {
            filter.push(
                parent,
                &condition.key,
                condition.value.clone(),
                condition.rule,
            )?;
        }
    }
    Ok(filter)
}
