use std::{collections::BTreeMap, io::Write};

use databank::{Bank, NodeId, Value, ValueKind};
use serde_json::json;

/// Render a value for humans, binaries as hex.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Bin(bytes) => format!("0x{}", hex::encode(bytes)),
        Value::U64(x) => x.to_string(),
        Value::U32(x) => x.to_string(),
        Value::I64(x) => x.to_string(),
        Value::I32(x) => x.to_string(),
        Value::F32(x) => x.to_string(),
        Value::F64(x) => x.to_string(),
        other => other.to_string(),
    }
}

/// Write the subtree of `start` as an indented outline, one node per line.
pub fn dump(bank: &Bank, start: NodeId, mut out: impl Write) -> anyhow::Result<()> {
    writeln!(out, "{}", describe(bank, start)?)?;
    for (node, depth) in bank.walk(start)? {
        writeln!(out, "{:indent$}{}", "", describe(bank, node)?, indent = depth * 2)?;
    }
    Ok(())
}

fn describe(bank: &Bank, node: NodeId) -> anyhow::Result<String> {
    let key = bank.key(node)?;
    let mut res = match bank.kind(node)? {
        ValueKind::Root => "root".to_owned(),
        ValueKind::Record => format!("{} #{}", key, bank.primary_key(node)?),
        kind => format!("{}: {} = {}", key, kind, format_value(&bank.value(node)?)),
    };
    if let Some(display) = bank.display(node)? {
        res.push_str(&format!(" ({})", display));
    }
    Ok(res)
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::None | Value::Root => serde_json::Value::Null,
        Value::String(x) => json!(x),
        Value::Bin(x) => json!(hex::encode(x)),
        Value::U64(x) | Value::Record(x) => json!(x),
        Value::U32(x) => json!(x),
        Value::B32(x) => json!(x),
        Value::C8(x) => json!(x),
        Value::I64(x) => json!(x),
        Value::I32(x) => json!(x),
        // non finite floats become null
        Value::F32(x) => json!(x),
        Value::F64(x) => json!(x),
    }
}

/// Convert the subtree of a record (or the root) to JSON.
///
/// Records become objects with their key, primary key, data points and child records.
/// Data points keep their kind, so that the dump can be told apart from a schema-ful export.
pub fn to_json(bank: &Bank, record: NodeId) -> anyhow::Result<serde_json::Value> {
    let mut points = Vec::new();
    let mut records = Vec::new();
    for child in bank.children(record)? {
        match bank.kind(child)? {
            ValueKind::Record => records.push(to_json(bank, child)?),
            kind => points.push(json!({
                "key": bank.key(child)?,
                "kind": kind.name(),
                "value": json_value(&bank.value(child)?),
            })),
        }
    }
    let primary_key = match bank.kind(record)? {
        ValueKind::Root => serde_json::Value::Null,
        _ => json!(bank.primary_key(record)?),
    };
    Ok(json!({
        "key": bank.key(record)?,
        "primaryKey": primary_key,
        "dataPoints": points,
        "records": records,
    }))
}

type Node<'a> = &'a NodeDescriptor;
type Edge<'a> = (usize, usize);

struct BankGraph {
    nodes: BTreeMap<usize, NodeDescriptor>,
    edges: Vec<(usize, usize)>,
}

enum NodeDescriptor {
    Root { id: usize },
    Record { id: usize, key: String, pk: u64 },
    DataPoint { id: usize, label: String },
}

impl NodeDescriptor {
    fn id(&self) -> usize {
        match self {
            NodeDescriptor::Root { id }
            | NodeDescriptor::Record { id, .. }
            | NodeDescriptor::DataPoint { id, .. } => *id,
        }
    }
}

impl<'a> dot::Labeller<'a, Node<'a>, Edge<'a>> for BankGraph {
    fn graph_id(&'a self) -> dot::Id<'a> {
        dot::Id::new("bank").unwrap()
    }

    fn node_id(&'a self, n: &Node<'a>) -> dot::Id<'a> {
        dot::Id::new(format!("N{}", n.id())).unwrap()
    }

    fn node_label(&'a self, n: &Node<'a>) -> dot::LabelText<'a> {
        let label = match n {
            NodeDescriptor::Root { .. } => "root".to_owned(),
            NodeDescriptor::Record { key, pk, .. } => format!("{} #{}", key, pk),
            NodeDescriptor::DataPoint { label, .. } => label.clone(),
        };
        dot::LabelText::label(label)
    }

    fn node_shape(&'a self, n: &Node<'a>) -> Option<dot::LabelText<'a>> {
        let shape = match n {
            NodeDescriptor::Root { .. } => "doublecircle",
            NodeDescriptor::Record { .. } => "box",
            NodeDescriptor::DataPoint { .. } => "plaintext",
        };
        Some(dot::LabelText::label(shape))
    }
}

impl<'a> dot::GraphWalk<'a, Node<'a>, Edge<'a>> for BankGraph {
    fn nodes(&'a self) -> dot::Nodes<'a, Node<'a>> {
        self.nodes.values().collect()
    }

    fn edges(&'a self) -> dot::Edges<'a, Edge<'a>> {
        self.edges.iter().cloned().collect()
    }

    fn source(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.0]
    }

    fn target(&'a self, edge: &Edge<'a>) -> Node<'a> {
        &self.nodes[&edge.1]
    }
}

/// Write the subtree of `start` as a dot graph. Can be piped directly into
/// `dot -Tpng -o bank.png`.
pub fn graph(bank: &Bank, start: NodeId, mut out: impl Write) -> anyhow::Result<()> {
    let mut ids = BTreeMap::new();
    let mut nodes = BTreeMap::new();
    let mut edges = Vec::new();
    let all = std::iter::once(start).chain(bank.walk(start)?.into_iter().map(|(node, _)| node));
    for node in all {
        let id = ids.len();
        ids.insert(node.slot(), id);
        let descriptor = match bank.kind(node)? {
            ValueKind::Root => NodeDescriptor::Root { id },
            ValueKind::Record => NodeDescriptor::Record {
                id,
                key: bank.key(node)?,
                pk: bank.primary_key(node)?,
            },
            _ => NodeDescriptor::DataPoint {
                id,
                label: format!("{} = {}", bank.key(node)?, format_value(&bank.value(node)?)),
            },
        };
        nodes.insert(id, descriptor);
        if node != start {
            if let Some(parent) = bank.parent(node)? {
                if let Some(parent_id) = ids.get(&parent.slot()) {
                    edges.push((*parent_id, id));
                }
            }
        }
    }
    dot::render(&BankGraph { nodes, edges }, &mut out)?;
    Ok(())
}
