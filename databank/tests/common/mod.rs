#![allow(dead_code)]
//! helper methods for the tests
use databank::{Bank, BankConfig, NodeId, Result, Value, ValueKind};
use quickcheck::{Arbitrary, Gen, TestResult};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use std::sync::Once;

static LOGGING: Once = Once::new();

/// log to the test output, filtered by RUST_LOG
pub fn init_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test(f: impl FnOnce() -> Result<bool>) -> TestResult {
    match f() {
        Ok(success) => TestResult::from_bool(success),
        Err(cause) => TestResult::error(cause.to_string()),
    }
}

pub fn debug_bank() -> Bank {
    init_logging();
    Bank::create(BankConfig::debug()).unwrap()
}

/// A data point value that survives a trip through the binary format unchanged
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar(pub Value);

impl Arbitrary for Scalar {
    fn arbitrary(g: &mut Gen) -> Self {
        let choice = *g.choose(&[0u8, 1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        Scalar(match choice {
            0 => Value::String(String::arbitrary(g)),
            1 => Value::Bin(Vec::arbitrary(g)),
            2 => Value::U64(u64::arbitrary(g)),
            3 => Value::U32(u32::arbitrary(g)),
            4 => Value::B32(bool::arbitrary(g)),
            5 => Value::C8(u8::arbitrary(g)),
            6 => Value::I64(i64::arbitrary(g)),
            7 => Value::I32(i32::arbitrary(g)),
            // NaN never compares equal, so stick to finite floats
            8 => Value::F32(i16::arbitrary(g) as f32 / 8.0),
            _ => Value::F64(i32::arbitrary(g) as f64 / 16.0),
        })
    }
}

/// Description of a record subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub key: String,
    pub points: Vec<(String, Scalar)>,
    pub children: Vec<Shape>,
}

impl Shape {
    fn arbitrary_depth(g: &mut Gen, depth: usize) -> Self {
        let keys = ["a", "b", "c", "item", "name", "score"];
        let key = (*g.choose(&keys).unwrap()).to_owned();
        let n_points = usize::arbitrary(g) % 4;
        let mut points: Vec<(String, Scalar)> = Vec::new();
        for _ in 0..n_points {
            let key = (*g.choose(&keys).unwrap()).to_owned();
            let value = Scalar::arbitrary(g);
            // same key and kind would collapse into one data point
            if points
                .iter()
                .any(|(k, v)| *k == key && v.0.kind() == value.0.kind())
            {
                continue;
            }
            points.push((key, value));
        }
        let n_children = if depth == 0 { 0 } else { usize::arbitrary(g) % 3 };
        let children = (0..n_children)
            .map(|_| Shape::arbitrary_depth(g, depth - 1))
            .collect();
        Shape {
            key,
            points,
            children,
        }
    }

    /// Add this shape as a record below `parent`.
    pub fn build(&self, bank: &Bank, parent: NodeId) -> Result<NodeId> {
        let record = bank.add_record(parent, &self.key, None)?;
        for (key, value) in &self.points {
            bank.set_data_point(record, key, value.0.clone(), None)?;
        }
        for child in &self.children {
            child.build(bank, record)?;
        }
        Ok(record)
    }

    /// read back a record subtree, data points first
    pub fn read(bank: &Bank, record: NodeId) -> Result<Self> {
        let mut points = Vec::new();
        let mut children = Vec::new();
        for child in bank.children(record)? {
            if bank.kind(child)? == ValueKind::Record {
                children.push(Shape::read(bank, child)?);
            } else {
                points.push((bank.key(child)?, Scalar(bank.value(child)?)));
            }
        }
        Ok(Shape {
            key: bank.key(record)?,
            points,
            children,
        })
    }

    pub fn record_count(&self) -> usize {
        1 + self.children.iter().map(Shape::record_count).sum::<usize>()
    }
}

impl Arbitrary for Shape {
    fn arbitrary(g: &mut Gen) -> Self {
        Shape::arbitrary_depth(g, 3)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let this = self.clone();
        Box::new(
            (0..self.children.len())
                .map(move |i| {
                    let mut res = this.clone();
                    res.children.remove(i);
                    res
                })
                .chain(self.children.clone().into_iter()),
        )
    }
}

/// Build a deterministic random bank with `records` records, each with a few data points.
pub fn random_bank(seed: u64, records: usize) -> Result<Bank> {
    let mut rng = ChaChaRng::seed_from_u64(seed);
    let bank = debug_bank();
    let mut parents = vec![bank.root()];
    for i in 0..records {
        let parent = parents[rng.gen_range(0..parents.len())];
        let record = bank.add_record(parent, &format!("r{}", i % 7), None)?;
        bank.set_data_point(record, "score", rng.gen::<u32>() % 100, None)?;
        if rng.gen_bool(0.5) {
            bank.set_data_point(record, "name", format!("name {}", i), None)?;
        }
        parents.push(record);
    }
    Ok(bank)
}
