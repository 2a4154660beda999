use common::{debug_bank, random_bank, test, Shape};
use databank::{Bank, BankConfig, Error, TypeMask, Value, ValueKind, MAGIC};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;

mod common;

fn read_all(bank: &Bank) -> databank::Result<Vec<Shape>> {
    bank.children(bank.root())?
        .into_iter()
        .map(|record| Shape::read(bank, record))
        .collect()
}

#[quickcheck]
fn roundtrip(shapes: Vec<Shape>) -> TestResult {
    test(|| {
        let bank = debug_bank();
        for shape in &shapes {
            shape.build(&bank, bank.root())?;
        }
        let bytes = bank.serialize()?;
        let (copy, report) = Bank::deserialize_with_report(&bytes)?;
        Ok(report.is_complete()
            && report.nodes_loaded == bank.node_count() - 1
            && read_all(&copy)? == shapes
            && copy.serialize()? == bytes)
    })
}

#[test]
fn header_fields_survive() {
    let bank = Bank::create(BankConfig {
        primary_key_index: 1000,
        primary_key_hash_table_slot_count: 64,
        disabled_types: TypeMask::BIN | TypeMask::I64,
        ..BankConfig::default()
    })
    .unwrap();
    let r = bank.add_record(bank.root(), "r", None).unwrap();
    bank.set_data_point(r, "x", 1u32, None).unwrap();
    let bytes = bank.serialize().unwrap();
    assert_eq!(&bytes[..4], &MAGIC.to_ne_bytes());
    let copy = Bank::deserialize(&bytes).unwrap();
    assert_eq!(copy.primary_key_index(), 1001);
    assert_eq!(copy.slot_count(), 64);
    assert_eq!(copy.disabled_types(), TypeMask::BIN | TypeMask::I64);
    let r = copy.get_record_with_id(1000).unwrap();
    assert_eq!(copy.get_value(r, "x").unwrap(), Value::U32(1));
    // the counter keeps going where it left off
    let next = copy.add_record(copy.root(), "s", None).unwrap();
    assert_eq!(copy.primary_key(next).unwrap(), 1001);
}

#[test]
fn serialize_into_a_file() {
    let bank = random_bank(7, 50).unwrap();
    let mut file = tempfile::tempfile().unwrap();
    let written = bank.serialize_into(&mut file).unwrap();
    use std::io::{Read, Seek, SeekFrom};
    file.seek(SeekFrom::Start(0)).unwrap();
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).unwrap();
    assert_eq!(bytes.len(), written);
    assert_eq!(bytes, bank.serialize().unwrap());
}

#[test]
fn truncated_input_gives_a_partial_bank() {
    let bank = random_bank(3, 100).unwrap();
    let bytes = bank.serialize().unwrap();
    let total = bank.node_count() - 1;
    let mut last = 0;
    // every cut point yields a consistent prefix of the tree
    for len in (24..bytes.len()).step_by(37) {
        let (partial, report) = Bank::deserialize_with_report(&bytes[..len]).unwrap();
        assert!(report.nodes_loaded < total);
        assert!(report.nodes_loaded >= last);
        last = report.nodes_loaded;
        assert_eq!(partial.node_count() - 1, report.nodes_loaded);
        match report.stopped_by {
            // the cut fell on a node boundary
            None => {}
            Some(Error::Truncated(offset)) => assert!(offset <= len),
            Some(other) => panic!("unexpected error {}", other),
        }
        for (node, _) in partial.walk(partial.root()).unwrap() {
            if partial.kind(node).unwrap() == ValueKind::Record {
                let pk = partial.primary_key(node).unwrap();
                let original = bank.get_record_with_id(pk).unwrap();
                assert_eq!(partial.key(node).unwrap(), bank.key(original).unwrap());
            }
        }
    }
    let (_, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.nodes_loaded, total);
}

fn node(kind: u32, key: &str, parent: u64, payload: &[u8]) -> Vec<u8> {
    let mut res = Vec::new();
    res.extend_from_slice(&kind.to_ne_bytes());
    res.extend_from_slice(&(key.len() as u64).to_ne_bytes());
    res.extend_from_slice(key.as_bytes());
    res.extend_from_slice(&parent.to_ne_bytes());
    res.extend_from_slice(payload);
    res
}

fn header() -> Vec<u8> {
    let mut res = Vec::new();
    res.extend_from_slice(&MAGIC.to_ne_bytes());
    res.extend_from_slice(&10u64.to_ne_bytes());
    res.extend_from_slice(&16u64.to_ne_bytes());
    res.extend_from_slice(&0u32.to_ne_bytes());
    res
}

#[test]
fn invalid_kind_stops_the_load() {
    let mut bytes = header();
    bytes.extend(node(1 << 10, "a", u64::MAX, &1u64.to_ne_bytes()));
    bytes.extend(node(3, "bad", 1, &[0; 8]));
    bytes.extend(node(1 << 10, "b", u64::MAX, &2u64.to_ne_bytes()));
    let (bank, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert_eq!(report.nodes_loaded, 1);
    assert!(matches!(report.stopped_by, Some(Error::InvalidKind(3))));
    assert!(bank.get_record_with_id(1).is_some());
    assert!(bank.get_record_with_id(2).is_none());

    // the root kind is not valid inside the stream either
    let mut bytes = header();
    bytes.extend(node(1 << 11, "root", u64::MAX, &[]));
    let (_, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert!(matches!(report.stopped_by, Some(Error::InvalidKind(_))));
}

#[test]
fn dangling_parent_stops_the_load() {
    let mut bytes = header();
    bytes.extend(node(1 << 10, "a", u64::MAX, &1u64.to_ne_bytes()));
    bytes.extend(node(1 << 3, "x", 1, &7u32.to_ne_bytes()));
    bytes.extend(node(1 << 3, "y", 99, &8u32.to_ne_bytes()));
    let bank = Bank::deserialize(&bytes).unwrap();
    let a = bank.get_record_with_id(1).unwrap();
    assert_eq!(bank.get_value(a, "x").unwrap(), Value::U32(7));
    let (_, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert!(matches!(report.stopped_by, Some(Error::UnknownParent(99))));
}

#[test]
fn duplicate_data_points_collapse() {
    let mut bytes = header();
    bytes.extend(node(1 << 10, "a", u64::MAX, &1u64.to_ne_bytes()));
    bytes.extend(node(1 << 3, "x", 1, &7u32.to_ne_bytes()));
    bytes.extend(node(1 << 3, "x", 1, &8u32.to_ne_bytes()));
    bytes.extend(node(1 << 2, "x", 1, &9u64.to_ne_bytes()));
    let (bank, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert!(report.is_complete());
    assert_eq!(report.nodes_loaded, 4);
    let a = bank.get_record_with_id(1).unwrap();
    assert_eq!(bank.children(a).unwrap().len(), 2);
    assert_eq!(bank.get_value(a, "x").unwrap(), Value::U32(8));
}

#[test]
fn data_point_under_root_is_rejected() {
    let mut bytes = header();
    bytes.extend(node(1 << 3, "x", u64::MAX, &7u32.to_ne_bytes()));
    let (bank, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert!(matches!(report.stopped_by, Some(Error::NotARecord { .. })));
    assert!(bank.children(bank.root()).unwrap().is_empty());
}

#[test]
fn disabled_kinds_in_the_stream() {
    let mut bytes = header();
    // disable strings
    bytes[20..24].copy_from_slice(&1u32.to_ne_bytes());
    bytes.extend(node(1 << 10, "a", u64::MAX, &1u64.to_ne_bytes()));
    let mut payload = 2u64.to_ne_bytes().to_vec();
    payload.extend_from_slice(b"hi");
    bytes.extend(node(1, "s", 1, &payload));
    let (_, report) = Bank::deserialize_with_report(&bytes).unwrap();
    assert_eq!(report.nodes_loaded, 1);
    assert!(matches!(
        report.stopped_by,
        Some(Error::TypeDisabled(ValueKind::String))
    ));
}

#[test]
fn every_scalar_kind_roundtrips() {
    let bank = debug_bank();
    let r = bank.add_record(bank.root(), "r", None).unwrap();
    let values = vec![
        Value::from("ünïcode"),
        Value::from(vec![0u8, 255, 7]),
        Value::from(u64::MAX - 1),
        Value::from(u32::MAX),
        Value::from(true),
        Value::from(false),
        Value::from(b'z'),
        Value::from(i64::MIN),
        Value::from(-5i32),
        Value::from(0.25f32),
        Value::from(-1e300f64),
    ];
    for (i, value) in values.iter().enumerate() {
        bank.set_data_point(r, &format!("k{}", i), value.clone(), None)
            .unwrap();
    }
    let copy = Bank::deserialize(&bank.serialize().unwrap()).unwrap();
    let r = copy.get_record_with_id(0).unwrap();
    for (i, value) in values.iter().enumerate() {
        assert_eq!(&copy.get_value(r, &format!("k{}", i)).unwrap(), value);
    }
}
