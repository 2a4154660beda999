//! Binary serialization of a whole bank
//!
//! The format is a header followed by every node except the root, in preorder. All integers
//! are in native byte order, there is no padding.
//!
//! ```text
//! header: magic u32 | primary key counter u64 | hash slot count u64 | disabled kinds u32
//! node:   kind bits u32 | key length u64 | key | parent primary key u64 | payload
//! ```
//!
//! The parent of a top level record is written as `u64::MAX`. Strings and binaries are
//! written as a u64 length followed by the bytes, records as their primary key, bools as a u32.
//! Display labels are not stored.
use crate::{
    bank::{Bank, BankConfig, ROOT_PRIMARY_KEY},
    error::{Error, Result},
    linkage::{Descendants, Link, TreeLinks},
    value::{TypeMask, Value, ValueKind},
};
use std::{convert::TryFrom, io::Write};
use tracing::{debug, trace};

/// First four bytes of every serialized bank
pub const MAGIC: u32 = 0x2E6D_6150;

/// Outcome of loading a bank
#[derive(Debug, Default)]
pub struct LoadReport {
    /// nodes applied to the bank, not counting the root
    pub nodes_loaded: usize,
    /// the error that ended the load early, if any
    pub stopped_by: Option<Error>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.stopped_by.is_none()
    }
}

struct Writer<W> {
    inner: W,
    written: usize,
}

impl<W: Write> Writer<W> {
    fn bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len();
        Ok(())
    }

    fn u32(&mut self, value: u32) -> Result<()> {
        self.bytes(&value.to_ne_bytes())
    }

    fn u64(&mut self, value: u64) -> Result<()> {
        self.bytes(&value.to_ne_bytes())
    }

    fn sized(&mut self, bytes: &[u8]) -> Result<()> {
        self.u64(bytes.len() as u64)?;
        self.bytes(bytes)
    }

    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::String(x) => self.sized(x.as_bytes()),
            Value::Bin(x) => self.sized(x),
            Value::U64(x) | Value::Record(x) => self.u64(*x),
            Value::U32(x) => self.u32(*x),
            Value::B32(x) => self.u32(u32::from(*x)),
            Value::C8(x) => self.bytes(&[*x]),
            Value::I64(x) => self.bytes(&x.to_ne_bytes()),
            Value::I32(x) => self.bytes(&x.to_ne_bytes()),
            Value::F32(x) => self.bytes(&x.to_ne_bytes()),
            Value::F64(x) => self.bytes(&x.to_ne_bytes()),
            Value::None | Value::Root => Err(Error::InvalidKind(value.kind().bits())),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, len: u64) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.offset;
        if len > remaining as u64 {
            return Err(Error::Truncated(self.offset));
        }
        let res = &self.bytes[self.offset..self.offset + len as usize];
        self.offset += len as usize;
        Ok(res)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut res = [0u8; N];
        res.copy_from_slice(self.take(N as u64)?);
        Ok(res)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_ne_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_ne_bytes(self.array()?))
    }

    fn sized(&mut self) -> Result<&'a [u8]> {
        let len = self.u64()?;
        self.take(len)
    }

    fn value(&mut self, kind: ValueKind) -> Result<Value> {
        Ok(match kind {
            ValueKind::String => Value::String(String::from_utf8_lossy(self.sized()?).into_owned()),
            ValueKind::Bin => Value::Bin(self.sized()?.to_vec()),
            ValueKind::U64 => Value::U64(self.u64()?),
            ValueKind::Record => Value::Record(self.u64()?),
            ValueKind::U32 => Value::U32(self.u32()?),
            ValueKind::B32 => Value::B32(self.u32()? != 0),
            ValueKind::C8 => Value::C8(self.array::<1>()?[0]),
            ValueKind::I64 => Value::I64(i64::from_ne_bytes(self.array()?)),
            ValueKind::I32 => Value::I32(i32::from_ne_bytes(self.array()?)),
            ValueKind::F32 => Value::F32(f32::from_ne_bytes(self.array()?)),
            ValueKind::F64 => Value::F64(f64::from_ne_bytes(self.array()?)),
            ValueKind::None | ValueKind::Root => return Err(Error::InvalidKind(kind.bits())),
        })
    }
}

impl Bank {
    /// Serialize the whole bank.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut res = Vec::with_capacity(self.memory_used().min(1 << 20) as usize);
        self.serialize_into(&mut res)?;
        Ok(res)
    }

    /// Serialize the whole bank into a writer, returning the number of bytes written.
    ///
    /// The bank lock is held for reading during the entire walk, so no records can be added
    /// or deleted meanwhile.
    pub fn serialize_into<W: Write>(&self, out: W) -> Result<usize> {
        let _span = self.span().enter();
        #[cfg(feature = "metrics")]
        let _timer = crate::bank::SERIALIZE_HIST.start_timer();
        let mut out = Writer {
            inner: out,
            written: 0,
        };
        let index = self.index.read();
        let links = self.arena.links();
        let write = |out: &mut Writer<W>| -> Result<usize> {
            out.u32(MAGIC)?;
            out.u64(index.next_primary_key())?;
            out.u64(index.slot_count())?;
            out.u32(self.disabled_types.bits())?;
            let mut count = 0;
            for (slot, _) in Descendants::new(&links, self.root.slot) {
                let node = self.arena.get(self.arena.id(slot))?;
                let parent = links
                    .link(slot, Link::Parent)
                    .and_then(|parent| self.arena.node(parent))
                    .and_then(|parent| parent.primary_key())
                    .unwrap_or(ROOT_PRIMARY_KEY);
                let payload = node.payload();
                trace!("writing {} {:?} under {}", node.kind(), node.key(), parent);
                out.u32(node.kind().bits())?;
                out.sized(node.key().as_bytes())?;
                out.u64(parent)?;
                out.value(&payload.value)?;
                count += 1;
            }
            out.inner.flush()?;
            Ok(count)
        };
        let count = write(&mut out).map_err(Error::report)?;
        debug!("serialized {} nodes into {} bytes", count, out.written);
        #[cfg(feature = "metrics")]
        crate::bank::SERIALIZE_SIZE_HIST.observe(out.written as f64);
        Ok(out.written)
    }

    /// Rebuild a bank from its serialized form.
    ///
    /// Fails if the header is bad. A problem further in is logged and ends the load, and what
    /// was loaded up to that point is returned. Use [deserialize_with_report] to tell the two
    /// apart.
    ///
    /// [deserialize_with_report]: #method.deserialize_with_report
    pub fn deserialize(bytes: &[u8]) -> Result<Bank> {
        Self::deserialize_with_report(bytes).map(|(bank, _)| bank)
    }

    /// Rebuild a bank, also reporting whether the input was consumed completely.
    ///
    /// Records and data points are applied through [add_record_with_pk] and [set_data_point],
    /// so data points with the same key and kind under one record collapse into one.
    ///
    /// [add_record_with_pk]: #method.add_record_with_pk
    /// [set_data_point]: #method.set_data_point
    pub fn deserialize_with_report(bytes: &[u8]) -> Result<(Bank, LoadReport)> {
        #[cfg(feature = "metrics")]
        let _timer = crate::bank::DESERIALIZE_HIST.start_timer();
        #[cfg(feature = "metrics")]
        crate::bank::DESERIALIZE_SIZE_HIST.observe(bytes.len() as f64);
        let mut reader = Reader { bytes, offset: 0 };
        let header = |reader: &mut Reader| -> Result<(u32, u64, u64, u32)> {
            Ok((reader.u32()?, reader.u64()?, reader.u64()?, reader.u32()?))
        };
        let (magic, counter, slot_count, disabled) = match header(&mut reader) {
            Ok((magic, ..)) if magic != MAGIC => return Err(Error::BadMagic(magic).report()),
            Ok(header) => header,
            Err(_) if bytes.len() >= 4 && bytes[..4] != MAGIC.to_ne_bytes() => {
                let magic = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                return Err(Error::BadMagic(magic).report());
            }
            Err(_) => return Err(Error::TruncatedHeader.report()),
        };
        let config = BankConfig {
            name: None,
            total_memory_cap: 0,
            primary_key_hash_table_slot_count: slot_count,
            primary_key_index: counter,
            disabled_types: TypeMask::from_bits_retain(disabled),
        };
        // a bad slot count in a stream is bad input
        config.validate().map_err(|err| match err {
            Error::InvalidConfig(why) => Error::BadHeader(why).report(),
            other => other.report(),
        })?;
        let bank = Bank::create(config)?;
        let mut report = LoadReport::default();
        {
            let _span = bank.span().enter();
            while !reader.is_empty() {
                if let Err(cause) = bank.read_node(&mut reader) {
                    report.stopped_by = Some(cause);
                    break;
                }
                report.nodes_loaded += 1;
            }
            debug!(
                "loaded {} nodes from {} bytes, complete: {}",
                report.nodes_loaded,
                bytes.len(),
                report.is_complete()
            );
        }
        Ok((bank, report))
    }

    fn read_node(&self, reader: &mut Reader) -> Result<()> {
        let bits = reader.u32().map_err(Error::report)?;
        let kind = ValueKind::try_from(bits).map_err(|bits| Error::InvalidKind(bits).report())?;
        let key = reader.sized().map_err(Error::report)?;
        let key = String::from_utf8_lossy(key);
        let parent_pk = reader.u64().map_err(Error::report)?;
        let value = reader.value(kind).map_err(Error::report)?;
        trace!("read {} {:?} under {}", kind, key, parent_pk);
        let parent = if parent_pk == ROOT_PRIMARY_KEY {
            self.root()
        } else {
            self.get_record_with_id(parent_pk)
                .ok_or_else(|| Error::UnknownParent(parent_pk).report())?
        };
        match value {
            Value::Record(primary_key) => self.add_record_with_pk(parent, &key, primary_key, None)?,
            value => self.set_data_point(parent, &key, value, None)?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(magic: u32, counter: u64, slots: u64, disabled: u32) -> Vec<u8> {
        let mut res = Vec::new();
        res.extend_from_slice(&magic.to_ne_bytes());
        res.extend_from_slice(&counter.to_ne_bytes());
        res.extend_from_slice(&slots.to_ne_bytes());
        res.extend_from_slice(&disabled.to_ne_bytes());
        res
    }

    #[test]
    fn empty_bank_is_just_a_header() {
        let bank = Bank::create(BankConfig::debug()).unwrap();
        let bytes = bank.serialize().unwrap();
        assert_eq!(bytes, header(MAGIC, 0, 16, 0));
        let (copy, report) = Bank::deserialize_with_report(&bytes).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.nodes_loaded, 0);
        assert_eq!(copy.slot_count(), 16);
        assert!(copy.children(copy.root()).unwrap().is_empty());
    }

    #[test]
    fn node_layout() {
        let bank = Bank::create(BankConfig::debug()).unwrap();
        let r = bank.add_record(bank.root(), "r", None).unwrap();
        bank.set_data_point(r, "b", true, None).unwrap();
        let bytes = bank.serialize().unwrap();
        let mut expected = header(MAGIC, 1, 16, 0);
        expected.extend_from_slice(&(1u32 << 10).to_ne_bytes());
        expected.extend_from_slice(&1u64.to_ne_bytes());
        expected.extend_from_slice(b"r");
        expected.extend_from_slice(&u64::MAX.to_ne_bytes());
        expected.extend_from_slice(&0u64.to_ne_bytes());
        expected.extend_from_slice(&(1u32 << 4).to_ne_bytes());
        expected.extend_from_slice(&1u64.to_ne_bytes());
        expected.extend_from_slice(b"b");
        expected.extend_from_slice(&0u64.to_ne_bytes());
        expected.extend_from_slice(&1u32.to_ne_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn header_errors() {
        assert!(matches!(
            Bank::deserialize(&header(0x1234_5678, 0, 16, 0)),
            Err(Error::BadMagic(0x1234_5678))
        ));
        assert!(matches!(
            Bank::deserialize(&header(MAGIC, 0, 16, 0)[..20]),
            Err(Error::TruncatedHeader)
        ));
        assert!(matches!(Bank::deserialize(&[]), Err(Error::TruncatedHeader)));
        assert!(matches!(
            Bank::deserialize(&[1, 2, 3, 4, 5]),
            Err(Error::BadMagic(_))
        ));
        for slots in [17u64, 1 << 25].iter().copied() {
            let err = Bank::deserialize(&header(MAGIC, 0, slots, 0)).unwrap_err();
            assert!(matches!(err, Error::BadHeader(_)));
            assert_eq!(err.severity(), crate::error::Severity::Critical);
        }
    }
}
