//! # Databank
//!
//! An embeddable, thread safe, schema-less hierarchical data store.
//!
//! A [Bank] holds a single tree. Below its root, callers build *records*, which can have
//! children and are addressable by a primary key, and *data points*, which are typed leaf
//! values of a record. Keys of nodes are plain strings and do not need to be unique among
//! siblings; lookups by key return the first match.
//!
//! ```
//! use databank::{Bank, BankConfig, Value};
//!
//! let bank = Bank::create(BankConfig::default()).unwrap();
//! let user = bank.add_record(bank.root(), "user", None).unwrap();
//! bank.set_data_point(user, "name", "alice", None).unwrap();
//! let pk = bank.primary_key(user).unwrap();
//! assert_eq!(bank.get_record_with_id(pk), Some(user));
//! assert_eq!(bank.get_value(user, "name").unwrap(), Value::from("alice"));
//! ```
//!
//! # Indexing
//!
//! Every record is entered into a fixed size hash table keyed by its primary key, so a record
//! can be found in constant time no matter where it sits in the tree. The table never shrinks
//! and is not updated when a record is deleted. Deleting only detaches the record from the
//! tree, nothing is ever freed before the bank itself is dropped.
//!
//! # Queries
//!
//! [Filter]s match the shape and the values of a subtree, and
//! [sort_generation](struct.Bank.html#method.sort_generation) reorders siblings by the value
//! of one of their data points.
//!
//! # Persistence
//!
//! A bank can be written to a compact binary form and rebuilt from it, see
//! [serialize](struct.Bank.html#method.serialize) and
//! [deserialize](struct.Bank.html#method.deserialize). There is no durability beyond that.
//!
//! [Bank]: struct.Bank.html
//! [Filter]: struct.Filter.html
mod arena;
mod bank;
mod codec;
mod error;
mod filter;
pub mod hash;
pub mod linkage;
mod sort;
pub mod value;

pub use arena::NodeId;
pub use bank::{
    Bank, BankConfig, BankInner, NodeOptions, DEFAULT_SLOT_COUNT, MAX_SLOT_COUNT, ORIGINAL_PK_KEY,
    ROOT_PRIMARY_KEY,
};
pub use codec::{LoadReport, MAGIC};
pub use error::{Error, Result, Severity};
pub use filter::{Filter, FilterId, FilterRule};
pub use hash::PRIMARY_KEY_SEED;
pub use sort::SortRule;
pub use value::{TypeMask, Value, ValueKind};

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

/// Register the histograms of all banks with a prometheus registry.
#[cfg(feature = "metrics")]
pub fn register_metrics(registry: &prometheus::Registry) -> Result<()> {
    bank::register(registry)
}
