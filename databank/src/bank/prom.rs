use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Histogram, HistogramOpts, Registry};

lazy_static! {
    pub static ref SERIALIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("serialize_time", "Complete time to serialize a bank",)
            .namespace("databank")
            .buckets(exponential_buckets(0.00001, 2.0, 20).unwrap()),
    )
    .unwrap();
    pub static ref DESERIALIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("deserialize_time", "Complete time to rebuild a bank",)
            .namespace("databank")
            .buckets(exponential_buckets(0.00001, 2.0, 20).unwrap()),
    )
    .unwrap();
    pub static ref SERIALIZE_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("serialize_size", "Size of serialized banks",)
            .namespace("databank")
            .buckets(exponential_buckets(64.0, 2.0, 20).unwrap()),
    )
    .unwrap();
    pub static ref DESERIALIZE_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("deserialize_size", "Size of bank files being read",)
            .namespace("databank")
            .buckets(exponential_buckets(64.0, 2.0, 20).unwrap()),
    )
    .unwrap();
    pub static ref FILTER_EVAL_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("filter_eval_time", "Time to evaluate a filter against a subtree",)
            .namespace("databank")
            .buckets(exponential_buckets(0.000001, 2.0, 20).unwrap()),
    )
    .unwrap();
}

pub(crate) fn register(registry: &Registry) -> crate::Result<()> {
    registry.register(Box::new(SERIALIZE_HIST.clone()))?;
    registry.register(Box::new(DESERIALIZE_HIST.clone()))?;
    registry.register(Box::new(SERIALIZE_SIZE_HIST.clone()))?;
    registry.register(Box::new(DESERIALIZE_SIZE_HIST.clone()))?;
    registry.register(Box::new(FILTER_EVAL_HIST.clone()))?;
    Ok(())
}
