use rust_decimal::Decimal;

use crate::config::BillingConfig;

/// Credit price of translating a subtitle file.
///
/// Entries are grouped into fixed-size batches and every started batch costs
/// the same: `ceil(entries / batch_size) * credits_per_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    batch_size: usize,
    credits_per_batch: Decimal,
}

impl Default for Pricing {
    fn default() -> Self {
        Self::new(20, Decimal::new(7, 1))
    }
}

impl Pricing {
    /// `batch_size` must be at least 1
    pub fn new(batch_size: usize, credits_per_batch: Decimal) -> Self {
        Self {
            batch_size: batch_size.max(1),
            credits_per_batch,
        }
    }

    pub fn from_config(config: &BillingConfig) -> Self {
        Self::new(config.batch_size, config.credits_per_batch)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn batches(&self, entry_count: usize) -> usize {
        entry_count.div_ceil(self.batch_size)
    }

    pub fn cost(&self, entry_count: usize) -> Decimal {
        Decimal::from(self.batches(entry_count) as u64) * self.credits_per_batch
    }
}
