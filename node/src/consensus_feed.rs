//! Stand-in for the out-of-scope consensus engine.
//!
//! `SPEC_FULL.md §A` calls for `paw-node` to drive its deterministic
//! block-execution loop "by a stub consensus feed (a placeholder for
//! the out-of-scope consensus engine)". [`StubConsensusFeed`] ticks at
//! a fixed interval and hands back an empty block; a real consensus
//! engine would replace it with one that delivers ordered transactions
//! gossiped from a mempool.

use paw_types::tx::ChainTransaction;
use tokio::time::{interval, Duration, Interval};

pub struct ProposedBlock {
    pub height: u64,
    pub timestamp: u64,
    pub transactions: Vec<ChainTransaction>,
}

pub struct StubConsensusFeed {
    ticker: Interval,
    next_height: u64,
}

impl StubConsensusFeed {
    pub fn new(block_interval: Duration, starting_height: u64) -> Self {
        Self {
            ticker: interval(block_interval),
            next_height: starting_height,
        }
    }

    pub async fn next_block(&mut self) -> ProposedBlock {
        self.ticker.tick().await;
        let height = self.next_height;
        self.next_height += 1;
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        ProposedBlock {
            height,
            timestamp,
            transactions: Vec::new(),
        }
    }
}
