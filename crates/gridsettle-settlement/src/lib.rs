//! # gridsettle-settlement: Settlement Aggregator
//!
//! Turns a ledger of metered trades into billed amounts, carbon accounting,
//! netting efficiency and latency statistics.
//!
//! - **Pricing** ([`pricing`]): one [`TradeRecord`](gridsettle_core::TradeRecord)
//!   in, one [`SettlementResult`] out, under a validated tariff.
//! - **Batch** ([`batch`]): ledger pricing with per-record failure isolation
//!   and in-batch replay detection.
//! - **Netting** ([`netting`]): bilateral or multilateral offsetting of
//!   buyer-to-seller obligations per settlement cycle.
//! - **Aggregation** ([`aggregate`]): mergeable fixed-point partials and the
//!   final [`AggregateReport`].
//! - **Percentiles** ([`percentile`]): nearest-rank latency ranking.
//!
//! ## Crate Policy
//!
//! - Every operation is pure and synchronous; nothing here holds global state.
//! - The optional `parallel` feature adds rayon-backed aggregation.

pub mod aggregate;
pub mod batch;
pub mod netting;
pub mod percentile;
pub mod pricing;

pub use aggregate::{aggregate, AggregateReport, Aggregator, PartialAggregate};
pub use batch::{price_batch, BatchOutcome, BatchPolicy, Rejection};
pub use netting::{
    NetPosition, NettingBook, NettingEngine, NettingError, NettingMode, NettingPlan,
    NettingSummary, Obligation, SettlementCycle, SettlementLeg,
};
pub use percentile::{percentile, LatencyPercentiles};
pub use pricing::{price, SettlementResult};
