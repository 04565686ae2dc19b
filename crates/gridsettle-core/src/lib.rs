//! # gridsettle-core: Foundational Types
//!
//! Domain primitives shared by every gridsettle crate. Depends on nothing
//! internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype identifiers.** [`MeterId`] and [`PartyId`] validate at
//!    construction and on deserialization. No bare strings for identifiers.
//!
//! 2. **Exhaustive carbon tags.** [`CarbonTag`] has one variant per standard
//!    source plus an uppercase `Other` for tags only some tariffs price.
//!
//! 3. **UTC-only timestamps.** [`Timestamp`] normalises every accepted input
//!    to UTC, seconds precision.
//!
//! 4. **Immutable records.** [`TradeRecord`] is input-only; derived values
//!    carry a back-reference instead of mutating it.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod carbon;
pub mod error;
pub mod identity;
pub mod record;
pub mod temporal;

pub use carbon::CarbonTag;
pub use error::{ConfigError, InsufficientDataError, SettlementError, ValidationError};
pub use identity::{MeterId, PartyId};
pub use record::{Counterparty, ReadingDigest, TradeRecord};
pub use temporal::Timestamp;
