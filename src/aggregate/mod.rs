//! Per-source aggregation into municipality-year counts
//!
//! Each submodule groups the typed records of one source and knows how to
//! write its indicators into a feature row through a [`RateGuard`].

pub mod births;
pub mod deaths;
pub mod facilities;
pub mod rates;
pub mod services;

pub use births::{BirthCounts, MeanAccumulator, aggregate_births};
pub use deaths::{DeathCounts, aggregate_deaths};
pub use facilities::{FacilityCounts, aggregate_facilities};
pub use rates::{PER_MILLE, PERCENT, RateGuard, guarded_rate};
pub use services::{ServiceTotals, aggregate_services};
