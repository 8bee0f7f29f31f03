//! Data models for option chains and SVI skews
//!
//! This module contains the normalized quote and chain types, the SVI
//! evaluators and the static no-arbitrage diagnostics.

pub mod arbitrage;
pub mod chain;
mod option;
pub mod svi;

pub use chain::{normalize, normalize_mixed, ChainExtents, ChainReference, Extent, OptionChain, RawOptionChain, SideFilter};
pub use option::*;
pub use svi::{evaluate, evaluate_curve, CurveMemo, StrikeGrid, SviCurvePoint, SviCurveQuery, SviParameters};
