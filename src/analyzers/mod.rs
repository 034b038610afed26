//! Wear-rate extraction and aggregation.
//!
//! Each sheet is turned into per-brush rate cells filtered against the
//! reference baselines, then all sheets are folded into one table per
//! measurement group with an average column.

pub mod aggregate;
pub mod analyzer;
pub mod extract;
pub mod types;
