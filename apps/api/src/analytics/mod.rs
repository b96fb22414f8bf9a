//! Data Summary Service — aggregates a flat sales table into per-product and
//! per-region statistics plus human-readable insights, and renders the fixed
//! textual block embedded in the generation prompt.

pub mod summary;
