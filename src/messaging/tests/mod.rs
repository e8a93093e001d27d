//! Test modules for the messaging bus
//!
//! Organised by concern: lineage-aware delivery and subscription
//! management.
