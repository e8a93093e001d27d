//! Binary support: command line, output tables and startup

pub mod args;
pub mod display;
pub mod error;
pub mod startup;
