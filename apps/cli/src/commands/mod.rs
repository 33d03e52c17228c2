//! Command implementations for the Dreamfusion CLI.

pub mod export;
pub mod metadata;
pub mod params;
pub mod run;
pub mod types;
