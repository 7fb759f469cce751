//! Historical price reconstruction from archived page captures.
//!
//! Target dates come from [`sampling`], each is matched to the closest capture by
//! [`archive::SnapshotResolver`], and fetched markup goes through the
//! [`parser::ExtractionPipeline`]. [`runner::Analyzer`] drives the whole run.

pub mod archive;
pub mod config;
pub mod error;
pub mod llm;
pub mod model;
pub mod parser;
pub mod runner;
pub mod sampling;
pub mod timeseries;

pub use error::{Error, Result};
pub use model::{
    BillingPeriod, Capture, Currency, ExtractionMethod, ExtractionResult, PriceCandidate,
    PriceRow, RealismBand, TimeSeries,
};
pub use runner::{AnalysisRequest, Analyzer};
pub use sampling::Interval;
