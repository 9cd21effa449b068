#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blend;
pub mod confidence;
pub mod config;
pub mod derived;
pub mod error;
pub mod estimator;
pub mod fiber;
pub mod joint;
pub mod logging;
pub mod regression;
pub mod sample;
pub mod selection;
pub mod store;
pub mod table;

pub use error::{Error, Result};
pub use estimator::{estimate, EstimationResult, QueryComposition};
