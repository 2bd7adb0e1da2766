//! Calendar arithmetic, output shapes and the fetcher family.

pub mod calendar;
pub mod dateutil;
pub mod clock;
pub mod table;
pub mod options;
pub mod universe;
pub mod assemble;
pub mod fetcher;
pub mod config_validation;
pub mod error;
