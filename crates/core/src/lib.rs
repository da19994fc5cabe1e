#![forbid(unsafe_code)]

pub mod achievements;
pub mod countdown;
pub mod error;
pub mod import;
pub mod model;
pub mod scoring;
pub mod streak;
pub mod time;

pub use error::Error;
pub use time::Clock;
