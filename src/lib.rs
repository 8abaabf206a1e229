#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod agreement;
pub mod assessment;
pub mod dataset;
mod error;
pub mod math;
pub mod pair;
pub mod regression;
pub mod reu;

pub use error::Error;
pub use reu::reu;

pub type Result<T> = ::std::result::Result<T, Error>;
