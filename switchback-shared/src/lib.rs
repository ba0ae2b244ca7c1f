pub mod events;
pub mod locations;

pub use locations::{Location, UnknownLocation};
