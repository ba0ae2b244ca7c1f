//! Scheduling and fairness rules applied before offers are posted and
//! trips are booked or cancelled. The gate only reads; all writes stay in
//! the offer and trip services.

pub mod gate;

pub use gate::{PolicyConstants, PolicyError, PolicyGate};
