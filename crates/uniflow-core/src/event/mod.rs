//! Event distribution for execution observers.

pub mod bus;
