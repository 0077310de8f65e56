// src/lib.rs — Library root for tasktrack

pub mod api;
pub mod calendar;
pub mod cli;
pub mod infra;
pub mod store;
pub mod timer;
