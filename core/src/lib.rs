//! Deterministic retail point-of-sale simulation.
//!
//! A run walks every (store, date, customer) and decides each basket from
//! keyed random draws, so any single decision can be replayed on its own.
//! The aggregator folds the generated transactions into totals and windowed
//! actual-vs-expected statistics; the report module projects those into
//! serialisable views.

pub mod aggregator;
pub mod calendar;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod observer;
pub mod report;
pub mod rng;
pub mod rules;
pub mod store;
pub mod types;
