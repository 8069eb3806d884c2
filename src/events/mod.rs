//! # Run Events
//!
//! Fan-out of run lifecycle notifications to any number of listeners over a
//! `tokio::sync::broadcast` channel. [`RunEventPublisher`] implements
//! [`RunObserver`](crate::orchestration::RunObserver), so it can be passed
//! straight to a run.

pub mod publisher;

pub use publisher::{PublishedEvent, RunEvent, RunEventPublisher, DEFAULT_EVENT_CAPACITY};
