// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits injected at the composition root.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod clock;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod store;

pub use adapter::PluginAdapter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{CheckPayload, JobScheduler};
pub use sink::EventSink;
pub use source::FlightSource;
pub use store::StoreBackend;
