// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flight status resolution for Flightwatch.
//!
//! [`CascadingResolver`] walks the GDS, external API and scraping layers in
//! order. [`ResolutionService`] wraps it with rate limiting, caching and the
//! per-key distributed lock so that concurrent callers share one cascade.

pub mod airline;
pub mod cascade;
pub mod recording;
pub mod scrapers;
pub mod service;

pub use airline::extract_airline_code;
pub use cascade::{CascadingResolver, CascadingResolverBuilder};
pub use scrapers::ScraperRegistry;
pub use service::{ResolutionService, ResolveOptions};
