// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source layer trait for upstream flight data clients.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{FlightDetails, SourceQuery};

/// A client able to look up live flight status (GDS, flight-data API, or an
/// airline scraper).
///
/// Implementations return a typed failure rather than panicking; the cascade
/// measures duration and records the failure message.
#[async_trait]
pub trait FlightSource: PluginAdapter {
    async fn attempt_resolve(&self, query: &SourceQuery) -> Result<FlightDetails, SourceError>;
}
