// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-airline scraper selection for the last cascade layer.

use std::collections::HashMap;
use std::sync::Arc;

use flightwatch_core::FlightSource;

use crate::airline::extract_airline_code;

/// Scrapers keyed by airline designator, with an optional catch-all.
#[derive(Default, Clone)]
pub struct ScraperRegistry {
    by_airline: HashMap<String, Arc<dyn FlightSource>>,
    fallback: Option<Arc<dyn FlightSource>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `scraper` for airline `code` (case-insensitive).
    pub fn register(&mut self, code: &str, scraper: Arc<dyn FlightSource>) {
        self.by_airline.insert(code.trim().to_uppercase(), scraper);
    }

    /// Sets the scraper used when no airline-specific one matches.
    pub fn set_fallback(&mut self, scraper: Arc<dyn FlightSource>) {
        self.fallback = Some(scraper);
    }

    pub fn is_empty(&self) -> bool {
        self.by_airline.is_empty() && self.fallback.is_none()
    }

    /// Registered airline codes, sorted.
    pub fn airlines(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.by_airline.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Scraper for `airline` (a designator or a flight number), else the fallback.
    pub fn select(&self, airline: Option<&str>) -> Option<Arc<dyn FlightSource>> {
        airline
            .and_then(extract_airline_code)
            .and_then(|code| self.by_airline.get(&code).cloned())
            .or_else(|| self.fallback.clone())
    }
}
