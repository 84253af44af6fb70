// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Airline designator extraction.

use std::sync::LazyLock;

use regex::Regex;

static DESIGNATOR: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2}").ok());

/// Two-character IATA designator at the start of a flight number or hint.
///
/// `"ba117"` yields `"BA"` and `"U2 8021"` yields `"U2"`. Input shorter than
/// two designator characters yields `None`.
pub fn extract_airline_code(flight_number: &str) -> Option<String> {
    let upper = flight_number.trim().to_uppercase();
    DESIGNATOR
        .as_ref()?
        .find(&upper)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_designators() {
        assert_eq!(extract_airline_code("BA117").as_deref(), Some("BA"));
        assert_eq!(extract_airline_code(" la3040").as_deref(), Some("LA"));
        assert_eq!(extract_airline_code("U2 8021").as_deref(), Some("U2"));
        assert_eq!(extract_airline_code("9W120").as_deref(), Some("9W"));
        assert_eq!(extract_airline_code("B"), None);
        assert_eq!(extract_airline_code("-BA"), None);
        assert_eq!(extract_airline_code(""), None);
    }
}
