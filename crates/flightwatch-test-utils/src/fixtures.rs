// SPDX-FileCopyrightText: 2026 Flightwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flight data builders.

use chrono::{DateTime, Duration, TimeZone, Utc};

use flightwatch_core::{FlightDetails, FlightEndpoint, FlightStatus, Passenger};

/// Scheduled departure of every fixture flight.
pub fn departure_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A scheduled LHR → JFK flight departing gate A1, terminal 5.
pub fn flight(number: &str) -> FlightDetails {
    FlightBuilder::new(number).build()
}

pub struct FlightBuilder {
    flight: FlightDetails,
}

impl FlightBuilder {
    pub fn new(number: &str) -> Self {
        let departs = departure_time();
        let code: String = number.chars().take(2).collect::<String>().to_uppercase();
        Self {
            flight: FlightDetails {
                flight_number: number.to_uppercase(),
                airline_name: format!("{code} Airways"),
                airline_code: code,
                aircraft: Some("B777".into()),
                status: FlightStatus::Scheduled,
                departure: FlightEndpoint {
                    airport: "LHR".into(),
                    scheduled_time: departs,
                    estimated_time: None,
                    actual_time: None,
                    terminal: Some("5".into()),
                    gate: Some("A1".into()),
                    delay_minutes: None,
                },
                arrival: FlightEndpoint {
                    airport: "JFK".into(),
                    scheduled_time: departs + Duration::hours(8),
                    estimated_time: None,
                    actual_time: None,
                    terminal: Some("7".into()),
                    gate: None,
                    delay_minutes: None,
                },
                passengers: vec![Passenger {
                    first_name: "JOHN".into(),
                    last_name: "SMITH".into(),
                    seat: Some("14A".into()),
                }],
                last_updated: departs - Duration::hours(3),
            },
        }
    }

    pub fn status(mut self, status: FlightStatus) -> Self {
        self.flight.status = status;
        self
    }

    pub fn gate(mut self, gate: &str) -> Self {
        self.flight.departure.gate = Some(gate.into());
        self
    }

    pub fn terminal(mut self, terminal: &str) -> Self {
        self.flight.departure.terminal = Some(terminal.into());
        self
    }

    /// Sets the departure delay and the matching estimated time.
    pub fn delayed_by(mut self, minutes: i32) -> Self {
        self.flight.departure.delay_minutes = Some(minutes);
        self.flight.departure.estimated_time =
            Some(self.flight.departure.scheduled_time + Duration::minutes(i64::from(minutes)));
        self
    }

    pub fn build(self) -> FlightDetails {
        self.flight
    }
}
