//! Attribute filters applied to loaded events before detection.

use basel_hotspots_event_models::{AccidentSeverity, Event, EventSet};
use chrono::{NaiveDateTime, Timelike as _};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SourceError;

/// Day or night, relative to an [`ObservationWindow`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TimeOfDay {
    Daytime,
    Nighttime,
}

impl TimeOfDay {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Daytime, Self::Nighttime]
    }
}

/// Hours of the day counted as daytime, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ObservationWindow {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 22,
        }
    }
}

impl ObservationWindow {
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidFilter`] unless
    /// `start_hour <= end_hour <= 23`.
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, SourceError> {
        let window = Self {
            start_hour,
            end_hour,
        };
        window.validate()?;
        Ok(window)
    }

    fn validate(&self) -> Result<(), SourceError> {
        if self.start_hour > self.end_hour || self.end_hour > 23 {
            return Err(SourceError::InvalidFilter {
                message: format!(
                    "observation window {}-{} must satisfy start <= end <= 23",
                    self.start_hour, self.end_hour
                ),
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn classify_hour(&self, hour: u32) -> TimeOfDay {
        if self.start_hour <= hour && hour <= self.end_hour {
            TimeOfDay::Daytime
        } else {
            TimeOfDay::Nighttime
        }
    }

    #[must_use]
    pub fn classify(&self, at: &NaiveDateTime) -> TimeOfDay {
        self.classify_hour(at.hour())
    }

    /// Day or night for `event`, `None` when its hour is unknown.
    #[must_use]
    pub fn classify_event(&self, event: &Event) -> Option<TimeOfDay> {
        event.hour_of_day().map(|hour| self.classify_hour(hour))
    }
}

/// Conjunction of optional attribute constraints.
///
/// An unset constraint accepts everything. An event lacking the attribute
/// a set constraint needs is rejected by it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventFilter {
    /// Earliest year kept, inclusive.
    pub from_year: Option<i32>,
    /// Latest year kept, inclusive.
    pub to_year: Option<i32>,
    pub time_of_day: Option<TimeOfDay>,
    pub observation_window: ObservationWindow,
    /// Allowed severities; empty allows all.
    pub severities: Vec<AccidentSeverity>,
    /// Allowed categories, compared case-insensitively; empty allows all.
    pub categories: Vec<String>,
}

impl EventFilter {
    /// Whether no constraint is set.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        self.from_year.is_none()
            && self.to_year.is_none()
            && self.time_of_day.is_none()
            && self.severities.is_empty()
            && self.categories.is_empty()
    }

    /// # Errors
    ///
    /// Returns [`SourceError::InvalidFilter`] for an inverted year range or
    /// an invalid observation window.
    pub fn validate(&self) -> Result<(), SourceError> {
        if let (Some(from), Some(to)) = (self.from_year, self.to_year)
            && from > to
        {
            return Err(SourceError::InvalidFilter {
                message: format!("year range {from}-{to} is inverted"),
            });
        }
        self.observation_window.validate()
    }

    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if self.from_year.is_some() || self.to_year.is_some() {
            let Some(year) = event.year() else {
                return false;
            };
            if self.from_year.is_some_and(|from| year < from)
                || self.to_year.is_some_and(|to| year > to)
            {
                return false;
            }
        }
        // Year- or month-only timestamps carry no time of day.
        if let Some(wanted) = self.time_of_day
            && self.observation_window.classify_event(event) != Some(wanted)
        {
            return false;
        }
        if !self.severities.is_empty()
            && !event
                .severity
                .is_some_and(|s| self.severities.contains(&s))
        {
            return false;
        }
        if !self.categories.is_empty()
            && !event.category.as_deref().is_some_and(|c| {
                self.categories
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(c))
            })
        {
            return false;
        }
        true
    }

    /// Returns the events passing this filter.
    ///
    /// # Errors
    ///
    /// Same as [`EventFilter::validate`].
    pub fn apply(&self, events: &EventSet) -> Result<EventSet, SourceError> {
        self.validate()?;
        if self.is_unrestricted() {
            return Ok(events.clone());
        }
        if self.time_of_day.is_some() {
            let without_hour = events.iter().filter(|e| e.hour_of_day().is_none()).count();
            if without_hour > 0 {
                log::warn!(
                    "{without_hour} of {} events have no hour of day and fail the \
                     time-of-day filter",
                    events.len()
                );
            }
        }
        let kept = events.retain(|e| self.matches(e));
        log::info!("Filter kept {} of {} events", kept.len(), events.len());
        Ok(kept)
    }
}
