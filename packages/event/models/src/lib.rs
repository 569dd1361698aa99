#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geolocated event types shared across the hotspot toolchain.
//!
//! Every data source (accident registers, noise measurement stations)
//! produces [`Event`] records. Events are grouped into an [`EventSet`] that
//! guarantees a single coordinate reference system and finite, in-bounds
//! coordinates before any detection strategy sees them.

use std::cmp::Ordering;

use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Swiss accident severity category, as published by the federal roads
/// office (`AccidentSeverityCategory`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum AccidentSeverity {
    /// `as1`: accident with fatalities
    #[serde(rename = "as1")]
    #[strum(to_string = "as1")]
    Fatal = 1,
    /// `as2`: accident with severe injuries
    #[serde(rename = "as2")]
    #[strum(to_string = "as2")]
    SevereInjuries = 2,
    /// `as3`: accident with light injuries
    #[serde(rename = "as3")]
    #[strum(to_string = "as3")]
    LightInjuries = 3,
    /// `as4`: accident with property damage only
    #[serde(rename = "as4")]
    #[strum(to_string = "as4")]
    PropertyDamage = 4,
}

impl AccidentSeverity {
    /// Returns the numeric part of the severity code (1 = most severe).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a severity from the numeric part of its code.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-4.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            1 => Ok(Self::Fatal),
            2 => Ok(Self::SevereInjuries),
            3 => Ok(Self::LightInjuries),
            4 => Ok(Self::PropertyDamage),
            _ => Err(InvalidSeverityError { value }),
        }
    }

    /// Human-readable English label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fatal => "Accident with fatalities",
            Self::SevereInjuries => "Accident with severe injuries",
            Self::LightInjuries => "Accident with light injuries",
            Self::PropertyDamage => "Accident with property damage",
        }
    }

    /// Returns all variants of this enum, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Fatal,
            Self::SevereInjuries,
            Self::LightInjuries,
            Self::PropertyDamage,
        ]
    }
}

/// Error returned when attempting to create an [`AccidentSeverity`] from an
/// invalid numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-4", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// Coordinate reference system of an [`EventSet`].
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
pub enum Crs {
    /// WGS84 degrees: `x` is longitude, `y` is latitude.
    Wgs84,
    /// Swiss LV95 (EPSG:2056) metres: `x` is easting, `y` is northing.
    Lv95,
    /// Any other planar projection. Only finiteness is checked.
    Projected,
}

impl Crs {
    /// Whether `coord` lies within the valid domain of this system.
    #[must_use]
    pub fn in_bounds(self, coord: &Coordinate) -> bool {
        if !coord.is_finite() {
            return false;
        }
        match self {
            Self::Wgs84 => (-180.0..=180.0).contains(&coord.x) && (-90.0..=90.0).contains(&coord.y),
            Self::Lv95 => {
                (2_400_000.0..=2_900_000.0).contains(&coord.x)
                    && (1_000_000.0..=1_350_000.0).contains(&coord.y)
            }
            Self::Projected => true,
        }
    }

    /// Whether coordinates are expressed in metres.
    #[must_use]
    pub const fn is_metric(self) -> bool {
        matches!(self, Self::Lv95 | Self::Projected)
    }
}

/// A planar coordinate pair in the units of its [`Crs`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Easting or longitude.
    pub x: f64,
    /// Northing or latitude.
    pub y: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance in coordinate units.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Total order on `(x, y)`, used wherever output must be deterministic.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.x
            .total_cmp(&other.x)
            .then_with(|| self.y.total_cmp(&other.y))
    }
}

/// Axis-aligned bounding box of a set of coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Coordinate,
    pub max: Coordinate,
}

impl Bounds {
    /// Smallest box covering every coordinate, or `None` for an empty input.
    pub fn covering<'a>(coords: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        let mut iter = coords.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for c in iter {
            bounds.min.x = bounds.min.x.min(c.x);
            bounds.min.y = bounds.min.y.min(c.y);
            bounds.max.x = bounds.max.x.max(c.x);
            bounds.max.y = bounds.max.y.max(c.y);
        }
        Some(bounds)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Returns a copy grown by `margin` on every side.
    #[must_use]
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            min: Coordinate::new(self.min.x - margin, self.min.y - margin),
            max: Coordinate::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Inclusive on all edges.
    #[must_use]
    pub fn contains(&self, coord: &Coordinate) -> bool {
        (self.min.x..=self.max.x).contains(&coord.x) && (self.min.y..=self.max.y).contains(&coord.y)
    }
}

/// Finest calendar unit an event's timestamp actually records.
///
/// Sources that publish only a year or a month still produce a full
/// timestamp (first of the month, midnight); the precision tells filters
/// which parts of it are real.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimePrecision {
    Year,
    Month,
    /// Hour of day or finer.
    #[default]
    Hour,
}

impl TimePrecision {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Year, Self::Month, Self::Hour]
    }
}

/// A single observed incident: a traffic accident or a noise measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Identifier from the data source (row number when the source has none).
    pub id: String,
    /// Location in the owning set's [`Crs`].
    pub position: Coordinate,
    /// When the event happened, if known.
    pub occurred_at: Option<NaiveDateTime>,
    /// Which parts of `occurred_at` the source recorded.
    #[serde(default)]
    pub time_precision: TimePrecision,
    /// Free-form category, e.g. the road type.
    pub category: Option<String>,
    /// Accident severity, if the source provides one.
    pub severity: Option<AccidentSeverity>,
    /// Measurement weight, e.g. a noise level in dB.
    pub weight: Option<f64>,
}

impl Event {
    #[must_use]
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            position: Coordinate::new(x, y),
            occurred_at: None,
            time_precision: TimePrecision::Hour,
            category: None,
            severity: None,
            weight: None,
        }
    }

    #[must_use]
    pub const fn with_occurred_at(mut self, occurred_at: NaiveDateTime) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Sets a timestamp that is only meaningful down to `precision`.
    #[must_use]
    pub const fn with_partial_time(
        mut self,
        occurred_at: NaiveDateTime,
        precision: TimePrecision,
    ) -> Self {
        self.occurred_at = Some(occurred_at);
        self.time_precision = precision;
        self
    }

    /// Calendar year, when the event has a timestamp.
    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.occurred_at.map(|at| at.year())
    }

    /// Hour of day, when the source recorded one.
    #[must_use]
    pub fn hour_of_day(&self) -> Option<u32> {
        match self.time_precision {
            TimePrecision::Hour => self.occurred_at.map(|at| at.hour()),
            TimePrecision::Year | TimePrecision::Month => None,
        }
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn with_severity(mut self, severity: AccidentSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub const fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    /// The event's weight, or 1 when it carries none.
    #[must_use]
    pub fn weight_or_unit(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Total order used to put events into a canonical sequence:
    /// position, then id, then timestamp.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.position
            .total_cmp(&other.position)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.occurred_at.cmp(&other.occurred_at))
    }

    fn validate(&self, crs: Crs) -> Result<(), InvalidEventReason> {
        if !self.position.is_finite() {
            return Err(InvalidEventReason::NonFiniteCoordinate);
        }
        if !crs.in_bounds(&self.position) {
            return Err(InvalidEventReason::OutOfBounds);
        }
        if let Some(weight) = self.weight
            && !(weight.is_finite() && weight >= 0.0)
        {
            return Err(InvalidEventReason::InvalidWeight);
        }
        Ok(())
    }
}

/// Why an [`Event`] was refused by an [`EventSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum InvalidEventReason {
    /// `x` or `y` is NaN or infinite.
    NonFiniteCoordinate,
    /// The coordinate lies outside the domain of the set's CRS.
    OutOfBounds,
    /// The weight is negative, NaN or infinite.
    InvalidWeight,
}

/// Error returned by [`EventSet::new`] for the first invalid event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEventError {
    /// Identifier of the offending event.
    pub id: String,
    /// What was wrong with it.
    pub reason: InvalidEventReason,
    /// CRS the event was validated against.
    pub crs: Crs,
}

impl std::fmt::Display for InvalidEventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid event {}: {} (crs {})",
            self.id, self.reason, self.crs
        )
    }
}

impl std::error::Error for InvalidEventError {}

/// An immutable, validated collection of events sharing one [`Crs`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSet {
    crs: Crs,
    events: Vec<Event>,
}

impl EventSet {
    /// Builds a set, refusing it entirely if any event is invalid.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEventError`] for the first event with a non-finite or
    /// out-of-bounds coordinate, or an invalid weight.
    pub fn new(crs: Crs, events: Vec<Event>) -> Result<Self, InvalidEventError> {
        for event in &events {
            event.validate(crs).map_err(|reason| InvalidEventError {
                id: event.id.clone(),
                reason,
                crs,
            })?;
        }
        Ok(Self { crs, events })
    }

    /// Builds a set, silently dropping invalid events.
    ///
    /// Returns the set and the number of events dropped.
    #[must_use]
    pub fn filtered(crs: Crs, events: Vec<Event>) -> (Self, usize) {
        let total = events.len();
        let events: Vec<Event> = events
            .into_iter()
            .filter(|e| e.validate(crs).is_ok())
            .collect();
        let dropped = total - events.len();
        (Self { crs, events }, dropped)
    }

    #[must_use]
    pub const fn empty(crs: Crs) -> Self {
        Self {
            crs,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Bounding box of all event positions, `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::covering(self.events.iter().map(|e| &e.position))
    }

    /// Returns a new set containing only the events matching `predicate`.
    #[must_use]
    pub fn retain(&self, mut predicate: impl FnMut(&Event) -> bool) -> Self {
        Self {
            crs: self.crs,
            events: self.events.iter().filter(|e| predicate(e)).cloned().collect(),
        }
    }

    /// Returns a new set with every position passed through `f`, validated
    /// against `crs`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEventError`] if a transformed position is invalid in
    /// the target system.
    pub fn map_positions(
        &self,
        crs: Crs,
        mut f: impl FnMut(Coordinate) -> Coordinate,
    ) -> Result<Self, InvalidEventError> {
        let events = self
            .events
            .iter()
            .map(|e| Event {
                position: f(e.position),
                ..e.clone()
            })
            .collect();
        Self::new(crs, events)
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn severity_from_value_roundtrip() {
        for v in 1..=4u8 {
            let severity = AccidentSeverity::from_value(v).unwrap();
            assert_eq!(severity.value(), v);
        }
        assert!(AccidentSeverity::from_value(0).is_err());
        assert!(AccidentSeverity::from_value(5).is_err());
    }

    #[test]
    fn severity_parses_source_codes() {
        assert_eq!(
            AccidentSeverity::from_str("as2").unwrap(),
            AccidentSeverity::SevereInjuries
        );
        assert_eq!(
            AccidentSeverity::from_str("AS4").unwrap(),
            AccidentSeverity::PropertyDamage
        );
        assert_eq!(AccidentSeverity::Fatal.to_string(), "as1");
    }

    #[test]
    fn crs_parses_case_insensitively() {
        assert_eq!(Crs::from_str("LV95").unwrap(), Crs::Lv95);
        assert_eq!(Crs::from_str("wgs84").unwrap(), Crs::Wgs84);
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let err = EventSet::new(
            Crs::Projected,
            vec![Event::new("a", 0.0, 0.0), Event::new("b", f64::NAN, 1.0)],
        )
        .unwrap_err();
        assert_eq!(err.id, "b");
        assert_eq!(err.reason, InvalidEventReason::NonFiniteCoordinate);
    }

    #[test]
    fn rejects_out_of_bounds_wgs84() {
        let err = EventSet::new(Crs::Wgs84, vec![Event::new("a", 7.59, 95.0)]).unwrap_err();
        assert_eq!(err.reason, InvalidEventReason::OutOfBounds);
    }

    #[test]
    fn rejects_negative_weight() {
        let err = EventSet::new(
            Crs::Projected,
            vec![Event::new("a", 1.0, 1.0).with_weight(-3.0)],
        )
        .unwrap_err();
        assert_eq!(err.reason, InvalidEventReason::InvalidWeight);
    }

    #[test]
    fn filtered_drops_invalid_events() {
        let (set, dropped) = EventSet::filtered(
            Crs::Lv95,
            vec![
                Event::new("ok", 2_611_000.0, 1_267_000.0),
                Event::new("wgs", 7.59, 47.56),
                Event::new("inf", f64::INFINITY, 1_267_000.0),
            ],
        );
        assert_eq!(set.len(), 1);
        assert_eq!(dropped, 2);
        assert_eq!(set.events()[0].id, "ok");
    }

    #[test]
    fn bounds_cover_all_events() {
        let set = EventSet::new(
            Crs::Projected,
            vec![
                Event::new("a", 1.0, 5.0),
                Event::new("b", -2.0, 3.0),
                Event::new("c", 4.0, -1.0),
            ],
        )
        .unwrap();
        let bounds = set.bounds().unwrap();
        assert_eq!(bounds.min, Coordinate::new(-2.0, -1.0));
        assert_eq!(bounds.max, Coordinate::new(4.0, 5.0));
        assert!((bounds.width() - 6.0).abs() < f64::EPSILON);
        assert!(EventSet::empty(Crs::Projected).bounds().is_none());
    }

    #[test]
    fn canonical_order_ignores_input_order() {
        let a = Event::new("a", 1.0, 1.0);
        let b = Event::new("b", 1.0, 1.0);
        let c = Event::new("c", 0.0, 2.0);
        let mut forward = vec![a.clone(), b.clone(), c.clone()];
        let mut reverse = vec![c, b, a];
        forward.sort_by(Event::canonical_cmp);
        reverse.sort_by(Event::canonical_cmp);
        assert_eq!(forward, reverse);
        assert_eq!(forward[0].id, "c");
    }

    #[test]
    fn event_serializes_camel_case() {
        let event = Event::new("42", 1.0, 2.0).with_severity(AccidentSeverity::LightInjuries);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["severity"], "as3");
        assert!(json.get("occurredAt").is_some());
        assert_eq!(json["timePrecision"], "hour");
    }

    #[test]
    fn hour_of_day_needs_hour_precision() {
        let at = chrono::NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let exact = Event::new("a", 0.0, 0.0).with_occurred_at(at);
        assert_eq!(exact.hour_of_day(), Some(0));
        let yearly = Event::new("b", 0.0, 0.0).with_partial_time(at, TimePrecision::Year);
        assert_eq!(yearly.hour_of_day(), None);
        assert_eq!(yearly.year(), Some(2020));
        assert!(Event::new("c", 0.0, 0.0).hour_of_day().is_none());
    }
}
