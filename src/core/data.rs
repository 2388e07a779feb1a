//! Data model shared by the engine, the providers and the viewer
//!
//! These structures are platform-agnostic (no WASM deps). Measurement
//! snapshots are immutable inputs; the engine only derives drifted copies.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::raster::Rgba;

/// Map center used when no points are available (Nilüfer, Bursa)
pub const DEFAULT_CENTER: GeoPoint = GeoPoint { lat: 40.232, lng: 28.949 };

/// Fallback dot color for points with an unparseable color string
pub const FALLBACK_COLOR: Rgb = Rgb::new(0xe6, 0x7e, 0x22);

/// Geographic position in degrees
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Position in the current viewport, in pixels from the top-left corner
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

impl PixelPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One measurement point as supplied by a data provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementPoint {
    pub lat: f64,
    pub lng: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
    /// Base cloud radius in meters
    pub base_radius: f64,
    /// Severity bucket color, `#rrggbb`
    pub color: String,
    /// Distance from the emission source (0 for stations)
    #[serde(default)]
    pub distance_m: f64,
}

impl MeasurementPoint {
    /// Build a point whose color follows the PM2.5 severity bucket
    pub fn new(lat: f64, lng: f64, pm25: Option<f64>, base_radius: f64) -> Self {
        Self {
            lat,
            lng,
            pm25,
            pm10: None,
            no2: None,
            so2: None,
            co: None,
            base_radius,
            color: Severity::color_hex_for(pm25).to_string(),
            distance_m: 0.0,
        }
    }

    #[inline]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// PM2.5 with missing readings treated as zero
    #[inline]
    pub fn pm25_or_zero(&self) -> f64 {
        self.pm25.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    /// Parsed severity color
    pub fn rgb(&self) -> Rgb {
        Rgb::parse_hex(&self.color).unwrap_or(FALLBACK_COLOR)
    }
}

/// Wind speed and direction, meteorological convention (clockwise from north)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindVector {
    pub speed_mps: f64,
    /// Degrees in [0, 360), direction the wind blows toward
    pub direction_deg: f64,
}

impl Default for WindVector {
    fn default() -> Self {
        Self {
            speed_mps: 3.0,
            direction_deg: 45.0,
        }
    }
}

impl WindVector {
    /// Validated constructor. Direction is wrapped into [0, 360).
    pub fn new(speed_mps: f64, direction_deg: f64) -> Option<Self> {
        if !speed_mps.is_finite() || speed_mps < 0.0 || !direction_deg.is_finite() {
            return None;
        }
        Some(Self {
            speed_mps,
            direction_deg: direction_deg.rem_euclid(360.0),
        })
    }

    /// Resolve a possibly missing or invalid reading, substituting the default
    pub fn resolve(wind: Option<WindVector>) -> Self {
        match wind.and_then(|w| Self::new(w.speed_mps, w.direction_deg)) {
            Some(w) => w,
            None => {
                warn!(?wind, "Wind missing or invalid, using default");
                Self::default()
            }
        }
    }

    #[inline]
    pub fn direction_rad(&self) -> f64 {
        self.direction_deg.to_radians()
    }

    /// 16-point compass label for the direction
    pub fn compass(&self) -> &'static str {
        compass_label(self.direction_deg)
    }
}

/// 16-point compass label for a bearing in degrees
pub fn compass_label(deg: f64) -> &'static str {
    const DIRS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE",
        "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
    ];
    let d = deg.rem_euclid(360.0);
    let idx = (d / 22.5).round() as usize % 16;
    DIRS[idx]
}

// ============================================================================
// Colors & severity
// ============================================================================

/// 8-bit sRGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rgb` or `#rrggbb` (leading `#` optional)
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return None,
        };
        let value = u32::from_str_radix(&expanded, 16).ok()?;
        Some(Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        ))
    }

    /// Straight-alpha float color
    pub fn with_alpha(self, alpha: f32) -> Rgba {
        Rgba::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            alpha,
        )
    }
}

/// PM2.5 severity buckets, shared by point colors and the heat gradient
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
}

impl Severity {
    pub const ALL: &'static [Severity] = &[
        Severity::Good,
        Severity::Moderate,
        Severity::UnhealthySensitive,
        Severity::Unhealthy,
        Severity::VeryUnhealthy,
    ];

    pub fn from_pm25(pm25: f64) -> Self {
        if pm25 < 12.0 {
            Severity::Good
        } else if pm25 < 35.5 {
            Severity::Moderate
        } else if pm25 < 55.5 {
            Severity::UnhealthySensitive
        } else if pm25 < 150.5 {
            Severity::Unhealthy
        } else {
            Severity::VeryUnhealthy
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            Severity::Good => "#2ecc71",
            Severity::Moderate => "#f1c40f",
            Severity::UnhealthySensitive => "#e67e22",
            Severity::Unhealthy => "#e74c3c",
            Severity::VeryUnhealthy => "#8e44ad",
        }
    }

    pub fn rgb(self) -> Rgb {
        match self {
            Severity::Good => Rgb::new(0x2e, 0xcc, 0x71),
            Severity::Moderate => Rgb::new(0xf1, 0xc4, 0x0f),
            Severity::UnhealthySensitive => Rgb::new(0xe6, 0x7e, 0x22),
            Severity::Unhealthy => Rgb::new(0xe7, 0x4c, 0x3c),
            Severity::VeryUnhealthy => Rgb::new(0x8e, 0x44, 0xad),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::Good => "Good",
            Severity::Moderate => "Moderate",
            Severity::UnhealthySensitive => "Unhealthy for sensitive groups",
            Severity::Unhealthy => "Unhealthy",
            Severity::VeryUnhealthy => "Very unhealthy",
        }
    }

    /// Health advisory shown above good air, None when no warning applies
    pub fn advisory(self) -> Option<&'static str> {
        match self {
            Severity::Good => None,
            Severity::Moderate => Some("Moderate air quality. Sensitive groups should take care."),
            Severity::UnhealthySensitive => {
                Some("Unhealthy for sensitive groups. Reduce outdoor activity.")
            }
            Severity::Unhealthy | Severity::VeryUnhealthy => {
                Some("Unhealthy air! Limit outdoor activity.")
            }
        }
    }

    /// Point color for an optional reading; missing readings are black
    pub fn color_hex_for(pm25: Option<f64>) -> &'static str {
        match pm25 {
            Some(v) if v.is_finite() => Self::from_pm25(v).hex(),
            _ => "#000000",
        }
    }
}

/// US EPA style PM2.5 → AQI, piecewise linear over the lower breakpoints
pub fn aqi_from_pm25(pm25: f64) -> u32 {
    const BREAKPOINTS: [(f64, f64, f64, f64); 4] = [
        (0.0, 12.0, 0.0, 50.0),
        (12.1, 35.4, 51.0, 100.0),
        (35.5, 55.4, 101.0, 150.0),
        (55.5, 150.4, 151.0, 200.0),
    ];
    if pm25.is_nan() || pm25 < 0.0 {
        return 0;
    }
    for (clo, chi, ilo, ihi) in BREAKPOINTS {
        // Readings between two bands (e.g. 12.05) snap to the upper band's floor
        if pm25 <= chi {
            let c = pm25.max(clo);
            return (((ihi - ilo) / (chi - clo)) * (c - clo) + ilo).round() as u32;
        }
    }
    300
}

// ============================================================================
// Bounds
// ============================================================================

/// Lat/lng bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Bounds enclosing all points, or None for an empty set
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a MeasurementPoint>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Self {
                    south: p.lat,
                    west: p.lng,
                    north: p.lat,
                    east: p.lng,
                },
                Some(b) => Self {
                    south: b.south.min(p.lat),
                    west: b.west.min(p.lng),
                    north: b.north.max(p.lat),
                    east: b.east.max(p.lng),
                },
            })
        })
    }

    /// Grow each side by `ratio` of the span
    pub fn pad(self, ratio: f64) -> Self {
        let dlat = (self.north - self.south) * ratio;
        let dlng = (self.east - self.west) * ratio;
        Self {
            south: self.south - dlat,
            west: self.west - dlng,
            north: self.north + dlat,
            east: self.east + dlng,
        }
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new((self.south + self.north) * 0.5, (self.west + self.east) * 0.5)
    }

    /// Square box of half-size `half_deg` around `center`
    pub fn around(center: GeoPoint, half_deg: f64) -> Self {
        Self {
            south: center.lat - half_deg,
            west: center.lng - half_deg,
            north: center.lat + half_deg,
            east: center.lng + half_deg,
        }
    }

    /// Widen either axis to at least `min_deg`, keeping the center
    pub fn with_min_span(self, min_deg: f64) -> Self {
        let c = self.center();
        let half_lat = ((self.north - self.south) * 0.5).max(min_deg * 0.5);
        let half_lng = ((self.east - self.west) * 0.5).max(min_deg * 0.5);
        Self {
            south: c.lat - half_lat,
            west: c.lng - half_lng,
            north: c.lat + half_lat,
            east: c.lng + half_lng,
        }
    }

    /// Initial viewport: padded point bounds, or a box around the default center
    pub fn for_viewport(points: &[MeasurementPoint]) -> Self {
        Self::from_points(points)
            .map(|b| b.pad(0.25))
            .unwrap_or_else(|| Self::around(DEFAULT_CENTER, 0.05))
            .with_min_span(0.02)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(5.0, None)]
    #[case(12.0, Some("Moderate air quality. Sensitive groups should take care."))]
    #[case(40.0, Some("Unhealthy for sensitive groups. Reduce outdoor activity."))]
    #[case(55.5, Some("Unhealthy air! Limit outdoor activity."))]
    #[case(300.0, Some("Unhealthy air! Limit outdoor activity."))]
    fn advisory_from_moderate_up(#[case] pm25: f64, #[case] expected: Option<&str>) {
        assert_eq!(Severity::from_pm25(pm25).advisory(), expected);
    }

    #[rstest]
    #[case(0.0, Severity::Good)]
    #[case(11.9, Severity::Good)]
    #[case(12.0, Severity::Moderate)]
    #[case(35.5, Severity::UnhealthySensitive)]
    #[case(55.5, Severity::Unhealthy)]
    #[case(150.5, Severity::VeryUnhealthy)]
    fn severity_buckets(#[case] pm25: f64, #[case] expected: Severity) {
        assert_eq!(Severity::from_pm25(pm25), expected);
    }

    #[test]
    fn missing_pm25_is_black() {
        assert_eq!(Severity::color_hex_for(None), "#000000");
        assert_eq!(Severity::color_hex_for(Some(20.0)), "#f1c40f");
    }

    #[test]
    fn severity_hex_matches_rgb() {
        for &s in Severity::ALL {
            assert_eq!(Rgb::parse_hex(s.hex()), Some(s.rgb()));
        }
    }

    #[test]
    fn parse_hex_short_and_long() {
        assert_eq!(Rgb::parse_hex("#fff"), Some(Rgb::new(255, 255, 255)));
        assert_eq!(Rgb::parse_hex("e67e22"), Some(Rgb::new(0xe6, 0x7e, 0x22)));
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn wind_resolve_substitutes_default() {
        assert_eq!(WindVector::resolve(None), WindVector::default());
        let bad = WindVector { speed_mps: -1.0, direction_deg: 90.0 };
        assert_eq!(WindVector::resolve(Some(bad)), WindVector::default());
        let nan = WindVector { speed_mps: 2.0, direction_deg: f64::NAN };
        assert_eq!(WindVector::resolve(Some(nan)), WindVector::default());
    }

    #[test]
    fn wind_direction_wraps() {
        let w = WindVector::new(2.0, 360.0).unwrap();
        assert_eq!(w.direction_deg, 0.0);
        let w = WindVector::new(2.0, -90.0).unwrap();
        assert_eq!(w.direction_deg, 270.0);
    }

    #[test]
    fn compass_labels() {
        assert_eq!(compass_label(0.0), "N");
        assert_eq!(compass_label(45.0), "NE");
        assert_eq!(compass_label(350.0), "N");
        assert_eq!(compass_label(200.0), "SSW");
    }

    #[test]
    fn aqi_breakpoints() {
        assert_eq!(aqi_from_pm25(0.0), 0);
        assert_eq!(aqi_from_pm25(12.0), 50);
        assert_eq!(aqi_from_pm25(25.5), 79);
        assert_eq!(aqi_from_pm25(500.0), 300);
        assert_eq!(aqi_from_pm25(12.05), 51);
        assert_eq!(aqi_from_pm25(-3.0), 0);
    }

    #[test]
    fn bounds_pad() {
        let pts = [
            MeasurementPoint::new(40.0, 29.0, Some(10.0), 220.0),
            MeasurementPoint::new(40.2, 29.4, Some(10.0), 220.0),
        ];
        let b = GeoBounds::from_points(&pts).unwrap().pad(0.25);
        assert!((b.south - 39.95).abs() < 1e-9);
        assert!((b.east - 29.5).abs() < 1e-9);
        assert!(GeoBounds::from_points(&Vec::<MeasurementPoint>::new()).is_none());
    }

    #[test]
    fn viewport_bounds_never_degenerate() {
        let single = [MeasurementPoint::new(40.0, 29.0, None, 220.0)];
        let b = GeoBounds::for_viewport(&single);
        assert!((b.north - b.south - 0.02).abs() < 1e-9);
        assert_eq!(b.center(), GeoPoint::new(40.0, 29.0));
        let empty = GeoBounds::for_viewport(&[]);
        assert!((empty.center().lat - DEFAULT_CENTER.lat).abs() < 1e-9);
        assert!((empty.east - empty.west - 0.1).abs() < 1e-9);
    }
}
