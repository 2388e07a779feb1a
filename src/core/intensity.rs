//! PM2.5 → visual intensity normalization
//!
//! Intensity mixes a gamma-shaped position within the current set's PM2.5
//! range with an absolute scale, then wobbles it over a 60-tick period.
//! Output is always within [`MIN_INTENSITY`, `MAX_INTENSITY`].

use std::f64::consts::TAU;

use super::data::MeasurementPoint;

pub const MIN_INTENSITY: f64 = 0.2;
pub const MAX_INTENSITY: f64 = 1.0;

/// Smallest range used for normalization, avoids blow-up on near-equal sets
pub const MIN_RANGE: f64 = 5.0;

/// Ticks per wobble period
pub const WOBBLE_PERIOD: u32 = 60;

/// Per-point phase stride so neighbouring points do not pulse in lockstep
pub const PHASE_STRIDE: u32 = 7;

const GAMMA: f64 = 0.6;
const ABSOLUTE_SCALE_PM25: f64 = 25.0;

/// Phase in [0, 60) for point `index` at `tick`
#[inline]
pub fn phase(tick: u32, index: usize) -> u32 {
    let offset = (index as u64 * PHASE_STRIDE as u64 % WOBBLE_PERIOD as u64) as u32;
    (tick % WOBBLE_PERIOD + offset) % WOBBLE_PERIOD
}

/// `sin` of the phase angle, in [-1, 1]
#[inline]
pub fn phase_sin(tick: u32, index: usize) -> f64 {
    (phase(tick, index) as f64 / WOBBLE_PERIOD as f64 * TAU).sin()
}

/// PM2.5 range of the current point set
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pm25Range {
    pub min: f64,
    pub max: f64,
}

impl Pm25Range {
    /// Missing readings count as zero. An empty set yields `[0, 0]`.
    pub fn of(points: &[MeasurementPoint]) -> Self {
        let mut values = points.iter().map(MeasurementPoint::pm25_or_zero);
        let Some(first) = values.next() else {
            return Self { min: 0.0, max: 0.0 };
        };
        values.fold(Self { min: first, max: first }, |r, v| Self {
            min: r.min.min(v),
            max: r.max.max(v),
        })
    }

    /// Normalization divisor, floored at [`MIN_RANGE`]
    #[inline]
    pub fn span(&self) -> f64 {
        (self.max - self.min).max(MIN_RANGE)
    }
}

/// Intensity before the wobble is applied
pub fn base_intensity(pm25: f64, range: &Pm25Range) -> f64 {
    let norm = ((pm25 - range.min) / range.span()).clamp(0.0, 1.0);
    let gamma_i = norm.powf(GAMMA);
    let pm_scale = (pm25 / ABSOLUTE_SCALE_PM25).min(1.0);
    gamma_i.max(pm_scale)
}

/// Wobble factor in [0.4, 1.0]
#[inline]
pub fn wobble(tick: u32, index: usize) -> f64 {
    0.7 + 0.3 * phase_sin(tick, index)
}

/// Visual intensity of point `index` at `tick`
pub fn intensity(point: &MeasurementPoint, index: usize, range: &Pm25Range, tick: u32) -> f64 {
    let base = base_intensity(point.pm25_or_zero(), range);
    (base * (0.9 + 0.5 * wobble(tick, index))).clamp(MIN_INTENSITY, MAX_INTENSITY)
}

/// Intensities for a whole set, in point order
pub fn normalize(points: &[MeasurementPoint], tick: u32) -> Vec<f64> {
    let range = Pm25Range::of(points);
    points
        .iter()
        .enumerate()
        .map(|(i, p)| intensity(p, i, &range, tick))
        .collect()
}
