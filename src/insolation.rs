//! Top-of-atmosphere solar insolation.
//!
//! Provides the auxiliary input channel generators can append to every
//! input time step. Values are normalised by the solar constant, so a
//! surface facing the sun at mean Earth–Sun distance receives 1.
//!
//! # Method
//!
//! Solar declination, the eccentricity correction factor and the equation
//! of time follow Spencer's Fourier series in the fractional year `γ`:
//!
//! ```text
//! cos(z) = sin(φ) sin(δ) + cos(φ) cos(δ) cos(h)
//! hourly = S · E0 · max(cos(z), 0)
//! daily  = S · E0 · max(cos(φ − δ), 0)      (solar-noon maximum)
//! ```
//!
//! where `h` is the local hour angle from UTC time, longitude and the
//! equation of time.

use crate::dataset::Grid;
use crate::error::Result;
use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{ArrayD, IxDyn};
use std::f64::consts::PI;

/// Normalised solar constant.
pub const SOLAR_CONSTANT: f64 = 1.0;

/// Sun geometry at one instant.
#[derive(Debug, Clone, Copy)]
struct SolarPosition {
    /// Declination (radians)
    declination: f64,
    /// Eccentricity correction factor
    eccentricity: f64,
    /// Equation of time (minutes)
    equation_of_time: f64,
    /// Minutes since 00:00 UTC
    utc_minutes: f64,
}

impl SolarPosition {
    fn at(time: &NaiveDateTime) -> Self {
        let utc_minutes = time.hour() as f64 * 60.0 + time.minute() as f64 + time.second() as f64 / 60.0;
        let gamma = 2.0 * PI / 365.0 * (time.ordinal0() as f64 + (utc_minutes / 60.0 - 12.0) / 24.0);
        let (s1, c1) = gamma.sin_cos();
        let (s2, c2) = (2.0 * gamma).sin_cos();
        let (s3, c3) = (3.0 * gamma).sin_cos();

        let declination = 0.006918 - 0.399912 * c1 + 0.070257 * s1 - 0.006758 * c2
            + 0.000907 * s2
            - 0.002697 * c3
            + 0.00148 * s3;
        let eccentricity = 1.000110 + 0.034221 * c1 + 0.001280 * s1 + 0.000719 * c2 + 0.000077 * s2;
        let equation_of_time =
            229.18 * (0.000075 + 0.001868 * c1 - 0.032077 * s1 - 0.014615 * c2 - 0.040849 * s2);

        Self {
            declination,
            eccentricity,
            equation_of_time,
            utc_minutes,
        }
    }

    fn cos_zenith(&self, lat_deg: f64, lon_deg: f64) -> f64 {
        let lat = lat_deg.to_radians();
        let solar_minutes = self.utc_minutes + self.equation_of_time + 4.0 * lon_deg;
        let hour_angle = (solar_minutes / 4.0 - 180.0).to_radians();
        lat.sin() * self.declination.sin() + lat.cos() * self.declination.cos() * hour_angle.cos()
    }

    fn cos_noon_zenith(&self, lat_deg: f64) -> f64 {
        (lat_deg.to_radians() - self.declination).cos()
    }
}

/// Insolation at every time and grid cell.
///
/// Returns an array of shape `(times.len(), *grid.shape())`. With `daily`,
/// each value is the day's maximum (solar noon) instead of the instantaneous
/// value, removing the diurnal cycle.
///
/// `solar_constant` scales the result; pass [`SOLAR_CONSTANT`] for
/// normalised values.
pub fn insolation(
    times: &[NaiveDateTime],
    grid: &Grid,
    daily: bool,
    solar_constant: f64,
) -> Result<ArrayD<f32>> {
    let mut shape = vec![times.len()];
    shape.extend_from_slice(grid.shape());
    let cells = grid.lat().len();

    let mut values = Vec::with_capacity(times.len() * cells);
    for time in times {
        let instant = match daily {
            true => time.date().and_hms_opt(12, 0, 0).unwrap_or(*time),
            false => *time,
        };
        let sun = SolarPosition::at(&instant);
        for (&lat, &lon) in grid.lat().iter().zip(grid.lon().iter()) {
            let cos_z = if daily {
                sun.cos_noon_zenith(lat)
            } else {
                sun.cos_zenith(lat, lon)
            };
            values.push((solar_constant * sun.eccentricity * cos_z.max(0.0)) as f32);
        }
    }

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_shape() {
        let grid = Grid::regular(&[45.0, 0.0, -45.0], &[0.0, 90.0]);
        let sol = insolation(&[at(2020, 1, 1, 0), at(2020, 1, 1, 6)], &grid, false, 1.0).unwrap();
        assert_eq!(sol.shape(), &[2, 3, 2]);
    }

    #[test]
    fn test_equinox_noon_at_equator() {
        let grid = Grid::regular(&[0.0], &[0.0]);
        let sol = insolation(&[at(2021, 3, 20, 12)], &grid, false, 1.0).unwrap();
        assert!((sol[[0, 0, 0]] - 1.0).abs() < 0.03, "got {}", sol[[0, 0, 0]]);
    }

    #[test]
    fn test_night_is_zero() {
        let grid = Grid::regular(&[0.0], &[0.0]);
        let sol = insolation(&[at(2021, 3, 20, 0)], &grid, false, 1.0).unwrap();
        assert_eq!(sol[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_daily_has_no_diurnal_cycle() {
        let grid = Grid::regular(&[30.0], &[0.0]);
        let sol = insolation(&[at(2021, 6, 1, 0), at(2021, 6, 1, 18)], &grid, true, 1.0).unwrap();
        assert_eq!(sol[[0, 0, 0]], sol[[1, 0, 0]]);
        assert!(sol[[0, 0, 0]] > 0.9);
    }

    #[test]
    fn test_polar_night() {
        let grid = Grid::regular(&[89.0], &[0.0]);
        let sol = insolation(&[at(2021, 12, 21, 12)], &grid, true, 1.0).unwrap();
        assert_eq!(sol[[0, 0, 0]], 0.0);
    }

    #[test]
    fn test_solar_constant_scales() {
        let grid = Grid::regular(&[10.0], &[20.0]);
        let t = [at(2021, 5, 5, 11)];
        let a = insolation(&t, &grid, false, 1.0).unwrap()[[0, 0, 0]];
        let b = insolation(&t, &grid, false, 1361.0).unwrap()[[0, 0, 0]];
        assert!((b / a - 1361.0).abs() < 0.5);
    }
}
