// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::Position;

/// Mean radius of Earth, in kilometers.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
pub const EARTH_RADIUS: f64 = 6371.0088;

/// Mean diameter of Earth, in kilometers.
/// Source: https://en.wikipedia.org/wiki/Earth_radius#Arithmetic_mean_radius
pub const EARTH_DIAMETER: f64 = EARTH_RADIUS + EARTH_RADIUS;

/// Calculates the [euclidean distance](https://en.wikipedia.org/wiki/Euclidean_distance)
/// between two points, in the same units as the input positions.
pub fn euclidean_distance(a: Position, b: Position) -> f64 {
    (a.lat - b.lat).hypot(a.lon - b.lon)
}

/// Calculates the [taxicab distance](https://en.wikipedia.org/wiki/Taxicab_geometry)
/// between two points, in the same units as the input positions.
pub fn taxicab_distance(a: Position, b: Position) -> f64 {
    (a.lat - b.lat).abs() + (a.lon - b.lon).abs()
}

/// Calculates the great-circle distance between two lat-lon positions
/// on Earth using the [haversine formula](https://en.wikipedia.org/wiki/Haversine_formula).
/// Returns the result in kilometers.
pub fn haversine_earth_distance(a: Position, b: Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lon1 = a.lon.to_radians();
    let lat2 = b.lat.to_radians();
    let lon2 = b.lon.to_radians();

    let sin_dlat_half = ((lat2 - lat1) * 0.5).sin();
    let sin_dlon_half = ((lon2 - lon1) * 0.5).sin();

    let h = sin_dlat_half * sin_dlat_half + lat1.cos() * lat2.cos() * sin_dlon_half * sin_dlon_half;

    EARTH_DIAMETER * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAWEL: Position = Position::new(50.05430, 19.93561);
    const KOPIEC: Position = Position::new(50.05499, 19.88821);
    const TYNIEC: Position = Position::new(49.99726, 19.80159);

    #[test]
    fn haversine_wawel_kopiec() {
        let d = haversine_earth_distance(WAWEL, KOPIEC);
        assert!((d - 3.384924).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn haversine_wawel_tyniec() {
        let d = haversine_earth_distance(WAWEL, TYNIEC);
        assert!((d - 11.484250).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        assert_eq!(
            haversine_earth_distance(WAWEL, TYNIEC),
            haversine_earth_distance(TYNIEC, WAWEL),
        );
    }

    #[test]
    fn euclidean() {
        let d = euclidean_distance(Position::new(1.0, 2.0), Position::new(4.0, 6.0));
        assert_eq!(d, 5.0);
    }

    #[test]
    fn taxicab() {
        let d = taxicab_distance(Position::new(1.0, 2.0), Position::new(4.0, 6.0));
        assert_eq!(d, 7.0);
    }
}
