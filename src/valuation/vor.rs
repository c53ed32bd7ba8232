// Value over replacement player (VORP).
//
// Each position has a fixed replacement-level projection. A player's VORP is
// how far the season projection clears that baseline, floored at zero.

use crate::draft::pick::Position;

/// Replacement-level season projection for a position.
pub fn replacement_baseline(pos: Position) -> f64 {
    match pos {
        Position::Quarterback => 200.0,
        Position::RunningBack => 120.0,
        Position::WideReceiver => 110.0,
        Position::TightEnd => 75.0,
        Position::Kicker => 100.0,
        Position::Defense => 80.0,
    }
}

/// VORP for a projection at a position. Never negative.
pub fn vorp(pos: Position, projection: f64) -> f64 {
    (projection - replacement_baseline(pos)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn vorp_reference_values() {
        assert!(approx_eq(vorp(Position::Quarterback, 350.0), 150.0));
        assert!(approx_eq(vorp(Position::RunningBack, 300.0), 180.0));
        assert!(approx_eq(vorp(Position::TightEnd, 180.0), 105.0));
    }

    #[test]
    fn vorp_floors_at_zero() {
        assert_eq!(vorp(Position::WideReceiver, 90.0), 0.0);
        assert_eq!(vorp(Position::Quarterback, 0.0), 0.0);
    }

    #[test]
    fn baseline_exactly_yields_zero() {
        for pos in [
            Position::Quarterback,
            Position::RunningBack,
            Position::WideReceiver,
            Position::TightEnd,
            Position::Kicker,
            Position::Defense,
        ] {
            assert_eq!(vorp(pos, replacement_baseline(pos)), 0.0);
        }
    }

    #[test]
    fn vorp_monotone_in_projection() {
        let mut prev = vorp(Position::RunningBack, 0.0);
        for proj in (0..400).step_by(10) {
            let v = vorp(Position::RunningBack, proj as f64);
            assert!(v >= prev);
            prev = v;
        }
    }
}
