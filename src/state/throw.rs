use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Sector number of the bullseye.
pub const BULL: u8 = 25;

/// Sectors a dart can land in, used when simulating throws.
const SECTORS: [u8; 21] = [
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, BULL,
];

/// A validated dart throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Throw {
    /// Sector hit, `1..=20` or `25` for the bull.
    pub sector: u8,
    /// Ring multiplier: 1 (single), 2 (double) or 3 (treble).
    pub multiplier: u8,
    /// Points scored, always `sector * multiplier`.
    pub total: u16,
}

/// Raised when a sector/multiplier pair cannot describe a dart on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid throw: sector {sector} with multiplier {multiplier}")]
pub struct InvalidThrow {
    /// Sector as received.
    pub sector: u32,
    /// Multiplier as received.
    pub multiplier: u32,
}

/// Turn a raw sector/multiplier pair into a [`Throw`].
///
/// A treble bull does not exist on a physical board and is coerced to a double bull.
pub fn classify(sector: u32, multiplier: u32) -> Result<Throw, InvalidThrow> {
    let invalid = InvalidThrow { sector, multiplier };

    let sector = u8::try_from(sector).map_err(|_| invalid)?;
    if !(1..=20).contains(&sector) && sector != BULL {
        return Err(invalid);
    }

    let mut multiplier = match multiplier {
        1..=3 => multiplier as u8,
        _ => return Err(invalid),
    };
    if sector == BULL && multiplier == 3 {
        multiplier = 2;
    }

    Ok(Throw {
        sector,
        multiplier,
        total: u16::from(sector) * u16::from(multiplier),
    })
}

impl Throw {
    /// Draw a random dart the way the simulation endpoint does: uniform sector, then uniform ring.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        let sector = SECTORS[rng.random_range(0..SECTORS.len())];
        let multiplier = rng.random_range(1..=3u32);
        // Every drawn pair is on the board, bull trebles get coerced.
        classify(u32::from(sector), multiplier).unwrap_or(Throw {
            sector,
            multiplier: 1,
            total: u16::from(sector),
        })
    }

    /// Whether the dart landed in a double ring (including the inner bull).
    pub fn is_double(&self) -> bool {
        self.multiplier == 2
    }
}

impl fmt::Display for Throw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.sector, self.multiplier) {
            (BULL, 2) => write!(f, "Bull"),
            (BULL, _) => write!(f, "25"),
            (sector, 3) => write!(f, "T{sector}"),
            (sector, 2) => write!(f, "D{sector}"),
            (sector, _) => write!(f, "S{sector}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn computes_total_from_sector_and_ring() {
        let throw = classify(20, 3).unwrap();
        assert_eq!(throw.total, 60);
        assert_eq!(throw.to_string(), "T20");
        assert_eq!(classify(7, 1).unwrap().total, 7);
    }

    #[test]
    fn treble_bull_is_coerced_to_double() {
        let throw = classify(25, 3).unwrap();
        assert_eq!(
            throw,
            Throw {
                sector: 25,
                multiplier: 2,
                total: 50
            }
        );
        assert_eq!(throw.to_string(), "Bull");
    }

    #[test]
    fn rejects_off_board_values() {
        assert!(classify(0, 1).is_err());
        assert!(classify(21, 1).is_err());
        assert!(classify(24, 1).is_err());
        assert!(classify(300, 1).is_err());
        assert!(classify(20, 0).is_err());
        assert!(classify(20, 4).is_err());
    }

    #[test]
    fn random_throws_stay_on_the_board() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let throw = Throw::random(&mut rng);
            assert!((1..=20).contains(&throw.sector) || throw.sector == BULL);
            assert!((1..=3).contains(&throw.multiplier));
            assert!(!(throw.sector == BULL && throw.multiplier == 3));
            assert_eq!(throw.total, u16::from(throw.sector) * u16::from(throw.multiplier));
        }
    }
}
