//! Injectable dice.
//!
//! Every resolution function takes a `&mut dyn DiceRoller` (or a generic
//! `R: DiceRoller`) instead of reaching for ambient randomness. The session
//! owns the only roller for a game; folding events never rolls.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A rolled pair of six-sided dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Individual die faces (1..=6).
    pub dice: [u8; 2],
    /// Sum of both faces.
    pub total: u8,
}

impl DiceRoll {
    /// Build a roll from two faces.
    #[must_use]
    pub const fn new(first: u8, second: u8) -> Self {
        Self {
            dice: [first, second],
            total: first + second,
        }
    }

    /// Whether the roll meets or beats a target number.
    #[must_use]
    pub const fn succeeds(&self, target: u8) -> bool {
        self.total >= target
    }
}

/// Source of randomness for all rules checks.
///
/// Implementors only supply [`DiceRoller::roll_range`]; every other roll is
/// derived from it so a scripted roller controls every outcome.
pub trait DiceRoller {
    /// Uniform value in `0..upper`. `upper` is never zero.
    fn roll_range(&mut self, upper: u32) -> u32;

    /// Roll one six-sided die.
    fn roll_d6(&mut self) -> u8 {
        u8::try_from(self.roll_range(6) + 1).unwrap_or(6)
    }

    /// Roll two six-sided dice.
    fn roll_2d6(&mut self) -> DiceRoll {
        let first = self.roll_d6();
        let second = self.roll_d6();
        DiceRoll::new(first, second)
    }

    /// Pick an index with probability proportional to its weight.
    ///
    /// Returns `None` when the weights sum to zero.
    fn roll_weighted(&mut self, weights: &[u32]) -> Option<usize> {
        let total: u32 = weights.iter().sum();
        if total == 0 {
            return None;
        }
        let mut pick = self.roll_range(total);
        for (index, &weight) in weights.iter().enumerate() {
            if pick < weight {
                return Some(index);
            }
            pick -= weight;
        }
        None
    }

    /// Uniform index into a collection of `len` items.
    fn roll_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        Some(self.roll_range(len as u32) as usize)
    }
}

impl<T: DiceRoller + ?Sized> DiceRoller for &mut T {
    fn roll_range(&mut self, upper: u32) -> u32 {
        (**self).roll_range(upper)
    }
}

/// Seeded roller backed by ChaCha8.
///
/// The same seed always produces the same sequence on every platform.
#[derive(Debug, Clone)]
pub struct SeededDiceRoller {
    seed: u64,
    rng: ChaCha8Rng,
    rolls: u64,
}

impl SeededDiceRoller {
    /// Create a roller from an explicit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            rolls: 0,
        }
    }

    /// The seed this roller started from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of primitive rolls consumed so far.
    #[must_use]
    pub const fn rolls(&self) -> u64 {
        self.rolls
    }
}

impl DiceRoller for SeededDiceRoller {
    fn roll_range(&mut self, upper: u32) -> u32 {
        self.rolls += 1;
        self.rng.gen_range(0..upper.max(1))
    }
}

/// Roller that replays a fixed list of die faces.
///
/// Each primitive roll consumes one face `f` and yields `(f - 1) % upper`,
/// so a face list reads naturally for d6 rolls. The list wraps around when
/// exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedDiceRoller {
    faces: Vec<u8>,
    cursor: usize,
}

impl ScriptedDiceRoller {
    /// Create a roller from die faces (each 1..=6 for d6 rolls).
    #[must_use]
    pub fn new(faces: impl Into<Vec<u8>>) -> Self {
        let mut faces = faces.into();
        if faces.is_empty() {
            faces.push(1);
        }
        Self { faces, cursor: 0 }
    }

    /// Create a roller where every 2d6 roll totals `total` (2..=12).
    #[must_use]
    pub fn constant_total(total: u8) -> Self {
        let total = total.clamp(2, 12);
        let first = (total - 1).min(6);
        Self::new(vec![first, total - first])
    }

    /// Number of faces consumed so far.
    #[must_use]
    pub const fn consumed(&self) -> usize {
        self.cursor
    }

    /// Whether every scripted face has been used at least once.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.faces.len()
    }
}

impl DiceRoller for ScriptedDiceRoller {
    fn roll_range(&mut self, upper: u32) -> u32 {
        let face = self.faces[self.cursor % self.faces.len()];
        self.cursor += 1;
        u32::from(face.saturating_sub(1)) % upper.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_roller_is_reproducible() {
        let mut a = SeededDiceRoller::new(42);
        let mut b = SeededDiceRoller::new(42);
        for _ in 0..100 {
            assert_eq!(a.roll_2d6(), b.roll_2d6());
        }
        assert_eq!(a.rolls(), 200);
    }

    #[test]
    fn test_seeded_roller_stays_in_range() {
        let mut roller = SeededDiceRoller::new(7);
        for _ in 0..1000 {
            let roll = roller.roll_2d6();
            assert!((2..=12).contains(&roll.total));
            assert!(roll.dice.iter().all(|d| (1..=6).contains(d)));
        }
    }

    #[test]
    fn test_scripted_roller_replays_faces() {
        let mut roller = ScriptedDiceRoller::new(vec![3, 4, 6]);
        assert_eq!(roller.roll_2d6(), DiceRoll::new(3, 4));
        assert_eq!(roller.roll_d6(), 6);
        // Wraps around
        assert_eq!(roller.roll_d6(), 3);
        assert!(roller.is_exhausted());
    }

    #[test]
    fn test_constant_total() {
        let mut roller = ScriptedDiceRoller::constant_total(12);
        assert_eq!(roller.roll_2d6().total, 12);
        let mut roller = ScriptedDiceRoller::constant_total(2);
        assert_eq!(roller.roll_2d6().total, 2);
        let mut roller = ScriptedDiceRoller::constant_total(8);
        assert_eq!(roller.roll_2d6().total, 8);
    }

    #[test]
    fn test_weighted_roll_skips_zero_weights() {
        // Face 1 -> 0, face 2 -> 1
        let mut roller = ScriptedDiceRoller::new(vec![1, 2]);
        assert_eq!(roller.roll_weighted(&[0, 1, 1]), Some(1));
        assert_eq!(roller.roll_weighted(&[0, 1, 1]), Some(2));
        assert_eq!(roller.roll_weighted(&[0, 0]), None);
    }

    #[test]
    fn test_roll_index_empty() {
        let mut roller = SeededDiceRoller::new(1);
        assert_eq!(roller.roll_index(0), None);
        assert!(roller.roll_index(5).is_some_and(|i| i < 5));
    }
}
