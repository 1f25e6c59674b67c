//! Weighted prize selection
//!
//! `ProbabilityEngine` is stateless: every call is a pure function of the
//! prize table and the draw it is handed. Randomness comes in through the
//! `DrawSource` trait so tests can force exact draws.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::types::PrizeItem;
use crate::error::{AppError, Result};

/// Upper bound (exclusive) of a uniform draw. Weights are percentage-scale.
pub const DRAW_SCALE: f64 = 100.0;

/// Source of uniform draws in `[0, 100)`.
pub trait DrawSource: Send {
    fn draw(&mut self) -> f64;
}

/// `DrawSource` backed by a `rand` generator.
#[derive(Debug)]
pub struct RandomDraw<R = StdRng> {
    rng: R,
}

impl RandomDraw<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible generator for simulations and tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> RandomDraw<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> DrawSource for RandomDraw<R> {
    fn draw(&mut self) -> f64 {
        self.rng.gen_range(0.0..DRAW_SCALE)
    }
}

/// Replays a fixed sequence of draws, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedDraw {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedDraw {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }
}

impl DrawSource for ScriptedDraw {
    fn draw(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor = self.cursor.wrapping_add(1);
        value
    }
}

/// Cumulative-weight prize resolver.
pub struct ProbabilityEngine;

impl ProbabilityEngine {
    /// Pick one item from `items`.
    ///
    /// Walks the table in order accumulating weight and returns the first
    /// item whose cumulative weight reaches the draw. Tables whose weights
    /// fall short of 100 (or drift in floating point) fall back to the last
    /// item. Negative and NaN weights count as zero.
    ///
    /// # Errors
    /// `EmptyPrizeTable` when `items` is empty.
    pub fn resolve<'a>(items: &'a [PrizeItem], draws: &mut dyn DrawSource) -> Result<&'a PrizeItem> {
        let last = items.last().ok_or(AppError::EmptyPrizeTable)?;
        let roll = draws.draw();

        let mut cumulative = 0.0;
        for item in items {
            cumulative += item.weight.max(0.0);
            if roll <= cumulative {
                return Ok(item);
            }
        }

        Ok(last)
    }

    /// Resolve `count` independent draws against the same table.
    pub fn resolve_many(
        items: &[PrizeItem],
        count: u32,
        draws: &mut dyn DrawSource,
    ) -> Result<Vec<PrizeItem>> {
        if items.is_empty() {
            return Err(AppError::EmptyPrizeTable);
        }
        (0..count)
            .map(|_| Self::resolve(items, draws).cloned())
            .collect()
    }
}
