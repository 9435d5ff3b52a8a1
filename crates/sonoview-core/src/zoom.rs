//! Zoom constraints
//!
//! A zoom constraint maps an arbitrary requested block size (samples per
//! pixel) onto one a model can serve efficiently. Waveform models only keep
//! summaries at power-of-two and power-of-sqrt-two block sizes, so views
//! showing them must snap onto that sequence.
//!
//! ## Step sequence of [`PowerOfSqrtTwoZoomConstraint`] (min cache power 8)
//!
//! ```text
//! direct reads:  1  2  4  5  8  11  16  22  32  45  64  90  128  181
//! cached:        256  362  512  724  1024  1448  ...  131072  185344  262144
//! ```
//!
//! Sizes below `2^min_cache_power` are read straight from the sample source.
//! From there on each power of two alternates with an integer multiple of
//! the sqrt-two cache block (`floor(256 * sqrt 2 + 0.01) = 362`), so every
//! cached step aggregates a whole number of cache entries.

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::types::{ZoomLevel, DEFAULT_MIN_CACHE_POWER, MAX_ZOOM_LEVEL};

/// Which way to snap a requested block size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingDirection {
    RoundDown,
    RoundUp,
    RoundNearest,
}

/// Which summary cache serves a block size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// `2^power`, aggregated from the power-of-two cache
    PowerOfTwo { power: u32 },
    /// `362 * 2^(power - min_cache_power)`, aggregated from the sqrt-two cache
    PowerOfSqrtTwo { power: u32 },
    /// Below the smallest cached block: read samples directly
    Direct,
}

/// A snapped block size together with the cache that serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSizeChoice {
    pub block_size: ZoomLevel,
    pub cache: CacheKind,
}

/// Rule for mapping requested block sizes onto supported ones
///
/// Implementations must keep `nearest_block_size(r, RoundUp) >= r` (unless
/// clamped at the maximum), `nearest_block_size(r, RoundDown) <= r`, and
/// never return less than 1.
pub trait ZoomConstraint: Send + Sync {
    fn nearest_block_size(&self, requested: ZoomLevel, dir: RoundingDirection) -> ZoomLevel;

    fn max_zoom_level(&self) -> ZoomLevel {
        MAX_ZOOM_LEVEL
    }
}

/// Accepts any block size between 1 and the maximum
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconstrained;

impl ZoomConstraint for Unconstrained {
    fn nearest_block_size(&self, requested: ZoomLevel, _dir: RoundingDirection) -> ZoomLevel {
        requested.clamp(1, self.max_zoom_level())
    }
}

/// Powers of two only
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerOfTwoZoomConstraint;

impl ZoomConstraint for PowerOfTwoZoomConstraint {
    fn nearest_block_size(&self, requested: ZoomLevel, dir: RoundingDirection) -> ZoomLevel {
        let requested = requested.clamp(1, self.max_zoom_level());
        if requested.is_power_of_two() {
            return requested;
        }
        let up = requested.next_power_of_two();
        let down = up / 2;
        let chosen = match dir {
            RoundingDirection::RoundDown => down,
            RoundingDirection::RoundUp => up,
            RoundingDirection::RoundNearest => {
                if requested - down <= up - requested {
                    down
                } else {
                    up
                }
            }
        };
        chosen.min(self.max_zoom_level())
    }
}

/// Alternating powers of two and sqrt-two multiples (see module docs)
#[derive(Debug, Clone, Copy)]
pub struct PowerOfSqrtTwoZoomConstraint {
    min_cache_power: u32,
}

impl Default for PowerOfSqrtTwoZoomConstraint {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CACHE_POWER)
    }
}

impl PowerOfSqrtTwoZoomConstraint {
    pub fn new(min_cache_power: u32) -> Self {
        Self { min_cache_power }
    }

    pub fn min_cache_power(&self) -> u32 {
        self.min_cache_power
    }

    /// Smallest block kept in the power-of-two cache
    pub fn pow2_cache_block(&self) -> u64 {
        1u64 << self.min_cache_power
    }

    /// Smallest block kept in the sqrt-two cache
    pub fn sqrt2_cache_block(&self) -> u64 {
        (self.pow2_cache_block() as f64 * SQRT_2 + 0.01) as u64
    }

    /// Block size for a cache kind, or `None` for direct reads
    pub fn block_size_for(&self, cache: CacheKind) -> Option<u64> {
        match cache {
            CacheKind::PowerOfTwo { power } => Some(1u64 << power),
            CacheKind::PowerOfSqrtTwo { power } => {
                Some(self.sqrt2_cache_block() << (power - self.min_cache_power))
            }
            CacheKind::Direct => None,
        }
    }

    /// Snap `requested` and report which cache can serve the result
    pub fn nearest_block_size_detailed(
        &self,
        requested: ZoomLevel,
        dir: RoundingDirection,
    ) -> BlockSizeChoice {
        let requested = requested.clamp(1, self.max_zoom_level());
        let min_cache = self.pow2_cache_block();

        if (requested as u64) < min_cache {
            return BlockSizeChoice {
                block_size: direct_step(requested, dir),
                cache: CacheKind::Direct,
            };
        }

        let target = requested as u64;
        let mut prev: Option<(u64, CacheKind)> = None;
        let mut step = 0u32;
        loop {
            let power = self.min_cache_power + step / 2;
            let cache = if step % 2 == 0 {
                CacheKind::PowerOfTwo { power }
            } else {
                CacheKind::PowerOfSqrtTwo { power }
            };
            let base = self.block_size_for(cache).unwrap_or(min_cache);

            if base >= target {
                let (size, cache) = match (dir, prev) {
                    _ if base == target => (base, cache),
                    (RoundingDirection::RoundUp, _) | (_, None) => (base, cache),
                    (RoundingDirection::RoundDown, Some(p)) => p,
                    (RoundingDirection::RoundNearest, Some(p)) => {
                        if target - p.0 <= base - target {
                            p
                        } else {
                            (base, cache)
                        }
                    }
                };
                return BlockSizeChoice {
                    block_size: size.min(u32::MAX as u64) as ZoomLevel,
                    cache,
                };
            }

            prev = Some((base, cache));
            step += 1;
        }
    }
}

impl ZoomConstraint for PowerOfSqrtTwoZoomConstraint {
    fn nearest_block_size(&self, requested: ZoomLevel, dir: RoundingDirection) -> ZoomLevel {
        self.nearest_block_size_detailed(requested, dir).block_size
    }
}

/// `sqrt(2)^k` steps (truncated) used for direct reads
fn direct_step(requested: ZoomLevel, dir: RoundingDirection) -> ZoomLevel {
    let mut val = 1.0f64;
    let mut prev = 1.0f64;
    while ((val + 0.01) as ZoomLevel) < requested {
        prev = val;
        val *= SQRT_2;
    }
    let up = (val + 0.01) as ZoomLevel;
    let down = (prev + 0.01) as ZoomLevel;
    if up == requested {
        return up;
    }
    match dir {
        RoundingDirection::RoundUp => up,
        RoundingDirection::RoundDown => down,
        RoundingDirection::RoundNearest => {
            if up - requested < requested - down {
                up
            } else {
                down
            }
        }
    }
}

/// Tie-break used when layers disagree about a block size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoomPolicy {
    /// Take whichever layer's candidate lies furthest from the request
    #[default]
    FurthestFromRequest,
    /// Largest candidate when rounding up or to nearest, smallest when rounding down
    MostRestrictive,
}

/// Negotiate one block size across the constraints of several layers
///
/// `None` entries stand for layers without a constraint of their own; they
/// get the power-of-sqrt-two default. With no layers at all the request is
/// returned unchanged.
pub fn negotiate_block_size<'a, I>(
    constraints: I,
    requested: ZoomLevel,
    dir: RoundingDirection,
    policy: ZoomPolicy,
) -> ZoomLevel
where
    I: IntoIterator<Item = Option<&'a dyn ZoomConstraint>>,
{
    let fallback = PowerOfSqrtTwoZoomConstraint::default();
    let mut candidate: Option<ZoomLevel> = None;

    for constraint in constraints {
        let this = match constraint {
            Some(c) => c.nearest_block_size(requested, dir),
            None => fallback.nearest_block_size(requested, dir),
        };

        candidate = Some(match (candidate, policy) {
            (None, _) => this,
            (Some(current), ZoomPolicy::FurthestFromRequest) => {
                if (this > requested && this > current) || (this < requested && this < current) {
                    this
                } else {
                    current
                }
            }
            (Some(current), ZoomPolicy::MostRestrictive) => match dir {
                RoundingDirection::RoundDown => current.min(this),
                _ => current.max(this),
            },
        });
    }

    candidate.unwrap_or(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use RoundingDirection::*;

    const ALL_DIRS: [RoundingDirection; 3] = [RoundDown, RoundUp, RoundNearest];

    fn steps(constraint: &dyn ZoomConstraint, up_to: ZoomLevel) -> Vec<ZoomLevel> {
        let mut out = Vec::new();
        let mut z = 1;
        while z <= up_to {
            let next = constraint.nearest_block_size(z, RoundUp);
            if out.last() != Some(&next) {
                out.push(next);
            }
            z = next + 1;
        }
        out
    }

    #[test]
    fn test_unconstrained_clamps_to_range() {
        let c = Unconstrained;
        assert_eq!(c.nearest_block_size(0, RoundDown), 1);
        assert_eq!(c.nearest_block_size(777, RoundUp), 777);
        assert_eq!(c.nearest_block_size(10_000_000, RoundDown), MAX_ZOOM_LEVEL);
    }

    #[test]
    fn test_sqrt_two_direct_steps() {
        let c = PowerOfSqrtTwoZoomConstraint::default();
        assert_eq!(
            steps(&c, 200),
            vec![1, 2, 4, 5, 8, 11, 16, 22, 32, 45, 64, 90, 128, 181, 256]
        );
    }

    #[test]
    fn test_sqrt_two_cached_steps() {
        let c = PowerOfSqrtTwoZoomConstraint::default();
        let cached: Vec<_> = steps(&c, 3000).into_iter().filter(|&z| z >= 256).collect();
        assert_eq!(cached, vec![256, 362, 512, 724, 1024, 1448, 2048, 2896, 4096]);
    }

    #[test]
    fn test_sqrt_two_reports_cache_kind() {
        let c = PowerOfSqrtTwoZoomConstraint::default();
        assert_eq!(
            c.nearest_block_size_detailed(100, RoundDown).cache,
            CacheKind::Direct
        );
        assert_eq!(
            c.nearest_block_size_detailed(1000, RoundDown),
            BlockSizeChoice {
                block_size: 724,
                cache: CacheKind::PowerOfSqrtTwo { power: 9 }
            }
        );
        assert_eq!(
            c.nearest_block_size_detailed(1000, RoundUp),
            BlockSizeChoice {
                block_size: 1024,
                cache: CacheKind::PowerOfTwo { power: 10 }
            }
        );
    }

    #[test]
    fn test_sqrt_two_nearest() {
        let c = PowerOfSqrtTwoZoomConstraint::default();
        assert_eq!(c.nearest_block_size(400, RoundNearest), 362);
        assert_eq!(c.nearest_block_size(500, RoundNearest), 512);
        assert_eq!(c.nearest_block_size(6, RoundNearest), 5);
    }

    #[test]
    fn test_rounding_invariants_hold_for_every_constraint() {
        let constraints: [&dyn ZoomConstraint; 3] = [
            &Unconstrained,
            &PowerOfTwoZoomConstraint,
            &PowerOfSqrtTwoZoomConstraint::default(),
        ];
        for c in constraints {
            for r in (1..5000).chain([65_535, 200_000, MAX_ZOOM_LEVEL]) {
                let up = c.nearest_block_size(r, RoundUp);
                let down = c.nearest_block_size(r, RoundDown);
                assert!(up >= r, "up {} < {}", up, r);
                assert!(down <= r, "down {} > {}", down, r);
                assert!(down >= 1);
                for dir in ALL_DIRS {
                    let z = c.nearest_block_size(r, dir);
                    assert_eq!(c.nearest_block_size(z, dir), z, "{} not a fixed point", z);
                }
            }
        }
    }

    #[test]
    fn test_maximum_clamps_round_up() {
        let c = PowerOfSqrtTwoZoomConstraint::default();
        assert_eq!(c.nearest_block_size(MAX_ZOOM_LEVEL + 10, RoundUp), MAX_ZOOM_LEVEL);
        assert_eq!(
            PowerOfTwoZoomConstraint.nearest_block_size(u32::MAX, RoundUp),
            MAX_ZOOM_LEVEL
        );
    }

    #[test]
    fn test_power_of_two() {
        let c = PowerOfTwoZoomConstraint;
        assert_eq!(c.nearest_block_size(300, RoundDown), 256);
        assert_eq!(c.nearest_block_size(300, RoundUp), 512);
        assert_eq!(c.nearest_block_size(300, RoundNearest), 256);
        assert_eq!(c.nearest_block_size(450, RoundNearest), 512);
    }

    #[test]
    fn test_negotiation_picks_furthest_candidate() {
        let sqrt2 = PowerOfSqrtTwoZoomConstraint::default();
        let pow2 = PowerOfTwoZoomConstraint;
        let layers: Vec<Option<&dyn ZoomConstraint>> = vec![Some(&sqrt2), Some(&pow2)];

        // sqrt2 -> 1448, pow2 -> 2048
        let up = negotiate_block_size(layers.clone(), 1100, RoundUp, ZoomPolicy::default());
        assert_eq!(up, 2048);
        // sqrt2 -> 1024, pow2 -> 1024
        let down = negotiate_block_size(layers, 1100, RoundDown, ZoomPolicy::default());
        assert_eq!(down, 1024);
    }

    #[test]
    fn test_negotiation_uses_default_for_unconstrained_layers() {
        let z = negotiate_block_size(vec![None], 1000, RoundDown, ZoomPolicy::default());
        assert_eq!(z, 724);
        let z = negotiate_block_size(Vec::new(), 1000, RoundDown, ZoomPolicy::default());
        assert_eq!(z, 1000);
    }

    #[test]
    fn test_most_restrictive_policy() {
        let sqrt2 = PowerOfSqrtTwoZoomConstraint::default();
        let pow2 = PowerOfTwoZoomConstraint;
        let free = Unconstrained;
        let layers: Vec<Option<&dyn ZoomConstraint>> = vec![Some(&free), Some(&sqrt2), Some(&pow2)];

        let up = negotiate_block_size(layers.clone(), 1100, RoundUp, ZoomPolicy::MostRestrictive);
        assert_eq!(up, 2048);
        let down = negotiate_block_size(layers, 1100, RoundDown, ZoomPolicy::MostRestrictive);
        assert_eq!(down, 1024);
    }
}
