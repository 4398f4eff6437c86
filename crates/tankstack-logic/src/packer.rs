//! Body packer: fills a flexible region with discrete catalog pieces.
//!
//! Pieces are chosen greedily, one at a time, each step taking the piece
//! whose aspect ratio best matches the remaining budget. Pieces are never
//! split; once selection stops, one uniform stretch factor closes the
//! residual gap so the region hits its budget exactly.
//!
//! ```
//! use tankstack_logic::packer::pack;
//!
//! let solution = pack(&[1.0, 2.0, 3.0], 5.9, 256);
//! assert_eq!(solution.height, 6.0);
//! assert!((solution.stretch - 5.9 / 6.0).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};

/// Result of packing one flexible region.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BodySolution {
    /// Chosen pieces, bottom to top, as indices into the packed slice.
    pub pieces: Vec<usize>,
    /// Sum of the chosen pieces' native aspect ratios.
    pub height: f32,
    /// Uniform vertical stretch applied to every piece.
    pub stretch: f32,
}

impl BodySolution {
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Height after stretching.
    pub fn stretched_height(&self) -> f32 {
        self.height * self.stretch
    }

    /// Re-index pieces through `map` (slice position → caller's index).
    pub fn remap(mut self, map: &[usize]) -> Self {
        for piece in &mut self.pieces {
            *piece = map[*piece];
        }
        self
    }
}

/// Greedy selection of pieces approximating `target`.
///
/// `aspects` must be sorted ascending. Returns the chosen indices and their
/// summed aspect ratio. Never exceeds `max_pieces` iterations.
pub fn select_pieces(aspects: &[f32], target: f32, max_pieces: usize) -> (Vec<usize>, f32) {
    let mut pieces = Vec::new();
    let mut height = 0.0f32;
    if aspects.is_empty() || !(target > 0.0) {
        return (pieces, height);
    }
    let smallest = aspects[0];

    while pieces.len() < max_pieces {
        let remainder = target - height;
        let mut best: Option<(usize, f32)> = None;

        for (k, &aspect) in aspects.iter().enumerate() {
            let residual = (remainder - aspect).abs();
            // Worse than stopping here; an equal residual still takes the piece.
            if residual > remainder {
                continue;
            }
            // Overshooting with a larger piece: a smaller piece plus the
            // smallest filler may land closer.
            if remainder - aspect < 0.0 && k > 0 {
                let alternative = (remainder - (aspects[k - 1] + smallest)).abs();
                if alternative < residual {
                    continue;
                }
            }
            match best {
                Some((_, best_residual)) if residual >= best_residual => {}
                _ => best = Some((k, residual)),
            }
        }

        match best {
            Some((k, _)) => {
                pieces.push(k);
                height += aspects[k];
            }
            None => break,
        }
    }

    (pieces, height)
}

/// Uniform stretch closing the gap between `height` and `target`.
pub fn uniform_stretch(height: f32, target: f32) -> f32 {
    if height > 0.0 {
        target / height
    } else {
        0.0
    }
}

/// Pack `target` aspect ratio from pieces with the given sorted `aspects`.
///
/// Empty input or a non-positive target yields an empty solution.
pub fn pack(aspects: &[f32], target: f32, max_pieces: usize) -> BodySolution {
    let (pieces, height) = select_pieces(aspects, target, max_pieces);
    let stretch = if pieces.is_empty() {
        0.0
    } else {
        uniform_stretch(height, target)
    };
    BodySolution {
        pieces,
        height,
        stretch,
    }
}
