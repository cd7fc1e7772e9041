//! Rules-engine contract.
//!
//! Games implement this trait with their own position and move types. The
//! search treats positions as opaque values: it asks for legal moves, applies
//! them, checks for the end of the game and hashes positions to detect
//! transpositions.

use std::fmt::Debug;
use std::hash::Hash;

/// Hash key identifying a position. Two equal positions must share a key;
/// distinct positions sharing a key are hash collisions.
pub type PositionKey = u64;

/// Main trait for game positions
///
/// # Example
///
/// ```rust
/// # use engine_core::Position;
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Countdown(u8);
///
/// impl Position for Countdown {
///     type Move = u8;
///
///     fn terminal_value(&self) -> Option<f32> {
///         // The side to move at zero has lost
///         (self.0 == 0).then_some(-1.0)
///     }
///
///     fn legal_moves(&self) -> Vec<u8> {
///         (1..=self.0.min(2)).collect()
///     }
///
///     fn apply(&self, mv: u8) -> Self {
///         Countdown(self.0 - mv)
///     }
///
///     fn hash_key(&self) -> u64 {
///         self.0 as u64
///     }
/// }
///
/// let start = Countdown(3);
/// assert_eq!(start.legal_moves(), vec![1, 2]);
/// assert_eq!(start.apply(2).apply(1).terminal_value(), Some(-1.0));
/// ```
pub trait Position: Clone + Eq + Debug + Send + Sync + 'static {
    /// Move type - small and Copy
    type Move: Copy + Eq + Hash + Debug + Send + Sync + 'static;

    /// Game result if the position ends the game.
    ///
    /// The value is from the perspective of the side to move:
    /// +1.0 win, -1.0 loss, 0.0 draw.
    fn terminal_value(&self) -> Option<f32>;

    /// Legal moves in a stable order. The index of a move in this vector is
    /// its move index inside the search tree.
    ///
    /// Must be empty only for terminal positions.
    fn legal_moves(&self) -> Vec<Self::Move>;

    /// Apply a legal move and return the resulting position.
    fn apply(&self, mv: Self::Move) -> Self;

    /// Hash key of this position.
    fn hash_key(&self) -> PositionKey;

    /// Whether playing `mv` makes every earlier position unreachable
    /// (captures, pawn moves, stone placement...). Repetition checks never
    /// look past an irreversible move.
    fn is_irreversible(&self, _mv: Self::Move) -> bool {
        false
    }

    /// Convenience: is the game over in this position.
    fn is_terminal(&self) -> bool {
        self.terminal_value().is_some()
    }
}
