//! TicTacToe rules for the search engine
//!
//! This crate provides a small, complete `Position` implementation. It is
//! used by the search tests, the benchmarks and the self-play driver.
//! TicTacToe is a convenient test bed because many move orders reach the
//! same board (transpositions) and every game ends within nine plies.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Position;
//! use games_tictactoe::TicTacToe;
//!
//! let start = TicTacToe::new();
//! assert_eq!(start.legal_moves().len(), 9);
//!
//! // X takes the top row
//! let end = TicTacToe::from_moves(&[0, 3, 1, 4, 2]).unwrap();
//! assert_eq!(end.terminal_value(), Some(-1.0)); // O to move, O has lost
//! ```

use std::fmt;

use engine_core::{Position, PositionKey};

/// Winning positions (rows, columns, diagonals)
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8], // rows
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8], // columns
    [0, 4, 8],
    [2, 4, 6], // diagonals
];

/// TicTacToe position
///
/// Represents the complete state of a TicTacToe game including the board,
/// the side to move, and winner information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicTacToe {
    /// Board representation: 0=empty, 1=X, 2=O
    board: [u8; 9],
    /// Side to move: 1=X, 2=O
    current_player: u8,
    /// Winner: 0=none/ongoing, 1=X, 2=O, 3=draw
    winner: u8,
}

impl TicTacToe {
    /// Create a new initial position (X to move)
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            current_player: 1,
            winner: 0,
        }
    }

    /// Play a sequence of moves from the initial position.
    /// Returns None if any move is illegal.
    pub fn from_moves(moves: &[u8]) -> Option<Self> {
        moves.iter().try_fold(Self::new(), |pos, &mv| pos.try_move(mv))
    }

    pub fn board(&self) -> &[u8; 9] {
        &self.board
    }

    pub fn current_player(&self) -> u8 {
        self.current_player
    }

    pub fn winner(&self) -> u8 {
        self.winner
    }

    /// Check if the game is over
    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Number of stones on the board
    pub fn moves_played(&self) -> usize {
        self.board.iter().filter(|&&cell| cell != 0).count()
    }

    /// Bit-mask representation of legal moves.
    ///
    /// Bits 0-8 correspond to board cells 0-8. When the game is finished the
    /// mask is zeroed.
    pub fn legal_moves_mask(&self) -> u16 {
        if self.is_done() {
            return 0;
        }

        self.board
            .iter()
            .enumerate()
            .fold(0u16, |mask, (idx, cell)| {
                if *cell == 0 {
                    mask | (1u16 << idx)
                } else {
                    mask
                }
            })
    }

    /// Place a stone for the side to move. Returns None for an illegal move.
    pub fn try_move(&self, cell: u8) -> Option<Self> {
        if self.is_done() || cell >= 9 || self.board[cell as usize] != 0 {
            return None;
        }

        let mut next = *self;
        next.board[cell as usize] = self.current_player;
        next.winner = Self::check_winner(&next.board);
        next.current_player = if self.current_player == 1 { 2 } else { 1 };
        Some(next)
    }

    /// Check for winner on the board
    fn check_winner(board: &[u8; 9]) -> u8 {
        for line in &LINES {
            let [a, b, c] = *line;
            if board[a] != 0 && board[a] == board[b] && board[b] == board[c] {
                return board[a];
            }
        }

        // Board full but no winner
        if board.iter().all(|&cell| cell != 0) {
            return 3;
        }

        0
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}

impl Position for TicTacToe {
    type Move = u8;

    fn terminal_value(&self) -> Option<f32> {
        match self.winner {
            0 => None,
            3 => Some(0.0),
            // Only the player who just moved can complete a line
            _ => Some(-1.0),
        }
    }

    fn legal_moves(&self) -> Vec<u8> {
        if self.is_done() {
            return Vec::new();
        }

        (0..9u8)
            .filter(|&cell| self.board[cell as usize] == 0)
            .collect()
    }

    fn apply(&self, mv: u8) -> Self {
        // Callers only pass moves from legal_moves()
        self.try_move(mv).unwrap_or(*self)
    }

    /// Base-3 board encoding plus the side to move; collision free.
    fn hash_key(&self) -> PositionKey {
        let board = self
            .board
            .iter()
            .rev()
            .fold(0u64, |acc, &cell| acc * 3 + cell as u64);
        (board << 1) | (self.current_player as u64 - 1)
    }

    /// Stones are never removed
    fn is_irreversible(&self, _mv: u8) -> bool {
        true
    }
}

impl fmt::Display for TicTacToe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.board.chunks(3) {
            let line: String = row
                .iter()
                .map(|&cell| match cell {
                    1 => 'X',
                    2 => 'O',
                    _ => '.',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
