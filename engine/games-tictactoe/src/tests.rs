use super::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;

#[test]
fn test_initial_position() {
    let pos = TicTacToe::new();
    assert_eq!(pos.board(), &[0; 9]);
    assert_eq!(pos.current_player(), 1);
    assert_eq!(pos.winner(), 0);
    assert!(!pos.is_done());
    assert_eq!(pos.terminal_value(), None);
}

#[test]
fn test_legal_moves() {
    let pos = TicTacToe::new();
    assert_eq!(pos.legal_moves(), (0..9).collect::<Vec<_>>());
    assert_eq!(pos.legal_moves_mask(), 0x1FFu16);

    // After one move
    let pos = pos.apply(4);
    let legal = pos.legal_moves();
    assert_eq!(legal.len(), 8);
    assert!(!legal.contains(&4));
    assert_eq!(pos.legal_moves_mask(), 0x1FFu16 & !(1u16 << 4));
}

#[test]
fn test_apply_switches_player() {
    let pos = TicTacToe::new().apply(4);
    assert_eq!(pos.board()[4], 1);
    assert_eq!(pos.current_player(), 2);
    assert!(!pos.is_done());
}

#[test]
fn test_illegal_moves_rejected() {
    let pos = TicTacToe::new().apply(4);
    assert_eq!(pos.try_move(4), None);
    assert_eq!(pos.try_move(9), None);
    assert_eq!(TicTacToe::from_moves(&[4, 4]), None);
}

#[test]
fn test_winning_game_is_terminal_loss_for_side_to_move() {
    // X wins with the top row
    let pos = TicTacToe::from_moves(&[0, 3, 1, 4, 2]).unwrap();

    assert_eq!(pos.winner(), 1);
    assert!(pos.is_done());
    assert!(pos.legal_moves().is_empty());
    // O is to move and has lost
    assert_eq!(pos.current_player(), 2);
    assert_eq!(pos.terminal_value(), Some(-1.0));
}

#[test]
fn test_draw_game() {
    // X O X / X O O / O X X
    let pos = TicTacToe::from_moves(&[0, 1, 2, 4, 3, 5, 7, 6, 8]).unwrap();
    assert_eq!(pos.winner(), 3);
    assert_eq!(pos.terminal_value(), Some(0.0));
}

#[test]
fn test_all_winning_lines() {
    for (line_idx, line) in LINES.iter().enumerate() {
        let mut board_x = [0u8; 9];
        let mut board_o = [0u8; 9];
        for &cell in line {
            board_x[cell] = 1;
            board_o[cell] = 2;
        }
        assert_eq!(TicTacToe::check_winner(&board_x), 1, "line {}", line_idx);
        assert_eq!(TicTacToe::check_winner(&board_o), 2, "line {}", line_idx);
    }
}

#[test]
fn test_transpositions_share_hash_and_equality() {
    // X0 O4 X1 and X1 O4 X0 reach the same board
    let a = TicTacToe::from_moves(&[0, 4, 1]).unwrap();
    let b = TicTacToe::from_moves(&[1, 4, 0]).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.hash_key(), b.hash_key());
}

#[test]
fn test_side_to_move_is_part_of_hash() {
    let mut pos = TicTacToe::new();
    let x_to_move = pos.hash_key();
    pos.current_player = 2;
    assert_ne!(pos.hash_key(), x_to_move);
}

#[test]
fn test_hash_is_collision_free_over_reachable_positions() {
    let mut seen: HashMap<u64, TicTacToe> = HashMap::new();
    let mut stack = vec![TicTacToe::new()];

    while let Some(pos) = stack.pop() {
        if let Some(existing) = seen.insert(pos.hash_key(), pos) {
            assert_eq!(existing, pos, "hash collision between distinct boards");
            continue;
        }
        for mv in pos.legal_moves() {
            stack.push(pos.apply(mv));
        }
    }

    // 5478 legal tic-tac-toe positions
    assert_eq!(seen.len(), 5478);
}

#[test]
fn test_every_move_is_irreversible() {
    let pos = TicTacToe::new();
    assert!(pos.legal_moves().iter().all(|&mv| pos.is_irreversible(mv)));
}

#[test]
fn test_display() {
    let pos = TicTacToe::from_moves(&[0, 4]).unwrap();
    assert_eq!(pos.to_string(), "X..\n.O.\n...\n");
}

/// Play many random games and verify invariants hold
#[test]
fn test_random_games_invariants() {
    for seed in 0..50 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut pos = TicTacToe::new();
        let mut move_count = 0;

        while !pos.is_done() {
            let legal = pos.legal_moves();
            assert!(
                !legal.is_empty(),
                "Non-terminal position must have legal moves (seed={})",
                seed
            );
            assert_eq!(legal.len(), pos.legal_moves_mask().count_ones() as usize);

            let mv = legal[rng.gen_range(0..legal.len())];
            let prev_player = pos.current_player();
            pos = pos.apply(mv);
            move_count += 1;

            assert_ne!(pos.current_player(), prev_player, "seed={}", seed);
            assert_eq!(pos.moves_played(), move_count);
        }

        assert!(move_count <= 9, "seed={}", seed);
        assert!(pos.legal_moves().is_empty());
        let value = pos.terminal_value().expect("finished game has a result");
        assert!(value == 0.0 || value == -1.0, "seed={}", seed);
    }
}
