//! Computer players: uniform random and exhaustive minimax

use crate::board::{Move, Player};
use crate::game::{GameResult, GameState};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Base score of a win; the search depth is subtracted so faster wins rank higher
const WIN_VALUE: i32 = 10;

// ============================================================================
// RANDOM AI
// ============================================================================

/// Picks uniformly among the empty cells
pub struct RandomAI {
    rng: ChaCha8Rng,
}

impl RandomAI {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn best_move(&mut self, state: &GameState) -> Option<Move> {
        if state.is_over() {
            return None;
        }
        state.valid_moves().choose(&mut self.rng).copied()
    }
}

// ============================================================================
// MINIMAX AI
// ============================================================================

/// Full-depth minimax. Never loses; ties between equally good moves are
/// broken with the seeded RNG.
pub struct MinimaxAI {
    rng: ChaCha8Rng,
}

impl MinimaxAI {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn best_move(&mut self, state: &GameState) -> Option<Move> {
        if state.is_over() {
            return None;
        }
        let me = state.current_player();

        let mut best_score = i32::MIN;
        let mut best_moves = Vec::new();
        for mv in state.valid_moves() {
            let Ok(next) = state.apply_move(mv) else {
                continue;
            };
            let score = minimax(&next, me, 1);
            if score > best_score {
                best_score = score;
                best_moves.clear();
            }
            if score == best_score {
                best_moves.push(mv);
            }
        }

        best_moves.choose(&mut self.rng).copied()
    }
}

/// Score of `state` from `me`'s point of view
fn minimax(state: &GameState, me: Player, depth: i32) -> i32 {
    match state.result() {
        GameResult::Won(player) if player == me => WIN_VALUE - depth,
        GameResult::Won(_) => depth - WIN_VALUE,
        GameResult::Draw => 0,
        GameResult::Ongoing => {
            let scores = state
                .valid_moves()
                .into_iter()
                .filter_map(|mv| state.apply_move(mv).ok())
                .map(|next| minimax(&next, me, depth + 1));

            if state.current_player() == me {
                scores.max().unwrap_or(0)
            } else {
                scores.min().unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(moves: &[(usize, usize)]) -> GameState {
        let mut game = GameState::new();
        for &(row, col) in moves {
            game.make_move(row, col).unwrap();
        }
        game
    }

    #[test]
    fn test_random_picks_empty_cell() {
        let game = play(&[(0, 0), (1, 1)]);
        let mut ai = RandomAI::with_seed(7);
        for _ in 0..20 {
            let mv = ai.best_move(&game).unwrap();
            assert!(game.valid_moves().contains(&mv));
        }
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let game = GameState::new();
        let a: Vec<_> = {
            let mut ai = RandomAI::with_seed(42);
            (0..5).map(|_| ai.best_move(&game)).collect()
        };
        let b: Vec<_> = {
            let mut ai = RandomAI::with_seed(42);
            (0..5).map(|_| ai.best_move(&game)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_move_when_over() {
        let game = play(&[(0, 0), (1, 1), (0, 1), (2, 2), (0, 2)]);
        assert_eq!(RandomAI::with_seed(1).best_move(&game), None);
        assert_eq!(MinimaxAI::with_seed(1).best_move(&game), None);
    }

    #[test]
    fn test_minimax_takes_win() {
        // X X . / O O . / . . .  -- X to move wins at (0, 2)
        let game = play(&[(0, 0), (1, 0), (0, 1), (1, 1)]);
        let mv = MinimaxAI::with_seed(3).best_move(&game).unwrap();
        assert_eq!(mv, Move::new(0, 2));
    }

    #[test]
    fn test_minimax_blocks_loss() {
        // X X . / . O . / . . .  -- O must block at (0, 2)
        let game = play(&[(0, 0), (1, 1), (0, 1)]);
        let mv = MinimaxAI::with_seed(3).best_move(&game).unwrap();
        assert_eq!(mv, Move::new(0, 2));
    }

    #[test]
    fn test_minimax_self_play_draws() {
        let mut game = GameState::new();
        let mut ai = MinimaxAI::with_seed(11);
        while let Some(mv) = ai.best_move(&game) {
            game.make_move(mv.row, mv.col).unwrap();
        }
        assert_eq!(game.result(), GameResult::Draw);
    }

    #[test]
    fn test_minimax_never_loses_to_random() {
        for seed in 0..10 {
            let mut game = GameState::new();
            let mut random = RandomAI::with_seed(seed);
            let mut minimax = MinimaxAI::with_seed(seed);
            let minimax_side = if seed % 2 == 0 { Player::One } else { Player::Two };

            while !game.is_over() {
                let mv = if game.current_player() == minimax_side {
                    minimax.best_move(&game)
                } else {
                    random.best_move(&game)
                }
                .unwrap();
                game.make_move(mv.row, mv.col).unwrap();
            }

            assert_ne!(game.result(), GameResult::Won(minimax_side.opponent()));
        }
    }
}
