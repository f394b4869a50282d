//! Game state, move application and win/draw detection

use crate::board::{
    LineKind, Move, Player, WinningLine, ANTI_DIAGONAL, BOARD_SIZE, MAIN_DIAGONAL,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    Won(Player),
    Draw,
}

/// Why a move was rejected
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("game is already over")]
    GameOver,

    #[error("cell ({row}, {col}) is off the board")]
    OutOfBounds { row: usize, col: usize },

    #[error("cell ({row}, {col}) is already occupied")]
    Occupied { row: usize, col: usize },
}

/// Why a snapshot cannot be turned back into a game
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("cell ({row}, {col}) holds invalid value {value}")]
    InvalidCell { row: usize, col: usize, value: u8 },

    #[error("impossible mark counts: {ones} for player 1, {twos} for player 2")]
    ImpossibleCounts { ones: usize, twos: usize },
}

/// Immutable copy of a game, safe to serialize and hand out
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cell values: 0 = empty, 1 / 2 = player mark
    pub board: [[u8; BOARD_SIZE]; BOARD_SIZE],
    pub current_player: Player,
    pub game_over: bool,
    /// None while ongoing, or on a draw when `game_over` is set
    pub winner: Option<Player>,
    pub winning_line: Option<WinningLine>,
    /// Number of filled cells
    pub moves_played: u8,
}

// ============================================================================
// GAME STATE
// ============================================================================

/// Game state for one 3x3 match
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    cells: [[Option<Player>; BOARD_SIZE]; BOARD_SIZE],
    current_player: Player,
    game_over: bool,
    winner: Option<Player>,
    winning_line: Option<WinningLine>,
    moves_played: u8,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Empty board, player one to move
    pub fn new() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
            current_player: Player::One,
            game_over: false,
            winner: None,
            winning_line: None,
            moves_played: 0,
        }
    }

    /// Reinitialize to the empty board
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Rebuild a game from a snapshot.
    ///
    /// Win and draw status are recomputed from the cells rather than trusted.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
        let mut cells = [[None; BOARD_SIZE]; BOARD_SIZE];
        let (mut ones, mut twos) = (0usize, 0usize);

        for (row, values) in snapshot.board.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                cells[row][col] = match value {
                    0 => None,
                    1 => {
                        ones += 1;
                        Some(Player::One)
                    }
                    2 => {
                        twos += 1;
                        Some(Player::Two)
                    }
                    value => return Err(SnapshotError::InvalidCell { row, col, value }),
                };
            }
        }

        if ones < twos || ones - twos > 1 {
            return Err(SnapshotError::ImpossibleCounts { ones, twos });
        }

        let mut state = Self {
            cells,
            current_player: snapshot.current_player,
            game_over: false,
            winner: None,
            winning_line: None,
            moves_played: (ones + twos) as u8,
        };

        if let Some((winner, line)) = state.find_any_win() {
            state.game_over = true;
            state.winner = Some(winner);
            state.winning_line = Some(line);
        } else if state.is_full() {
            state.game_over = true;
        } else if ones == twos {
            state.current_player = Player::One;
        } else {
            state.current_player = Player::Two;
        }

        Ok(state)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Player to move. Not meaningful once the game is over: a winning move
    /// leaves the winner here.
    pub fn current_player(&self) -> Player {
        self.current_player
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    pub fn winner(&self) -> Option<Player> {
        self.winner
    }

    pub fn winning_line(&self) -> Option<WinningLine> {
        self.winning_line
    }

    pub fn moves_played(&self) -> u8 {
        self.moves_played
    }

    /// Occupant of a cell, None for empty or off-board cells
    pub fn cell(&self, row: usize, col: usize) -> Option<Player> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn result(&self) -> GameResult {
        match (self.game_over, self.winner) {
            (false, _) => GameResult::Ongoing,
            (true, Some(player)) => GameResult::Won(player),
            (true, None) => GameResult::Draw,
        }
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        let mut board = [[0u8; BOARD_SIZE]; BOARD_SIZE];
        for (row, values) in self.cells.iter().enumerate() {
            for (col, cell) in values.iter().enumerate() {
                board[row][col] = cell.map_or(0, Player::value);
            }
        }

        Snapshot {
            board,
            current_player: self.current_player,
            game_over: self.game_over,
            winner: self.winner,
            winning_line: self.winning_line,
            moves_played: self.moves_played,
        }
    }

    // ========================================================================
    // MOVE GENERATION
    // ========================================================================

    /// Empty cells in row-major order
    pub fn valid_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(BOARD_SIZE * BOARD_SIZE);
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                if self.cells[row][col].is_none() {
                    moves.push(Move::new(row, col));
                }
            }
        }
        moves
    }

    // ========================================================================
    // MOVE APPLICATION
    // ========================================================================

    /// Place the current player's mark at (row, col).
    ///
    /// A rejected move leaves the state untouched. The turn passes only when
    /// the move does not end the game.
    pub fn make_move(&mut self, row: usize, col: usize) -> Result<(), MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        let mv = Move::new(row, col);
        if !mv.is_valid() {
            return Err(MoveError::OutOfBounds { row, col });
        }
        if self.cells[row][col].is_some() {
            return Err(MoveError::Occupied { row, col });
        }

        let player = self.current_player;
        self.cells[row][col] = Some(player);
        self.moves_played += 1;

        if let Some(line) = self.check_winner(mv, player) {
            self.game_over = true;
            self.winner = Some(player);
            self.winning_line = Some(line);
        } else if self.is_full() {
            self.game_over = true;
        } else {
            self.current_player = player.opponent();
        }

        Ok(())
    }

    /// Apply move to a copy (returns new state)
    pub fn apply_move(&self, mv: Move) -> Result<Self, MoveError> {
        let mut next = self.clone();
        next.make_move(mv.row, mv.col)?;
        Ok(next)
    }

    // ========================================================================
    // WIN DETECTION
    // ========================================================================

    /// Check only the lines passing through the just-played cell
    fn check_winner(&self, mv: Move, player: Player) -> Option<WinningLine> {
        let mut candidates = vec![
            WinningLine::new(LineKind::Row, mv.row as u8),
            WinningLine::new(LineKind::Col, mv.col as u8),
        ];
        if mv.on_main_diagonal() {
            candidates.push(WinningLine::new(LineKind::Diag, MAIN_DIAGONAL));
        }
        if mv.on_anti_diagonal() {
            candidates.push(WinningLine::new(LineKind::Diag, ANTI_DIAGONAL));
        }

        candidates
            .into_iter()
            .find(|line| self.line_owned_by(*line, player))
    }

    /// Full scan, used when the last move is unknown
    fn find_any_win(&self) -> Option<(Player, WinningLine)> {
        let mut lines = Vec::with_capacity(2 * BOARD_SIZE + 2);
        for i in 0..BOARD_SIZE as u8 {
            lines.push(WinningLine::new(LineKind::Row, i));
            lines.push(WinningLine::new(LineKind::Col, i));
        }
        lines.push(WinningLine::new(LineKind::Diag, MAIN_DIAGONAL));
        lines.push(WinningLine::new(LineKind::Diag, ANTI_DIAGONAL));

        lines.into_iter().find_map(|line| {
            Player::ALL
                .into_iter()
                .find(|&player| self.line_owned_by(line, player))
                .map(|player| (player, line))
        })
    }

    fn line_owned_by(&self, line: WinningLine, player: Player) -> bool {
        line.cells()
            .iter()
            .all(|cell| self.cells[cell.row][cell.col] == Some(player))
    }

    fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }
}

// ============================================================================
// TESTS
// ============================================================================
