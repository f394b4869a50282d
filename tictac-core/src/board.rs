//! Board geometry: players, coordinates and winning lines

use serde::{Deserialize, Serialize};

/// Board side length
pub const BOARD_SIZE: usize = 3;

/// Diagonal index for the main diagonal (row == col)
pub const MAIN_DIAGONAL: u8 = 1;

/// Diagonal index for the anti-diagonal (row + col == 2)
pub const ANTI_DIAGONAL: u8 = 2;

/// Player mark. The numeric value doubles as the seat number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    One = 1,
    Two = 2,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Numeric value written into board cells (1 or 2)
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Zero-based slot index (0 or 1)
    pub fn index(self) -> usize {
        self as usize - 1
    }

    pub const ALL: [Player; 2] = [Player::One, Player::Two];
}

impl From<Player> for u8 {
    fn from(player: Player) -> u8 {
        player.value()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("invalid player value: {}", other)),
        }
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// A cell coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub row: usize,
    pub col: usize,
}

impl Move {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Check if this coordinate is on the board
    pub fn is_valid(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }

    pub fn on_main_diagonal(&self) -> bool {
        self.row == self.col
    }

    pub fn on_anti_diagonal(&self) -> bool {
        self.row + self.col == BOARD_SIZE - 1
    }
}

/// Kind of line a win was made on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Row,
    Col,
    Diag,
}

/// Which row, column or diagonal completed a win
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WinningLine {
    pub kind: LineKind,
    pub index: u8,
}

impl WinningLine {
    pub const fn new(kind: LineKind, index: u8) -> Self {
        Self { kind, index }
    }

    /// The three cells of this line
    pub fn cells(&self) -> [Move; BOARD_SIZE] {
        let i = self.index as usize;
        match (self.kind, self.index) {
            (LineKind::Row, _) => [Move::new(i, 0), Move::new(i, 1), Move::new(i, 2)],
            (LineKind::Col, _) => [Move::new(0, i), Move::new(1, i), Move::new(2, i)],
            (LineKind::Diag, MAIN_DIAGONAL) => [Move::new(0, 0), Move::new(1, 1), Move::new(2, 2)],
            (LineKind::Diag, _) => [Move::new(0, 2), Move::new(1, 1), Move::new(2, 0)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_values() {
        assert_eq!(Player::One.value(), 1);
        assert_eq!(Player::Two.value(), 2);
        assert_eq!(Player::One.opponent(), Player::Two);
        assert_eq!(Player::Two.opponent(), Player::One);
        assert_eq!(Player::try_from(2), Ok(Player::Two));
        assert!(Player::try_from(0).is_err());
        assert!(Player::try_from(3).is_err());
    }

    #[test]
    fn test_move_validity() {
        assert!(Move::new(0, 0).is_valid());
        assert!(Move::new(2, 2).is_valid());
        assert!(!Move::new(3, 0).is_valid());
        assert!(!Move::new(0, 3).is_valid());
    }

    #[test]
    fn test_diagonal_membership() {
        assert!(Move::new(1, 1).on_main_diagonal());
        assert!(Move::new(1, 1).on_anti_diagonal());
        assert!(Move::new(0, 2).on_anti_diagonal());
        assert!(!Move::new(0, 1).on_main_diagonal());
        assert!(!Move::new(0, 1).on_anti_diagonal());
    }

    #[test]
    fn test_line_cells() {
        let anti = WinningLine::new(LineKind::Diag, ANTI_DIAGONAL).cells();
        assert_eq!(anti, [Move::new(0, 2), Move::new(1, 1), Move::new(2, 0)]);
        let col = WinningLine::new(LineKind::Col, 1).cells();
        assert_eq!(col, [Move::new(0, 1), Move::new(1, 1), Move::new(2, 1)]);
    }

    #[test]
    fn test_wire_format() {
        let line = WinningLine::new(LineKind::Row, 0);
        assert_eq!(
            serde_json::to_string(&line).unwrap(),
            r#"{"kind":"row","index":0}"#
        );
        assert_eq!(serde_json::to_string(&Player::Two).unwrap(), "2");
        assert!(serde_json::from_str::<Player>("7").is_err());
    }
}
