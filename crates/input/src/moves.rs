use shardworld_common::Direction;
use thiserror::Error;

/// Longest move string a client may send in one batch.
pub const MAX_BATCH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown move {found:?} at position {position}")]
    UnknownMove { found: char, position: usize },

    #[error("batch of {len} moves exceeds the limit of {max}")]
    TooLong { len: usize, max: usize },
}

/// Strictly parse a batch of `n`/`e`/`s`/`w` characters (either case).
/// Whitespace is skipped.
pub fn parse_moves(input: &str) -> Result<Vec<Direction>, InputError> {
    let mut moves = Vec::new();
    for (position, c) in input.chars().enumerate() {
        if c.is_whitespace() {
            continue;
        }
        let dir = Direction::from_char(c)
            .ok_or(InputError::UnknownMove { found: c, position })?;
        moves.push(dir);
    }
    if moves.len() > MAX_BATCH {
        return Err(InputError::TooLong {
            len: moves.len(),
            max: MAX_BATCH,
        });
    }
    Ok(moves)
}

/// Render moves back into the wire form the world consumes.
pub fn format_moves(moves: &[Direction]) -> String {
    moves.iter().map(|d| d.as_char()).collect()
}
