//! Property-based test generators using proptest.

use proptest::prelude::*;
use tessera_world::Direction;

/// Strategy for a single direction.
pub fn direction_strategy() -> impl Strategy<Value = Direction> {
    prop::sample::select(Direction::ALL.to_vec())
}

/// Strategy for a sequence of moves.
pub fn moves_strategy(max_len: usize) -> impl Strategy<Value = Vec<Direction>> {
    prop::collection::vec(direction_strategy(), 0..=max_len)
}

/// Strategy for board dimensions between 1x1 and `max` by `max`.
pub fn board_size_strategy(max: usize) -> impl Strategy<Value = (usize, usize)> {
    (1..=max.max(1), 1..=max.max(1))
}

/// Strategy for a board size together with a cell on it.
pub fn board_with_cell_strategy(max: usize) -> impl Strategy<Value = ((usize, usize), (usize, usize))> {
    board_size_strategy(max).prop_flat_map(|(width, height)| {
        (Just((width, height)), (0..width, 0..height))
    })
}

/// Strategy for a set of distinct cells on a `width` by `height` board.
pub fn distinct_cells_strategy(
    width: usize,
    height: usize,
    max: usize,
) -> impl Strategy<Value = Vec<(usize, usize)>> {
    let max = max.min(width * height).max(1);
    prop::collection::hash_set((0..width, 0..height), 1..=max)
        .prop_map(|cells| cells.into_iter().collect())
}
