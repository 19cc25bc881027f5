//! Character bookkeeping.

use crate::types::{CharacterKind, ItemId};

/// The stored state of a character.
///
/// `level` and `position` are what the character believes about where it
/// stands. Levels update them when the character joins, moves or leaves;
/// boards read them to know where a moving character comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterState {
    /// Display name.
    pub name: String,
    /// Player or server controlled.
    pub kind: CharacterKind,
    /// Name of the level the character is on.
    pub level: Option<String>,
    /// Column and row on that level.
    pub position: Option<(usize, usize)>,
    /// Items picked up so far.
    pub items: Vec<ItemId>,
}

impl CharacterState {
    /// Creates a character that is not on any level.
    pub fn new(name: impl Into<String>, kind: CharacterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            level: None,
            position: None,
            items: Vec::new(),
        }
    }

    /// Returns true if the character stands on `level`.
    #[must_use]
    pub fn is_on(&self, level: &str) -> bool {
        self.level.as_deref() == Some(level)
    }

    /// Records where the character stands.
    pub fn place(&mut self, level: &str, x: usize, y: usize) {
        self.level = Some(level.to_string());
        self.position = Some((x, y));
    }

    /// Forgets the character's level and position.
    pub fn clear_placement(&mut self) {
        self.level = None;
        self.position = None;
    }
}
