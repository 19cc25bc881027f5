//! Level scenarios: joining, moving, leaving and the messages they produce.

use proptest::prelude::*;
use tessera_testkit::prelude::*;
use tessera_txn::{TimeoutPolicy, TxnError};
use tessera_world::{CharacterKind, Direction, ItemId, LevelMessage, WorldError};

fn updates(messages: &[LevelMessage]) -> Vec<Vec<(usize, usize)>> {
    messages
        .iter()
        .filter_map(|message| match message {
            LevelMessage::Update { spaces, .. } => {
                Some(spaces.iter().map(|space| (space.x, space.y)).collect())
            }
            LevelMessage::Board { .. } => None,
        })
        .collect()
}

#[test]
fn move_broadcasts_both_cells_once() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 3));
    let hero = fixture.player_at(&level, "hero", 1, 1);

    let joined = fixture.messages(hero);
    assert_eq!(joined.len(), 1);
    assert!(matches!(&joined[0], LevelMessage::Board { level, .. } if level == "hall"));

    let moved = fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Up));
    assert!(moved);
    assert_eq!(updates(&fixture.messages(hero)), vec![vec![(1, 1), (1, 0)]]);
    assert_eq!(fixture.occupant(&level, 1, 0), Some(hero));
    assert_eq!(fixture.occupant(&level, 1, 1), None);
    assert_eq!(fixture.state(hero).position, Some((1, 0)));

    let moved = fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Up));
    assert!(!moved);
    assert!(fixture.messages(hero).is_empty());
    assert_eq!(fixture.state(hero).position, Some((1, 0)));
}

#[test]
fn other_characters_see_moves() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 3));
    let watcher = fixture.player_at(&level, "watcher", 0, 0);
    let walker = fixture.player_at(&level, "walker", 2, 2);

    let announced = updates(&fixture.messages(watcher));
    assert_eq!(announced, vec![vec![(2, 2)]]);
    fixture.messages(walker);

    fixture.in_txn(|txn| level.move_character(txn, walker, Direction::Left));
    assert_eq!(updates(&fixture.messages(watcher)), vec![vec![(2, 2), (1, 2)]]);
    assert_eq!(updates(&fixture.messages(walker)), vec![vec![(2, 2), (1, 2)]]);
}

#[test]
fn blocked_moves_change_nothing() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 1));
    let a = fixture.player_at(&level, "a", 0, 0);
    let b = fixture.player_at(&level, "b", 1, 0);
    fixture.wall_at(&level, 2, 0);
    fixture.messages(a);
    fixture.messages(b);

    assert!(!fixture.in_txn(|txn| level.move_character(txn, a, Direction::Right)));
    assert!(!fixture.in_txn(|txn| level.move_character(txn, b, Direction::Right)));
    assert!(fixture.messages(a).is_empty());
    assert!(fixture.messages(b).is_empty());
    assert_eq!(fixture.occupant(&level, 0, 0), Some(a));
    assert_eq!(fixture.occupant(&level, 1, 0), Some(b));
    assert_level_consistent(&fixture, &level);
}

#[test]
fn aborted_move_is_invisible() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 3));
    let hero = fixture.player_at(&level, "hero", 1, 1);
    fixture.messages(hero);

    let handle = fixture.coordinator.create_transaction(TimeoutPolicy::Bounded);
    assert!(level
        .move_character(handle.transaction(), hero, Direction::Down)
        .unwrap());
    handle
        .transaction()
        .abort(TxnError::failed("player disconnected"))
        .unwrap();

    assert!(fixture.messages(hero).is_empty());
    assert_eq!(fixture.occupant(&level, 1, 1), Some(hero));
    assert_eq!(fixture.occupant(&level, 1, 2), None);
    assert_eq!(fixture.state(hero).position, Some((1, 1)));
}

#[test]
fn removal_announces_vacated_cell() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 3));
    let stays = fixture.player_at(&level, "stays", 0, 0);
    let quits = fixture.player_at(&level, "quits", 2, 2);
    fixture.messages(stays);
    fixture.messages(quits);

    assert!(fixture.in_txn(|txn| level.remove_character(txn, quits)));
    assert_eq!(updates(&fixture.messages(stays)), vec![vec![(2, 2)]]);
    assert!(fixture.messages(quits).is_empty());
    assert_eq!(fixture.occupant(&level, 2, 2), None);
    assert_eq!(fixture.read(|txn| level.roster(txn)), vec![stays]);
    assert_level_consistent(&fixture, &level);
}

#[test]
fn removal_discards_undrained_messages() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 3));
    let stays = fixture.player_at(&level, "stays", 0, 0);
    let quits = fixture.player_at(&level, "quits", 2, 2);
    assert!(fixture.in_txn(|txn| level.move_character(txn, stays, Direction::Right)));
    let channel = fixture.world.channel();
    assert_eq!(channel.open_mailboxes(), 2);

    assert!(fixture.in_txn(|txn| level.remove_character(txn, quits)));

    assert_eq!(channel.open_mailboxes(), 1);
    assert!(fixture.messages(quits).is_empty());
    assert!(!fixture.messages(stays).is_empty());
    assert_eq!(channel.open_mailboxes(), 0);
}

#[test]
fn random_placement_uses_free_cells() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(2, 2));
    let mut rng = seeded_rng(3);

    let mut cells = Vec::new();
    for index in 0..4 {
        let id = fixture.character(&format!("c{index}"), CharacterKind::Ai);
        cells.push(fixture.in_txn(|txn| level.add_character(txn, id, &mut rng)));
    }
    cells.sort_unstable();
    assert_eq!(cells, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);

    let late = fixture.character("late", CharacterKind::Ai);
    let handle = fixture.coordinator.create_transaction(TimeoutPolicy::Bounded);
    let error = level
        .add_character(handle.transaction(), late, &mut rng)
        .unwrap_err();
    assert!(matches!(error, WorldError::BoardFull { .. }));
    assert_level_consistent(&fixture, &level);
}

#[test]
fn items_are_announced_and_taken() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(3, 1));
    let hero = fixture.player_at(&level, "hero", 0, 0);
    fixture.messages(hero);

    assert!(fixture.in_txn(|txn| level.add_item_at(txn, ItemId(7), 1, 0)));
    assert_eq!(updates(&fixture.messages(hero)), vec![vec![(1, 0)]]);

    fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Right));
    fixture.messages(hero);
    assert!(fixture.in_txn(|txn| level.take(txn, hero)));
    assert_eq!(updates(&fixture.messages(hero)), vec![vec![(1, 0)]]);
    assert_eq!(fixture.state(hero).items, vec![ItemId(7)]);
    assert!(!fixture.in_txn(|txn| level.take(txn, hero)));
}

#[test]
fn snapshot_reflects_committed_state() {
    let fixture = WorldFixture::new();
    let level = fixture.level("hall", &open_board(2, 2));
    let hero = fixture.player_at(&level, "hero", 1, 1);

    let snapshot = fixture.read(|txn| level.board_snapshot(txn));
    assert_eq!((snapshot.width, snapshot.height), (2, 2));
    let occupied: Vec<_> = snapshot
        .spaces
        .iter()
        .filter(|space| space.character.is_some())
        .map(|space| (space.x, space.y, space.character))
        .collect();
    assert_eq!(occupied, vec![(1, 1, Some(hero))]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn lone_walker_follows_its_steps(
        ((width, height), (x, y)) in board_with_cell_strategy(5),
        steps in moves_strategy(12),
    ) {
        let fixture = WorldFixture::new();
        let level = fixture.level("field", &open_board(width, height));
        let walker = fixture.player_at(&level, "walker", x, y);

        let mut expected = (x, y);
        for step in steps {
            let target = step.step(expected.0, expected.1, width, height);
            let moved = fixture.in_txn(|txn| level.move_character(txn, walker, step));
            prop_assert_eq!(moved, target.is_some());
            if let Some(target) = target {
                expected = target;
            }
            prop_assert_eq!(fixture.state(walker).position, Some(expected));
        }
        prop_assert_eq!(fixture.occupant(&level, expected.0, expected.1), Some(walker));
        assert_level_consistent(&fixture, &level);
    }

    #[test]
    fn occupied_cells_refuse_newcomers(cells in distinct_cells_strategy(4, 4, 6)) {
        let fixture = WorldFixture::new();
        let level = fixture.level("field", &open_board(4, 4));
        for (index, (x, y)) in cells.iter().copied().enumerate() {
            fixture.player_at(&level, &format!("p{index}"), x, y);
        }
        let (x, y) = cells[0];
        let newcomer = fixture.character("newcomer", CharacterKind::Player);
        let added = fixture.in_txn(|txn| level.add_character_at(txn, newcomer, x, y));
        prop_assert!(!added);
        prop_assert_eq!(fixture.state(newcomer).level, None);
        prop_assert_eq!(fixture.read(|txn| level.roster(txn)).len(), cells.len());
        assert_level_consistent(&fixture, &level);
    }
}
