//! Connector tiles moving characters within and between levels.

use tessera_testkit::prelude::*;
use tessera_world::{CharacterKind, Direction, LevelMessage, Location};

#[test]
fn one_way_connector_moves_character_to_target() {
    let fixture = WorldFixture::new();
    let a = fixture.level("a", &open_board(8, 8));
    let b = fixture.level("b", &open_board(8, 8));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_one_way(txn, &Location::new("a", 2, 3), &Location::new("b", 5, 5))
    });
    let hero = fixture.player_at(&a, "hero", 2, 2);
    fixture.messages(hero);

    let moved = fixture.in_txn(|txn| a.move_character(txn, hero, Direction::Down));

    assert!(!moved);
    assert_eq!(fixture.occupant(&a, 2, 2), None);
    assert_eq!(fixture.occupant(&a, 2, 3), None);
    assert_eq!(fixture.occupant(&b, 5, 5), Some(hero));

    let state = fixture.state(hero);
    assert_eq!(state.level.as_deref(), Some("b"));
    assert_eq!(state.position, Some((5, 5)));
    assert!(fixture.read(|txn| a.roster(txn)).is_empty());
    assert_eq!(fixture.read(|txn| b.roster(txn)), vec![hero]);

    let messages = fixture.messages(hero);
    assert!(messages
        .iter()
        .any(|message| matches!(message, LevelMessage::Board { level, .. } if level == "b")));
    assert_level_consistent(&fixture, &a);
    assert_level_consistent(&fixture, &b);
}

#[test]
fn one_way_connector_has_no_way_back() {
    let fixture = WorldFixture::new();
    let a = fixture.level("a", &open_board(4, 4));
    let b = fixture.level("b", &open_board(4, 4));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_one_way(txn, &Location::new("a", 1, 0), &Location::new("b", 1, 1))
    });
    let hero = fixture.player_at(&b, "hero", 1, 2);

    // Step onto the landing cell and off again: it is ordinary floor.
    assert!(fixture.in_txn(|txn| b.move_character(txn, hero, Direction::Up)));
    assert!(fixture.in_txn(|txn| b.move_character(txn, hero, Direction::Down)));
    assert_eq!(fixture.state(hero).level.as_deref(), Some("b"));
    assert!(fixture.read(|txn| a.roster(txn)).is_empty());
}

#[test]
fn occupied_destination_keeps_character_home() {
    let fixture = WorldFixture::new();
    let a = fixture.level("a", &open_board(8, 8));
    let b = fixture.level("b", &open_board(8, 8));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_one_way(txn, &Location::new("a", 2, 3), &Location::new("b", 5, 5))
    });
    let blocker = fixture.player_at(&b, "blocker", 5, 5);
    let hero = fixture.player_at(&a, "hero", 2, 2);
    fixture.messages(blocker);

    assert!(!fixture.in_txn(|txn| a.move_character(txn, hero, Direction::Down)));

    assert_eq!(fixture.occupant(&a, 2, 2), Some(hero));
    assert_eq!(fixture.occupant(&b, 5, 5), Some(blocker));
    let state = fixture.state(hero);
    assert_eq!(state.level.as_deref(), Some("a"));
    assert_eq!(state.position, Some((2, 2)));
    assert_eq!(fixture.read(|txn| a.roster(txn)), vec![hero]);
    assert!(fixture.messages(blocker).is_empty());
    assert_level_consistent(&fixture, &a);
    assert_level_consistent(&fixture, &b);
}

#[test]
fn two_way_connector_works_both_ways() {
    let fixture = WorldFixture::new();
    let a = fixture.level("a", &open_board(4, 4));
    let b = fixture.level("b", &open_board(4, 4));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_two_way(txn, &Location::new("a", 0, 1), &Location::new("b", 3, 3))
    });
    let hero = fixture.player_at(&a, "hero", 0, 0);

    fixture.in_txn(|txn| a.move_character(txn, hero, Direction::Down));
    assert_eq!(fixture.state(hero).level.as_deref(), Some("b"));
    assert_eq!(fixture.occupant(&b, 3, 3), Some(hero));

    assert!(fixture.in_txn(|txn| b.move_character(txn, hero, Direction::Left)));
    fixture.in_txn(|txn| b.move_character(txn, hero, Direction::Right));

    let state = fixture.state(hero);
    assert_eq!(state.level.as_deref(), Some("a"));
    assert_eq!(state.position, Some((0, 1)));
    assert!(fixture.read(|txn| b.roster(txn)).is_empty());
    assert_eq!(fixture.read(|txn| a.roster(txn)), vec![hero]);
    assert_level_consistent(&fixture, &a);
    assert_level_consistent(&fixture, &b);
}

#[test]
fn connector_within_one_level() {
    let fixture = WorldFixture::new();
    let level = fixture.level("maze", &open_board(5, 5));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_two_way(txn, &Location::new("maze", 0, 0), &Location::new("maze", 4, 4))
    });
    let hero = fixture.player_at(&level, "hero", 1, 0);
    fixture.messages(hero);

    assert!(!fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Left)));

    let state = fixture.state(hero);
    assert_eq!(state.level.as_deref(), Some("maze"));
    assert_eq!(state.position, Some((4, 4)));
    assert_eq!(fixture.occupant(&level, 1, 0), None);
    assert_eq!(fixture.read(|txn| level.roster(txn)), vec![hero]);
    assert!(!fixture.messages(hero).is_empty());
    assert_level_consistent(&fixture, &level);
}

#[test]
fn player_connector_refuses_ai() {
    let fixture = WorldFixture::new();
    let a = fixture.level("a", &open_board(8, 8));
    let b = fixture.level("b", &open_board(8, 8));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_player_only(txn, &Location::new("a", 2, 3), &Location::new("b", 5, 5))
    });

    let monster = fixture.character("monster", CharacterKind::Ai);
    fixture.in_txn(|txn| a.add_character_at(txn, monster, 2, 2));
    assert!(!fixture.in_txn(|txn| a.move_character(txn, monster, Direction::Down)));
    assert_eq!(fixture.occupant(&a, 2, 2), Some(monster));
    assert_eq!(fixture.state(monster).level.as_deref(), Some("a"));

    let hero = fixture.player_at(&a, "hero", 1, 3);
    fixture.in_txn(|txn| a.move_character(txn, hero, Direction::Right));
    assert_eq!(fixture.state(hero).level.as_deref(), Some("b"));
    assert_eq!(fixture.occupant(&b, 5, 5), Some(hero));
    assert_level_consistent(&fixture, &a);
    assert_level_consistent(&fixture, &b);
}

#[test]
fn same_level_connector_leads_to_far_end_from_equidistant_cell() {
    let fixture = WorldFixture::new();
    let level = fixture.level("maze", &open_board(3, 3));
    fixture.in_txn(|txn| {
        fixture
            .world
            .connect_two_way(txn, &Location::new("maze", 1, 0), &Location::new("maze", 0, 1))
    });
    let hero = fixture.player_at(&level, "hero", 0, 0);

    assert!(!fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Right)));
    assert_eq!(fixture.state(hero).position, Some((0, 1)));
    assert_eq!(fixture.occupant(&level, 0, 1), Some(hero));
    assert_eq!(fixture.occupant(&level, 0, 0), None);

    assert!(fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Up)));
    assert!(!fixture.in_txn(|txn| level.move_character(txn, hero, Direction::Down)));
    assert_eq!(fixture.state(hero).position, Some((1, 0)));
    assert_eq!(fixture.occupant(&level, 1, 0), Some(hero));
    assert_level_consistent(&fixture, &level);
}
