use scrawl_system::{
    default_score, validate_code, GameError, GameSettings, LobbyState, LobbyStatus, WordBag,
};

#[test]
fn it_tracks_membership_as_joins_minus_leaves() {
    let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), GameSettings::default());
    for id in 2..=5u32 {
        lobby.join(id, format!("player{}", id)).expect("");
    }
    lobby.leave(3).expect("");
    lobby.leave(5).expect("");

    let ids: Vec<u32> = lobby.players.iter().map(|p| p.connection_id).collect();
    assert_eq!(ids, vec![1, 2, 4]);
    assert_eq!(lobby.players.iter().filter(|p| p.is_host).count(), 1);
}

#[test]
fn it_migrates_host_to_the_longest_tenured_survivor() {
    let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), GameSettings::default());
    lobby.join(2, "bob".into()).expect("");
    lobby.join(3, "carol".into()).expect("");

    lobby.leave(1).expect("");
    assert_eq!(lobby.host, 2, "bob joined before carol");

    lobby.leave(2).expect("");
    assert_eq!(lobby.host, 3);
    assert!(lobby.players[0].is_host);
}

#[test]
fn it_reports_empty_after_the_last_player_leaves() {
    let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), GameSettings::default());
    let outcome = lobby.leave(1).expect("");
    assert!(outcome.now_empty);
    assert!(lobby.players.is_empty());
}

#[test]
fn it_plays_a_full_game_with_scoring() {
    let mut settings = GameSettings::default();
    settings.rounds = 2;
    let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), settings);
    lobby.join(2, "bob".into()).expect("");
    lobby.join(3, "carol".into()).expect("");
    lobby.start(1).expect("");
    assert_eq!(lobby.status, LobbyStatus::Playing);

    let mut rng = rand::thread_rng();
    let mut bag = WordBag::new(lobby.settings.categories, &mut rng);

    let mut turns = 0;
    loop {
        let drawer = lobby.begin_turn().expect("");
        let _word = bag.draw(&mut rng);
        // both non-drawers guess right away
        for (rank, player) in lobby
            .players
            .clone()
            .iter()
            .filter(|p| p.connection_id != drawer)
            .enumerate()
        {
            let (guesser_delta, drawer_delta) = default_score(0.2, rank);
            lobby.award(player.connection_id, guesser_delta);
            lobby.award(drawer, drawer_delta);
        }
        turns += 1;
        if lobby.advance_turn() {
            break;
        }
    }

    assert_eq!(turns, 6, "2 rounds * 3 players");
    assert_eq!(lobby.status, LobbyStatus::Finished);
    assert!(lobby.players.iter().all(|p| p.score > 0));
    assert!(lobby.players.iter().all(|p| !p.is_drawing));
}

#[test]
fn it_ends_a_round_cleanly_when_the_last_drawer_leaves() {
    let mut lobby = LobbyState::new("ABC123".into(), 1, "alice".into(), GameSettings::default());
    lobby.join(2, "bob".into()).expect("");
    lobby.start(1).expect("");

    lobby.begin_turn().expect("");
    assert!(!lobby.advance_turn());
    // bob (seat 1) is the drawer of the round's last turn and leaves mid-turn
    lobby.begin_turn().expect("");
    let outcome = lobby.leave(2).expect("");
    assert!(outcome.was_drawing);
    assert_eq!(lobby.current_turn, 0);
    assert_eq!(lobby.current_round, 1);
}

#[test]
fn it_rejects_codes_the_generator_would_never_produce() {
    assert!(matches!(
        validate_code("tiny"),
        Err(GameError::Validation(_))
    ));
    assert!(validate_code("QWERTY").is_ok());
}
