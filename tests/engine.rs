use std::{sync::Arc, time::Duration};

use dartboard_back::{
    dao::{snapshot::Snapshot, snapshot_store::MemoryStore},
    error::EngineError,
    services::{
        dartboard::LinkState,
        engine::{Engine, EngineHandle, EngineOptions},
        storage_supervisor,
    },
    state::{
        broadcast::BroadcastHub,
        lobby::LobbyStatus,
        match_state::{GameMode, MatchStatus},
        registry::{LeaveOutcome, Registry},
        throw::classify,
    },
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

struct Server {
    engine: EngineHandle,
    hub: Arc<BroadcastHub>,
    store: MemoryStore,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
    _link: watch::Sender<LinkState>,
}

async fn start_server() -> Server {
    let store = MemoryStore::default();
    let snapshot = storage_supervisor::load_clean_slate(&store).await.unwrap();

    let hub = Arc::new(BroadcastHub::new(64));
    let (link, link_rx) = watch::channel(LinkState::Connected);
    let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
    let (engine, _task) = Engine::spawn(
        Registry::from_snapshot(snapshot),
        hub.clone(),
        link_rx,
        snapshot_tx,
        EngineOptions::default(),
    );

    let cancel = CancellationToken::new();
    let writer = tokio::spawn(storage_supervisor::run(
        Arc::new(store.clone()),
        snapshot_rx,
        cancel.clone(),
    ));

    Server {
        engine,
        hub,
        store,
        cancel,
        writer,
        _link: link,
    }
}

impl Server {
    async fn shutdown(self) -> Option<Snapshot> {
        self.cancel.cancel();
        self.writer.await.unwrap();
        self.store.current().await
    }
}

async fn seat(engine: &EngineHandle, names: &[&str]) -> (Vec<Uuid>, Uuid) {
    let mut ids = Vec::new();
    for name in names {
        ids.push(engine.register_player((*name).into()).await.unwrap().id);
    }
    let lobby = engine.create_lobby(ids[0], None, None).await.unwrap().id;
    for id in &ids[1..] {
        engine.join_lobby(*id, lobby).await.unwrap();
    }
    (ids, lobby)
}

#[tokio::test]
async fn full_match_is_broadcast_and_persisted() {
    let server = start_server().await;
    let engine = &server.engine;
    let (players, lobby) = seat(engine, &["alice", "bob"]).await;
    let (alice, bob) = (players[0], players[1]);
    let mut viewer = server.hub.subscribe_lobby(lobby);

    engine.set_mode(alice, lobby, GameMode::X301).await.unwrap();
    engine.start_match(alice, lobby).await.unwrap();

    // 301 -> 121 -> 61, then a dart leaving 1 is a bust.
    for _ in 0..3 {
        engine.apply_throw(lobby, classify(20, 3).unwrap()).await.unwrap();
    }
    for _ in 0..3 {
        engine.apply_throw(lobby, classify(1, 1).unwrap()).await.unwrap();
    }
    engine.apply_throw(lobby, classify(20, 3).unwrap()).await.unwrap();
    let game = engine.apply_throw(lobby, classify(20, 3).unwrap()).await.unwrap();
    assert!(game.is_bust);
    assert_eq!(game.players[0].score, 61);
    assert_eq!(game.current_player_index, 1);

    for _ in 0..3 {
        engine.apply_throw(lobby, classify(1, 1).unwrap()).await.unwrap();
    }
    // 61 = T17 + D5.
    engine.apply_throw(lobby, classify(17, 3).unwrap()).await.unwrap();
    let game = engine.apply_throw(lobby, classify(5, 2).unwrap()).await.unwrap();
    assert_eq!(game.status, MatchStatus::Finished);
    assert_eq!(game.winner, Some(alice));

    let lobby_state = engine.lobby(lobby).await.unwrap();
    assert_eq!(lobby_state.status, LobbyStatus::Finished);
    assert!(engine.can_start().await.unwrap().can_start);

    let mut events = Vec::new();
    while let Ok(event) = viewer.try_recv() {
        events.push(event.event);
    }
    assert_eq!(events.first(), Some(&"lobby_update"));
    assert!(events.contains(&"game_started"));
    assert_eq!(events.last(), Some(&"game_update"));

    let winner = engine.player(alice).await.unwrap();
    assert_eq!(winner.stats.games_won, 1);
    assert_eq!(winner.stats.highest_checkout, 10);
    assert_eq!(engine.player(bob).await.unwrap().stats.games_played, 1);

    let saved = server.shutdown().await.unwrap();
    let saved_alice = saved.users.iter().find(|user| user.id == alice).unwrap();
    assert_eq!(saved_alice.stats.games_won, 1);
    assert_eq!(saved.active_game, None);
}

#[tokio::test]
async fn only_one_lobby_holds_the_board() {
    let server = start_server().await;
    let engine = &server.engine;
    let (first, lobby_a) = seat(engine, &["alice", "bob"]).await;
    let (second, lobby_b) = seat(engine, &["carol", "dave"]).await;

    engine.start_match(first[0], lobby_a).await.unwrap();
    assert_eq!(
        engine.start_match(second[0], lobby_b).await,
        Err(EngineError::BoardBusy { holder: lobby_a })
    );
    assert_eq!(
        engine.apply_throw(lobby_b, classify(20, 1).unwrap()).await,
        Err(EngineError::NotInProgress)
    );

    engine.abort_match(first[1], lobby_a).await.unwrap();
    assert!(matches!(
        engine.lobby(lobby_a).await,
        Err(EngineError::NotFound(_))
    ));
    engine.start_match(second[0], lobby_b).await.unwrap();
    assert_eq!(
        engine.can_start().await.unwrap().active_game_id,
        Some(lobby_b)
    );

    server.shutdown().await;
}

#[tokio::test]
async fn viewers_follow_host_changes_and_deletion() {
    let server = start_server().await;
    let engine = &server.engine;
    let (players, lobby) = seat(engine, &["alice", "bob"]).await;
    let mut viewer = server.hub.subscribe_lobby(lobby);

    assert_eq!(
        engine.leave_lobby(players[0], lobby).await.unwrap(),
        LeaveOutcome::Left
    );
    let changed = viewer.recv().await.unwrap();
    assert_eq!(changed.event, "host_changed");
    assert!(changed.frame.contains(&players[1].to_string()));
    assert_eq!(viewer.recv().await.unwrap().event, "lobby_update");

    assert_eq!(
        engine.leave_lobby(players[1], lobby).await.unwrap(),
        LeaveOutcome::Deleted
    );
    assert_eq!(viewer.recv().await.unwrap().event, "lobby_deleted");
    let closed = tokio::time::timeout(Duration::from_secs(1), viewer.recv())
        .await
        .unwrap();
    assert!(closed.is_err());

    server.shutdown().await;
}

#[tokio::test]
async fn undo_restores_the_previous_turn() {
    let server = start_server().await;
    let engine = &server.engine;
    let (players, lobby) = seat(engine, &["alice", "bob"]).await;
    engine.start_match(players[0], lobby).await.unwrap();

    for _ in 0..3 {
        engine.apply_throw(lobby, classify(20, 1).unwrap()).await.unwrap();
    }
    let game = engine.undo_last_throw(players[0], lobby).await.unwrap();
    assert_eq!(game.current_player_index, 0);
    assert_eq!(game.players[0].score, 461);
    assert_eq!(game.players[0].throws_in_round.len(), 2);

    assert!(matches!(
        engine.undo_last_throw(players[1], lobby).await,
        Err(EngineError::Forbidden(_))
    ));

    server.shutdown().await;
}
