use axum::Router;

use crate::state::SharedState;

pub mod caller;
pub mod docs;
pub mod game;
pub mod health;
pub mod lobbies;
pub mod players;
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(players::router())
        .merge(lobbies::router())
        .merge(game::router())
        .merge(websocket::router())
        .merge(docs::router());

    api_router.with_state(state)
}
