use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the dartboard backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::players::register_player,
        crate::routes::players::get_player,
        crate::routes::lobbies::list_lobbies,
        crate::routes::lobbies::create_lobby,
        crate::routes::lobbies::get_lobby,
        crate::routes::lobbies::join_lobby,
        crate::routes::lobbies::leave_lobby,
        crate::routes::lobbies::set_mode,
        crate::routes::lobbies::start_match,
        crate::routes::lobbies::end_match,
        crate::routes::lobbies::abort_match,
        crate::routes::lobbies::apply_throw,
        crate::routes::lobbies::simulate_throw,
        crate::routes::lobbies::undo_throw,
        crate::routes::game::can_start,
        crate::routes::game::dartboard_status,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::player::RegisterPlayerRequest,
            crate::dto::lobby::CreateLobbyRequest,
            crate::dto::lobby::SetModeRequest,
            crate::dto::lobby::ThrowRequest,
            crate::dto::lobby::LeaveLobbyResponse,
            crate::dto::lobby::ActionResponse,
            crate::dto::game::CanStartResponse,
            crate::dto::dartboard::DartboardStatusResponse,
            crate::dto::ws::ViewerInboundMessage,
            crate::dto::events::GameAbortedEvent,
            crate::dto::events::HostChangedEvent,
            crate::dto::events::DartboardStatusEvent,
            crate::services::dartboard::LinkState,
            crate::state::player::User,
            crate::state::player::PlayerStats,
            crate::state::lobby::Lobby,
            crate::state::lobby::LobbySummary,
            crate::state::match_state::MatchState,
            crate::state::match_state::GameMode,
            crate::state::throw::Throw,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "players", description = "Player registration and statistics"),
        (name = "lobbies", description = "Lobby lifecycle"),
        (name = "match", description = "Match control and scoring"),
        (name = "game", description = "Dartboard availability"),
        (name = "viewers", description = "WebSocket stream of lobby and match events"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_lobby_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/lobbies",
            "/lobbies/{id}/start",
            "/lobbies/{id}/undo-throw",
            "/game/can-start",
            "/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
