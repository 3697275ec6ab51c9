use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

use crate::auth::AuthService;
use crate::game_manager::GameManager;
use crate::websocket::{ConnectionManager, RateLimit};
use game_core::{PREDEFINED_CATEGORIES, normalize_game_code};
use game_types::GameError;

pub mod auth;
pub mod config;
pub mod game_manager;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
    rate_limit: RateLimit,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let game_manager_filter = warp::any().map({
        let game_manager = game_manager.clone();
        move || game_manager.clone()
    });

    let auth_filter = warp::any().map({
        let auth_service = auth_service.clone();
        move || auth_service.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter)
        .and(game_manager_filter.clone())
        .and(auth_filter.clone())
        .map(move |ws: warp::ws::Ws, conn_mgr, game_mgr, auth| {
            ws.on_upgrade(move |socket| {
                websocket::handle_connection(socket, conn_mgr, game_mgr, auth, rate_limit)
            })
        });

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", StatusCode::OK));

    // Redacted session snapshot, personalized when the caller authenticates
    let session = warp::path!("sessions" / String)
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(game_manager_filter.clone())
        .and(auth_filter.clone())
        .and_then(handle_session_request);

    let categories = warp::path("categories")
        .and(warp::get())
        .map(|| warp::reply::json(&PREDEFINED_CATEGORIES));

    let user_profile = warp::path!("user" / String / "profile")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(game_manager_filter)
        .and(auth_filter)
        .and_then(handle_user_profile_request);

    // CORS configuration
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET"]);

    websocket
        .or(health)
        .or(session)
        .or(categories)
        .or(user_profile)
        .with(cors)
        .with(warp::log("guess_the_word"))
}

fn error_reply(message: &str, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": message })),
        status,
    )
}

fn game_error_status(error: &GameError) -> StatusCode {
    match error {
        GameError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        GameError::InvalidGameCode { .. } | GameError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        GameError::NotInSession | GameError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        GameError::NetworkError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_session_request(
    code: String,
    auth_header: Option<String>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let code = match normalize_game_code(&code) {
        Ok(code) => code,
        Err(e) => return Ok(error_reply(&e.to_string(), StatusCode::BAD_REQUEST)),
    };

    let viewer = match auth_header {
        Some(header) => match auth_service.validate_header(&header) {
            Ok(identity) => Some(identity.id),
            Err(_) => {
                return Ok(error_reply(
                    "Invalid authentication token",
                    StatusCode::UNAUTHORIZED,
                ));
            }
        },
        None => None,
    };

    match game_manager.session_for(&code, viewer.as_deref()).await {
        Ok(session) => Ok(warp::reply::with_status(
            warp::reply::json(&session),
            StatusCode::OK,
        )),
        Err(e) => {
            if matches!(e, GameError::NetworkError { .. }) {
                tracing::error!("Failed to load game {}: {}", code, e);
            }
            Ok(error_reply(&e.to_string(), game_error_status(&e)))
        }
    }
}

async fn handle_user_profile_request(
    user_id: String,
    auth_header: Option<String>,
    game_manager: Arc<GameManager>,
    auth_service: Arc<AuthService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    // Public profile viewing not allowed
    let Some(auth_header) = auth_header else {
        return Ok(error_reply("Authentication required", StatusCode::UNAUTHORIZED));
    };

    match auth_service.validate_header(&auth_header) {
        Ok(identity) if identity.id != user_id => {
            return Ok(error_reply(
                "Not authorized to view this profile",
                StatusCode::FORBIDDEN,
            ));
        }
        Ok(_) => {}
        Err(_) => {
            return Ok(error_reply(
                "Invalid authentication token",
                StatusCode::UNAUTHORIZED,
            ));
        }
    }

    match game_manager.users().find_by_id(&user_id).await {
        Ok(Some(user)) => Ok(warp::reply::with_status(
            warp::reply::json(&user),
            StatusCode::OK,
        )),
        Ok(None) => Ok(error_reply("User not found", StatusCode::NOT_FOUND)),
        Err(err) => {
            tracing::error!("Failed to fetch profile {}: {}", user_id, err);
            Ok(error_reply(
                "Failed to fetch user profile",
                game_error_status(&err),
            ))
        }
    }
}
