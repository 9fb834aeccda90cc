use axum::Router;
use tower_http::services::ServeDir;

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod health;
pub mod identity;
mod multipart;
pub mod player;
pub mod public;

/// Full application router: API areas, Swagger UI and the uploaded images under `/uploads`.
///
/// Public and admin routes share some paths (`/api/anime-guesses`, `/api/openings`) with
/// different methods; only the admin methods carry the admin guard.
pub fn router(state: SharedState) -> Router<()> {
    let uploads = ServeDir::new(&state.config().uploads_dir);

    Router::new()
        .merge(health::router())
        .merge(public::router())
        .merge(player::router())
        .merge(admin::router(&state))
        .merge(docs::router())
        .nest_service("/uploads", uploads)
        .with_state(state)
}
