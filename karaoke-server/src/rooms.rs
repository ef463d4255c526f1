use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    serialized::{NormalizedQueue, ToSerialized},
};

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}/queue",
    tag = "rooms",
    params(
        ("id" = i32, Path, description = "The room id")
    ),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = NormalizedQueue),
        (status = 401, description = "Missing or unknown session"),
        (status = 403, description = "The session belongs to another room")
    )
)]
pub(crate) async fn queue(
    session: Session,
    State(context): State<ServerContext>,
    Path(room_id): Path<i32>,
) -> ServerResult<Json<NormalizedQueue>> {
    if !session.can_access(room_id) {
        return Err(ServerError::Forbidden("Cannot view another room's queue"));
    }

    let queue = context.collab.queue().get(room_id).await?;

    Ok(Json(queue.to_serialized()))
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/:id/queue", get(queue))
}
