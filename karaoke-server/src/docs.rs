use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{
    schemas::{AddToQueueSchema, ClientMessage, MoveInQueueSchema, RemoveFromQueueSchema},
    serialized::{NormalizedQueue, QueueItem, ServerMessage, ToastKind},
};

#[derive(OpenApi)]
#[openapi(
    paths(crate::rooms::queue, crate::gateway::gateway),
    components(schemas(
        QueueItem,
        NormalizedQueue,
        ServerMessage,
        ToastKind,
        ClientMessage,
        AddToQueueSchema,
        MoveInQueueSchema,
        RemoveFromQueueSchema
    )),
    modifiers(&Security),
    info(
        description = "karaoke-server exposes the room queues and the gateway clients connect to"
    ))
]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let api = ApiDoc::openapi();

        assert!(api.paths.paths.contains_key("/v1/rooms/{id}/queue"));
        assert!(api.paths.paths.contains_key("/v1/gateway"));
        assert!(api
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("BearerAuth")));
    }
}
