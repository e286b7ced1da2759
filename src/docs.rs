use utoipa::openapi;
use utoipa::OpenApi;

use crate::routes::Routes;

#[derive(OpenApi)]
#[openapi(info(
    title = "Dockhand",
    description = "List, start, stop, and restart Docker containers."
))]
pub struct Docs;

impl Docs {
    pub fn document() -> openapi::OpenApi {
        let mut document = Docs::openapi();
        document.merge(Routes::openapi());
        document
    }
}
