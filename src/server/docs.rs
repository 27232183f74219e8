use std::sync::Arc;

use aide::{
    axum::{routing::get_with, ApiRouter},
    openapi::{OpenApi, Tag},
    redoc::Redoc,
    transform::TransformOpenApi,
};
use axum::{response::IntoResponse, routing::get, Extension};

use crate::server::errors::ErrorBody;
use crate::server::extractors::Json;

pub fn docs_routes(docs_path: &str) -> ApiRouter {
    aide::gen::infer_responses(true);

    let router: ApiRouter = ApiRouter::new()
        .api_route(
            "/",
            get_with(
                Redoc::new(format!("{docs_path}/api.json"))
                    .with_title("Embedding Gateway")
                    .axum_handler(),
                |op| op.description("This documentation page."),
            ),
        )
        .route("/api.json", get(serve_docs));

    aide::gen::infer_responses(false);

    router
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoResponse {
    axum::Json(api.as_ref()).into_response()
}

pub fn api_docs(api: TransformOpenApi) -> TransformOpenApi {
    api.title("Embedding Gateway")
        .summary("Sentence embeddings and similarity comparison")
        .description(
            "Embeds text with a local sentence-transformer model and scores new text \
             against previously seen texts.",
        )
        .tag(Tag {
            name: "embedding".into(),
            description: Some("Embedding and comparison".into()),
            ..Default::default()
        })
        .default_response_with::<Json<ErrorBody>, _>(|res| {
            res.example(ErrorBody {
                detail: "Model not loaded".to_string(),
            })
        })
}
