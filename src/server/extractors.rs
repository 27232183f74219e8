use aide::OperationIo;
use axum::response::IntoResponse;
use axum_macros::FromRequest;
use serde::Serialize;

use crate::server::errors::AppError;

/// `axum::Json` whose rejections render as [`AppError`].
#[derive(FromRequest, OperationIo)]
#[from_request(via(axum::Json), rejection(AppError))]
#[aide(
    input_with = "axum::Json<T>",
    output_with = "axum::Json<T>",
    json_schema
)]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}
