use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::generation::VarietalDescription, error::AppError, services::generation_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/varietals/{name}/description",
    tag = "generation",
    params(("name" = String, Path, description = "Grape varietal name")),
    responses(
        (status = 200, description = "Generated description", body = VarietalDescription),
        (status = 503, description = "No generation backend configured")
    )
)]
/// Generate a short description of a grape varietal.
pub async fn varietal_description(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<VarietalDescription>, AppError> {
    let description = generation_service::describe_varietal(&state, &name).await?;
    Ok(Json(description))
}

/// Configure the generation endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/varietals/{name}/description", get(varietal_description))
}
