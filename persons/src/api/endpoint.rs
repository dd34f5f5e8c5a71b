use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{debug_handler, Json};

use crate::api::errors::PersonError;
use crate::persons::person_models::Person;
use crate::router;

fn parse_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, PersonError> {
    path.map(|Path(id)| id)
        .map_err(|e| PersonError::RequestParsingError(e.body_text()))
}

/// Cached read. Persons below the configured age are served but never cached.
#[debug_handler]
pub async fn get_person(
    state: State<router::State>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Person>, PersonError> {
    let id = parse_id(path)?;

    let result = state.persons.read(&id).await?;
    tracing::debug!(id, source = %result.source, "Read person");

    result
        .value
        .map(Json)
        .ok_or(PersonError::PersonNotFound(id))
}

/// Whatever the last store-backed read left in the shared slot, `null` if nothing yet.
#[debug_handler]
pub async fn get_last_fetched_person(
    state: State<router::State>,
) -> Result<Json<Option<Person>>, PersonError> {
    let person = state.persons.read_last_fetched().await?;
    Ok(Json(person))
}

#[debug_handler]
pub async fn update_person(
    state: State<router::State>,
    body: Result<Json<Person>, JsonRejection>,
) -> Result<Json<Person>, PersonError> {
    let Json(person) = body.map_err(|e| PersonError::RequestParsingError(e.body_text()))?;

    let saved = state.persons.write(&person).await?;
    tracing::info!(id = saved.id, "Updated person");

    Ok(Json(saved))
}

/// Deleting an id that doesn't exist still succeeds, and still evicts.
#[debug_handler]
pub async fn delete_person(
    state: State<router::State>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, PersonError> {
    let id = parse_id(path)?;

    state.persons.delete(&id).await?;
    Ok(StatusCode::OK)
}

#[debug_handler]
pub async fn list_persons(
    state: State<router::State>,
) -> Result<Json<Vec<Person>>, PersonError> {
    Ok(Json(state.persons.find_all().await?))
}

#[debug_handler]
pub async fn count_persons(state: State<router::State>) -> Result<Json<i64>, PersonError> {
    Ok(Json(state.persons.count().await?))
}
