use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::Json,
    Extension,
};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::headers::Alert;
use crate::model::{Entity, Id};
use crate::logic::validate::FieldError;
use crate::store::traits::{GroupLinks, Repository};

pub type AppState<S> = Arc<S>;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type IdPath = Result<Path<Id>, PathRejection>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn read_body<E: Entity, T>(payload: JsonBody<T>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(ApiError::json_payload::<E>)
}

fn read_id<E: Entity>(path: IdPath) -> Result<Id, ApiError> {
    path.map(|Path(id)| id).map_err(ApiError::path_payload::<E>)
}

/// Checks the body identifier against the path identifier.
fn check_body_id<E: Entity>(path_id: Id, body_id: Option<Id>) -> Result<Id, ApiError> {
    match body_id {
        None => Err(ApiError::id_null::<E>()),
        Some(body_id) if body_id != path_id => Err(ApiError::id_invalid::<E>()),
        Some(body_id) => Ok(body_id),
    }
}

/// Loads the stored groups an incoming record references; unknown ids fail validation.
async fn check_group_links<S, E>(store: &S, entity: &mut E) -> Result<(), ApiError>
where
    S: GroupLinks<E>,
    E: Entity,
{
    let missing = store.load_groups(entity).await.map_err(ApiError::internal::<E>)?;
    if missing.is_empty() {
        return Ok(());
    }
    let field_errors = missing
        .into_iter()
        .map(|id| FieldError::new("userGroups", &format!("user group {} does not exist", id)))
        .collect();
    Err(ApiError::validation::<E>(field_errors))
}

/// Refreshes the groups of a stored record; references to deleted groups are dropped.
async fn refresh_group_links<S, E>(store: &S, entity: &mut E) -> Result<(), ApiError>
where
    S: GroupLinks<E>,
    E: Entity,
{
    let missing = store.load_groups(entity).await.map_err(ApiError::internal::<E>)?;
    if !missing.is_empty() {
        log::debug!("{} {:?} references deleted user groups {:?}", E::ENTITY_NAME, entity.id(), missing);
    }
    Ok(())
}

/// `POST /api/<entities>`: creates a record. The body must not carry an identifier.
pub async fn create_entity<S, E>(
    State(store): State<AppState<S>>,
    payload: JsonBody<E>,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Extension<Alert>, Json<E>), ApiError>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    let mut entity = read_body::<E, E>(payload)?;
    log::debug!("REST request to save {} : {:?}", E::ENTITY_NAME, entity);

    entity.validate().map_err(ApiError::validation::<E>)?;
    if entity.id().is_some() {
        return Err(ApiError::id_exists::<E>());
    }
    check_group_links(&*store, &mut entity).await?;

    entity.normalize();
    let created = store.insert(entity).await.map_err(ApiError::internal::<E>)?;
    let id = created
        .id()
        .ok_or_else(|| ApiError::internal::<E>(anyhow::anyhow!("store returned a record without id")))?;
    log::info!("Created {} {}", E::ENTITY_NAME, id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("{}/{}", E::RESOURCE_PATH, id))],
        Extension(Alert::created::<E>(id)),
        Json(created),
    ))
}

/// `PUT /api/<entities>/{id}`: replaces every field of an existing record.
pub async fn update_entity<S, E>(
    State(store): State<AppState<S>>,
    path: IdPath,
    payload: JsonBody<E>,
) -> Result<(Extension<Alert>, Json<E>), ApiError>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    let path_id = read_id::<E>(path)?;
    let mut entity = read_body::<E, E>(payload)?;
    log::debug!("REST request to update {} : {}, {:?}", E::ENTITY_NAME, path_id, entity);

    entity.validate().map_err(ApiError::validation::<E>)?;
    let id = check_body_id::<E>(path_id, entity.id())?;

    if !store.exists_by_id(id).await.map_err(ApiError::internal::<E>)? {
        return Err(ApiError::id_not_found::<E>(StatusCode::BAD_REQUEST));
    }
    check_group_links(&*store, &mut entity).await?;

    entity.normalize();
    let updated = store.save(entity).await.map_err(ApiError::internal::<E>)?;
    Ok((Extension(Alert::updated::<E>(id)), Json(updated)))
}

/// `PATCH /api/<entities>/{id}`: overwrites only the fields present in the body.
/// Accepts `application/json` and `application/merge-patch+json`.
pub async fn partial_update_entity<S, E>(
    State(store): State<AppState<S>>,
    path: IdPath,
    payload: JsonBody<E::Update>,
) -> Result<(Extension<Alert>, Json<E>), ApiError>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    let path_id = read_id::<E>(path)?;
    let update = read_body::<E, E::Update>(payload)?;
    log::debug!("REST request to partial update {} : {}, {:?}", E::ENTITY_NAME, path_id, update);

    let id = check_body_id::<E>(path_id, E::update_id(&update))?;

    let Some(mut existing) = store.find_by_id(id).await.map_err(ApiError::internal::<E>)? else {
        return Err(ApiError::id_not_found::<E>(StatusCode::NOT_FOUND));
    };

    refresh_group_links(&*store, &mut existing).await?;
    existing.apply_update(update);
    let updated = store.save(existing).await.map_err(ApiError::internal::<E>)?;
    Ok((Extension(Alert::updated::<E>(id)), Json(updated)))
}

/// `GET /api/<entities>`: every stored record, ordered by identifier.
pub async fn list_entities<S, E>(State(store): State<AppState<S>>) -> Result<Json<Vec<E>>, ApiError>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    log::debug!("REST request to get all {}", E::ENTITY_NAME);
    let mut entities = store.find_all().await.map_err(ApiError::internal::<E>)?;
    for entity in &mut entities {
        refresh_group_links(&*store, entity).await?;
    }
    Ok(Json(entities))
}

/// `GET /api/<entities>/{id}`
pub async fn get_entity<S, E>(State(store): State<AppState<S>>, path: IdPath) -> Result<Json<E>, ApiError>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    let id = read_id::<E>(path)?;
    log::debug!("REST request to get {} : {}", E::ENTITY_NAME, id);

    match store.find_by_id(id).await {
        Ok(Some(mut entity)) => {
            refresh_group_links(&*store, &mut entity).await?;
            Ok(Json(entity))
        }
        Ok(None) => Err(ApiError::not_found::<E>()),
        Err(e) => Err(ApiError::internal::<E>(e)),
    }
}

/// `DELETE /api/<entities>/{id}`: answers 204 whether or not the record existed.
pub async fn delete_entity<S, E>(
    State(store): State<AppState<S>>,
    path: IdPath,
) -> Result<(StatusCode, Extension<Alert>), ApiError>
where
    S: Repository<E> + 'static,
    E: Entity,
{
    let id = read_id::<E>(path)?;
    log::debug!("REST request to delete {} : {}", E::ENTITY_NAME, id);

    let removed = store.delete_by_id(id).await.map_err(ApiError::internal::<E>)?;
    if !removed {
        log::debug!("{} {} was already absent", E::ENTITY_NAME, id);
    }

    Ok((StatusCode::NO_CONTENT, Extension(Alert::deleted::<E>(id))))
}
