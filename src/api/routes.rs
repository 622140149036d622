use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::api::handlers;
use crate::api::headers::{alert_headers, AppName};
use crate::model::{AppUser, Entity, UserGroup};
use crate::store::traits::{GroupLinks, Repository, Store};

/// CRUD routes for one entity under its resource path.
fn entity_routes<S, E>() -> Router<Arc<S>>
where
    S: Repository<E> + GroupLinks<E> + 'static,
    E: Entity,
{
    let collection = E::RESOURCE_PATH;
    let item = format!("{}/:id", E::RESOURCE_PATH);

    Router::new()
        .route(
            collection,
            get(handlers::list_entities::<S, E>).post(handlers::create_entity::<S, E>),
        )
        .route(
            &item,
            get(handlers::get_entity::<S, E>)
                .put(handlers::update_entity::<S, E>)
                .patch(handlers::partial_update_entity::<S, E>)
                .delete(handlers::delete_entity::<S, E>),
        )
}

pub fn create_router<S: Store + 'static>() -> Router<Arc<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .merge(entity_routes::<S, AppUser>())
        .merge(entity_routes::<S, UserGroup>())
}

/// Router with state and alert headers applied, ready to serve.
pub fn build_app<S: Store + 'static>(store: Arc<S>, app_name: &str) -> Router {
    create_router::<S>()
        .with_state(store)
        .layer(middleware::from_fn_with_state(AppName::new(app_name), alert_headers))
}
