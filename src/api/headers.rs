use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::model::{Entity, Id};

/// Outcome of a request, attached to the response as an extension and turned
/// into `X-<app>-alert` / `X-<app>-error` / `X-<app>-params` headers by [`alert_headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Created { entity: &'static str, id: Id },
    Updated { entity: &'static str, id: Id },
    Deleted { entity: &'static str, id: Id },
    Error { entity: &'static str, key: &'static str },
}

impl Alert {
    pub fn created<E: Entity>(id: Id) -> Self {
        Alert::Created {
            entity: E::ENTITY_NAME,
            id,
        }
    }

    pub fn updated<E: Entity>(id: Id) -> Self {
        Alert::Updated {
            entity: E::ENTITY_NAME,
            id,
        }
    }

    pub fn deleted<E: Entity>(id: Id) -> Self {
        Alert::Deleted {
            entity: E::ENTITY_NAME,
            id,
        }
    }

    /// Header name suffix, header value and params value.
    fn parts(&self, app_name: &str) -> (&'static str, String, String) {
        match self {
            Alert::Created { entity, id } => ("alert", format!("{}.{}.created", app_name, entity), id.to_string()),
            Alert::Updated { entity, id } => ("alert", format!("{}.{}.updated", app_name, entity), id.to_string()),
            Alert::Deleted { entity, id } => ("alert", format!("{}.{}.deleted", app_name, entity), id.to_string()),
            Alert::Error { entity, key } => ("error", format!("error.{}", key), entity.to_string()),
        }
    }

    pub fn write_headers(&self, app_name: &str, headers: &mut HeaderMap) {
        let (kind, message, params) = self.parts(app_name);
        insert_header(headers, &format!("x-{}-{}", app_name, kind), &message);
        insert_header(headers, &format!("x-{}-params", app_name), &params);
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (HeaderName::try_from(name), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => log::warn!("Skipping invalid alert header {}: {}", name, value),
    }
}

/// Application name used as the alert header prefix.
#[derive(Debug, Clone)]
pub struct AppName(pub Arc<str>);

impl AppName {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

/// Middleware that renders the response's [`Alert`], if any, as headers.
pub async fn alert_headers(State(app_name): State<AppName>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if let Some(alert) = response.extensions_mut().remove::<Alert>() {
        alert.write_headers(&app_name.0, response.headers_mut());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppUser, UserGroup};

    #[test]
    fn test_created_alert_headers() {
        let mut headers = HeaderMap::new();
        Alert::created::<AppUser>(5).write_headers("appUserDb", &mut headers);

        assert_eq!(headers.get("x-appuserdb-alert").unwrap(), "appUserDb.appUser.created");
        assert_eq!(headers.get("x-appuserdb-params").unwrap(), "5");
    }

    #[test]
    fn test_error_alert_headers() {
        let mut headers = HeaderMap::new();
        Alert::Error {
            entity: UserGroup::ENTITY_NAME,
            key: "idexists",
        }
        .write_headers("appUserDb", &mut headers);

        assert_eq!(headers.get("x-appuserdb-error").unwrap(), "error.idexists");
        assert_eq!(headers.get("x-appuserdb-params").unwrap(), "userGroup");
        assert!(headers.get("x-appuserdb-alert").is_none());
    }

    #[test]
    fn test_invalid_app_name_skips_headers() {
        let mut headers = HeaderMap::new();
        Alert::deleted::<UserGroup>(1).write_headers("bad name", &mut headers);
        assert!(headers.is_empty());
    }
}
