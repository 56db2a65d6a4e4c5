// src/services/actor.rs

//! Who is acting on a cleaning-task request.
//!
//! Assignment records the cleaner's id and display name. Today those come
//! from `X-User-ID` / `X-User-Name` request headers and not from the login
//! token; [`ActorResolver`] keeps that choice out of the lifecycle so a
//! token-backed resolver can replace it.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use super::{ServiceError, ServiceResult};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

pub const DEFAULT_ACTOR_ID: i64 = 1;
pub const DEFAULT_ACTOR_NAME: &str = "cleaning staff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub name: String,
}

pub trait ActorResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> ServiceResult<Actor>;
}

/// Requires an `Authorization` header to be present but does not inspect
/// it; identity falls back to id 1 / "cleaning staff".
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderActorResolver;

impl ActorResolver for HeaderActorResolver {
    fn resolve(&self, headers: &HeaderMap) -> ServiceResult<Actor> {
        let authorized = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| !v.trim().is_empty());
        if !authorized {
            return Err(ServiceError::Auth("missing authorization header".into()));
        }

        let id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_ACTOR_ID);

        // names may carry non-ASCII bytes, which `to_str` rejects
        let name = headers
            .get(USER_NAME_HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR_NAME.to_string());

        Ok(Actor { id, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(v));
        }
        h
    }

    #[test]
    fn missing_authorization_is_rejected() {
        let err = HeaderActorResolver.resolve(&headers(&[("x-user-id", "7")])).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(_)));
    }

    #[test]
    fn headers_supply_identity() {
        let a = HeaderActorResolver
            .resolve(&headers(&[
                ("authorization", "Bearer abc"),
                ("x-user-id", "7"),
                ("x-user-name", "Mehmet"),
            ]))
            .unwrap();
        assert_eq!(a, Actor { id: 7, name: "Mehmet".into() });
    }

    #[test]
    fn non_ascii_names_survive() {
        let mut h = headers(&[("authorization", "Bearer abc")]);
        h.insert(USER_NAME_HEADER, HeaderValue::from_bytes("Ayşe Yılmaz".as_bytes()).unwrap());
        let a = HeaderActorResolver.resolve(&h).unwrap();
        assert_eq!(a.name, "Ayşe Yılmaz");
    }

    #[test]
    fn defaults_when_identity_absent_or_garbled() {
        let a = HeaderActorResolver
            .resolve(&headers(&[("authorization", "x"), ("x-user-id", "seven")]))
            .unwrap();
        assert_eq!(a.id, DEFAULT_ACTOR_ID);
        assert_eq!(a.name, DEFAULT_ACTOR_NAME);
    }
}
