use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::trace;

use super::session::Subject;
use crate::errors::Error;

/// Handlers take the authenticated [`Subject`] the authorization middleware attached.
///
/// Rejects with 401 on routes the middleware let through anonymously.
impl<S> FromRequestParts<S> for Subject
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Subject>() {
            Some(subject) => Ok(subject.clone()),
            None => {
                trace!("No subject attached to request");
                Err(Error::Unauthenticated { message: None })
            }
        }
    }
}
