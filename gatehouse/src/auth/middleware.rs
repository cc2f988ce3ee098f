use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use super::{AuthError, permissions::Route};
use crate::{
    AppState,
    errors::Error,
    types::{Permissions, TokenId, abbrev_uuid},
};

/// A token renewed while authorizing a request.
pub(crate) struct Refreshed {
    token_id: TokenId,
    token: String,
}

/// Implementation for [`authorization_middleware`]. Returns the request with the [`Subject`]
/// attached, plus the renewed token when the session was refreshed.
///
/// [`Subject`]: super::session::Subject
pub(crate) async fn authorize_request(state: &AppState, mut request: Request) -> Result<(Request, Option<Refreshed>), Error> {
    let method = request.method().clone();
    let route = state.permissions.resolve(&method, request.uri().path());

    if route == Route::Anonymous {
        trace!(%method, path = request.uri().path(), "Anonymous route");
        return Ok((request, None));
    }

    let token = bearer_token(request.headers()).ok_or(Error::Unauthenticated { message: None })?;
    let subject = state.tokens.validate(token).await?;

    // Current permissions of the user record, not the snapshot in the token
    if let Err(e) = check_access(route, &subject.user.permissions, &method) {
        debug!(
            user_id = %abbrev_uuid(&subject.user.id),
            %method,
            path = request.uri().path(),
            ?route,
            "Access denied"
        );
        return Err(e.into());
    }

    let refreshed = state.tokens.refresh(&subject)?.map(|token| Refreshed {
        token_id: subject.token_id,
        token,
    });
    trace!(user_id = %abbrev_uuid(&subject.user.id), refreshed = refreshed.is_some(), "Request authorized");

    request.extensions_mut().insert(subject);
    Ok((request, refreshed))
}

/// Gate every request on the route registry, the bearer token and the caller's permissions.
///
/// A refreshed token is returned to the caller in the response `Authorization` header.
pub async fn authorization_middleware(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let (request, refreshed) = authorize_request(&state, request).await?;
    let mut response = next.run(request).await;

    // Logout revokes the session while the request is in flight
    if let Some(Refreshed { token_id, token }) = refreshed.filter(|r| !state.tokens.is_revoked(&r.token_id)) {
        trace!(token_id = %abbrev_uuid(&token_id), "Returning refreshed token");
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| Error::Internal {
            operation: format!("encode refreshed token header: {e}"),
        })?;
        response.headers_mut().insert(header::AUTHORIZATION, value);
    }

    Ok(response)
}

/// Whether `permissions` allow `method` on a route that requires a token.
pub fn check_access(route: Route, permissions: &Permissions, method: &Method) -> Result<(), AuthError> {
    let granted = match route {
        Route::Anonymous | Route::AllowAll => true,
        Route::Category(category) => permissions.level(category).permits(method),
        Route::Unregistered => false,
    };

    if granted { Ok(()) } else { Err(AuthError::Forbidden) }
}

/// The token from an `Authorization: Bearer <token>` header, if one is present and non-blank.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
