use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lessons_core::model::RegistrationDraft;
use serde::Deserialize;
use services::LoginSession;

use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, SESSION_COOKIE};
use crate::error::ApiError;
use crate::extract::FormOrJson;
use crate::views::SessionBody;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
}

impl From<RegisterForm> for RegistrationDraft {
    fn from(form: RegisterForm) -> Self {
        Self {
            username: form.username,
            email: form.email,
            first_name: form.first_name,
            last_name: form.last_name,
            password1: form.password1,
            password2: form.password2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/register", post(register))
        .route("/accounts/login", post(login))
        .route("/accounts/logout", post(logout))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn signed_in(jar: CookieJar, session: LoginSession) -> (CookieJar, SessionBody) {
    let jar = jar.add(session_cookie(session.token.clone()));
    let body = SessionBody {
        token: session.token,
        expires_at: session.expires_at,
        user: session.user.into(),
    };
    (jar, body)
}

/// Create an account and sign it in. Callers that already have a session
/// are sent to the lesson list instead.
async fn register(
    State(state): State<AppState>,
    MaybeUser(current): MaybeUser,
    jar: CookieJar,
    FormOrJson(form): FormOrJson<RegisterForm>,
) -> Result<Response, ApiError> {
    if current.is_some() {
        return Ok(Redirect::to("/lessons").into_response());
    }

    let accounts = state.services.accounts();
    let password = form.password1.clone();
    let user = accounts.register(form.into()).await?;
    let session = accounts.login(&user.username, &password).await?;
    let (jar, body) = signed_in(jar, session);
    Ok((StatusCode::CREATED, jar, Json(body)).into_response())
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    FormOrJson(form): FormOrJson<LoginForm>,
) -> Result<(CookieJar, Json<SessionBody>), ApiError> {
    let session = state
        .services
        .accounts()
        .login(&form.username, &form.password)
        .await?;
    let (jar, body) = signed_in(jar, session);
    Ok((jar, Json(body)))
}

async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), ApiError> {
    state.services.accounts().logout(&current.token).await?;
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}
