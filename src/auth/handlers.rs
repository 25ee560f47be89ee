use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::db::users::{self, NewUser, UserError};
use crate::error::{AppError, AppResult};
use crate::extractors::{session_token, MaybeUser};
use crate::forms::{safe_next, FormErrors, LoginForm, SignupForm};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<String>,
    pub form: SignupForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<String>,
    pub username: String,
    pub next: String,
    pub errors: FormErrors,
}

#[derive(Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

/// Redirect that also sets (or clears) the session cookie.
fn redirect_with_cookie(location: &str, cookie: String) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, cookie),
        ],
        "",
    )
        .into_response()
}

fn start_session(state: &AppState, user_id: i64, location: &str) -> AppResult<Response> {
    let conn = state.db.get()?;
    let token = session::create_session(&conn, user_id, state.config.auth.session_hours)?;
    Ok(redirect_with_cookie(
        location,
        session::session_cookie(
            &state.config.auth.cookie_name,
            &token,
            state.config.auth.session_hours,
        ),
    ))
}

// -- Signup handlers --

/// GET /auth/signup/
pub async fn signup_page(maybe_user: MaybeUser) -> Html<SignupTemplate> {
    Html(SignupTemplate {
        viewer: maybe_user.username(),
        form: SignupForm::default(),
        errors: FormErrors::default(),
    })
}

/// POST /auth/signup/: create the account and log it in
pub async fn signup(State(state): State<AppState>, Form(form): Form<SignupForm>) -> AppResult<Response> {
    let rerender = |form: SignupForm, errors: FormErrors| -> AppResult<Response> {
        let form = SignupForm {
            password1: String::new(),
            password2: String::new(),
            ..form
        };
        Ok(Html(SignupTemplate {
            viewer: None,
            form,
            errors,
        })
        .into_response())
    };

    if let Err(errors) = form.validate() {
        return rerender(form, errors);
    }

    let hash = password::hash_password(&form.password1, state.config.auth.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    let created = {
        let conn = state.db.get()?;
        users::create(
            &conn,
            &NewUser {
                username: form.username.trim(),
                password_hash: &hash,
                first_name: form.first_name.trim(),
                last_name: form.last_name.trim(),
                email: form.email.trim(),
                is_admin: false,
            },
        )
    };

    match created {
        Ok(user_id) => start_session(&state, user_id, "/"),
        Err(UserError::UsernameTaken) => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            rerender(form, errors)
        }
        Err(UserError::Database(e)) => Err(e.into()),
    }
}

// -- Login handlers --

/// GET /auth/login/?next=...
pub async fn login_page(maybe_user: MaybeUser, Query(query): Query<NextQuery>) -> Html<LoginTemplate> {
    Html(LoginTemplate {
        viewer: maybe_user.username(),
        username: String::new(),
        next: query.next,
        errors: FormErrors::default(),
    })
}

/// POST /auth/login/: check credentials, set the session cookie, follow `next`
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> AppResult<Response> {
    let username = form.username.trim();
    let credentials = {
        let conn = state.db.get()?;
        users::credentials(&conn, username)?
    };

    let user_id = match credentials {
        Some((id, hash)) if password::verify_password(&form.password, &hash) => id,
        _ => {
            tracing::info!(username, "Failed login attempt");
            let mut errors = FormErrors::default();
            errors.add(
                "form",
                "Please enter a correct username and password. Note that both fields may be case-sensitive.",
            );
            return Ok(Html(LoginTemplate {
                viewer: None,
                username: username.to_string(),
                next: form.next.clone(),
                errors,
            })
            .into_response());
        }
    };

    tracing::info!(user_id, username, "User logged in");
    start_session(&state, user_id, safe_next(&form.next))
}

// -- Logout handler --

/// POST /auth/logout/: delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;

    if let Some(token) = session_token(&headers, cookie_name) {
        let conn = state.db.get()?;
        if let Err(e) = session::delete_session(&conn, token) {
            tracing::warn!("Could not delete session: {}", e);
        }
    }

    Ok(redirect_with_cookie(
        "/",
        session::clear_session_cookie(cookie_name),
    ))
}
