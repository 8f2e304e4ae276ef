//! Account endpoints: signup, login, profile and user administration.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use triplify_auth::{Session, UserStore};
use triplify_common::TriplifyError;

use crate::error::ApiError;
use crate::handlers::{clear_session_cookie, session_cookie};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

/// POST /signup
pub async fn signup(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<SignupForm>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    let mut errors: Vec<String> = Vec::new();
    if !UserStore::validate_email(&form.email) {
        errors.push("Email is not valid".to_string());
    }
    if form.password != form.password2 {
        errors.push("Passwords are not identical".to_string());
    }
    let min = state.config.auth.password_min_length;
    if form.password.len() < min {
        errors.push(format!("Password must be at least {min} characters"));
    }
    if let Err(e) = UserStore::validate_username(&form.username) {
        errors.push(e.to_string());
    } else {
        if users.username_exists(&form.username).await? {
            errors.push("Username already exists".to_string());
        }
        if users.email_exists(&form.email).await? {
            errors.push("Email already exists".to_string());
        }
    }
    if !errors.is_empty() {
        return Ok((jar, Json(json!({ "error": errors }))));
    }

    let admin = state.config.auth.first_user_admin && users.user_count().await? == 0;
    users
        .create_user(&form.username, &form.email, &form.password, admin)
        .await?;
    users.add_apikey(&form.username, "default").await?;

    let session = Session {
        username: form.username.clone(),
        admin,
        blocked: false,
        group: "base".to_string(),
    };
    let token = state.sessions.insert(session).await;
    let jar = jar.add(session_cookie(token));

    Ok((
        jar,
        Json(json!({
            "username": form.username,
            "admin": admin,
            "blocked": false,
            "error": [],
        })),
    ))
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username_email: String,
    pub password: String,
}

/// POST /login
pub async fn login(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<LoginForm>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    let record = if UserStore::validate_email(&form.username_email) {
        users.fetch_by_email(&form.username_email).await?
    } else {
        users.fetch(&form.username_email).await?
    };

    let Some(record) = record else {
        return Ok((jar, Json(json!({ "error": ["Account is not registered"] }))));
    };
    if !UserStore::verify_password(&record, &form.password) {
        return Ok((jar, Json(json!({ "error": ["Password is incorrect"] }))));
    }

    debug!(username = %record.username, "login");
    let session = Session {
        username: record.username.clone(),
        admin: record.admin,
        blocked: record.blocked,
        group: "base".to_string(),
    };
    let token = state.sessions.insert(session).await;
    let jar = jar.add(session_cookie(token));

    Ok((
        jar,
        Json(json!({
            "username": record.username,
            "admin": record.admin,
            "blocked": record.blocked,
            "error": [],
        })),
    ))
}

#[derive(Deserialize)]
pub struct ApiLoginForm {
    pub apikey: String,
}

/// POST /login_api
pub async fn login_api(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<ApiLoginForm>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    let Some(record) = users.fetch_by_apikey(&form.apikey).await? else {
        return Ok((jar, Json(json!({ "error": "API key belongs to nobody" }))));
    };

    let session = Session {
        username: record.username.clone(),
        admin: record.admin,
        blocked: record.blocked,
        group: "base".to_string(),
    };
    let token = state.sessions.insert(session).await;
    let jar = jar.add(session_cookie(token));

    Ok((
        jar,
        Json(json!({
            "username": record.username,
            "admin": record.admin,
            "blocked": record.blocked,
            "error": "",
        })),
    ))
}

/// GET /logout
pub async fn logout(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    if let Some(cookie) = jar.get(crate::state::SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }
    (clear_session_cookie(jar), Json(json!({})))
}

/// GET /checkuser — refresh and report the session flags.
pub async fn checkuser(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.session(&jar).await;

    if session.logged_in() {
        let builder = state.query_builder(&session).await;
        let users = UserStore::new(&state.client, &builder, state.internal_namespace());
        if let Some(record) = users.fetch(&session.username).await? {
            session.admin = record.admin;
            session.blocked = record.blocked;
            if let Some(cookie) = jar.get(crate::state::SESSION_COOKIE) {
                state.sessions.replace(cookie.value(), session.clone()).await;
            }
        }
    }

    Ok(Json(json!({
        "username": session.username,
        "admin": session.admin,
        "blocked": session.blocked,
    })))
}

/// GET /nb_users
pub async fn nb_users(State(state): State<SharedState>, jar: CookieJar) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    Ok(Json(json!({ "count": users.user_count().await? })))
}

#[derive(Deserialize)]
pub struct ApiKeyForm {
    pub keyname: String,
}

/// POST /api_key — mint a named API key.
pub async fn api_key(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<ApiKeyForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    let key = users.add_apikey(&session.username, &form.keyname).await?;
    Ok(Json(json!({ "success": "success", "key": key })))
}

/// GET /renew_apikey
pub async fn renew_apikey(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    let key = users.renew_apikey(&session.username).await?;
    Ok(Json(json!({ "key": key })))
}

/// GET /get_my_infos
pub async fn get_my_infos(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    let record = users
        .fetch(&session.username)
        .await?
        .ok_or_else(|| TriplifyError::NotFound(session.username.clone()))?;
    let apikey = users
        .list_apikeys(&session.username)
        .await?
        .into_iter()
        .next()
        .map(|(_, key)| key);

    Ok(Json(json!({
        "username": record.username,
        "email": record.email,
        "admin": record.admin,
        "blocked": record.blocked,
        "apikey": apikey,
    })))
}

#[derive(Deserialize)]
pub struct UpdateMailForm {
    pub email: String,
}

/// POST /update_mail
pub async fn update_mail(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<UpdateMailForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    if !UserStore::validate_email(&form.email) {
        return Ok(Json(json!({ "error": "Not a valid email" })));
    }
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    users.update_email(&session.username, &form.email).await?;
    Ok(Json(json!({ "success": "success" })))
}

#[derive(Deserialize)]
pub struct UpdatePasswdForm {
    pub current_passwd: String,
    pub passwd: String,
    pub passwd2: String,
}

/// POST /update_passwd
pub async fn update_passwd(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<UpdatePasswdForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    let record = users
        .fetch(&session.username)
        .await?
        .ok_or_else(|| TriplifyError::NotFound(session.username.clone()))?;
    if !UserStore::verify_password(&record, &form.current_passwd) {
        return Ok(Json(json!({ "error": "Current password is wrong" })));
    }
    if form.passwd != form.passwd2 {
        return Ok(Json(json!({ "error": "Passwords are not identical" })));
    }
    let min = state.config.auth.password_min_length;
    if form.passwd.len() < min {
        return Ok(Json(json!({ "error": format!("Password is too small ({min} chars min)") })));
    }

    users.update_password(&session.username, &form.passwd).await?;
    Ok(Json(json!({ "success": "success" })))
}

/// GET /get_users_infos — admin listing.
pub async fn get_users_infos(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    Ok(Json(json!({
        "result": users.list_users().await?,
        "me": session.username,
    })))
}

#[derive(Deserialize)]
pub struct LockForm {
    pub username: String,
    pub lock: bool,
}

/// POST /lock_user
pub async fn lock_user(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<LockForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    users.set_blocked(&form.username, form.lock).await?;
    Ok(Json(json!("success")))
}

#[derive(Deserialize)]
pub struct SetAdminForm {
    pub username: String,
    pub admin: bool,
}

/// POST /set_admin
pub async fn set_admin(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<SetAdminForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;
    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());
    users.set_admin(&form.username, form.admin).await?;
    Ok(Json(json!("success")))
}

#[derive(Deserialize)]
pub struct DeleteUserForm {
    pub username: String,
    #[serde(default)]
    pub passwd: String,
    #[serde(default)]
    pub passwd_conf: bool,
}

/// POST /delete_user — remove an account and every graph it owns.
pub async fn delete_user(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<DeleteUserForm>,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;

    // Plain users can only delete themselves.
    if session.username != form.username && !session.admin {
        return Err(ApiError(TriplifyError::Forbidden));
    }

    let builder = state.query_builder(&session).await;
    let users = UserStore::new(&state.client, &builder, state.internal_namespace());

    if form.passwd_conf {
        let record = users
            .fetch(&form.username)
            .await?
            .ok_or_else(|| TriplifyError::NotFound(form.username.clone()))?;
        if !UserStore::verify_password(&record, &form.passwd) {
            return Ok((jar, Json(json!({ "error": "Wrong password" }))));
        }
    }

    crate::handlers::graphs::drop_graphs_of_user(&state, &builder, &form.username).await?;
    users.delete_user(&form.username).await?;

    // Deleting yourself logs you out.
    let jar = if session.username == form.username {
        if let Some(cookie) = jar.get(crate::state::SESSION_COOKIE) {
            state.sessions.remove(cookie.value()).await;
        }
        clear_session_cookie(jar)
    } else {
        jar
    };

    Ok((jar, Json(json!("success"))))
}
