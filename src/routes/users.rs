use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Router};
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{self, CurrentUser, MaybeUser, RequireUser};
use crate::error::AppError;
use crate::forms::auth::{LoginForm, PasswordChangeForm, SignupForm};
use crate::forms::FormErrors;
use crate::helpers::{found, OrNotFound};
use crate::models::user::NewUser;
use crate::models::ModelError;
use crate::services::Store;
use crate::state::AppState;

use super::base_context;

const PASSWORD_CHANGE_DONE: &str = "/auth/password_change/done/";

#[derive(Deserialize, Debug, Default)]
struct NextQuery {
    next: Option<String>,
}

async fn render_form<S: Store>(
    state: &AppState<S>,
    user: Option<&CurrentUser>,
    template: &str,
    form: &impl Serialize,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut ctx = base_context(user);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    state.templates.render(template, &ctx).await
}

async fn signup_form<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, AppError> {
    render_form(
        &state,
        user.as_ref(),
        "users/signup.html",
        &SignupForm::default(),
        &FormErrors::default(),
    )
    .await
}

#[tracing::instrument(skip_all)]
async fn signup<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    jar: PrivateCookieJar,
    Form(mut form): Form<SignupForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.clean() {
        let page = render_form(&state, user.as_ref(), "users/signup.html", &form, &errors).await?;
        return Ok(page.into_response());
    }

    let new_user = NewUser {
        username: form.username.clone(),
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        password_hash: auth::hash_password(&form.password1)?,
    };
    let created = match state.store.create_user(&new_user).await {
        Ok(created) => created,
        Err(e) if e.downcast_ref::<ModelError>() == Some(&ModelError::UsernameTaken) => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            let page =
                render_form(&state, user.as_ref(), "users/signup.html", &form, &errors).await?;
            return Ok(page.into_response());
        }
        Err(e) => return Err(e.into()),
    };
    info!(user_id = created.id, username = %created.username, "user signed up");

    Ok((auth::log_in(jar, &created), found("/")).into_response())
}

async fn login_form<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<NextQuery>,
) -> Result<Html<String>, AppError> {
    let form = LoginForm {
        next: q.next,
        ..LoginForm::default()
    };
    render_form(
        &state,
        user.as_ref(),
        "users/login.html",
        &form,
        &FormErrors::default(),
    )
    .await
}

#[tracing::instrument(skip_all)]
async fn login<S: Store>(
    State(state): State<AppState<S>>,
    jar: PrivateCookieJar,
    Form(mut form): Form<LoginForm>,
) -> Result<Response, AppError> {
    if let Err(errors) = form.clean() {
        let page = render_form(&state, None, "users/login.html", &form, &errors).await?;
        return Ok(page.into_response());
    }

    let user = state
        .store
        .get_user_by_username(&form.username)
        .await?
        .filter(|u| auth::verify_password(&form.password, &u.password_hash));
    let Some(user) = user else {
        warn!(username = %form.username, "failed login");
        let errors = LoginForm::invalid_credentials();
        let page = render_form(&state, None, "users/login.html", &form, &errors).await?;
        return Ok(page.into_response());
    };

    info!(user_id = user.id, "user logged in");
    let next = auth::safe_next(form.next.as_deref());
    Ok((auth::log_in(jar, &user), found(next)).into_response())
}

async fn logout<S: Store>(
    State(state): State<AppState<S>>,
    jar: PrivateCookieJar,
) -> Result<Response, AppError> {
    let page = state
        .templates
        .render("users/logged_out.html", &base_context(None))
        .await?;
    Ok((auth::log_out(jar), page).into_response())
}

async fn password_change_form<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    render_form(
        &state,
        Some(&user),
        "users/password_change_form.html",
        &(),
        &FormErrors::default(),
    )
    .await
}

#[tracing::instrument(skip_all)]
async fn password_change<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    jar: PrivateCookieJar,
    Form(form): Form<PasswordChangeForm>,
) -> Result<Response, AppError> {
    let old_matches = auth::verify_password(&form.old_password, &user.user.password_hash);
    if let Err(errors) = form.clean(old_matches) {
        let page = render_form(
            &state,
            Some(&user),
            "users/password_change_form.html",
            &(),
            &errors,
        )
        .await?;
        return Ok(page.into_response());
    }

    let hash = auth::hash_password(&form.new_password1)?;
    state.store.set_password_hash(user.id(), &hash).await?;
    // the old cookie no longer matches, hand out a fresh one
    let refreshed = state.store.get_user(user.id()).await?.or_404()?;
    info!(user_id = refreshed.id, "password changed");

    Ok((auth::log_in(jar, &refreshed), found(PASSWORD_CHANGE_DONE)).into_response())
}

async fn password_change_done<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    state
        .templates
        .render("users/password_change_done.html", &base_context(Some(&user)))
        .await
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/auth/signup/", get(signup_form::<S>).post(signup::<S>))
        .route("/auth/login/", get(login_form::<S>).post(login::<S>))
        .route("/auth/logout/", get(logout::<S>).post(logout::<S>))
        .route(
            "/auth/password_change/",
            get(password_change_form::<S>).post(password_change::<S>),
        )
        .route(PASSWORD_CHANGE_DONE, get(password_change_done::<S>))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, Response, StatusCode};

    use super::super::testing::*;
    use crate::auth::{verify_password, SESSION_COOKIE};
    use crate::services::UserService;

    fn session_from(res: &Response<Body>) -> String {
        res.headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(SESSION_COOKIE))
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_owned()
    }

    async fn get_with_cookie(app: &TestApp, uri: &str, cookie: &str) -> Response<Body> {
        let req = Request::get(uri)
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        app.send(req).await
    }

    #[tokio::test]
    async fn auth_pages_use_correct_templates() {
        let app = TestApp::new();
        let user = app.user("leo").await;

        for (uri, template) in [
            ("/auth/signup/", "users/signup.html"),
            ("/auth/login/", "users/login.html"),
            ("/auth/logout/", "users/logged_out.html"),
        ] {
            let res = app.get(uri, None).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri}");
            assert_template(&body_text(res).await, template);
        }
        for (uri, template) in [
            ("/auth/password_change/", "users/password_change_form.html"),
            ("/auth/password_change/done/", "users/password_change_done.html"),
        ] {
            let res = app.get(uri, None).await;
            assert!(location(&res).starts_with("/auth/login/?next="));

            let res = app.get(uri, Some(&user)).await;
            assert_template(&body_text(res).await, template);
        }
    }

    #[tokio::test]
    async fn signup_creates_and_logs_in() {
        let app = TestApp::new();
        let body = "first_name=Leo&last_name=Tolstoy&username=leo&email=leo%40example.com\
                    &password1=war-and-peace&password2=war-and-peace";

        let res = app.post_form("/auth/signup/", None, body).await;
        assert_eq!(location(&res), "/");
        let cookie = session_from(&res);

        let user = app.store().get_user_by_username("leo").await.unwrap().unwrap();
        assert_eq!(user.full_name(), "Leo Tolstoy");
        assert!(verify_password("war-and-peace", &user.password_hash));

        let res = get_with_cookie(&app, "/follow/", &cookie).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn signup_without_email() {
        let app = TestApp::new();
        let body = "username=leo&email=&password1=war-and-peace&password2=war-and-peace";

        let res = app.post_form("/auth/signup/", None, body).await;
        assert_eq!(location(&res), "/");
        let user = app.store().get_user_by_username("leo").await.unwrap().unwrap();
        assert_eq!(user.email, "");
    }

    #[tokio::test]
    async fn signup_rejects_taken_username() {
        let app = TestApp::new();
        app.user("leo").await;
        let body = "username=leo&email=other%40example.com\
                    &password1=war-and-peace&password2=war-and-peace";

        let res = app.post_form("/auth/signup/", None, body).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert_template(&body, "users/signup.html");
        assert!(body.contains("A user with that username already exists."));
    }

    #[tokio::test]
    async fn login_follows_next() {
        let app = TestApp::new();
        app.user("leo").await;

        let body = format!("username=leo&password={PASSWORD}&next=%2Ffollow%2F");
        let res = app.post_form("/auth/login/", None, &body).await;
        assert_eq!(location(&res), "/follow/");
        assert!(!session_from(&res).is_empty());

        let body = format!("username=leo&password={PASSWORD}&next=https%3A%2F%2Fevil.example%2F");
        let res = app.post_form("/auth/login/", None, &body).await;
        assert_eq!(location(&res), "/");
    }

    #[tokio::test]
    async fn login_with_wrong_password() {
        let app = TestApp::new();
        app.user("leo").await;

        let res = app
            .post_form("/auth/login/", None, "username=leo&password=not-it")
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(header::SET_COOKIE).is_none());
        let body = body_text(res).await;
        assert!(body.contains("Please enter a correct username and password."));
    }

    #[tokio::test]
    async fn password_change_retires_old_sessions() {
        let app = TestApp::new();
        let user = app.user("leo").await;
        let old_cookie = app.session(&user);

        let body = format!(
            "old_password={PASSWORD}&new_password1=brand-new-pass&new_password2=brand-new-pass"
        );
        let res = app
            .post_form("/auth/password_change/", Some(&user), &body)
            .await;
        assert_eq!(location(&res), "/auth/password_change/done/");
        let new_cookie = session_from(&res);

        let stored = app.store().get_user(user.id).await.unwrap().unwrap();
        assert!(verify_password("brand-new-pass", &stored.password_hash));

        let res = get_with_cookie(&app, "/follow/", &old_cookie).await;
        assert_eq!(res.status(), StatusCode::FOUND);
        let res = get_with_cookie(&app, "/follow/", &new_cookie).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn password_change_needs_old_password() {
        let app = TestApp::new();
        let user = app.user("leo").await;

        let res = app
            .post_form(
                "/auth/password_change/",
                Some(&user),
                "old_password=wrong&new_password1=brand-new-pass&new_password2=brand-new-pass",
            )
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(body_text(res).await.contains("Your old password was entered incorrectly."));

        let stored = app.store().get_user(user.id).await.unwrap().unwrap();
        assert!(verify_password(PASSWORD, &stored.password_hash));
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let app = TestApp::new();
        let user = app.user("leo").await;

        let res = app.get("/auth/logout/", Some(&user)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let cleared = session_from(&res);
        assert_eq!(cleared, format!("{SESSION_COOKIE}="));
    }
}
