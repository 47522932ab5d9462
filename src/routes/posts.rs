use axum::extract::{Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tracing::info;

use crate::auth::{CurrentUser, MaybeUser, RequireUser};
use crate::error::AppError;
use crate::forms::post::{CommentForm, PostForm};
use crate::forms::FormErrors;
use crate::helpers::{found, OrNotFound, PageQuery};
use crate::media;
use crate::models::comment::NewComment;
use crate::models::group::Group;
use crate::models::post::{ImageChange, NewPost, PostChanges, PostFilter, PostView};
use crate::pagination::requested_page;
use crate::services::posts::paginate_posts;
use crate::services::Store;
use crate::state::AppState;

use super::{base_context, parse_id};

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

fn post_url(post_id: i32) -> String {
    format!("/posts/{post_id}/")
}

#[tracing::instrument(skip_all)]
async fn index<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let key = (requested_page(q.raw()), user.as_ref().map(CurrentUser::id));
    if let Some(html) = state.index_cache.get(&key).await {
        return Ok(Html(html));
    }

    let page = paginate_posts(
        &state.store,
        &PostFilter::all(),
        q.raw(),
        state.settings.post_count,
    )
    .await?;
    let mut ctx = base_context(user.as_ref());
    ctx.insert("page_obj", &page);
    ctx.insert("index", &true);
    let Html(html) = state.templates.render("posts/index.html", &ctx).await?;

    state.index_cache.insert(key, html.clone()).await;
    Ok(Html(html))
}

async fn group_posts<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    Path(slug): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let group = state.store.get_group_by_slug(&slug).await?.or_404()?;
    let page = paginate_posts(
        &state.store,
        &PostFilter::group(group.id),
        q.raw(),
        state.settings.post_count,
    )
    .await?;

    let mut ctx = base_context(user.as_ref());
    ctx.insert("group", &group);
    ctx.insert("page_obj", &page);
    state.templates.render("posts/group_list.html", &ctx).await
}

async fn profile<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    Path(username): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let author = state.store.get_user_by_username(&username).await?.or_404()?;
    let page = paginate_posts(
        &state.store,
        &PostFilter::author(author.id),
        q.raw(),
        state.settings.post_count,
    )
    .await?;
    let following = match &user {
        Some(viewer) => state.store.is_following(viewer.id(), author.id).await?,
        None => false,
    };
    let stats = state.store.follow_stats(author.id).await?;

    let mut ctx = base_context(user.as_ref());
    ctx.insert("is_self", &user.as_ref().is_some_and(|u| u.id() == author.id));
    ctx.insert("author", &author);
    ctx.insert("author_name", &author.full_name());
    ctx.insert("page_obj", &page);
    ctx.insert("following", &following);
    ctx.insert("stats", &stats);
    state.templates.render("posts/profile.html", &ctx).await
}

async fn post_detail<S: Store>(
    State(state): State<AppState<S>>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let post = state.store.get_post(parse_id(&post_id)?).await?.or_404()?;
    let comments = state.store.comments_for_post(post.id).await?;
    let post_number = state
        .store
        .count_posts(&PostFilter::author(post.author.id))
        .await?;

    let mut ctx = base_context(user.as_ref());
    ctx.insert("is_author", &user.as_ref().is_some_and(|u| u.id() == post.author.id));
    ctx.insert("post", &post);
    ctx.insert("comments", &comments);
    ctx.insert("post_number", &post_number);
    ctx.insert("form", &CommentForm::default());
    state.templates.render("posts/post_detail.html", &ctx).await
}

async fn render_post_form<S: Store>(
    state: &AppState<S>,
    user: &CurrentUser,
    groups: &[Group],
    form: &PostForm,
    errors: &FormErrors,
    editing: Option<&PostView>,
) -> Result<Html<String>, AppError> {
    let mut ctx = base_context(Some(user));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("groups", groups);
    if let Some(post) = editing {
        ctx.insert("post", post);
        ctx.insert("is_edit", &true);
    }
    state.templates.render("posts/create_post.html", &ctx).await
}

async fn post_create_form<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Html<String>, AppError> {
    let groups = state.store.list_groups().await?;
    render_post_form(
        &state,
        &user,
        &groups,
        &PostForm::default(),
        &FormErrors::default(),
        None,
    )
    .await
}

#[tracing::instrument(skip_all)]
async fn post_create<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = PostForm::from_multipart(multipart).await?;
    let groups = state.store.list_groups().await?;
    let clean = match form.clean(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            let page = render_post_form(&state, &user, &groups, &form, &errors, None).await?;
            return Ok(page.into_response());
        }
    };

    let image = match &clean.image {
        Some(upload) => Some(media::save_post_image(&state.settings.media_dir, upload).await?),
        None => None,
    };
    let post = state
        .store
        .create_post(&NewPost {
            text: clean.text,
            author_id: user.id(),
            group_id: clean.group_id,
            image,
        })
        .await?;
    info!(post_id = post.id, author = %user.user.username, "post created");

    Ok(found(profile_url(&user.user.username)))
}

async fn post_edit_form<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post = state.store.get_post(parse_id(&post_id)?).await?.or_404()?;
    if post.author.id != user.id() {
        return Ok(found(post_url(post.id)));
    }

    let groups = state.store.list_groups().await?;
    let form = PostForm {
        text: post.text.clone(),
        group: post
            .group
            .as_ref()
            .map(|g| g.id.to_string())
            .unwrap_or_default(),
        ..PostForm::default()
    };
    let page = render_post_form(
        &state,
        &user,
        &groups,
        &form,
        &FormErrors::default(),
        Some(&post),
    )
    .await?;
    Ok(page.into_response())
}

#[tracing::instrument(skip_all)]
async fn post_edit<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let post = state.store.get_post(parse_id(&post_id)?).await?.or_404()?;
    if post.author.id != user.id() {
        return Ok(found(post_url(post.id)));
    }

    let form = PostForm::from_multipart(multipart).await?;
    let groups = state.store.list_groups().await?;
    let clean = match form.clean(&groups) {
        Ok(clean) => clean,
        Err(errors) => {
            let page =
                render_post_form(&state, &user, &groups, &form, &errors, Some(&post)).await?;
            return Ok(page.into_response());
        }
    };

    let image = match (&clean.image, clean.clear_image) {
        (Some(upload), _) => {
            ImageChange::Replace(media::save_post_image(&state.settings.media_dir, upload).await?)
        }
        (None, true) => ImageChange::Clear,
        (None, false) => ImageChange::Keep,
    };
    state
        .store
        .update_post(
            post.id,
            &PostChanges {
                text: clean.text,
                group_id: clean.group_id,
                image,
            },
        )
        .await?;

    Ok(found(post_url(post.id)))
}

async fn add_comment<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Path(post_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let post = state.store.get_post(parse_id(&post_id)?).await?.or_404()?;
    // an empty comment is dropped, the reader lands back on the post either way
    if let Ok(text) = form.clean() {
        state
            .store
            .create_comment(&NewComment {
                post_id: post.id,
                author_id: user.id(),
                text,
            })
            .await?;
    }
    Ok(found(post_url(post.id)))
}

async fn follow_index<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Query(q): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let page = paginate_posts(
        &state.store,
        &PostFilter::followed_by(user.id()),
        q.raw(),
        state.settings.post_count,
    )
    .await?;

    let mut ctx = base_context(Some(&user));
    ctx.insert("page_obj", &page);
    ctx.insert("follow", &true);
    state.templates.render("posts/follow.html", &ctx).await
}

async fn profile_follow<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = state.store.get_user_by_username(&username).await?.or_404()?;
    if author.id != user.id() {
        state.store.follow(user.id(), author.id).await?;
    }
    Ok(found(profile_url(&author.username)))
}

async fn profile_unfollow<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    Path(username): Path<String>,
) -> Result<Response, AppError> {
    let author = state.store.get_user_by_username(&username).await?.or_404()?;
    if author.id != user.id() {
        state.store.unfollow(user.id(), author.id).await?;
    }
    Ok(found(profile_url(&author.username)))
}

pub fn router<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(index::<S>))
        .route("/group/:slug/", get(group_posts::<S>))
        .route("/profile/:username/", get(profile::<S>))
        .route(
            "/profile/:username/follow/",
            get(profile_follow::<S>).post(profile_follow::<S>),
        )
        .route(
            "/profile/:username/unfollow/",
            get(profile_unfollow::<S>).post(profile_unfollow::<S>),
        )
        .route("/posts/:post_id/", get(post_detail::<S>))
        .route(
            "/posts/:post_id/edit/",
            get(post_edit_form::<S>).post(post_edit::<S>),
        )
        .route("/posts/:post_id/comment/", post(add_comment::<S>))
        .route(
            "/create/",
            get(post_create_form::<S>).post(post_create::<S>),
        )
        .route("/follow/", get(follow_index::<S>))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    use super::super::testing::*;
    use super::super::MAX_UPLOAD_BYTES;
    use crate::forms::post::SMALL_GIF;
    use crate::services::{CommentService, FollowService, PostService};

    fn count_posts(body: &str) -> usize {
        body.matches("<article class=\"post\"").count()
    }

    #[tokio::test]
    async fn urls_for_guest() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        app.group("Test group", "testslug").await;
        let post = app.post(&author, None, "Test post").await;

        for uri in [
            "/".to_owned(),
            "/group/testslug/".to_owned(),
            "/profile/post_author/".to_owned(),
            format!("/posts/{}/", post.id),
        ] {
            assert_eq!(app.get(&uri, None).await.status(), StatusCode::OK, "{uri}");
        }

        let res = app.get("/create/", None).await;
        assert_eq!(location(&res), "/auth/login/?next=%2Fcreate%2F");

        let edit = format!("/posts/{}/edit/", post.id);
        let res = app.get(&edit, None).await;
        assert!(location(&res).starts_with("/auth/login/?next="));

        let res = app.get("/unexisting_page/", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_template(&body_text(res).await, "core/404.html");
    }

    #[tokio::test]
    async fn urls_for_authorized_non_author() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let stranger = app.user("HasNoName").await;
        let post = app.post(&author, None, "Test post").await;

        assert_eq!(
            app.get("/create/", Some(&stranger)).await.status(),
            StatusCode::OK
        );
        let res = app
            .get(&format!("/posts/{}/edit/", post.id), Some(&stranger))
            .await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));
    }

    #[tokio::test]
    async fn pages_use_correct_templates() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let group = app.group("Test group", "test-slug").await;
        let post = app.post(&author, Some(&group), "Test post").await;

        let pages = [
            ("/".to_owned(), "posts/index.html"),
            ("/group/test-slug/".to_owned(), "posts/group_list.html"),
            ("/profile/post_author/".to_owned(), "posts/profile.html"),
            (format!("/posts/{}/", post.id), "posts/post_detail.html"),
            (format!("/posts/{}/edit/", post.id), "posts/create_post.html"),
            ("/create/".to_owned(), "posts/create_post.html"),
            ("/follow/".to_owned(), "posts/follow.html"),
        ];
        for (uri, template) in pages {
            let res = app.get(&uri, Some(&author)).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri}");
            assert_template(&body_text(res).await, template);
        }
    }

    #[tokio::test]
    async fn unknown_rows_are_404() {
        let app = TestApp::new();
        for uri in [
            "/group/nope/",
            "/profile/nobody/",
            "/posts/999/",
            "/posts/abc/",
        ] {
            let res = app.get(uri, None).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn index_lists_newest_first_with_context() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let group = app.group("Test group", "test-slug").await;
        app.post(&author, Some(&group), "Older test post").await;
        app.post(&author, None, "Newer test post").await;

        let body = body_text(app.get("/", None).await).await;
        assert_eq!(count_posts(&body), 2);
        let newer = body.find("Newer test post").unwrap();
        let older = body.find("Older test post").unwrap();
        assert!(newer < older);
        assert!(body.contains("/profile/post_author/"));
        assert!(body.contains("/group/test-slug/"));
    }

    #[tokio::test]
    async fn group_page_only_has_group_posts() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let group = app.group("Test group", "test-slug").await;
        let other = app.group("Another group", "another-slug").await;
        app.post(&author, Some(&group), "Post in the group").await;
        app.post(&author, Some(&other), "Post elsewhere").await;

        let body = body_text(app.get("/group/test-slug/", None).await).await;
        assert!(body.contains("Test group"));
        assert!(body.contains("Post in the group"));
        assert!(!body.contains("Post elsewhere"));
        assert_eq!(count_posts(&body), 1);
    }

    #[tokio::test]
    async fn listings_paginate_by_ten() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let group = app.group("Test group", "test-slug").await;
        for i in 0..13 {
            app.post(&author, Some(&group), &format!("Test post {i}")).await;
        }

        for base in ["/", "/group/test-slug/", "/profile/post_author/"] {
            let first = body_text(app.get(base, None).await).await;
            assert_eq!(count_posts(&first), 10, "{base}");

            let second = body_text(app.get(&format!("{base}?page=2"), None).await).await;
            assert_eq!(count_posts(&second), 3, "{base}?page=2");
        }
    }

    #[tokio::test]
    async fn post_detail_shows_comments_and_count() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let post = app.post(&author, None, "Test post").await;
        app.post(&author, None, "Second post").await;
        app.store()
            .create_comment(&crate::models::comment::NewComment {
                post_id: post.id,
                author_id: author.id,
                text: "Test comment".into(),
            })
            .await
            .unwrap();

        let body = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
        assert!(body.contains("Test post"));
        assert!(body.contains("Test comment"));
        assert!(body.contains("<span class=\"post-number\">2</span>"));
        // guests get no comment form
        assert!(!body.contains("name=\"text\""));
    }

    #[tokio::test]
    async fn comments_need_login() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let reader = app.user("reader").await;
        let post = app.post(&author, None, "Test post").await;
        let uri = format!("/posts/{}/comment/", post.id);

        let res = app.post_form(&uri, None, "text=anonymous").await;
        assert!(location(&res).starts_with("/auth/login/"));
        assert!(app.store().comments_for_post(post.id).await.unwrap().is_empty());

        let res = app.post_form(&uri, Some(&reader), "text=Nice+post").await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));
        let comments = app.store().comments_for_post(post.id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "Nice post");
        assert_eq!(comments[0].author.username, "reader");

        let res = app.post_form(&uri, Some(&reader), "text=+++").await;
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(app.store().comments_for_post(post.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_post_with_image() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let group = app.group("Test group", "test-slug").await;
        let group_id = group.id.to_string();

        let res = app
            .post_multipart(
                "/create/",
                &author,
                &[("text", "Post with a picture"), ("group", &group_id)],
                Some(("small.gif", SMALL_GIF)),
            )
            .await;
        assert_eq!(location(&res), "/profile/post_author/");

        let posts = app
            .store()
            .list_posts(&crate::models::post::PostFilter::all(), 0, 10)
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.text, "Post with a picture");
        assert_eq!(post.group.as_ref().map(|g| g.id), Some(group.id));
        let image = post.image.clone().unwrap();
        assert!(app.media.path().join(&image).exists());

        let body = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
        assert!(body.contains(&format!("/media/{image}")));
    }

    #[tokio::test]
    async fn invalid_post_form_is_shown_again() {
        let app = TestApp::new();
        let author = app.user("post_author").await;

        let res = app
            .post_multipart("/create/", &author, &[("text", "  "), ("group", "42")], None)
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_text(res).await;
        assert_template(&body, "posts/create_post.html");
        assert!(body.contains("This field is required."));
        assert!(body.contains("Select a valid choice."));
        assert_eq!(
            app.store()
                .count_posts(&crate::models::post::PostFilter::all())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn author_edits_post() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let stranger = app.user("stranger").await;
        let post = app.post(&author, None, "Original text").await;
        let uri = format!("/posts/{}/edit/", post.id);

        let res = app
            .post_multipart(&uri, &stranger, &[("text", "Hijacked")], None)
            .await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));

        let res = app
            .post_multipart(&uri, &author, &[("text", "Edited text")], None)
            .await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));

        let stored = app.store().get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.text, "Edited text");
    }

    #[tokio::test]
    async fn edit_replaces_image() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        app.post_multipart("/create/", &author, &[("text", "Pictured")], Some(("old.gif", SMALL_GIF)))
            .await;
        let post = app
            .store()
            .list_posts(&crate::models::post::PostFilter::all(), 0, 10)
            .await
            .unwrap()
            .remove(0);
        let old_image = post.image.clone().unwrap();

        let res = app
            .post_multipart(
                &format!("/posts/{}/edit/", post.id),
                &author,
                &[("text", "Pictured again")],
                Some(("new.gif", SMALL_GIF)),
            )
            .await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));

        let stored = app.store().get_post(post.id).await.unwrap().unwrap();
        let new_image = stored.image.unwrap();
        assert_ne!(new_image, old_image);
        assert!(app.media.path().join(&new_image).exists());
        assert_eq!(stored.text, "Pictured again");
    }

    #[tokio::test]
    async fn edit_clears_image() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        app.post_multipart("/create/", &author, &[("text", "Pictured")], Some(("small.gif", SMALL_GIF)))
            .await;
        let post = app
            .store()
            .list_posts(&crate::models::post::PostFilter::all(), 0, 10)
            .await
            .unwrap()
            .remove(0);
        assert!(post.image.is_some());

        let res = app
            .post_multipart(
                &format!("/posts/{}/edit/", post.id),
                &author,
                &[("text", "No picture"), ("image-clear", "on")],
                None,
            )
            .await;
        assert_eq!(location(&res), format!("/posts/{}/", post.id));

        let stored = app.store().get_post(post.id).await.unwrap().unwrap();
        assert_eq!(stored.image, None);
        assert_eq!(stored.text, "No picture");
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let mut big = SMALL_GIF.to_vec();
        big.resize(MAX_UPLOAD_BYTES + 1024 * 1024, 0);

        let res = app
            .post_multipart("/create/", &author, &[("text", "Huge")], Some(("big.gif", big.as_slice())))
            .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            app.store()
                .count_posts(&crate::models::post::PostFilter::all())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn truncated_multipart_is_400() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let body = "--cut-short\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nNever fini";

        let req = Request::post("/create/")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=cut-short")
            .header(header::COOKIE, app.session(&author))
            .body(Body::from(body))
            .unwrap();
        let res = app.send(req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn follow_and_unfollow() {
        let app = TestApp::new();
        let user = app.user("post_author").await;
        let new_author = app.user("new_author").await;
        let second = app.user("second_author").await;

        app.get("/profile/new_author/follow/", Some(&user)).await;
        let counter = app.store().follow_stats(user.id).await.unwrap().following;

        let res = app.get("/profile/second_author/follow/", Some(&user)).await;
        assert_eq!(location(&res), "/profile/second_author/");
        assert_eq!(
            app.store().follow_stats(user.id).await.unwrap().following,
            counter + 1
        );

        // following twice changes nothing
        app.get("/profile/second_author/follow/", Some(&user)).await;
        assert_eq!(
            app.store().follow_stats(user.id).await.unwrap().following,
            counter + 1
        );

        app.get("/profile/second_author/unfollow/", Some(&user)).await;
        assert_eq!(
            app.store().follow_stats(user.id).await.unwrap().following,
            counter
        );
        assert!(app.store().is_following(user.id, new_author.id).await.unwrap());
        assert!(!app.store().is_following(user.id, second.id).await.unwrap());
    }

    #[tokio::test]
    async fn cannot_follow_yourself() {
        let app = TestApp::new();
        let user = app.user("narcissus").await;

        let res = app.get("/profile/narcissus/follow/", Some(&user)).await;
        assert_eq!(location(&res), "/profile/narcissus/");
        assert_eq!(app.store().follow_stats(user.id).await.unwrap().following, 0);
    }

    #[tokio::test]
    async fn unfollowing_yourself_only_redirects() {
        let app = TestApp::new();
        let user = app.user("narcissus").await;
        let other = app.user("echo").await;
        app.store().follow(user.id, other.id).await.unwrap();

        let res = app.get("/profile/narcissus/unfollow/", Some(&user)).await;
        assert_eq!(location(&res), "/profile/narcissus/");
        assert_eq!(app.store().follow_stats(user.id).await.unwrap().following, 1);
    }

    #[tokio::test]
    async fn profile_shows_following_state() {
        let app = TestApp::new();
        let reader = app.user("reader").await;
        let author = app.user("writer").await;
        app.store().follow(reader.id, author.id).await.unwrap();

        let body = body_text(app.get("/profile/writer/", Some(&reader)).await).await;
        assert!(body.contains("/profile/writer/unfollow/"));

        let body = body_text(app.get("/profile/writer/", None).await).await;
        assert!(!body.contains("/profile/writer/unfollow/"));
        assert!(!body.contains("/profile/writer/follow/"));
    }

    #[tokio::test]
    async fn follow_feed_shows_followed_authors_only() {
        let app = TestApp::new();
        let user = app.user("post_author").await;
        let new_author = app.user("new_author").await;
        let bystander = app.user("bystander").await;
        let group = app.group("Another group", "another-slug").await;

        app.get("/profile/new_author/follow/", Some(&user)).await;
        app.post(&new_author, Some(&group), "New follow test post").await;

        let body = body_text(app.get("/follow/", Some(&user)).await).await;
        assert_eq!(count_posts(&body), 1);
        assert!(body.contains("New follow test post"));
        assert!(body.contains("/profile/new_author/"));

        let body = body_text(app.get("/follow/", Some(&bystander)).await).await;
        assert_eq!(count_posts(&body), 0);
    }

    #[tokio::test]
    async fn index_is_cached() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let post = app.post(&author, None, "Cached test post").await;

        let before = body_text(app.get("/", None).await).await;
        assert!(before.contains("Cached test post"));

        assert!(app.store().delete_post(post.id).await.unwrap());
        let cached = body_text(app.get("/", None).await).await;
        assert_eq!(before, cached);

        app.state.index_cache.invalidate_all();
        let fresh = body_text(app.get("/", None).await).await;
        assert_ne!(fresh, cached);
        assert!(!fresh.contains("Cached test post"));
    }

    #[tokio::test]
    async fn index_cache_shares_entries_across_page_spellings() {
        let app = TestApp::new();
        let author = app.user("post_author").await;
        let post = app.post(&author, None, "Cached test post").await;

        let first = body_text(app.get("/", None).await).await;
        assert!(app.store().delete_post(post.id).await.unwrap());

        for uri in ["/?page=1", "/?page=abc", "/?page=", "/?page=%201"] {
            let body = body_text(app.get(uri, None).await).await;
            assert_eq!(body, first, "{uri}");
        }
    }
}
