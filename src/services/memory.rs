use std::sync::Arc;

use axum::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::comment::*;
use crate::models::follow::*;
use crate::models::group::*;
use crate::models::post::*;
use crate::models::user::*;
use crate::models::ModelError;

use super::{CommentService, FollowService, GroupService, PostService, Svc, UserService};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    last_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, id: i32) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn group(&self, id: i32) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    fn is_following(&self, user_id: i32, author_id: i32) -> bool {
        self.follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
    }

    fn matches(&self, post: &Post, filter: &PostFilter) -> bool {
        filter.group_id.map_or(true, |g| post.group_id == Some(g))
            && filter.author_id.map_or(true, |a| post.author_id == a)
            && filter
                .followed_by
                .map_or(true, |u| self.is_following(u, post.author_id))
            && filter.text_contains.as_ref().map_or(true, |needle| {
                post.text.to_lowercase().contains(&needle.to_lowercase())
            })
            && filter.created_since.map_or(true, |since| post.created >= since)
    }

    fn view(&self, post: &Post) -> Option<PostView> {
        let author = self.user(post.author_id)?.clone();
        let group = post.group_id.and_then(|g| self.group(g)).cloned();
        Some(PostView::from((post.clone(), author, group)))
    }

    fn comment_view(&self, comment: &Comment) -> Option<CommentView> {
        let author = self.user(comment.author_id)?.clone();
        Some(CommentView::from((comment.clone(), author)))
    }
}

/// Keeps every table in process memory. Used when no database is configured
/// and by the HTTP tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl Svc for MemoryStore {}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i32)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

fn window<T>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl UserService<anyhow::Error> for MemoryStore {
    async fn get_user(&self, id: i32) -> anyhow::Result<Option<User>> {
        Ok(self.tables.read().await.user(id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, u: &NewUser) -> anyhow::Result<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|existing| existing.username == u.username) {
            return Err(ModelError::UsernameTaken.into());
        }
        let user = User {
            id: t.next_id(),
            username: u.username.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            password_hash: u.password_hash.clone(),
            created: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn set_password_hash(&self, id: i32, hash: &str) -> anyhow::Result<()> {
        let mut t = self.tables.write().await;
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(ModelError::NotFound("user"))?;
        user.password_hash = hash.to_owned();
        Ok(())
    }
}

#[async_trait]
impl GroupService<anyhow::Error> for MemoryStore {
    async fn get_group(&self, id: i32) -> anyhow::Result<Option<Group>> {
        Ok(self.tables.read().await.group(id).cloned())
    }

    async fn get_group_by_slug(&self, slug: &str) -> anyhow::Result<Option<Group>> {
        let t = self.tables.read().await;
        Ok(t.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn list_groups(&self) -> anyhow::Result<Vec<Group>> {
        let mut groups = self.tables.read().await.groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(groups)
    }

    async fn create_group(&self, g: &NewGroup) -> anyhow::Result<Group> {
        let mut t = self.tables.write().await;
        if t.groups.iter().any(|existing| existing.slug == g.slug) {
            return Err(ModelError::SlugTaken.into());
        }
        let group = Group {
            id: t.next_id(),
            title: g.title.clone(),
            slug: g.slug.clone(),
            description: g.description.clone(),
        };
        t.groups.push(group.clone());
        Ok(group)
    }
}

#[async_trait]
impl PostService<anyhow::Error> for MemoryStore {
    async fn count_posts(&self, filter: &PostFilter) -> anyhow::Result<i64> {
        let t = self.tables.read().await;
        Ok(t.posts.iter().filter(|p| t.matches(p, filter)).count() as i64)
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<PostView>> {
        let t = self.tables.read().await;
        let mut views: Vec<PostView> = t
            .posts
            .iter()
            .filter(|p| t.matches(p, filter))
            .filter_map(|p| t.view(p))
            .collect();
        newest_first(&mut views, |v| (v.created, v.id));
        Ok(window(views, offset, limit))
    }

    async fn get_post(&self, id: i32) -> anyhow::Result<Option<PostView>> {
        let t = self.tables.read().await;
        Ok(t.posts.iter().find(|p| p.id == id).and_then(|p| t.view(p)))
    }

    async fn create_post(&self, p: &NewPost) -> anyhow::Result<Post> {
        let mut t = self.tables.write().await;
        if t.user(p.author_id).is_none() {
            return Err(ModelError::NotFound("user").into());
        }
        let post = Post {
            id: t.next_id(),
            text: p.text.clone(),
            author_id: p.author_id,
            group_id: p.group_id,
            image: p.image.clone(),
            created: Utc::now(),
        };
        t.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i32, changes: &PostChanges) -> anyhow::Result<Post> {
        let mut t = self.tables.write().await;
        let post = t
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ModelError::NotFound("post"))?;
        post.text = changes.text.clone();
        post.group_id = changes.group_id;
        match &changes.image {
            ImageChange::Keep => {}
            ImageChange::Clear => post.image = None,
            ImageChange::Replace(path) => post.image = Some(path.clone()),
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i32) -> anyhow::Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.posts.len();
        t.posts.retain(|p| p.id != id);
        t.comments.retain(|c| c.post_id != id);
        Ok(t.posts.len() != before)
    }

    async fn set_post_group(&self, id: i32, group_id: Option<i32>) -> anyhow::Result<()> {
        let mut t = self.tables.write().await;
        let post = t
            .posts
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ModelError::NotFound("post"))?;
        post.group_id = group_id;
        Ok(())
    }
}

#[async_trait]
impl CommentService<anyhow::Error> for MemoryStore {
    async fn comments_for_post(&self, post_id: i32) -> anyhow::Result<Vec<CommentView>> {
        let t = self.tables.read().await;
        let mut views: Vec<CommentView> = t
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| t.comment_view(c))
            .collect();
        newest_first(&mut views, |v| (v.created, v.id));
        Ok(views)
    }

    async fn create_comment(&self, c: &NewComment) -> anyhow::Result<Comment> {
        let mut t = self.tables.write().await;
        if !t.posts.iter().any(|p| p.id == c.post_id) {
            return Err(ModelError::NotFound("post").into());
        }
        let comment = Comment {
            id: t.next_id(),
            post_id: c.post_id,
            author_id: c.author_id,
            text: c.text.clone(),
            created: Utc::now(),
        };
        t.comments.push(comment.clone());
        Ok(comment)
    }

    async fn count_comments(&self) -> anyhow::Result<i64> {
        Ok(self.tables.read().await.comments.len() as i64)
    }

    async fn list_comments(&self, offset: i64, limit: i64) -> anyhow::Result<Vec<CommentView>> {
        let t = self.tables.read().await;
        let mut views: Vec<CommentView> =
            t.comments.iter().filter_map(|c| t.comment_view(c)).collect();
        newest_first(&mut views, |v| (v.created, v.id));
        Ok(window(views, offset, limit))
    }
}

#[async_trait]
impl FollowService<anyhow::Error> for MemoryStore {
    async fn is_following(&self, user_id: i32, author_id: i32) -> anyhow::Result<bool> {
        Ok(self.tables.read().await.is_following(user_id, author_id))
    }

    async fn follow(&self, user_id: i32, author_id: i32) -> anyhow::Result<bool> {
        if user_id == author_id {
            return Err(ModelError::SelfFollow.into());
        }
        let mut t = self.tables.write().await;
        if t.is_following(user_id, author_id) {
            return Ok(false);
        }
        let id = t.next_id();
        t.follows.push(Follow {
            id,
            user_id,
            author_id,
        });
        Ok(true)
    }

    async fn unfollow(&self, user_id: i32, author_id: i32) -> anyhow::Result<bool> {
        let mut t = self.tables.write().await;
        let before = t.follows.len();
        t.follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(t.follows.len() != before)
    }

    async fn follow_stats(&self, user_id: i32) -> anyhow::Result<FollowStats> {
        let t = self.tables.read().await;
        Ok(FollowStats {
            followers: t.follows.iter().filter(|f| f.author_id == user_id).count() as i64,
            following: t.follows.iter().filter(|f| f.user_id == user_id).count() as i64,
        })
    }

    async fn count_follows(&self) -> anyhow::Result<i64> {
        Ok(self.tables.read().await.follows.len() as i64)
    }

    async fn list_follows(&self, offset: i64, limit: i64) -> anyhow::Result<Vec<FollowView>> {
        let t = self.tables.read().await;
        let views = t
            .follows
            .iter()
            .rev()
            .filter_map(|f| {
                Some(FollowView {
                    id: f.id,
                    user: t.user(f.user_id)?.clone(),
                    author: t.user(f.author_id)?.clone(),
                })
            })
            .collect();
        Ok(window(views, offset, limit))
    }
}
