use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdash_client::ApiClient;
use qdash_core::{Authorizer, OwnerOrAdmin, ServiceError, new_id, now_rfc3339};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::model::{Comment, ParentKind, ParentRef};

// ---------------------------------------------------------------------------
// CommentRepository
// ---------------------------------------------------------------------------

/// Storage for comment threads.
#[async_trait]
pub trait CommentRepository: Send + Sync + 'static {
    /// One thread, in creation order.
    async fn list(&self, parent: &ParentRef) -> Result<Vec<Comment>, ServiceError>;

    /// Store a new comment and return it as stored (with its id).
    async fn create(&self, comment: Comment) -> Result<Comment, ServiceError>;

    /// Replace the text of a stored comment.
    async fn update(&self, comment: Comment) -> Result<Comment, ServiceError>;

    async fn delete(&self, id: &str) -> Result<(), ServiceError>;

    /// Drop the thread of a deleted parent. Returns how many comments went.
    async fn delete_thread(&self, parent: &ParentRef) -> Result<usize, ServiceError>;
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::NotFound(format!("comment {id}"))
}

/// In-process comment storage.
#[derive(Default)]
pub struct MemoryCommentRepository {
    comments: RwLock<Vec<Comment>>,
}

impl MemoryCommentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentRepository for MemoryCommentRepository {
    async fn list(&self, parent: &ParentRef) -> Result<Vec<Comment>, ServiceError> {
        Ok(self
            .comments
            .read()
            .await
            .iter()
            .filter(|c| &c.parent == parent)
            .cloned()
            .collect())
    }

    async fn create(&self, mut comment: Comment) -> Result<Comment, ServiceError> {
        if comment.id.is_empty() {
            comment.id = new_id();
        }
        self.comments.write().await.push(comment.clone());
        Ok(comment)
    }

    async fn update(&self, comment: Comment) -> Result<Comment, ServiceError> {
        let mut comments = self.comments.write().await;
        let slot = comments
            .iter_mut()
            .find(|c| c.id == comment.id)
            .ok_or_else(|| not_found(&comment.id))?;
        *slot = comment.clone();
        Ok(comment)
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let mut comments = self.comments.write().await;
        let before = comments.len();
        comments.retain(|c| c.id != id);
        if comments.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn delete_thread(&self, parent: &ParentRef) -> Result<usize, ServiceError> {
        let mut comments = self.comments.write().await;
        let before = comments.len();
        comments.retain(|c| &c.parent != parent);
        Ok(before - comments.len())
    }
}

/// Comment endpoints of the REST backend:
/// `GET /api/comments/{type}/{id}`, `POST /api/comments`,
/// `PUT|DELETE /api/comments/{id}`.
pub struct RestCommentRepository {
    client: ApiClient,
}

/// `POST /api/comments` body.
#[derive(Serialize)]
struct NewComment<'a> {
    content: &'a str,
    parent_id: &'a str,
    parent_type: ParentKind,
}

/// `PUT /api/comments/{id}` body.
#[derive(Serialize)]
struct EditComment<'a> {
    content: &'a str,
}

/// Write responses carry the comment bare, wrapped, or not at all.
#[derive(Deserialize)]
#[serde(untagged)]
enum CommentBody {
    Wrapped { comment: Comment },
    Bare(Comment),
}

fn echoed(body: Value) -> Option<Comment> {
    match serde_json::from_value(body).ok()? {
        CommentBody::Wrapped { comment } | CommentBody::Bare(comment) => Some(comment),
    }
}

impl RestCommentRepository {
    pub const PATH: &'static str = "/api/comments";

    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn thread_path(parent: &ParentRef) -> String {
        format!("{}/{}/{}", Self::PATH, parent.kind, parent.id)
    }

    fn item_path(id: &str) -> String {
        format!("{}/{id}", Self::PATH)
    }
}

#[async_trait]
impl CommentRepository for RestCommentRepository {
    async fn list(&self, parent: &ParentRef) -> Result<Vec<Comment>, ServiceError> {
        let thread: Vec<Comment> = self.client.get_json(&Self::thread_path(parent)).await?;
        debug!(parent = %parent, count = thread.len(), "fetched comments");
        Ok(thread)
    }

    async fn create(&self, comment: Comment) -> Result<Comment, ServiceError> {
        let body = NewComment {
            content: &comment.text,
            parent_id: &comment.parent.id,
            parent_type: comment.parent.kind,
        };
        let reply: Value = self.client.post_json(Self::PATH, &body).await?;
        if let Some(stored) = echoed(reply) {
            return Ok(stored);
        }
        let thread = self.list(&comment.parent).await?;
        match thread
            .into_iter()
            .rev()
            .find(|c| c.author == comment.author && c.text == comment.text)
        {
            Some(stored) => Ok(stored),
            None => {
                warn!(parent = %comment.parent, "created comment not found in thread");
                Ok(comment)
            }
        }
    }

    async fn update(&self, comment: Comment) -> Result<Comment, ServiceError> {
        let body = EditComment {
            content: &comment.text,
        };
        let reply: Value = self.client.put_json(&Self::item_path(&comment.id), &body).await?;
        Ok(echoed(reply).unwrap_or(comment))
    }

    async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.client.delete(&Self::item_path(id)).await?;
        Ok(())
    }

    async fn delete_thread(&self, parent: &ParentRef) -> Result<usize, ServiceError> {
        // The backend drops a record's comments together with the record.
        debug!(parent = %parent, "thread removal left to the backend");
        Ok(0)
    }
}

// ---------------------------------------------------------------------------
// CommentStore
// ---------------------------------------------------------------------------

/// Comment threads keyed by parent record. Comments are edited and deleted
/// by their author only.
///
/// Edit and delete check authorship against the comments this store has
/// listed or added, so a thread is listed before its comments are changed.
pub struct CommentStore {
    repo: Arc<dyn CommentRepository>,
    authorizer: Arc<dyn Authorizer>,
    seen: RwLock<HashMap<String, Comment>>,
}

impl Default for CommentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentStore {
    /// A store over in-process threads.
    pub fn new() -> Self {
        Self::with_repository(Arc::new(MemoryCommentRepository::new()))
    }

    pub fn with_repository(repo: Arc<dyn CommentRepository>) -> Self {
        Self {
            repo,
            authorizer: Arc::new(OwnerOrAdmin::owner_only()),
            seen: RwLock::new(HashMap::new()),
        }
    }

    fn checked_text(text: &str) -> Result<String, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::Validation("comment text is empty".into()));
        }
        Ok(text.to_string())
    }

    async fn remember(&self, comment: &Comment) {
        self.seen
            .write()
            .await
            .insert(comment.id.clone(), comment.clone());
    }

    async fn authored(&self, id: &str, actor: &str) -> Result<Comment, ServiceError> {
        let comment = self
            .seen
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))?;
        self.authorizer
            .check(actor, &comment.author, &format!("comment {id}"))?;
        Ok(comment)
    }

    /// The thread for `parent`, in creation order.
    pub async fn list(&self, parent: &ParentRef) -> Result<Vec<Comment>, ServiceError> {
        let thread = self.repo.list(parent).await?;
        let mut seen = self.seen.write().await;
        seen.retain(|_, c| &c.parent != parent);
        seen.extend(thread.iter().map(|c| (c.id.clone(), c.clone())));
        Ok(thread)
    }

    pub async fn add(
        &self,
        parent: ParentRef,
        author: &str,
        text: &str,
    ) -> Result<Comment, ServiceError> {
        let text = Self::checked_text(text)?;
        let now = now_rfc3339();
        let draft = Comment {
            id: String::new(),
            parent,
            author: author.to_string(),
            text,
            created_at: now.clone(),
            updated_at: now,
        };
        let comment = self.repo.create(draft).await?;
        self.remember(&comment).await;
        info!(comment = %comment.id, parent = %comment.parent, author, "comment added");
        Ok(comment)
    }

    pub async fn edit(&self, id: &str, actor: &str, text: &str) -> Result<Comment, ServiceError> {
        let text = Self::checked_text(text)?;
        let mut comment = self.authored(id, actor).await?;
        comment.text = text;
        comment.updated_at = now_rfc3339();
        let stored = self.repo.update(comment).await?;
        self.remember(&stored).await;
        info!(comment = %id, actor, "comment edited");
        Ok(stored)
    }

    pub async fn delete(&self, id: &str, actor: &str) -> Result<(), ServiceError> {
        self.authored(id, actor).await?;
        self.repo.delete(id).await?;
        self.seen.write().await.remove(id);
        info!(comment = %id, actor, "comment deleted");
        Ok(())
    }

    /// Drop the whole thread of a deleted parent. Returns how many comments
    /// went with it.
    pub async fn remove_parent(&self, parent: &ParentRef) -> Result<usize, ServiceError> {
        let dropped = self.repo.delete_thread(parent).await?;
        self.seen.write().await.retain(|_, c| &c.parent != parent);
        Ok(dropped)
    }
}
