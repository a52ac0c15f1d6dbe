use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub project_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: String,
    pub content: String,
    pub parent_id: Option<Uuid>,
}

/// A root comment with every descendant flattened beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentThread {
    pub root: Comment,
    pub replies: Vec<Comment>,
}

/// Groups comments into one-level threads.
///
/// Relative order of the input is preserved for roots and for the replies of
/// each root. Replies to replies are attached to their root ancestor. A
/// comment whose parent is not in the set (or whose parent chain loops) is
/// treated as a root.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let parents: HashMap<Uuid, Option<Uuid>> =
        comments.iter().map(|c| (c.id, c.parent_id)).collect();

    let root_of = |id: Uuid| -> Uuid {
        let mut current = id;
        // at most one step per comment; anything longer is a cycle
        for _ in 0..parents.len() {
            match parents.get(&current).copied().flatten() {
                Some(parent) if parents.contains_key(&parent) => current = parent,
                _ => return current,
            }
        }
        id
    };

    let mut slot: HashMap<Uuid, usize> = HashMap::new();
    let mut threads: Vec<CommentThread> = Vec::new();
    let mut pending: Vec<(Uuid, Comment)> = Vec::new();

    for c in comments {
        let root = root_of(c.id);
        if root == c.id {
            slot.insert(c.id, threads.len());
            threads.push(CommentThread {
                root: c,
                replies: Vec::new(),
            });
        } else {
            pending.push((root, c));
        }
    }

    for (root, reply) in pending {
        if let Some(&idx) = slot.get(&root) {
            threads[idx].replies.push(reply);
        }
    }

    threads
}
