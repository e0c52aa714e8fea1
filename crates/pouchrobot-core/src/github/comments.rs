// SPDX-License-Identifier: Apache-2.0

//! Idempotent comment and label operations built on [`GitHubApi`].
//!
//! The bot recognises its own comments by marker substring, so each helper
//! first reads the current remote state and then mutates only what differs.

use anyhow::Result;
use tracing::{debug, warn};

use super::{Comment, GitHubApi};

/// Returns the first comment containing `marker`.
pub async fn find_comment(
    api: &dyn GitHubApi,
    number: u64,
    marker: &str,
) -> Result<Option<Comment>> {
    let comments = api.list_comments(number).await?;
    Ok(comments.into_iter().find(|c| c.body.contains(marker)))
}

/// Deletes every comment containing `marker` and returns how many went away.
///
/// A failed deletion is logged and skipped so one stale comment does not
/// block the rest.
pub async fn remove_comments_containing(
    api: &dyn GitHubApi,
    number: u64,
    marker: &str,
) -> Result<usize> {
    let comments = api.list_comments(number).await?;
    Ok(delete_matching(api, number, &comments, marker).await)
}

async fn delete_matching(
    api: &dyn GitHubApi,
    number: u64,
    comments: &[Comment],
    marker: &str,
) -> usize {
    let mut removed = 0;
    for comment in comments.iter().filter(|c| c.body.contains(marker)) {
        match api.delete_comment(comment.id).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(number, comment_id = comment.id, error = %e, "Failed to delete comment"),
        }
    }
    removed
}

/// Posts `body` unless a comment containing `marker` already exists.
///
/// Returns true if a comment was posted.
pub async fn ensure_comment(
    api: &dyn GitHubApi,
    number: u64,
    marker: &str,
    body: &str,
) -> Result<bool> {
    if find_comment(api, number, marker).await?.is_some() {
        debug!(number, "Comment already present");
        return Ok(false);
    }
    api.create_comment(number, body).await?;
    Ok(true)
}

/// Deletes every comment containing `marker`, then posts `body`.
pub async fn replace_comment(
    api: &dyn GitHubApi,
    number: u64,
    marker: &str,
    body: &str,
) -> Result<()> {
    remove_comments_containing(api, number, marker).await?;
    api.create_comment(number, body).await
}

/// Keeps exactly one up-to-date comment containing `marker` at the bottom.
///
/// If the newest comment already carries the marker, only older copies are
/// deleted. Otherwise every copy is deleted and `body` is posted fresh.
pub async fn refresh_comment(
    api: &dyn GitHubApi,
    number: u64,
    marker: &str,
    body: &str,
) -> Result<()> {
    let comments = api.list_comments(number).await?;

    if let Some((latest, older)) = comments.split_last()
        && latest.body.contains(marker)
    {
        delete_matching(api, number, older, marker).await;
        return Ok(());
    }

    delete_matching(api, number, &comments, marker).await;
    api.create_comment(number, body).await
}

/// Adds `label` if `current` does not contain it. Returns true if added.
pub async fn ensure_label(
    api: &dyn GitHubApi,
    number: u64,
    current: &[String],
    label: &str,
) -> Result<bool> {
    if current.iter().any(|l| l == label) {
        return Ok(false);
    }
    api.add_labels(number, &[label.to_string()]).await?;
    Ok(true)
}

/// Removes `label` if `current` contains it. Returns true if removed.
pub async fn drop_label(
    api: &dyn GitHubApi,
    number: u64,
    current: &[String],
    label: &str,
) -> Result<bool> {
    if !current.iter().any(|l| l == label) {
        return Ok(false);
    }
    api.remove_label(number, label).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::Issue;
    use crate::github::memory::MemoryGitHub;

    fn github_with_issue() -> MemoryGitHub {
        let gh = MemoryGitHub::new("o", "r");
        gh.insert_issue(Issue::builder().number(1).title("t").user("u").build());
        gh
    }

    #[tokio::test]
    async fn test_ensure_comment_is_idempotent() {
        let gh = github_with_issue();
        assert!(ensure_comment(&gh, 1, "MARK", "hello MARK").await.unwrap());
        assert!(!ensure_comment(&gh, 1, "MARK", "hello MARK").await.unwrap());
        assert_eq!(gh.comments(1).len(), 1);
    }

    #[tokio::test]
    async fn test_remove_comments_containing_removes_all() {
        let gh = github_with_issue();
        gh.create_comment(1, "a MARK").await.unwrap();
        gh.create_comment(1, "unrelated").await.unwrap();
        gh.create_comment(1, "b MARK").await.unwrap();

        let removed = remove_comments_containing(&gh, 1, "MARK").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(gh.comments(1), vec!["unrelated".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_comment_keeps_latest() {
        let gh = github_with_issue();
        gh.create_comment(1, "old MARK").await.unwrap();
        gh.create_comment(1, "new MARK").await.unwrap();

        refresh_comment(&gh, 1, "MARK", "fresh MARK").await.unwrap();
        assert_eq!(gh.comments(1), vec!["new MARK".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_comment_reposts_when_buried() {
        let gh = github_with_issue();
        gh.create_comment(1, "old MARK").await.unwrap();
        gh.create_comment(1, "someone replied").await.unwrap();

        refresh_comment(&gh, 1, "MARK", "fresh MARK").await.unwrap();
        assert_eq!(
            gh.comments(1),
            vec!["someone replied".to_string(), "fresh MARK".to_string()]
        );
    }

    #[tokio::test]
    async fn test_replace_comment() {
        let gh = github_with_issue();
        gh.create_comment(1, "first MARK").await.unwrap();
        replace_comment(&gh, 1, "MARK", "second MARK").await.unwrap();
        assert_eq!(gh.comments(1), vec!["second MARK".to_string()]);
    }

    #[tokio::test]
    async fn test_label_helpers() {
        let gh = github_with_issue();
        assert!(ensure_label(&gh, 1, &[], "LGTM").await.unwrap());
        let current = gh.labels(1);
        assert!(!ensure_label(&gh, 1, &current, "LGTM").await.unwrap());
        assert!(drop_label(&gh, 1, &current, "LGTM").await.unwrap());
        assert!(gh.labels(1).is_empty());
        assert!(!drop_label(&gh, 1, &[], "LGTM").await.unwrap());
    }
}
