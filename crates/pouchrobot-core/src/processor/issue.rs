// SPDX-License-Identifier: Apache-2.0

//! Issue triage: labels, length checks, translation and priority reminders.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use super::events::{IssuesEvent, WebhookIssue};
use super::{Processor, text_len};
use crate::github::comments::{ensure_comment, ensure_label, remove_comments_containing};
use crate::labels::{MORE_INFO_NEEDED_LABEL, PRIORITY_P1_LABEL, label_delta};
use crate::templates::{CommentKind, ENGLISH_REMINDER};

impl Processor {
    pub(super) async fn process_issue(&self, event: IssuesEvent) -> Result<()> {
        let issue = &event.issue;
        info!(number = issue.number, action = %event.action, "Processing issue event");

        match event.action.as_str() {
            "opened" => {
                self.triage_issue(issue, self.triage.issue_body_min_len_opened)
                    .await
            }
            "edited" => {
                self.triage_issue(issue, self.triage.issue_body_min_len_edited)
                    .await
            }
            "labeled" | "unlabeled" => self.sync_priority_reminder(issue).await,
            other => {
                debug!(action = other, "Ignoring issue action");
                Ok(())
            }
        }
    }

    /// Classifies, checks title and body length, then translates.
    ///
    /// A failed length check stops the pass; later checks wait until the
    /// author fixes the earlier one.
    #[instrument(skip(self, issue), fields(number = issue.number))]
    async fn triage_issue(&self, issue: &WebhookIssue, body_min_len: usize) -> Result<()> {
        let api = self.api.as_ref();
        let number = issue.number;

        let mut labels = api.get_issue(number).await?.labels;
        let candidates = self
            .rules
            .classify(issue.title.as_deref(), issue.body.as_deref());
        let delta = label_delta(&candidates, &labels);
        if !delta.is_empty() {
            api.add_labels(number, &delta).await?;
            info!(labels = ?delta, "Attached classified labels");
            labels.extend(delta);
        }

        let title_marker = self.templates.marker(CommentKind::IssueTitleTooShort);
        if text_len(issue.title.as_deref()) < self.triage.title_min_len {
            let body = self.templates.too_short(
                CommentKind::IssueTitleTooShort,
                issue.author(),
                self.triage.title_min_len,
            );
            ensure_comment(api, number, &title_marker, &body).await?;
            ensure_label(api, number, &labels, MORE_INFO_NEEDED_LABEL).await?;
            return Ok(());
        }
        remove_comments_containing(api, number, &title_marker).await?;

        let body_marker = self.templates.marker(CommentKind::IssueDescriptionTooShort);
        if text_len(issue.body.as_deref()) < body_min_len {
            let body = self.templates.too_short(
                CommentKind::IssueDescriptionTooShort,
                issue.author(),
                body_min_len,
            );
            ensure_comment(api, number, &body_marker, &body).await?;
            ensure_label(api, number, &labels, MORE_INFO_NEEDED_LABEL).await?;
            return Ok(());
        }
        remove_comments_containing(api, number, &body_marker).await?;

        self.translate_body(issue).await
    }

    async fn translate_body(&self, issue: &WebhookIssue) -> Result<()> {
        let (Some(translator), Some(body)) = (&self.translator, issue.body.as_deref()) else {
            return Ok(());
        };
        if body.contains(ENGLISH_REMINDER.trim()) {
            debug!(number = issue.number, "Issue body already translated");
            return Ok(());
        }

        match translator.translate(body).await {
            Ok(Some(translated)) => {
                self.api
                    .edit_issue_body(issue.number, &format!("{translated}{ENGLISH_REMINDER}"))
                    .await?;
                info!(number = issue.number, "Appended English translation");
            }
            Ok(None) => debug!(number = issue.number, "Issue body is English"),
            Err(e) => warn!(number = issue.number, error = %e, "Translation failed"),
        }
        Ok(())
    }

    /// Keeps `priority/P1 attached <=> reminder comment present`.
    #[instrument(skip(self, issue), fields(number = issue.number))]
    async fn sync_priority_reminder(&self, issue: &WebhookIssue) -> Result<()> {
        let api = self.api.as_ref();
        let current = api.get_issue(issue.number).await?;
        let marker = self.templates.marker(CommentKind::PriorityReminder);

        if current.has_label(PRIORITY_P1_LABEL) {
            let body = self
                .templates
                .render(CommentKind::PriorityReminder, issue.author());
            if ensure_comment(api, issue.number, &marker, &body).await? {
                info!("Posted priority reminder");
            }
        } else {
            let removed = remove_comments_containing(api, issue.number, &marker).await?;
            if removed > 0 {
                info!(removed, "Removed priority reminder");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::super::test_support::{processor, processor_with};
    use crate::config::TriageConfig;
    use crate::github::{GitHubApi, Issue};
    use crate::github::memory::MemoryGitHub;
    use crate::translator::Translator;

    const LONG_BODY: &str = "Running `pouch run -v /data busybox` exits immediately with an error \
                             about the volume driver not being found on the host machine.";

    fn issue_event(action: &str, title: &str, body: Option<&str>) -> Vec<u8> {
        serde_json::json!({
            "action": action,
            "issue": {
                "number": 1,
                "title": title,
                "body": body,
                "user": {"login": "alice"},
                "labels": []
            }
        })
        .to_string()
        .into_bytes()
    }

    fn seeded(title: &str, body: Option<&str>) -> Arc<MemoryGitHub> {
        let gh = Arc::new(MemoryGitHub::new("pouchcontainer", "pouch"));
        gh.insert_issue(
            Issue::builder()
                .number(1)
                .title(title)
                .maybe_body(body.map(str::to_string))
                .user("alice")
                .build(),
        );
        gh
    }

    #[tokio::test]
    async fn test_short_title_labels_and_comments_once() {
        let gh = seeded("volume bug", Some(LONG_BODY));
        let p = processor(&gh);

        for action in ["opened", "edited", "edited"] {
            p.dispatch("issues", &issue_event(action, "volume bug", Some(LONG_BODY)))
                .await
                .unwrap();
        }

        let labels = gh.labels(1);
        assert_eq!(
            labels
                .iter()
                .filter(|l| *l == "status/more-info-needed")
                .count(),
            1
        );
        let comments = gh.comments(1);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("**ISSUE TITLE**"));
        assert!(labels.contains(&"areas/storage".to_string()));
        assert!(labels.contains(&"kind/bug".to_string()));
    }

    #[tokio::test]
    async fn test_short_body_uses_action_threshold() {
        let title = "pouch run fails when mounting a volume";
        let body = "x".repeat(70);
        let gh = seeded(title, Some(&body));
        let p = processor(&gh);

        p.dispatch("issues", &issue_event("edited", title, Some(&body)))
            .await
            .unwrap();
        assert!(gh.comments(1).is_empty());

        p.dispatch("issues", &issue_event("opened", title, Some(&body)))
            .await
            .unwrap();
        let comments = gh.comments(1);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("longer than 100 chars"));
    }

    #[tokio::test]
    async fn test_fixed_title_removes_stale_comment() {
        let gh = seeded("short", Some(LONG_BODY));
        let p = processor(&gh);
        p.dispatch("issues", &issue_event("opened", "short", Some(LONG_BODY)))
            .await
            .unwrap();
        assert_eq!(gh.comments(1).len(), 1);

        let title = "pouch run fails when mounting a volume";
        p.dispatch("issues", &issue_event("edited", title, Some(LONG_BODY)))
            .await
            .unwrap();
        assert!(gh.comments(1).is_empty());
    }

    struct FakeTranslator;

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(&self, text: &str) -> anyhow::Result<Option<String>> {
            Ok(text
                .contains("失败")
                .then(|| format!("{text}\r\n// failed")))
        }
    }

    #[tokio::test]
    async fn test_translation_appends_reminder_once() {
        let title = "pouch run fails when mounting a volume";
        let body = format!("{LONG_BODY} 运行失败");
        let gh = seeded(title, Some(&body));
        let p = processor_with(&gh, TriageConfig::default(), Some(Arc::new(FakeTranslator)));

        p.dispatch("issues", &issue_event("opened", title, Some(&body)))
            .await
            .unwrap();
        let edited = gh.body(1).unwrap();
        assert!(edited.contains("// failed"));
        assert!(edited.ends_with("IN ENGLISH!!!!***"));

        p.dispatch("issues", &issue_event("edited", title, Some(&edited)))
            .await
            .unwrap();
        assert_eq!(gh.body(1).unwrap(), edited);
    }

    #[tokio::test]
    async fn test_english_body_is_not_edited() {
        let title = "pouch run fails when mounting a volume";
        let gh = seeded(title, Some(LONG_BODY));
        let p = processor_with(&gh, TriageConfig::default(), Some(Arc::new(FakeTranslator)));

        p.dispatch("issues", &issue_event("opened", title, Some(LONG_BODY)))
            .await
            .unwrap();
        assert_eq!(gh.body(1).as_deref(), Some(LONG_BODY));
    }

    #[tokio::test]
    async fn test_priority_reminder_follows_label() {
        let gh = seeded("panic on start", Some(LONG_BODY));
        let p = processor(&gh);

        gh.add_labels(1, &["priority/P1".to_string()]).await.unwrap();
        for _ in 0..2 {
            p.dispatch("issues", &issue_event("labeled", "panic on start", None))
                .await
                .unwrap();
        }
        let comments = gh.comments(1);
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("**priority/P1**"));

        gh.remove_label(1, "priority/P1").await.unwrap();
        p.dispatch("issues", &issue_event("unlabeled", "panic on start", None))
            .await
            .unwrap();
        assert!(gh.comments(1).is_empty());
    }

    #[tokio::test]
    async fn test_other_actions_are_ignored() {
        let gh = seeded("x", None);
        let p = processor(&gh);
        p.dispatch("issues", &issue_event("closed", "x", None))
            .await
            .unwrap();
        assert!(gh.comments(1).is_empty());
        assert!(gh.labels(1).is_empty());
    }
}
