// SPDX-License-Identifier: Apache-2.0

//! Comment templates posted by the bot.
//!
//! Every comment embeds a marker that is stable for a given repository and
//! comment kind. The bot finds its own earlier comments by searching for that
//! marker, which keeps add/remove operations idempotent. Markers never contain
//! counts or thresholds, so a changed limit still finds older comments.

/// Suffix appended to an issue body after a translation was inserted.
pub const ENGLISH_REMINDER: &str =
    "\r\n\r\n***!!!!WE STRONGLY ENCOURAGE YOU TO DESCRIBE YOUR ISSUE IN ENGLISH!!!!***";

/// The kinds of comment the bot manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// Issue title below the minimum length.
    IssueTitleTooShort,
    /// Issue body below the minimum length.
    IssueDescriptionTooShort,
    /// Pull request title below the minimum length.
    PrTitleTooShort,
    /// Pull request body below the minimum length.
    PrDescriptionTooShort,
    /// A commit lacks a `Signed-off-by` trailer.
    NeedsSignOff,
    /// Issue carries the highest priority label.
    PriorityReminder,
    /// Author contributes for the first time.
    FirstContribution,
    /// Pull request is not mergeable.
    Conflict,
    /// Pull request is too many commits behind master.
    Gap,
    /// CI reported a failed build.
    CiFailure,
}

impl CommentKind {
    fn is_length_check(self) -> bool {
        matches!(
            self,
            CommentKind::IssueTitleTooShort
                | CommentKind::IssueDescriptionTooShort
                | CommentKind::PrTitleTooShort
                | CommentKind::PrDescriptionTooShort
        )
    }
}

/// Renders comments for one repository.
#[derive(Debug, Clone)]
pub struct Templates {
    owner: String,
    repo: String,
}

impl Templates {
    /// Creates templates for `owner/repo`.
    #[must_use]
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    fn contributing_url(&self) -> String {
        format!(
            "https://github.com/{}/{}/blob/master/CONTRIBUTING.md",
            self.owner, self.repo
        )
    }

    /// Stable substring identifying comments of `kind`.
    #[must_use]
    pub fn marker(&self, kind: CommentKind) -> String {
        match kind {
            CommentKind::IssueTitleTooShort => {
                "While we thought **ISSUE TITLE** could be more specific".to_string()
            }
            CommentKind::IssueDescriptionTooShort => {
                "While we thought **ISSUE DESCRIPTION** could be more specific".to_string()
            }
            CommentKind::PrTitleTooShort => {
                "While we thought **PR TITLE** could be more specific".to_string()
            }
            CommentKind::PrDescriptionTooShort => {
                "While we thought **PR Description** could be more specific".to_string()
            }
            CommentKind::NeedsSignOff => {
                " Thanks for your contribution. 🍻\nPlease sign off in each of your commits."
                    .to_string()
            }
            CommentKind::PriorityReminder => format!(
                "😱 This is a **priority/P1** issue which is highest.\n\
                 Seems to be severe enough.\n\
                 ping @{}/{} , PTAL.\n",
                self.owner, self.repo
            ),
            CommentKind::FirstContribution => format!(
                "👏  We really appreciate it.\n\
                 Just remind that you have read the contribution guide: {}\n\
                 If you didn't, you should do that first. If done, welcome again and please enjoy hacking! 🍻\n",
                self.contributing_url()
            ),
            CommentKind::Conflict => "Conflict happens after merging a previous commit.\n\
                 Please rebase the branch against master and push it back again. Thanks a lot.\n"
                .to_string(),
            CommentKind::Gap => "commits behind master.\n\
                 Please rebase the branch against master and push it back again. Thanks a lot.\n"
                .to_string(),
            CommentKind::CiFailure => format!(
                "\nCI fails according integration system.\n\
                 Please refer to the CI failure Details button to corresponding test, and update your PR to pass CI.\n\
                 \n\
                 If this is flaky test, welcome to track this with [profiling an issue](https://github.com/{}/{}/issues/new).\n",
                self.owner, self.repo
            ),
        }
    }

    /// Renders a length-check comment quoting `min_len`.
    ///
    /// Kinds other than the four length checks fall back to [`Templates::render`].
    #[must_use]
    pub fn too_short(&self, kind: CommentKind, user: &str, min_len: usize) -> String {
        if !kind.is_length_check() {
            return self.render(kind, user);
        }

        let marker = self.marker(kind);
        let contributing = self.contributing_url();
        let (greeting, what) = match kind {
            CommentKind::IssueTitleTooShort | CommentKind::IssueDescriptionTooShort => {
                (format!("Thanks for your contribution. 🍻 @{user} "), "issue")
            }
            _ => (format!("Thanks for your contribution. 🍻  @{user} "), "PR"),
        };
        let field = match kind {
            CommentKind::IssueTitleTooShort | CommentKind::PrTitleTooShort => "title",
            _ => "description",
        };
        let template = if kind == CommentKind::IssueDescriptionTooShort {
            format!(
                "Here is a template at https://github.com/{}/{}/blob/master/.github/ISSUE_TEMPLATE.md\n",
                self.owner, self.repo
            )
        } else {
            String::new()
        };

        format!(
            "{greeting}\n{marker}, longer than {min_len} chars.\n\
             {template}\
             Please edit this {what} {field} instead of opening a new one.\n\
             More details, please refer to {contributing}"
        )
    }

    /// Renders a comment of `kind` addressed to `user`.
    ///
    /// Length checks render without a quoted limit; `Gap` and `CiFailure`
    /// get the plain greeting. Use [`Templates::too_short`],
    /// [`Templates::gap`] and [`Templates::ci_failure`] for the full text.
    #[must_use]
    pub fn render(&self, kind: CommentKind, user: &str) -> String {
        let marker = self.marker(kind);
        match kind {
            CommentKind::IssueTitleTooShort | CommentKind::IssueDescriptionTooShort => {
                format!("Thanks for your contribution. 🍻 @{user} \n{marker}.")
            }
            CommentKind::PrTitleTooShort | CommentKind::PrDescriptionTooShort => {
                format!("Thanks for your contribution. 🍻  @{user} \n{marker}.")
            }
            CommentKind::NeedsSignOff => format!("@{user}{marker}"),
            CommentKind::PriorityReminder => format!("Thanks for your report, @{user} \n{marker}"),
            CommentKind::FirstContribution => format!(
                "We found this is your first time to contribute to {}, @{user} \n{marker}",
                self.repo
            ),
            CommentKind::Conflict | CommentKind::Gap | CommentKind::CiFailure => {
                format!("ping @{user} \n{marker}")
            }
        }
    }

    /// Gap comment quoting how far behind master the pull request is.
    #[must_use]
    pub fn gap(&self, user: &str, gap: usize) -> String {
        format!(
            "ping @{user} \nWe found that this PR is over {gap} {}",
            self.marker(CommentKind::Gap)
        )
    }

    /// CI failure comment with the build link and duration.
    #[must_use]
    pub fn ci_failure(&self, user: &str, build_url: &str, duration_secs: i64) -> String {
        format!(
            "{}build url: {build_url}\nbuild duration: {duration_secs}s\n",
            self.render(CommentKind::CiFailure, user)
        )
    }
}
