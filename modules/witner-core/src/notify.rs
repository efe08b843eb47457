use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use witner_common::{Incident, QualifiedReplyRecord, QualifiedStatus, Response};

use crate::traits::{Poster, ReplyTarget};

pub const CANNOT_OVERRIDE: &str = "You can not update this help request with a lower priority:";
pub const PRIORITY_CHANGED: &str = "Help request's priority level has changed:";
pub const CHEAPER_ALTERNATIVE: &str = "We have found a less costly help request:";

/// `lead` followed by a link to the quoted post.
pub fn quote(lead: &str, quoted_url: &str) -> String {
    format!("{lead} {quoted_url}")
}

pub fn cannot_override(current: &QualifiedStatus) -> String {
    quote(CANNOT_OVERRIDE, &current.url())
}

pub fn priority_changed(response: &Response) -> String {
    quote(PRIORITY_CHANGED, &response.url())
}

pub fn cheaper_alternative(alternative: &Incident) -> String {
    quote(CHEAPER_ALTERNATIVE, &alternative.url())
}

impl From<&Response> for ReplyTarget {
    fn from(response: &Response) -> Self {
        Self {
            screen_name: response.user.screen_name.clone(),
            post_id: response.id.clone(),
        }
    }
}

impl From<&QualifiedReplyRecord> for ReplyTarget {
    fn from(record: &QualifiedReplyRecord) -> Self {
        Self {
            screen_name: record.user.screen_name.clone(),
            post_id: record.response_id.clone(),
        }
    }
}

/// Poster that only logs. Used when no outbound account is configured.
#[derive(Default)]
pub struct LogPoster {
    next_id: AtomicU64,
}

#[async_trait]
impl Poster for LogPoster {
    async fn post(&self, body: &str, reply_to: Option<&ReplyTarget>) -> anyhow::Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        match reply_to {
            Some(target) => info!(
                id = %id,
                to = %target.screen_name,
                in_reply_to = %target.post_id,
                body,
                "Post"
            ),
            None => info!(id = %id, body, "Post"),
        }
        Ok(id)
    }
}
