//! Forum endpoints.

use crate::client::CampusClient;
use crate::error::Result;
use crate::models::forum::{Discussion, Forum, Post, ReplyRequest, ReplyResponse};

#[derive(Debug, Clone, Copy)]
pub struct ForumsApi<'a> {
    client: &'a CampusClient,
}

impl<'a> ForumsApi<'a> {
    pub(crate) fn new(client: &'a CampusClient) -> Self {
        Self { client }
    }

    /// GET `/forums/course/{course_id}`
    pub async fn for_course(self, course_id: i64) -> Result<Vec<Forum>> {
        self.client
            .get_json(&format!("/forums/course/{}", course_id))
            .await
    }

    /// GET `/forums/{forum_id}/discussions`
    pub async fn discussions(self, forum_id: i64) -> Result<Vec<Discussion>> {
        self.client
            .get_json(&format!("/forums/{}/discussions", forum_id))
            .await
    }

    /// GET `/forums/discussions/{discussion_id}/posts`
    pub async fn posts(self, discussion_id: i64) -> Result<Vec<Post>> {
        self.client
            .get_json(&format!("/forums/discussions/{}/posts", discussion_id))
            .await
    }

    /// POST `/forums/discussions/{discussion_id}/reply`
    pub async fn reply(self, discussion_id: i64, message: &str) -> Result<ReplyResponse> {
        self.client
            .post_json(
                &format!("/forums/discussions/{}/reply", discussion_id),
                &ReplyRequest { message },
            )
            .await
    }
}
