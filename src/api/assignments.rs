//! Assignment endpoints.

use crate::client::CampusClient;
use crate::error::Result;
use crate::models::assignment::{
    Assignment, SubmissionStatus, SubmitAssignmentRequest, SubmitAssignmentResponse,
};

#[derive(Debug, Clone, Copy)]
pub struct AssignmentsApi<'a> {
    client: &'a CampusClient,
}

impl<'a> AssignmentsApi<'a> {
    pub(crate) fn new(client: &'a CampusClient) -> Self {
        Self { client }
    }

    /// GET `/assignments/course/{course_id}`
    pub async fn for_course(self, course_id: i64) -> Result<Vec<Assignment>> {
        self.client
            .get_json(&format!("/assignments/course/{}", course_id))
            .await
    }

    /// GET `/assignments/{id}`
    pub async fn get(self, id: i64) -> Result<Assignment> {
        self.client.get_json(&format!("/assignments/{}", id)).await
    }

    /// GET `/assignments/{id}/submission`
    pub async fn submission(self, id: i64) -> Result<SubmissionStatus> {
        self.client
            .get_json(&format!("/assignments/{}/submission", id))
            .await
    }

    /// Submit online text.
    ///
    /// POST `/assignments/{id}/submit`
    pub async fn submit(self, id: i64, text: &str) -> Result<SubmitAssignmentResponse> {
        self.client
            .post_json(
                &format!("/assignments/{}/submit", id),
                &SubmitAssignmentRequest { text },
            )
            .await
    }
}
