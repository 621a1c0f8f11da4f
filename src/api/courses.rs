//! Course endpoints.

use crate::client::CampusClient;
use crate::error::Result;
use crate::models::course::{Course, CourseContent};

/// Courses the current user is enrolled in.
#[derive(Debug, Clone, Copy)]
pub struct CoursesApi<'a> {
    client: &'a CampusClient,
}

impl<'a> CoursesApi<'a> {
    pub(crate) fn new(client: &'a CampusClient) -> Self {
        Self { client }
    }

    /// GET `/courses`
    pub async fn list(self) -> Result<Vec<Course>> {
        self.client.get_json("/courses").await
    }

    /// GET `/courses/{id}`
    pub async fn get(self, id: i64) -> Result<Course> {
        self.client.get_json(&format!("/courses/{}", id)).await
    }

    /// Sections and activities of a course.
    ///
    /// GET `/courses/{id}/contents`
    pub async fn contents(self, id: i64) -> Result<Vec<CourseContent>> {
        self.client
            .get_json(&format!("/courses/{}/contents", id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
    use crate::error::Error;
    use crate::storage::MemorySecureStore;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> CampusClient {
        let store = MemorySecureStore::with_entries([(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")]);
        let client = CampusClient::builder()
            .base_url(server.uri())
            .store(Arc::new(store))
            .build()
            .unwrap();
        client.session().restore().await.unwrap();
        client
    }

    #[tokio::test]
    async fn test_list_courses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 2, "shortname": "MAT101", "fullname": "Matemáticas I", "startdate": 1704067200},
                {"id": 3, "shortname": "FIS101", "fullname": "Física I"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let courses = client(&server).await.courses().list().await.unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].shortname, "MAT101");
        assert_eq!(courses[1].startdate, None);
    }

    #[tokio::test]
    async fn test_course_contents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses/2/contents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 10,
                "name": "Tema 1",
                "modules": [{
                    "id": 44, "name": "Tarea 1", "instance": 7,
                    "modname": "assign", "modplural": "Tareas"
                }]
            }])))
            .mount(&server)
            .await;

        let contents = client(&server).await.courses().contents(2).await.unwrap();
        assert_eq!(contents[0].modules[0].modname, "assign");
    }

    #[tokio::test]
    async fn test_missing_course_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses/99"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"detail": "Course not found"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).await.courses().get(99).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, ref message } if message == "Course not found"));
    }
}
