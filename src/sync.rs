use crate::{
    config::SyncConfig,
    data::{
        StudentId,
        student::{Student, StudentForm},
    },
    error::RosterResult,
    pagination::PAGE_LIMIT,
    sync::{cache::QueryCache, http::StudentsClient, in_flight::InFlight},
};
use std::{sync::Arc, time::Duration};

pub mod cache;
pub mod http;
pub mod in_flight;

pub use http::StudentPage;

/// Keeps the student list and student details in step with the API.
///
/// Pages are cached by page number and details by student id. Every successful mutation
/// invalidates all pages before returning, so the next list read after a change always
/// reaches the API.
#[derive(Debug, Clone)]
pub struct StudentSynchronizer {
    client: StudentsClient,
    pages: QueryCache<u32, StudentPage>,
    details: QueryCache<StudentId, Student>,
    in_flight: Arc<InFlight>,
    list_freshness: Duration,
    detail_freshness: Duration,
}

impl StudentSynchronizer {
    pub fn new(config: &SyncConfig) -> RosterResult<Self> {
        Ok(Self {
            client: StudentsClient::new(config)?,
            pages: QueryCache::new("students", config.cache_capacity),
            details: QueryCache::new("student", config.cache_capacity),
            in_flight: Arc::new(InFlight::default()),
            list_freshness: config.list_freshness,
            detail_freshness: config.detail_freshness,
        })
    }

    pub async fn list_students(&self, page: u32) -> RosterResult<StudentPage> {
        let client = self.client.clone();
        let in_flight = self.in_flight.clone();

        self.pages
            .get_or_fetch(page, self.list_freshness, async move {
                let (_guard, registration) = in_flight.register(page);
                client
                    .list_students(page, PAGE_LIMIT, Some(registration))
                    .await
            })
            .await
    }

    /// Aborts the list request for `page`, if one is running.
    pub fn cancel_list(&self, page: u32) -> bool {
        let cancelled = self.in_flight.cancel(page);
        if cancelled {
            info!(page, "Cancelled list request");
        }
        cancelled
    }

    pub async fn get_student(&self, id: StudentId) -> RosterResult<Student> {
        self.details
            .get_or_fetch(id, self.detail_freshness, self.client.get_student(id))
            .await
    }

    /// Warms the detail cache ahead of a navigation. Failures only get logged, the real
    /// read will surface them if they persist.
    pub async fn prefetch_student(&self, id: StudentId, freshness: Duration) {
        if let Err(e) = self
            .details
            .get_or_fetch(id, freshness, self.client.get_student(id))
            .await
        {
            warn!(?e, id, "Unable to prefetch student");
        }
    }

    pub fn detail_freshness(&self) -> Duration {
        self.detail_freshness
    }

    pub async fn add_student(&self, form: &StudentForm) -> RosterResult<Student> {
        let student = self.client.add_student(form).await?;
        self.pages.invalidate_all();

        info!(id = student.id, "Added student");
        Ok(student)
    }

    pub async fn update_student(
        &self,
        id: StudentId,
        form: &StudentForm,
    ) -> RosterResult<Student> {
        let student = self.client.update_student(id, form).await?;
        self.pages.invalidate_all();
        self.details.insert(id, student.clone()).await;

        info!(id, "Updated student");
        Ok(student)
    }

    pub async fn delete_student(&self, id: StudentId) -> RosterResult<()> {
        self.client.delete_student(id).await?;
        self.pages.invalidate_all();
        self.details.invalidate(&id).await;

        info!(id, "Deleted student");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::RosterError, sync::http::TOTAL_COUNT_HEADER};
    use serde_json::json;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn student_json(id: StudentId) -> serde_json::Value {
        json!({
            "id": id,
            "first_name": "Alan",
            "last_name": "Turing",
            "email": format!("alan{id}@example.com"),
            "gender": "male",
            "country": "UK",
            "avatar": "https://example.com/alan.png",
            "btc_address": "1BoatSLRHtKNngkdXEeobR76b53LETtpyT"
        })
    }

    fn synchronizer_for(server: &MockServer) -> StudentSynchronizer {
        let config = SyncConfig::for_api(Url::parse(&server.uri()).unwrap());
        StudentSynchronizer::new(&config).unwrap()
    }

    async fn mount_page(server: &MockServer, page: &str, total: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/students"))
            .and(query_param("page", page))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([student_json(1)]))
                    .insert_header(TOTAL_COUNT_HEADER, total),
            )
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn prefetch_within_window_is_one_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(student_json(1)))
            .expect(1)
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        sync.prefetch_student(1, Duration::from_secs(10)).await;
        sync.prefetch_student(1, Duration::from_secs(10)).await;
        let student = sync.get_student(1).await.unwrap();

        assert_eq!(student.email, "alan1@example.com");
    }

    #[tokio::test]
    async fn failed_prefetch_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students/8"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        sync.prefetch_student(8, Duration::from_secs(10)).await;
        let err = sync.get_student(8).await.unwrap_err();
        assert!(matches!(err.root(), RosterError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_list_reads_share_a_request() {
        let server = MockServer::start().await;
        mount_page(&server, "1", "1", 1).await;

        let sync = synchronizer_for(&server);
        let (a, b) = tokio::join!(sync.list_students(1), sync.list_students(1));
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn delete_forces_next_list_to_refetch() {
        let server = MockServer::start().await;
        mount_page(&server, "2", "11", 2).await;
        Mock::given(method("DELETE"))
            .and(path("/students/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        sync.list_students(2).await.unwrap();
        sync.list_students(2).await.unwrap();
        sync.delete_student(11).await.unwrap();
        sync.list_students(2).await.unwrap();
    }

    #[tokio::test]
    async fn list_after_delete_never_joins_the_older_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([student_json(21)]))
                    .insert_header(TOTAL_COUNT_HEADER, "21")
                    .set_delay(Duration::from_millis(400)),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .insert_header(TOTAL_COUNT_HEADER, "20")
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/students/21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        let before = sync.list_students(3);
        let after = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sync.delete_student(21).await.unwrap();
            sync.list_students(3).await
        };

        let (before, after) = tokio::join!(before, after);
        assert_eq!(before.unwrap().total_count, 21);
        assert_eq!(after.unwrap().total_count, 20);
    }

    #[tokio::test]
    async fn failed_delete_keeps_cache() {
        let server = MockServer::start().await;
        mount_page(&server, "1", "3", 1).await;
        Mock::given(method("DELETE"))
            .and(path("/students/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        sync.list_students(1).await.unwrap();
        assert!(sync.delete_student(2).await.is_err());
        sync.list_students(1).await.unwrap();
    }

    #[tokio::test]
    async fn update_refreshes_detail_from_response() {
        let server = MockServer::start().await;
        let mut updated = student_json(5);
        updated["country"] = json!("France");
        Mock::given(method("PUT"))
            .and(path("/students/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(updated))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/students/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(student_json(5)))
            .expect(0)
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        let form = StudentForm {
            country: "France".into(),
            email: "alan5@example.com".into(),
            ..StudentForm::default()
        };
        sync.update_student(5, &form).await.unwrap();

        assert_eq!(sync.get_student(5).await.unwrap().country, "France");
    }

    #[tokio::test]
    async fn cancelling_aborts_the_running_list_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let sync = synchronizer_for(&server);
        let request = sync.list_students(6);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sync.cancel_list(6)
        };

        let (result, cancelled) = tokio::join!(request, cancel);
        assert!(cancelled);
        let err = result.unwrap_err();
        assert!(matches!(err.root(), RosterError::Cancelled { page: 6 }));
        assert!(!sync.cancel_list(6));
    }
}
