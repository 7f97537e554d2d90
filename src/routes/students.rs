use crate::{
    data::{IdForm, StudentId},
    error::RosterError,
    maud_conveniences::{Notice, failure_banner, render_table, success_banner, title},
    pagination::{PageQuery, PageWindow},
    routes::sse::SseEvent,
    state::RosterState,
    sync::StudentPage,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
pub struct StudentsPageQuery {
    page: Option<String>,
    notice: Option<Notice>,
}

pub async fn get_students(
    State(state): State<RosterState>,
    Query(StudentsPageQuery { page, notice }): Query<StudentsPageQuery>,
) -> Markup {
    let page = PageQuery { page }.page();

    state.render(html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-4xl w-full flex flex-col space-y-4" {
            @if let Some(notice) = notice {
                (notice)
            }
            div hx-ext="sse" sse-connect="/sse_feed" {
                div id="students" hx-get={"/internal/students?page=" (page)} hx-trigger="load" hx-swap="outerHTML" {
                    (loading_skeleton(page))
                }
            }
        }
    })
}

fn loading_skeleton(page: u32) -> Markup {
    html! {
        div role="status" class="mt-6 animate-pulse" {
            div class="mb-4 h-4 rounded bg-gray-700" {}
            @for _ in 0..10 {
                div class="mb-2.5 h-10 rounded bg-gray-700" {}
            }
            span class="sr-only" {"Loading..."}
        }
        button class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" hx-post={"/internal/students/cancel?page=" (page)} hx-target="#students" hx-swap="outerHTML" {
            "Cancel"
        }
    }
}

pub async fn internal_get_students(
    State(state): State<RosterState>,
    Query(query): Query<PageQuery>,
) -> Response {
    let page = query.page();
    match state.list_students(page).await {
        Ok(listing) => render_students(page, &listing, None).into_response(),
        Err(e) => {
            warn!(?e, page, "Unable to list students");
            (e.status_code(), render_list_failure(page, &e, None)).into_response()
        }
    }
}

/// Stands in for the table when a page could not be loaded, so `#students` stays swappable.
fn render_list_failure(page: u32, e: &RosterError, notice: Option<Notice>) -> Markup {
    html! {
        div id="students" class="container mx-auto" {
            @if let Some(notice) = notice {
                (notice)
            }
            (failure_banner(e.to_string()))
            (retry_button(page))
        }
    }
}

fn retry_button(page: u32) -> Markup {
    html! {
        button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get={"/internal/students?page=" (page)} hx-target="#students" hx-swap="outerHTML" {
            "Retry"
        }
    }
}

fn render_students(page: u32, listing: &StudentPage, notice: Option<Notice>) -> Markup {
    let window = PageWindow::new(page, listing.total_count);

    let rows = listing
        .items
        .iter()
        .map(|student| {
            let delete_vals = json!({
                "id": student.id,
                "page": window.page,
                "total_count": window.total_count,
            });

            [
                html! {(student.id)},
                html! {(student.avatar())},
                html! {(student)},
                html! {(student.email)},
                html! {
                    a href={"/students/" (student.id) "?return_page=" (window.page)}
                        hx-post={"/internal/students/prefetch?id=" (student.id)}
                        hx-trigger="mouseenter once"
                        hx-swap="none"
                        class="mr-5 font-medium text-blue-500 hover:underline" {
                        "Edit"
                    }
                    button class="font-medium text-red-500" hx-delete="/internal/students" hx-vals=(delete_vals.to_string()) hx-target="#students" hx-swap="outerHTML" hx-confirm="Delete this student?" {
                        "Delete"
                    }
                },
            ]
        })
        .collect();

    html! {
        div id="students" hx-get={"/internal/students?page=" (window.page)} hx-trigger="sse:students_changed" hx-swap="outerHTML" class="container mx-auto" {
            @if let Some(notice) = notice {
                (notice)
            }
            div class="flex flex-row items-center justify-between" {
                (title("Students"))
                a href={"/students/add?return_page=" (window.page_for_new_item())} class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" {
                    "Add Student"
                }
            }
            (render_table(["#", "Avatar", "Name", "Email", ""], rows))
            (render_pagination(&window))
        }
    }
}

fn render_pagination(window: &PageWindow) -> Markup {
    const ENABLED: &str = "border border-gray-600 py-2 px-3 leading-tight hover:bg-gray-700";
    const DISABLED: &str = "border border-gray-600 py-2 px-3 leading-tight text-gray-500 cursor-not-allowed";

    html! {
        nav aria-label="Page navigation" class="mt-6 flex justify-center" {
            ul class="inline-flex -space-x-px" {
                li {
                    @if window.has_previous() {
                        a href={"/students?page=" (window.page - 1)} class=(ENABLED) {"Previous"}
                    } @else {
                        span class=(DISABLED) {"Previous"}
                    }
                }
                @for page in window.pages() {
                    li {
                        @if page == window.page {
                            a href={"/students?page=" (page)} aria-current="page" class="border border-gray-600 py-2 px-3 leading-tight bg-gray-700 font-semibold text-blue-400" {(page)}
                        } @else {
                            a href={"/students?page=" (page)} class=(ENABLED) {(page)}
                        }
                    }
                }
                li {
                    @if window.has_next() {
                        a href={"/students?page=" (window.page + 1)} class=(ENABLED) {"Next"}
                    } @else {
                        span class=(DISABLED) {"Next"}
                    }
                }
            }
        }
    }
}

pub async fn internal_post_cancel_list(
    State(state): State<RosterState>,
    Query(query): Query<PageQuery>,
) -> Markup {
    let page = query.page();
    let cancelled = state.cancel_list(page);

    html! {
        div id="students" class="container mx-auto" {
            @if cancelled {
                (success_banner("Loading cancelled"))
            } @else {
                (success_banner("Nothing was loading"))
            }
            (retry_button(page))
        }
    }
}

pub async fn internal_post_prefetch_student(
    State(state): State<RosterState>,
    Query(IdForm { id }): Query<IdForm>,
) -> StatusCode {
    state
        .prefetch_student(id, state.detail_freshness())
        .await;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct DeleteForm {
    id: StudentId,
    page: u32,
    total_count: u64,
}

/// Deletes, then answers with whichever page should be on screen now. A reload failing after
/// the delete still reports the delete.
pub async fn internal_delete_student(
    State(state): State<RosterState>,
    Query(DeleteForm {
        id,
        page,
        total_count,
    }): Query<DeleteForm>,
) -> Response {
    if let Err(e) = state.delete_student(id).await {
        warn!(?e, id, "Unable to delete student");
        return (e.status_code(), render_list_failure(page, &e, None)).into_response();
    }
    state.send_sse_event(SseEvent::StudentsChanged);

    let next_page = PageWindow::new(page, total_count).page_after_removal();
    let push_url = [("HX-Push-Url", format!("/students?page={next_page}"))];

    match state.list_students(next_page).await {
        Ok(listing) => (
            push_url,
            render_students(next_page, &listing, Some(Notice::Deleted)),
        )
            .into_response(),
        Err(e) => {
            warn!(?e, page = next_page, "Unable to reload students after delete");
            (
                push_url,
                render_list_failure(next_page, &e, Some(Notice::Deleted)),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{config::SyncConfig, routes::app, state::RosterState, sync::http::TOTAL_COUNT_HEADER};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use tower::ServiceExt;
    use url::Url;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path, query_param},
    };

    fn student_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "first_name": "Katherine",
            "last_name": format!("Johnson{id}"),
            "email": format!("kj{id}@example.com"),
            "gender": "female",
            "country": "USA",
            "avatar": "",
            "btc_address": "1BoatSLRHtKNngkdXEeobR76b53LETtpyT"
        })
    }

    fn state_for(server: &MockServer) -> RosterState {
        RosterState::new(&SyncConfig::for_api(Url::parse(&server.uri()).unwrap())).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn first_page_disables_previous_and_links_add_to_new_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!((1..=10).map(student_json).collect::<Vec<_>>()))
                    .insert_header(TOTAL_COUNT_HEADER, "20"),
            )
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::get("/internal/students?page=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        assert!(body.contains("Johnson10"));
        assert!(body.contains(r#"<span class="border border-gray-600 py-2 px-3 leading-tight text-gray-500 cursor-not-allowed">Previous</span>"#));
        assert!(body.contains(r#"href="/students?page=2""#));
        assert!(body.contains(r#"href="/students/add?return_page=3""#));
    }

    #[tokio::test]
    async fn deleting_last_row_moves_back_a_page() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/students/21"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!((11..=20).map(student_json).collect::<Vec<_>>()))
                    .insert_header(TOTAL_COUNT_HEADER, "20"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::delete("/internal/students?id=21&page=3&total_count=21")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["HX-Push-Url"], "/students?page=2");
        assert!(body_text(response).await.contains("Johnson20"));
    }

    #[tokio::test]
    async fn shell_tells_htmx_to_swap_error_responses() {
        let server = MockServer::start().await;

        let response = app(state_for(&server))
            .oneshot(Request::get("/students?page=2").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_text(response).await;
        assert!(body.contains(r#"name="htmx-config""#));
        assert!(body.contains("[45].."));
    }

    #[tokio::test]
    async fn failed_list_still_answers_with_a_students_fragment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::get("/internal/students?page=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_text(response).await;
        assert!(body.contains(r#"id="students""#));
        assert!(body.contains(r#"role="alert""#));
        assert!(body.contains(r#"hx-get="/internal/students?page=2""#));
    }

    #[tokio::test]
    async fn failed_delete_shows_an_alert() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/students/4"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::delete("/internal/students?id=4&page=1&total_count=8")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get("HX-Push-Url").is_none());
        let body = body_text(response).await;
        assert!(body.contains(r#"role="alert""#));
        assert!(!body.contains("Deleted student"));
    }

    #[tokio::test]
    async fn delete_is_reported_even_if_the_reload_fails() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/students/11"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/students"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::delete("/internal/students?id=11&page=2&total_count=11")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["HX-Push-Url"], "/students?page=1");
        let body = body_text(response).await;
        assert!(body.contains("Deleted student"));
        assert!(body.contains(r#"role="alert""#));
        assert!(body.contains(r#"hx-get="/internal/students?page=1""#));
    }

    #[tokio::test]
    async fn prefetch_answers_no_content_even_on_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/students/3"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = app(state_for(&server))
            .oneshot(
                Request::post("/internal/students/prefetch?id=3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn cancel_with_nothing_loading_offers_retry() {
        let server = MockServer::start().await;

        let response = app(state_for(&server))
            .oneshot(
                Request::post("/internal/students/cancel?page=4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_text(response).await;
        assert!(body.contains("Nothing was loading"));
        assert!(body.contains(r#"hx-get="/internal/students?page=4""#));
    }
}
