use crate::{
    routes::{
        index::get_index_route,
        sse::sse_feed,
        student_form::{get_add_student, get_edit_student, post_add_student, post_edit_student},
        students::{
            get_students, internal_delete_student, internal_get_students,
            internal_post_cancel_list, internal_post_prefetch_student,
        },
    },
    state::RosterState,
};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub mod index;
pub mod sse;
pub mod student_form;
pub mod students;

pub fn app(state: RosterState) -> Router {
    Router::new()
        .route("/", get(get_index_route))
        .route("/students", get(get_students))
        .route(
            "/students/add",
            get(get_add_student).post(post_add_student),
        )
        .route(
            "/students/{id}",
            get(get_edit_student).post(post_edit_student),
        )
        .route(
            "/internal/students",
            get(internal_get_students).delete(internal_delete_student),
        )
        .route(
            "/internal/students/cancel",
            post(internal_post_cancel_list),
        )
        .route(
            "/internal/students/prefetch",
            post(internal_post_prefetch_student),
        )
        .route("/sse_feed", get(sse_feed))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
