use crate::{
    data::{
        StudentId,
        student::{FieldErrors, Gender, Student, StudentForm},
    },
    error::{RosterError, RosterResult},
    maud_conveniences::{
        Notice, failure_banner, form_element, form_submit_button, text_form_element, title,
    },
    routes::sse::SseEvent,
    state::RosterState,
};
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use serde::Deserialize;

/// Page to land on after submitting. Decided by whoever linked to the form.
#[derive(Deserialize)]
pub struct ReturnPage {
    return_page: Option<u32>,
}

impl ReturnPage {
    fn get(&self) -> u32 {
        self.return_page.unwrap_or(1).max(1)
    }
}

#[derive(Debug, Copy, Clone)]
enum FormMode {
    Add,
    Edit(StudentId),
}

impl FormMode {
    fn action(self, return_page: u32) -> String {
        match self {
            Self::Add => format!("/students/add?return_page={return_page}"),
            Self::Edit(id) => format!("/students/{id}?return_page={return_page}"),
        }
    }

    const fn heading(self) -> &'static str {
        match self {
            Self::Add => "Add student",
            Self::Edit(_) => "Edit student",
        }
    }

    const fn submit_label(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Edit(_) => "Update",
        }
    }

    const fn notice(self) -> Notice {
        match self {
            Self::Add => Notice::Added,
            Self::Edit(_) => Notice::Updated,
        }
    }
}

struct FormFeedback<'a> {
    errors: Option<&'a FieldErrors>,
    failure: Option<String>,
}

impl FormFeedback<'_> {
    const NONE: Self = Self {
        errors: None,
        failure: None,
    };

    fn field(&self, name: &str) -> Option<&str> {
        self.errors.and_then(|errors| errors.get(name))
    }
}

fn render_form(
    mode: FormMode,
    form: &StudentForm,
    return_page: u32,
    feedback: &FormFeedback<'_>,
) -> Markup {
    html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-xl" {
            (title(mode.heading()))
            @if let Some(failure) = &feedback.failure {
                (failure_banner(failure))
            }

            form method="post" action=(mode.action(return_page)) {
                (form_element("email", "Email address", feedback.field("email"), html! {
                    input required type="email" id="email" name="email" value=(form.email) class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
                }))

                (form_element("gender", "Gender", feedback.field("gender"), html! {
                    div id="gender" class="flex flex-row space-x-6" {
                        @for gender in Gender::ALL {
                            @let id = format!("gender-{}", gender.as_str());
                            div class="flex items-center" {
                                input type="radio" id=(id) name="gender" value=(gender.as_str()) checked[form.gender == gender] class="h-4 w-4";
                                label for=(id) class="ml-2 text-sm font-medium text-gray-300" {(gender)}
                            }
                        }
                    }
                }))

                (text_form_element("country", "Country", &form.country, feedback.field("country")))

                div class="grid md:grid-cols-2 md:gap-6" {
                    (text_form_element("first_name", "First Name", &form.first_name, feedback.field("first_name")))
                    (text_form_element("last_name", "Last Name", &form.last_name, feedback.field("last_name")))
                }
                div class="grid md:grid-cols-2 md:gap-6" {
                    (text_form_element("avatar", "Avatar Base64", &form.avatar, feedback.field("avatar")))
                    (text_form_element("btc_address", "BTC Address", &form.btc_address, feedback.field("btc_address")))
                }

                (form_submit_button(mode.submit_label()))
            }
        }
    }
}

pub async fn get_add_student(
    State(state): State<RosterState>,
    Query(return_page): Query<ReturnPage>,
) -> Markup {
    state.render(render_form(
        FormMode::Add,
        &StudentForm::default(),
        return_page.get(),
        &FormFeedback::NONE,
    ))
}

pub async fn post_add_student(
    State(state): State<RosterState>,
    Query(return_page): Query<ReturnPage>,
    Form(form): Form<StudentForm>,
) -> Response {
    let result = match form.validate_locally() {
        Ok(()) => state.add_student(&form).await,
        Err(errors) => Err(RosterError::Validation { errors }),
    };

    after_submit(&state, FormMode::Add, &form, return_page.get(), result)
}

pub async fn get_edit_student(
    State(state): State<RosterState>,
    Path(id): Path<StudentId>,
    Query(return_page): Query<ReturnPage>,
) -> RosterResult<Markup> {
    let student = state.get_student(id).await?;

    Ok(state.render(render_form(
        FormMode::Edit(id),
        &student.to_form(),
        return_page.get(),
        &FormFeedback::NONE,
    )))
}

pub async fn post_edit_student(
    State(state): State<RosterState>,
    Path(id): Path<StudentId>,
    Query(return_page): Query<ReturnPage>,
    Form(form): Form<StudentForm>,
) -> Response {
    let result = match form.validate_locally() {
        Ok(()) => state.update_student(id, &form).await,
        Err(errors) => Err(RosterError::Validation { errors }),
    };

    after_submit(&state, FormMode::Edit(id), &form, return_page.get(), result)
}

/// Success goes back to the list, a 422 goes back to the form with messages by each field,
/// anything else goes back to the form with a banner so nothing typed is lost.
fn after_submit(
    state: &RosterState,
    mode: FormMode,
    form: &StudentForm,
    return_page: u32,
    result: RosterResult<Student>,
) -> Response {
    let e = match result {
        Ok(_) => {
            state.send_sse_event(SseEvent::StudentsChanged);
            let notice = mode.notice().as_str();
            return Redirect::to(&format!("/students?page={return_page}&notice={notice}"))
                .into_response();
        }
        Err(e) => e,
    };

    let feedback = match e.field_errors() {
        Some(errors) => FormFeedback {
            errors: Some(errors),
            failure: None,
        },
        None => {
            warn!(?e, "Unable to save student");
            FormFeedback {
                errors: None,
                failure: Some(e.to_string()),
            }
        }
    };

    (
        e.status_code(),
        state.render(render_form(mode, form, return_page, &feedback)),
    )
        .into_response()
}
