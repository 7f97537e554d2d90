use maud::{Markup, Render, html};
use serde::Deserialize;

pub fn render_table<const N: usize>(titles: [&'static str; N], items: Vec<[Markup; N]>) -> Markup {
    html! {
        div class="overflow-x-auto" {
            table class="min-w-full bg-gray-800 rounded shadow-md" {
                thead class="bg-gray-700" {
                    tr {
                        @for title in titles {
                            th class="py-2 px-4 text-left font-semibold text-gray-300" {(title)}
                        }
                    }
                }
                tbody {
                    @for row in items {
                        tr class="hover:bg-gray-700" {
                            @for col in row {
                                td class="py-2 px-4 border-b border-gray-600 text-gray-200" {(col)}
                            }
                        }
                    }
                }
            }
        }
    }
}

pub fn title(s: impl Render) -> Markup {
    html! {
        h1 class="text-2xl font-semibold mb-4" {(s)}
    }
}

pub fn render_nav() -> Markup {
    html! {
        nav class="w-full max-w-4xl flex flex-row space-x-4 p-4 mb-4" {
            a href="/" class="hover:text-blue-400" {"Home"}
            a href="/students" class="hover:text-blue-400" {"Students"}
        }
    }
}

pub fn form_element(id: &'static str, label: &'static str, error: Option<&str>, input: Markup) -> Markup {
    html! {
        div class="mb-4" {
            label for=(id) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            (input)
            @if let Some(error) = error {
                p class="mt-1 text-xs text-red-500" {(error)}
            }
        }
    }
}

pub fn text_form_element(
    id: &'static str,
    label: &'static str,
    value: &str,
    error: Option<&str>,
) -> Markup {
    form_element(id, label, error, html! {
        input required type="text" id=(id) name=(id) value=(value) class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {}
    })
}

pub fn form_submit_button(text: &'static str) -> Markup {
    html! {
        div class="flex items-center justify-between" {
            button type="submit" class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded focus:outline-none focus:shadow-outline" {
                (text)
            }
        }
    }
}

/// Transient messages shown at the top of the student list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Notice {
    Added,
    Updated,
    Deleted,
}

impl Notice {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

impl Render for Notice {
    fn render(&self) -> Markup {
        let text = match self {
            Self::Added => "Add student info success",
            Self::Updated => "Update student info success",
            Self::Deleted => "Deleted student",
        };
        success_banner(text)
    }
}

pub fn success_banner(text: impl Render) -> Markup {
    html! {
        div role="status" class="bg-green-100 border border-green-400 text-green-700 px-4 py-3 rounded relative mb-4" {
            (text)
        }
    }
}

pub fn failure_banner(text: impl Render) -> Markup {
    html! {
        div role="alert" class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" {
            strong class="font-bold" {"Something went wrong: "}
            span {(text)}
        }
    }
}
