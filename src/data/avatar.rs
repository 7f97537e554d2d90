use base64::{Engine, prelude::BASE64_STANDARD};
use maud::{Markup, Render, html};

/// A student's avatar, which the API stores either as a link or as raw base64.
pub struct Avatar<'a> {
    raw: &'a str,
    alt: &'a str,
}

impl<'a> Avatar<'a> {
    pub const fn new(raw: &'a str, alt: &'a str) -> Self {
        Self { raw, alt }
    }

    /// Something usable as an `img` `src`, if the avatar makes any sense.
    pub fn src(&self) -> Option<String> {
        let raw = self.raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.starts_with("http://") || raw.starts_with("https://") || raw.starts_with("data:") {
            return Some(raw.to_string());
        }

        let bytes = BASE64_STANDARD.decode(raw).ok()?;
        let mime = infer::get(&bytes)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map_or("image/png", |kind| kind.mime_type());

        Some(format!("data:{mime};base64,{raw}"))
    }
}

impl Render for Avatar<'_> {
    fn render(&self) -> Markup {
        html! {
            @if let Some(src) = self.src() {
                img src=(src) alt=(self.alt) class="h-5 w-5 rounded" {}
            } @else {
                span class="italic text-gray-500" {"-"}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_pass_through() {
        let avatar = Avatar::new("https://cdn.example.com/a.png", "a");
        assert_eq!(avatar.src().as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn base64_gets_a_sniffed_mime_type() {
        let gif = BASE64_STANDARD.encode(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;");
        let src = Avatar::new(&gif, "g").src().unwrap();
        assert!(src.starts_with("data:image/gif;base64,"));
    }

    #[test]
    fn garbage_is_dropped() {
        assert_eq!(Avatar::new("%%% not base64 %%%", "x").src(), None);
        assert_eq!(Avatar::new("   ", "x").src(), None);
    }
}
