//! Rendering capability used by [`Cacher::fetch_html`](super::Cacher::fetch_html).

use std::fmt::Write;

/// Something that renders `Data` into an output buffer.
pub trait Template {
    type Data;

    fn execute(&self, out: &mut String, data: &Self::Data) -> Result<(), askama::Error>;
}

/// Adapter for askama templates, which carry their data in their own fields.
pub struct Askama<T>(pub T);

impl<T: askama::Template> Template for Askama<T> {
    type Data = ();

    fn execute(&self, out: &mut String, _data: &()) -> Result<(), askama::Error> {
        self.0.render_into(out)
    }
}

/// Pre-rendered markup passed through unchanged.
pub struct Raw(pub String);

impl Template for Raw {
    type Data = ();

    fn execute(&self, out: &mut String, _data: &()) -> Result<(), askama::Error> {
        out.write_str(&self.0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(askama::Template)]
    #[template(source = "<h1>{{ title }}</h1>", ext = "html")]
    struct Heading<'a> {
        title: &'a str,
    }

    #[test]
    fn askama_templates_render_into_buffer() {
        let mut out = String::from("<!-- -->");
        Askama(Heading { title: "News" })
            .execute(&mut out, &())
            .expect("render");
        assert_eq!(out, "<!-- --><h1>News</h1>");
    }

    #[test]
    fn askama_escapes_html() {
        let mut out = String::new();
        Askama(Heading { title: "<b>" })
            .execute(&mut out, &())
            .expect("render");
        assert!(out.starts_with("<h1>"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn raw_passes_through() {
        let mut out = String::new();
        Raw("<p>hi</p>".into()).execute(&mut out, &()).expect("render");
        assert_eq!(out, "<p>hi</p>");
    }
}
