// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Minimal HTML bodies for error and redirect responses.

use http::header::{HeaderMap, HeaderValue};
use http::{Response, StatusCode};

use crate::Body;

/// Escapes `&`, `<`, `>`, `"` and `'` for interpolation into HTML text
/// and attribute values.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// The one document shape this crate emits, for both errors and redirects.
fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{title}</title>\n\
         </head>\n\
         <body>\n\
         <pre>{body}</pre>\n\
         </body>\n\
         </html>\n"
    )
}

fn finish(builder: http::response::Builder, doc: String) -> Response<Body> {
    builder
        .header(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=UTF-8"),
        )
        .header(
            http::header::CONTENT_LENGTH,
            HeaderValue::from_str(&doc.len().to_string()).expect("length is ASCII"),
        )
        .header(
            http::header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'self'"),
        )
        .header(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        )
        .body(Body::from(doc))
        .expect("static response parts are valid")
}

/// Renders the canonical error page. `extra_headers` (such as
/// `Content-Range` on a 416 or `Allow` on a 405) are applied before the
/// fixed body headers.
pub(crate) fn error_response(
    status: StatusCode,
    reason: &str,
    extra_headers: HeaderMap,
) -> Response<Body> {
    let mut builder = Response::builder().status(status);
    for (name, value) in &extra_headers {
        builder = builder.header(name, value);
    }
    finish(builder, document("Error", &escape(reason)))
}

/// Renders a 301 pointing a directory request at its trailing-slash form.
pub(crate) fn redirect_response(location: &str) -> Response<Body> {
    let escaped = escape(location);
    let doc = document(
        "Redirecting",
        &format!("Redirecting to <a href=\"{escaped}\">{escaped}</a>"),
    );
    let builder = Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(
            http::header::LOCATION,
            HeaderValue::from_str(location).expect("encoded location is a valid header value"),
        );
    finish(builder, doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn error_page_shape() {
        let res = error_response(StatusCode::NOT_FOUND, "Not Found", HeaderMap::new());
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            res.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "text/html; charset=UTF-8"
        );
        assert_eq!(
            res.headers()
                .get(http::header::CONTENT_SECURITY_POLICY)
                .unwrap(),
            "default-src 'self'"
        );
        assert_eq!(
            res.headers()
                .get(http::header::X_CONTENT_TYPE_OPTIONS)
                .unwrap(),
            "nosniff"
        );
        let expected = document("Error", "Not Found");
        assert_eq!(
            res.headers()
                .get(http::header::CONTENT_LENGTH)
                .unwrap()
                .to_str()
                .unwrap(),
            expected.len().to_string()
        );
    }

    #[test]
    fn error_page_carries_extra_headers() {
        let mut extra = HeaderMap::new();
        extra.insert(
            http::header::CONTENT_RANGE,
            HeaderValue::from_static("bytes */6"),
        );
        let res = error_response(
            StatusCode::RANGE_NOT_SATISFIABLE,
            "Range Not Satisfiable",
            extra,
        );
        assert_eq!(
            res.headers().get(http::header::CONTENT_RANGE).unwrap(),
            "bytes */6"
        );
    }

    #[test]
    fn redirect_links_to_location() {
        let res = redirect_response("/sub/");
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(res.headers().get(http::header::LOCATION).unwrap(), "/sub/");
    }
}
