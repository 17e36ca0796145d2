use crate::{
    errors::ErrorKind,
    http::{request::Request, response::Response},
    StatusCode,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::{ffi::OsString, os::unix::ffi::OsStrExt, path::Path};
use tokio::io::AsyncWrite;

// RFC 3986 unreserved characters stay as they are.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub(crate) async fn handle<S: AsyncWrite + Unpin>(
    stream: &mut S,
    request: &Request,
    response: &mut Response,
) -> Result<(), ErrorKind> {
    let path = request.path().ok_or(ErrorKind::NotFound)?;
    let names = list_entries(path).await?;
    let page = render_listing(request.uri(), &names);

    response.head(stream, StatusCode::Ok, "text/html").await?;
    response.body(stream, page.as_bytes()).await?;
    response.finish(stream).await
}

/// Entry names sorted bytewise, `..` included and `.` left out.
pub(crate) async fn list_entries(dir: &Path) -> Result<Vec<OsString>, ErrorKind> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = vec![OsString::from("..")];

    while let Some(entry) = entries.next_entry().await? {
        names.push(entry.file_name());
    }

    names.sort_unstable();
    Ok(names)
}

/// Renders an HTML list linking every name under `uri`.
pub(crate) fn render_listing(uri: &str, names: &[OsString]) -> String {
    let base = base_href(uri);
    let mut page = String::from("<ul>\n");

    for name in names {
        let href = format!("{base}{}", percent_encode(name.as_bytes(), SEGMENT));
        let text = name.to_string_lossy();

        page.push_str("<li><a href=\"");
        page.push_str(&encode_double_quoted_attribute(&href));
        page.push_str("\">");
        page.push_str(&encode_text(&text));
        page.push_str("</a></li>\n");
    }

    page.push_str("</ul>\n");
    page
}

// Re-encodes the request URI segment by segment and ends it with `/`.
fn base_href(uri: &str) -> String {
    let decoded: Vec<u8> = percent_decode_str(uri).collect();
    let mut base = String::from("/");

    for segment in decoded.split(|&b| b == b'/').filter(|s| !s.is_empty()) {
        base.extend(percent_encode(segment, SEGMENT));
        base.push('/');
    }

    base
}
