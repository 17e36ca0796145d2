use crate::{
    errors::ErrorKind,
    http::{request::Request, response::Response},
    Config, StatusCode,
};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWrite},
};

pub(crate) const BUFFER_SIZE: usize = 8 * 1024;

/// Streams a regular file through a fixed buffer, one chunk written before
/// the next is read.
pub(crate) async fn handle<S: AsyncWrite + Unpin>(
    stream: &mut S,
    request: &Request,
    response: &mut Response,
    config: &Config,
) -> Result<(), ErrorKind> {
    let path = request.path().ok_or(ErrorKind::NotFound)?;
    let mut file = File::open(path).await?;

    response
        .head(stream, StatusCode::Ok, config.mimetype(path))
        .await?;

    let mut buffer = vec![0; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        response.body(stream, &buffer[..n]).await?;
    }

    response.finish(stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tools::*, MimeTypes};
    use std::{fs, sync::Arc, time::Duration};

    fn content(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    async fn serve(config: &Arc<crate::Config>, name: &str) -> (Result<(), ErrorKind>, Vec<u8>) {
        let mut request = request("GET", &format!("/{name}"));
        request.set_path(config.root().join(name));

        let mut out = Vec::new();
        let mut response = Response::new(Duration::from_secs(1));
        let result = handle(&mut out, &request, &mut response, config).await;
        (result, out)
    }

    #[tokio::test]
    async fn body_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        for len in [0, BUFFER_SIZE - 1, BUFFER_SIZE, BUFFER_SIZE + 1, 3 * BUFFER_SIZE + 7] {
            let name = format!("file-{len}.bin");
            let data = content(len);
            fs::write(dir.path().join(&name), &data).unwrap();

            let (result, out) = serve(&config, &name).await;
            assert_eq!(result, Ok(()));

            let (head, body) = split_response(&out);
            assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-Type: text/plain");
            assert_eq!(body.len(), len);
            assert_eq!(body, data.as_slice());
        }
    }

    #[tokio::test]
    async fn content_type_from_table() {
        let dir = tempfile::tempdir().unwrap();
        let mime = MimeTypes::from_table("text/html html\nimage/png png\n", "text/plain");
        let config = Arc::new(crate::Config::new(dir.path(), 9898, mime).unwrap());

        fs::write(dir.path().join("index.html"), "<h1>hi</h1>").unwrap();
        fs::write(dir.path().join("README"), "readme").unwrap();

        let (_, out) = serve(&config, "index.html").await;
        let (head, body) = split_response(&out);
        assert_eq!(head, "HTTP/1.0 200 OK\r\nContent-Type: text/html");
        assert_eq!(body, b"<h1>hi</h1>");

        let (_, out) = serve(&config, "README").await;
        assert_eq!(split_response(&out).0, "HTTP/1.0 200 OK\r\nContent-Type: text/plain");
    }

    #[tokio::test]
    async fn vanished_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let (result, out) = serve(&config, "gone.txt").await;

        assert!(matches!(result, Err(ErrorKind::Io(_))));
        assert_eq!(result.unwrap_err().status(), StatusCode::InternalServerError);
        assert!(out.is_empty());
    }
}
