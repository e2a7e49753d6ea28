//! Loopback listener that receives the OAuth redirect.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use url::Url;

/// How long to wait for the user to finish signing in.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body><h3>Signed in.</h3>\
    <p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Sign-in failed.</h3>\
    <p>Check the terminal for details.</p></body></html>";

/// What the redirect carried.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Redirect {
    Code(String),
    Error(String),
    /// Unrelated request (favicon etc.)
    Ignored,
}

/// Parse the request line of an HTTP GET into a redirect outcome.
pub(crate) fn parse_request_line(line: &str) -> Redirect {
    let mut parts = line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Redirect::Ignored;
    };
    let Ok(url) = Url::parse(&format!("http://localhost{}", target)) else {
        return Redirect::Ignored;
    };
    if url.path() != "/callback" {
        return Redirect::Ignored;
    }

    let mut code = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "error_description" => error = Some(v.into_owned()),
            "error" if error.is_none() => error = Some(v.into_owned()),
            _ => {}
        }
    }
    match (code, error) {
        (Some(c), _) => Redirect::Code(c),
        (None, Some(e)) => Redirect::Error(e),
        (None, None) => Redirect::Ignored,
    }
}

/// Bind the redirect port. Done before opening the browser so the
/// redirect cannot race the listener.
pub(crate) async fn bind(port: u16) -> Result<TcpListener> {
    TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to listen on localhost:{} for the OAuth redirect", port))
}

/// Accept connections until one carries an authorization code or error.
pub(crate) async fn wait_for_code(listener: TcpListener) -> Result<String> {
    tokio::time::timeout(LOGIN_TIMEOUT, accept_code(&listener))
        .await
        .context("Timed out waiting for the browser sign-in")?
}

async fn accept_code(listener: &TcpListener) -> Result<String> {
    loop {
        let (mut stream, peer) = listener.accept().await.context("Accept failed")?;
        tracing::debug!("Redirect connection from {}", peer);

        let (reader, mut writer) = stream.split();
        let mut line = String::new();
        BufReader::new(reader)
            .read_line(&mut line)
            .await
            .context("Failed to read redirect request")?;

        let outcome = parse_request_line(&line);
        let (status, page) = match outcome {
            Redirect::Code(_) => ("200 OK", SUCCESS_PAGE),
            Redirect::Error(_) => ("400 Bad Request", FAILURE_PAGE),
            Redirect::Ignored => ("404 Not Found", ""),
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            page.len(),
            page
        );
        if let Err(e) = writer.write_all(response.as_bytes()).await {
            tracing::debug!("Failed to answer redirect: {}", e);
        }

        match outcome {
            Redirect::Code(code) => return Ok(code),
            Redirect::Error(e) => bail!("Provider rejected sign-in: {}", e),
            Redirect::Ignored => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code() {
        assert_eq!(
            parse_request_line("GET /callback?code=abc-123 HTTP/1.1\r\n"),
            Redirect::Code("abc-123".to_string())
        );
    }

    #[test]
    fn test_parse_error_prefers_description() {
        assert_eq!(
            parse_request_line(
                "GET /callback?error=access_denied&error_description=User+cancelled HTTP/1.1"
            ),
            Redirect::Error("User cancelled".to_string())
        );
    }

    #[test]
    fn test_parse_ignores_other_paths() {
        assert_eq!(
            parse_request_line("GET /favicon.ico HTTP/1.1"),
            Redirect::Ignored
        );
        assert_eq!(parse_request_line("POST /callback HTTP/1.1"), Redirect::Ignored);
        assert_eq!(parse_request_line(""), Redirect::Ignored);
    }

    #[tokio::test]
    async fn test_wait_for_code_over_loopback() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let client = tokio::spawn(async move {
            let mut s = tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .unwrap();
            s.write_all(b"GET /callback?code=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
        });

        let code = wait_for_code(listener).await.unwrap();
        assert_eq!(code, "xyz");
        client.await.unwrap();
    }
}
