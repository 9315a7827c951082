//! HTTP client for a remote schema backend.
//!
//! Routes:
//! - `POST /upload` multipart form with a `file` part
//! - `POST /reload` the raw events array as the JSON body
//! - `POST /update` `{id, key, value}`
//! - `GET /node?ID=<id>` sub-tree lookup

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::traits::{DocumentEndpoint, SubtreeFetcher};
use crate::error::AppError;
use crate::models::{DocumentSnapshot, ElementList, FieldEdit};

/// Remote schema backend.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decodes a success body. The backend does not always label its JSON
    /// with a JSON content type, so the body is parsed from bytes.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::backend(status.as_u16(), &body));
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SubtreeFetcher for HttpBackend {
    async fn fetch_subtree(&self, node_id: &str) -> Result<ElementList, AppError> {
        let response = self
            .client
            .get(self.url("/node"))
            .query(&[("ID", node_id)])
            .send()
            .await?;
        Self::read_json(response).await.map_err(|e| match e {
            AppError::Backend { title, .. } => {
                AppError::SubtreeUnavailable(format!("{node_id}: {title}"))
            }
            other => other,
        })
    }
}

#[async_trait]
impl DocumentEndpoint for HttpBackend {
    async fn upload(&self, file_name: &str, contents: Vec<u8>) -> Result<DocumentSnapshot, AppError> {
        let part = Part::bytes(contents).file_name(file_name.to_string());
        let form = Form::new().part("file", part);
        let response = self
            .client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn reload(&self, schema_json: &Value) -> Result<DocumentSnapshot, AppError> {
        let response = self
            .client
            .post(self.url("/reload"))
            .json(schema_json)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn update_field(&self, edit: &FieldEdit) -> Result<DocumentSnapshot, AppError> {
        let response = self
            .client
            .post(self.url("/update"))
            .json(edit)
            .send()
            .await?;
        Self::read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and hands back the request head.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // Read the head, then as much body as Content-Length announces.
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn backend(url: &str) -> HttpBackend {
        HttpBackend::new(url, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_subtree_sends_id_query() {
        let body = r#"{"nodes":[{"data":{"id":"A1"}}],"edges":[]}"#;
        let (url, server) = serve_once("200 OK", body).await;

        let list = backend(&url).fetch_subtree("A").await.unwrap();
        assert_eq!(list.nodes.len(), 1);
        assert_eq!(list.nodes[0].id(), "A1");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /node?ID=A "));
    }

    #[tokio::test]
    async fn test_fetch_subtree_failure_is_unavailable() {
        let (url, _server) = serve_once("400 BAD REQUEST", "Parsing error! Upload the file again.").await;
        let err = backend(&url).fetch_subtree("A").await.unwrap_err();
        assert!(matches!(err, AppError::SubtreeUnavailable(ref m) if m.contains("Parsing error")));
    }

    #[tokio::test]
    async fn test_reload_error_carries_title() {
        let page = "<html><head><title>KeyError: 'children_gate' // Werkzeug Debugger</title></head></html>";
        let (url, _server) = serve_once("500 INTERNAL SERVER ERROR", page).await;

        let err = backend(&url).reload(&serde_json::json!([])).await.unwrap_err();
        match &err {
            AppError::Backend { status, title } => {
                assert_eq!(*status, 500);
                assert_eq!(title, "KeyError: 'children_gate'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.user_message(), crate::error::MISSING_CHILDREN_GATE_HINT);
    }

    #[tokio::test]
    async fn test_upload_posts_multipart_file() {
        let body = r#"{"name":"Events/1/Outbreak","parsedSchema":{"nodes":[],"edges":[]},"schemaJson":[]}"#;
        let (url, server) = serve_once("200 OK", body).await;

        let snapshot = backend(&url)
            .upload("schema.json", br#"{"events":[]}"#.to_vec())
            .await
            .unwrap();
        assert_eq!(snapshot.name, "Events/1/Outbreak");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /upload "));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains("filename=\"schema.json\""));
    }
}
