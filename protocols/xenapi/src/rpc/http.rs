/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use tap::TapFallible;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader,
};
use tokio::net::UnixStream;

use crate::config::HttpsStrategy;

use super::{
    decode_response, encode_call, unwrap_envelope, Connector, Error, Result,
    Target, Transport, Value,
};

/// Opens XML-RPC transports to XAPI.
#[derive(Debug, Clone)]
pub struct XmlRpcConnector {
    https_strategy: HttpsStrategy,
    timeout: Option<Duration>,
    local_socket: PathBuf,
}

#[derive(Debug)]
pub struct XmlRpcTransport {
    channel: Channel,
    timeout: Option<Duration>,
}

#[derive(Debug)]
enum Channel {
    Http { client: Client, url: Url },
    Unix { path: PathBuf },
}

impl XmlRpcConnector {
    pub fn new(
        https_strategy: HttpsStrategy,
        timeout: Option<Duration>,
        local_socket: PathBuf,
    ) -> Self {
        Self {
            https_strategy,
            timeout,
            local_socket,
        }
    }

    fn create_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .user_agent("SmartAgent")
            .danger_accept_invalid_hostnames(matches!(
                self.https_strategy,
                HttpsStrategy::IgnoreHostname
            ))
            .danger_accept_invalid_certs(matches!(
                self.https_strategy,
                HttpsStrategy::IgnoreCertificate
            ));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().map_err(Error::BuildClient)
    }
}

#[async_trait]
impl Connector for XmlRpcConnector {
    type Transport = XmlRpcTransport;

    async fn connect(&self, target: &Target) -> Result<XmlRpcTransport> {
        let channel = match target {
            Target::Local => {
                debug!(
                    "using local xapi socket {}",
                    self.local_socket.display()
                );
                Channel::Unix {
                    path: self.local_socket.clone(),
                }
            }
            Target::Remote(url) => {
                let parsed = Url::parse(url)
                    .ok()
                    .filter(|u| matches!(u.scheme(), "http" | "https"))
                    .ok_or_else(|| Error::UnsupportedUrl(url.clone()))?;
                debug!("using xapi endpoint {parsed}");
                Channel::Http {
                    client: self.create_client()?,
                    url: parsed,
                }
            }
        };
        Ok(XmlRpcTransport {
            channel,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl Transport for XmlRpcTransport {
    async fn request(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value> {
        let body = encode_call(method, &params);
        trace!("sending {method} ({} bytes)", body.len());
        let response = match &self.channel {
            Channel::Http { client, url } => {
                post_http(client, url, body).await?
            }
            Channel::Unix { path } => match self.timeout {
                Some(timeout) => {
                    tokio::time::timeout(timeout, post_unix(path, body))
                        .await
                        .map_err(|_| {
                            Error::Io(io::Error::new(
                                io::ErrorKind::TimedOut,
                                "timeout waiting for xapi socket",
                            ))
                        })??
                }
                None => post_unix(path, body).await?,
            },
        };
        unwrap_envelope(decode_response(&response)?)
            .tap_err(|e| trace!("{method} failed: {e}"))
    }
}

async fn post_http(client: &Client, url: &Url, body: String) -> Result<String> {
    client
        .post(url.clone())
        .header(CONTENT_TYPE, HeaderValue::from_static("text/xml"))
        .body(body)
        .send()
        .await
        .map_err(Error::Http)?
        .error_for_status()
        .map_err(Error::Http)?
        .text()
        .await
        .map_err(Error::Http)
}

async fn post_unix(path: &Path, body: String) -> Result<String> {
    let mut socket = UnixStream::connect(path).await?;
    let head = format!(
        "POST / HTTP/1.0\r\n\
         Host: localhost\r\n\
         Content-Type: text/xml\r\n\
         Content-Length: {}\r\n\r\n",
        body.len()
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(body.as_bytes()).await?;

    read_response(BufReader::new(socket)).await
}

/// Read one HTTP/1.x response and return its body if the status is 200.
///
/// The body is bounded by `Content-Length` when the server sends one, so a
/// connection held open after the response does not stall the request.
async fn read_response<R>(mut reader: R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let status = line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| Error::Malformed(String::from("missing status line")))?;

    let mut length = None;
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(Error::Malformed(String::from(
                "incomplete http response",
            )));
        }
        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                length = Some(value.trim().parse::<usize>().map_err(|_| {
                    Error::Malformed(format!("invalid content-length {value}"))
                })?);
            }
        }
    }
    if status != 200 {
        return Err(Error::Status(status));
    }

    let mut body = Vec::new();
    match length {
        Some(length) => {
            body.resize(length, 0);
            reader.read_exact(&mut body).await?;
        }
        None => {
            reader.read_to_end(&mut body).await?;
        }
    }
    String::from_utf8(body).map_err(|_| {
        Error::Malformed(String::from("response is not valid utf-8"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = "<methodResponse><params><param><value><struct>\
        <member><name>Status</name><value>Success</value></member>\
        <member><name>Value</name><value>OpaqueRef:host-1</value></member>\
        </struct></value></param></params></methodResponse>";

    #[tokio::test]
    async fn response_body() {
        let response: &[u8] =
            b"HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\n\r\n<x/>";
        assert_eq!(read_response(response).await.unwrap(), "<x/>");
    }

    #[tokio::test]
    async fn content_length_bounds_body() {
        let response: &[u8] =
            b"HTTP/1.1 200 OK\r\ncontent-length: 4\r\n\r\n<x/>trailing";
        assert_eq!(read_response(response).await.unwrap(), "<x/>");
    }

    #[tokio::test]
    async fn response_status() {
        let response: &[u8] = b"HTTP/1.1 500 Internal Error\r\n\r\noops";
        assert!(matches!(
            read_response(response).await,
            Err(Error::Status(500))
        ));
        let response: &[u8] = b"HTTP/1.1 200 OK\r\n";
        assert!(matches!(
            read_response(response).await,
            Err(Error::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn local_socket_kept_open() {
        let path = std::env::temp_dir()
            .join(format!("xenapi-keepalive-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0; 4096];
            let _ = socket.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{ENVELOPE}",
                ENVELOPE.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            /* Hold the connection without closing it. */
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(socket);
        });

        let connector =
            XmlRpcConnector::new(HttpsStrategy::Strict, None, path.clone());
        let transport = connector.connect(&Target::Local).await.unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            transport.request("session.get_this_host", Vec::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result, Value::from("OpaqueRef:host-1"));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn remote_target_requires_http() {
        let connector = XmlRpcConnector::new(
            HttpsStrategy::Strict,
            None,
            PathBuf::from("/var/lib/xcp/xapi"),
        );
        assert!(matches!(
            connector
                .connect(&Target::Remote("unix://10.0.0.1".to_string()))
                .await,
            Err(Error::UnsupportedUrl(_))
        ));
        assert!(connector
            .connect(&Target::Remote("https://10.0.0.1".to_string()))
            .await
            .is_ok());
        assert!(connector.connect(&Target::Local).await.is_ok());
    }
}
