//! Throwaway HTTP/1.1 server for exercising real `reqwest` requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// One step of a streamed (chunked) response body.
#[derive(Clone, Debug)]
pub enum BodyStep {
    Send(Vec<u8>),
    Pause(Duration),
    /// Keep the connection open without sending anything more.
    Hold,
    /// Close the connection without finishing the chunked body.
    Drop,
}

#[derive(Clone, Debug)]
pub enum CannedResponse {
    Fixed {
        status: u16,
        content_type: &'static str,
        body: String,
    },
    Streamed {
        content_type: &'static str,
        steps: Vec<BodyStep>,
    },
}

impl CannedResponse {
    pub fn json(status: u16, body: &str) -> Self {
        CannedResponse::Fixed {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    /// Chunked 200 response; the body ends after the last step unless a step holds.
    pub fn streamed(content_type: &'static str, steps: Vec<BodyStep>) -> Self {
        CannedResponse::Streamed {
            content_type,
            steps,
        }
    }

    /// Chunked response sending each piece with a short pause between them.
    pub fn chunks(content_type: &'static str, pieces: &[&str]) -> Self {
        let mut steps = Vec::new();
        for piece in pieces {
            steps.push(BodyStep::Send(piece.as_bytes().to_vec()));
            steps.push(BodyStep::Pause(Duration::from_millis(5)));
        }
        Self::streamed(content_type, steps)
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub request_line: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

pub struct MockServer {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn requests(&self) -> Vec<String> {
        self.recorded
            .lock()
            .await
            .iter()
            .map(|request| request.request_line.clone())
            .collect()
    }

    pub async fn recorded(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().await.clone()
    }
}

/// Client that never routes through a proxy from the environment.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client should build")
}

/// Serve `responses` in order, one per accepted connection.
pub async fn spawn_http_server(responses: Vec<CannedResponse>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    let recorded = Arc::new(Mutex::new(Vec::new()));
    let recorded_for_server = Arc::clone(&recorded);

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let recorded = Arc::clone(&recorded_for_server);
            tokio::spawn(async move {
                if let Ok(request) = read_http_request(&mut stream).await {
                    recorded.lock().await.push(request);
                    let _ = write_response(&mut stream, response).await;
                }
            });
        }
    });

    MockServer {
        base_url: format!("http://{addr}"),
        recorded,
    }
}

async fn write_response(stream: &mut TcpStream, response: CannedResponse) -> std::io::Result<()> {
    match response {
        CannedResponse::Fixed {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                reason(status),
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(body.as_bytes()).await?;
            stream.shutdown().await
        }
        CannedResponse::Streamed {
            content_type,
            steps,
        } => {
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: {content_type}\r\ntransfer-encoding: chunked\r\n\r\n"
            );
            stream.write_all(head.as_bytes()).await?;
            stream.flush().await?;
            for step in steps {
                match step {
                    BodyStep::Send(bytes) => {
                        if bytes.is_empty() {
                            continue;
                        }
                        stream
                            .write_all(format!("{:x}\r\n", bytes.len()).as_bytes())
                            .await?;
                        stream.write_all(&bytes).await?;
                        stream.write_all(b"\r\n").await?;
                        stream.flush().await?;
                    }
                    BodyStep::Pause(duration) => tokio::time::sleep(duration).await,
                    BodyStep::Hold => {
                        std::future::pending::<()>().await;
                    }
                    BodyStep::Drop => return Ok(()),
                }
            }
            stream.write_all(b"0\r\n\r\n").await?;
            stream.flush().await?;
            stream.shutdown().await
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn read_http_request(stream: &mut TcpStream) -> Result<RecordedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut content_length = 0_usize;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length.saturating_sub(body.len())];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(RecordedRequest { request_line, body })
}
