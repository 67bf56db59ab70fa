//! Canned HTTP responder for exercising the generation client
//!
//! Accepts one connection per scripted response, reads the full request and
//! answers with the script entry, then closes the connection.

#![allow(dead_code)]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// 10 x 20 x 30 box centered at (5, 5, 5)
pub const CUBE_OBJ: &str = "\
o cube
v 0 -5 -10
v 10 -5 -10
v 0 15 -10
v 10 15 -10
v 0 -5 20
v 10 -5 20
v 0 15 20
v 10 15 20
f 1 2 4 3
f 5 6 8 7
f 1 2 6 5
f 3 4 8 7
";

/// One scripted reply
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Accept and read the request but never answer
    pub hang: bool,
}

impl Canned {
    pub fn ok_obj(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
            hang: false,
        }
    }

    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
            hang: false,
        }
    }

    pub fn hang() -> Self {
        Self {
            status: 200,
            content_type: "text/plain",
            body: Vec::new(),
            hang: true,
        }
    }
}

/// Serve `script` in order; the handle yields every captured request
pub async fn serve(script: Vec<Canned>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for canned in script {
            let (mut socket, _) = listener.accept().await.unwrap();
            requests.push(read_request(&mut socket).await);

            if canned.hang {
                tokio::time::sleep(std::time::Duration::from_secs(30)).await;
                continue;
            }

            let head = format!(
                "HTTP/1.1 {} Canned\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                canned.status,
                canned.content_type,
                canned.body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&canned.body).await.unwrap();
            let _ = socket.shutdown().await;
        }
        requests
    });

    (url, handle)
}

/// URL of a port nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if request_complete(&buf) {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_complete(buf: &[u8]) -> bool {
    let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
    let body = &buf[end + 4..];

    if head.contains("transfer-encoding: chunked") {
        return body.ends_with(b"0\r\n\r\n");
    }
    let length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    body.len() >= length
}
