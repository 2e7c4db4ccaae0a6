//! In-process scripted Telnet device for integration tests.
//!
//! Binds an ephemeral port and plays one of several device behaviors per
//! accepted connection. Tracks the number of currently-open connections
//! so tests can assert that `close_all` releases every socket.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use telpool::DeviceEndpoint;

const IAC: u8 = 255;
const DO: u8 = 253;
const WILL: u8 = 251;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Full login flow, then echo commands with canned output.
    Normal,
    /// Like Normal but every prompt is written in several small chunks.
    ChunkedPrompts,
    /// Sends the username prompt, reads the username, then goes silent.
    NoPasswordPrompt,
    /// Loops back to the username prompt after the password is submitted.
    RejectPassword,
    /// Accepts the connection and never writes anything.
    Mute,
}

pub struct FakeDevice {
    pub addr: SocketAddr,
    open: Arc<AtomicUsize>,
}

impl FakeDevice {
    pub async fn spawn(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let open = Arc::new(AtomicUsize::new(0));

        let counter = open.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let counter = counter.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, behavior).await;
                    counter.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });

        Self { addr, open }
    }

    /// Endpoint pointing at this fake device.
    pub fn endpoint(&self, username: &str, password: &str) -> DeviceEndpoint {
        DeviceEndpoint::new(self.addr.ip().to_string(), username, password)
            .with_port(self.addr.port())
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Wait until every accepted connection has been torn down.
    pub async fn assert_no_open_connections(&self, within: Duration) {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.open_connections() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} connection(s) still open", self.open_connections());
    }
}

/// An address that refuses connections: bind an ephemeral port, then
/// drop the listener so nothing is listening there.
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn handle_connection(mut stream: TcpStream, behavior: Behavior) -> std::io::Result<()> {
    if behavior == Behavior::Mute {
        // Hold the connection open until the client goes away.
        while read_line(&mut stream).await.is_some() {}
        return Ok(());
    }

    // Real devices open with option negotiation before any banner.
    stream.write_all(&[IAC, DO, 1, IAC, WILL, 3]).await?;

    let chunked = behavior == Behavior::ChunkedPrompts;
    write_prompt(&mut stream, "\r\nUser Access Verification\r\n\r\nUsername: ", chunked).await?;
    let Some(_username) = read_line(&mut stream).await else {
        return Ok(());
    };

    if behavior == Behavior::NoPasswordPrompt {
        while read_line(&mut stream).await.is_some() {}
        return Ok(());
    }

    write_prompt(&mut stream, "Password: ", chunked).await?;
    let Some(_password) = read_line(&mut stream).await else {
        return Ok(());
    };

    if behavior == Behavior::RejectPassword {
        write_prompt(&mut stream, "\r\n% Login invalid\r\n\r\nUsername: ", chunked).await?;
        while read_line(&mut stream).await.is_some() {}
        return Ok(());
    }

    write_prompt(&mut stream, "\r\nswitch>", chunked).await?;

    while let Some(command) = read_line(&mut stream).await {
        let command = command.trim();
        if command == "hang" {
            // Swallow the command and never answer.
            continue;
        }
        let response = format!(
            "{}\r\n{}\r\nswitch>",
            command,
            canned_output(command)
        );
        write_prompt(&mut stream, &response, chunked).await?;
    }

    Ok(())
}

fn canned_output(command: &str) -> String {
    match command {
        "show ip inter bri" => "Interface      IP-Address    OK? Method Status    Protocol\r\n\
             Vlan1          10.10.10.2    YES NVRAM  up        up"
            .to_string(),
        "term len 0" => "paging disabled".to_string(),
        other => format!("%% ran: {}", other),
    }
}

/// Write text either whole or in small delayed chunks, so tests cover
/// prompts that arrive split across reads.
async fn write_prompt(stream: &mut TcpStream, text: &str, chunked: bool) -> std::io::Result<()> {
    if !chunked {
        stream.write_all(text.as_bytes()).await?;
        return stream.flush().await;
    }

    for piece in text.as_bytes().chunks(4) {
        stream.write_all(piece).await?;
        stream.flush().await?;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Read one CRLF line, dropping Telnet refusals and other control bytes
/// the client may interleave.
async fn read_line(stream: &mut TcpStream) -> Option<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = stream.read(&mut byte).await.ok()?;
        if n == 0 {
            return None;
        }
        match byte[0] {
            b'\n' => break,
            b @ 0x20..=0x7e => line.push(b),
            _ => {}
        }
    }
    Some(String::from_utf8_lossy(&line).to_string())
}
