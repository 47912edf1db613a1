//! Byte-exact replies and the send loop that delivers them.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};

use crate::listing::Listing;

/// Size of each read when streaming a file body.
pub const CHUNK_SIZE: usize = 4096;

const NOT_FOUND_BODY: &str = "<html><head><title>Ruh-roh! Page not found!</title></head>\
    <body><h1>404 Page Not Found! :'( :'( :'(</h1></body></html>";

/// Bytes sent after every body.
const BODY_TRAILER: &[u8] = b"\r\n\r\n";

/// Writes whole buffers, retrying short writes, and counts what went out.
#[derive(Debug)]
pub struct Sender<W> {
    inner: W,
    sent: u64,
}

impl<W: Write> Sender<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, sent: 0 }
    }

    /// Send all of `data`. A zero-length write means the peer closed and fails with `WriteZero`.
    pub fn send(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            match self.inner.write(data) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "peer closed the connection",
                    ))
                }
                Ok(n) => {
                    self.sent += n as u64;
                    data = &data[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Total bytes written so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Status codes this server answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A fully decided response, waiting to be written.
#[derive(Debug)]
pub enum Reply {
    BadRequest { version: String },
    NotFound { version: String },
    /// Stream an opened file (a requested file or a directory's `index.html`).
    File {
        version: String,
        file: File,
        content_type: String,
    },
    Listing { version: String, listing: Listing },
}

impl Reply {
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest { .. } => Status::BadRequest,
            Self::NotFound { .. } => Status::NotFound,
            Self::File { .. } | Self::Listing { .. } => Status::Ok,
        }
    }

    /// Write the reply to `sender`.
    pub fn send<W: Write>(self, sender: &mut Sender<W>) -> io::Result<()> {
        match self {
            Self::BadRequest { version } => {
                sender.send(format!("{} 400 BAD REQUEST\r\n\r\n", version).as_bytes())
            }
            Self::NotFound { version } => {
                sender.send(format!("{} 404 Not Found\r\n", version).as_bytes())?;
                sender.send(headers(NOT_FOUND_BODY.len() as u64, "text/html").as_bytes())?;
                sender.send(NOT_FOUND_BODY.as_bytes())?;
                sender.send(BODY_TRAILER)
            }
            Self::File {
                version,
                mut file,
                content_type,
            } => {
                let length = file.metadata()?.len();
                sender.send(ok_status_line(&version).as_bytes())?;
                sender.send(headers(length, &content_type).as_bytes())?;
                stream_body(sender, &mut file, length)?;
                sender.send(BODY_TRAILER)
            }
            Self::Listing { version, listing } => {
                let body = listing.to_string();
                sender.send(ok_status_line(&version).as_bytes())?;
                sender.send(headers(body.len() as u64, "text/html").as_bytes())?;
                sender.send(body.as_bytes())?;
                sender.send(BODY_TRAILER)
            }
        }
    }
}

// The space before CRLF is part of the wire format.
fn ok_status_line(version: &str) -> String {
    format!("{} 200 OK \r\n", version)
}

fn headers(content_length: u64, content_type: &str) -> String {
    format!(
        "Content-Length: {}\r\n\
        Content-Type: {}\r\n\
        \r\n",
        content_length, content_type
    )
}

/// Copy exactly `length` bytes of `body` in `CHUNK_SIZE` pieces.
fn stream_body<W: Write, R: Read>(
    sender: &mut Sender<W>,
    body: &mut R,
    length: u64,
) -> io::Result<()> {
    let mut body = body.take(length);
    let mut buf = [0; CHUNK_SIZE];
    let mut remaining = length;
    while remaining > 0 {
        let read = match body.read(&mut buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("file ended {} bytes short of its advertised length", remaining),
                ))
            }
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        sender.send(&buf[..read])?;
        remaining -= read as u64;
    }
    Ok(())
}
