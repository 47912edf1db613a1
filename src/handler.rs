//! Per-connection state machine: read one request, decide, respond, close.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::listing::Listing;
use crate::mime::MimeMap;
use crate::request::{fallback_version, Malformed, Request, FALLBACK_VERSION};
use crate::resource::{make_safe_url, Resource};
use crate::response::{Reply, Sender, Status};

/// The whole request must arrive in a single receive of at most this many bytes.
pub const RECV_BUFFER_SIZE: usize = 2048;

#[derive(Debug)]
enum State {
    Reading,
    Parsing(Vec<u8>),
    Resolving(Request),
    Responding(Reply),
    Closed(Exchange),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Parsing(_) => "parsing",
            Self::Resolving(_) => "resolving",
            Self::Responding(_) => "responding",
            Self::Closed(_) => "closed",
        }
    }
}

/// What a completed connection amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    pub status: Status,
    /// Bytes written to the client, headers and framing included.
    pub sent: u64,
}

/// Serves one connection at a time; shared read-only between workers.
#[derive(Debug)]
pub struct Handler {
    wwwroot: String,
    mime_map: MimeMap,
    timeout: Option<Duration>,
    safe_paths: bool,
}

impl Handler {
    pub fn new(config: &Config) -> Self {
        Self {
            wwwroot: config.wwwroot.clone(),
            mime_map: MimeMap::default(),
            timeout: config.timeout,
            safe_paths: config.safe_paths,
        }
    }

    /// Serve `stream` to completion. The socket is closed when this returns, whatever happened.
    pub fn handle(&self, mut stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "-".to_string());
        if let Err(e) = stream
            .set_read_timeout(self.timeout)
            .and_then(|_| stream.set_write_timeout(self.timeout))
        {
            warn!("{}: failed to set socket timeouts: {}", peer, e);
        }
        match self.serve(&mut stream) {
            Ok(exchange) => debug!("{}: {} ({} bytes)", peer, exchange.status, exchange.sent),
            Err(e) => warn!("{}: {:#}", peer, e),
        }
    }

    /// Run the state machine over any byte stream.
    pub fn serve<S: Read + Write>(&self, stream: &mut S) -> Result<Exchange> {
        let mut state = State::Reading;
        loop {
            trace!("{}", state.name());
            state = match state {
                State::Reading => self.read(stream),
                State::Parsing(data) => self.parse(&data),
                State::Resolving(request) => self.resolve(request),
                State::Responding(reply) => self.respond(stream, reply)?,
                State::Closed(exchange) => return Ok(exchange),
            };
        }
    }

    fn read<R: Read>(&self, stream: &mut R) -> State {
        let mut buf = [0; RECV_BUFFER_SIZE];
        let error = loop {
            match stream.read(&mut buf) {
                Ok(recvd) => return State::Parsing(buf[..recvd].to_vec()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break e,
            }
        };
        if matches!(
            error.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ) {
            debug!("timed out waiting for request");
        } else {
            warn!("failed to receive request: {}", error);
        }
        State::Responding(Reply::BadRequest {
            version: FALLBACK_VERSION.to_string(),
        })
    }

    fn parse(&self, data: &[u8]) -> State {
        match Request::parse(data) {
            Ok(request) => State::Resolving(request),
            Err(Malformed) => State::Responding(Reply::BadRequest {
                version: fallback_version(data),
            }),
        }
    }

    fn resolve(&self, request: Request) -> State {
        let Request { target, version } = request;
        let target = if self.safe_paths {
            match make_safe_url(&target) {
                Some(target) => target,
                None => {
                    debug!("refusing target {} outside the document root", target);
                    return State::Responding(Reply::BadRequest { version });
                }
            }
        } else {
            target
        };

        let resource = Resource::resolve(&self.wwwroot, &target);
        debug!("GET {} {} -> {:?}", target, version, resource);
        let reply = match resource {
            Resource::File(path) | Resource::DirectoryIndex(path) => match File::open(&path) {
                Ok(file) => Reply::File {
                    content_type: self.mime_map.content_type(&path).to_string(),
                    version,
                    file,
                },
                Err(e) => {
                    debug!("failed to open {}: {}", path.display(), e);
                    Reply::NotFound { version }
                }
            },
            Resource::Listing(dir) => match Listing::read(&dir) {
                Ok(listing) => Reply::Listing { version, listing },
                Err(e) => {
                    warn!("failed to list {}: {}", dir.display(), e);
                    Reply::NotFound { version }
                }
            },
            Resource::NotFound => Reply::NotFound { version },
        };
        State::Responding(reply)
    }

    fn respond<W: Write>(&self, stream: &mut W, reply: Reply) -> Result<State> {
        let status = reply.status();
        let mut sender = Sender::new(stream);
        reply
            .send(&mut sender)
            .with_context(|| {
                format!(
                    "aborted {} response after {} bytes",
                    status,
                    sender.sent()
                )
            })?;
        Ok(State::Closed(Exchange {
            status,
            sent: sender.sent(),
        }))
    }
}
