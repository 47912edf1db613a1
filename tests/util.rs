use std::fs::{create_dir, write};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::{tempdir, TempDir};

const BIN: &str = env!("CARGO_BIN_EXE_torero-serve");

fn get_unused_port() -> Option<u16> {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .ok()
        .map(|listener| listener.local_addr().unwrap().port())
}

fn wait_for_port(port: u16) -> bool {
    for _ in 0..1000 {
        if TcpStream::connect((Ipv4Addr::LOCALHOST, port)).is_ok() {
            return true;
        }
        sleep(Duration::from_millis(5));
    }
    false
}

/// Run the binary to completion, for invocations that are expected to exit on their own.
pub fn run(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .output()
        .expect("failed to run torero-serve")
}

struct ScopedChild(Child);

impl Drop for ScopedChild {
    fn drop(&mut self) {
        self.0.kill().ok();
        self.0.wait().ok();
    }
}

/// A running server on a fresh port, serving a temporary document root.
pub struct Server {
    child: ScopedChild,
    port: u16,
    root: TempDir,
}

impl Server {
    /// Start the server with `args` after the positional arguments.
    pub fn with_args(args: &[&str]) -> Self {
        let root = tempdir().expect("failed to create tempdir");

        // Assumes the port won't be reused before the server binds it.
        let port = get_unused_port().expect("failed to get unused port");

        let port_arg = port.to_string();
        let child = Command::new(BIN)
            .args(&[
                port_arg.as_str(),
                root.path().to_str().expect("path is not valid UTF-8"),
                "--addr",
                "127.0.0.1",
            ])
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn torero-serve");
        let child = ScopedChild(child);

        assert!(wait_for_port(port), "failed to connect to torero-serve");

        Self { child, port, root }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    pub fn create_dir(&self, name: &str) {
        create_dir(self.root().join(name)).expect("failed to create directory");
    }

    pub fn create_file(&self, name: &str, contents: impl AsRef<[u8]>) {
        write(self.root().join(name), contents).expect("failed to create file");
    }

    pub fn stream(&self) -> TcpStream {
        connect(self.addr())
    }

    /// Send raw bytes and collect everything until the server closes.
    pub fn request(&self, request: &[u8]) -> Vec<u8> {
        send_request(self.addr(), request)
    }

    pub fn request_text(&self, request: &[u8]) -> String {
        String::from_utf8(self.request(request)).expect("response is not valid UTF-8")
    }

    /// Deliver `signal` and wait for the server to exit.
    pub fn stop(&mut self, signal: Signal) -> ExitStatus {
        let child = &mut self.child.0;
        kill(Pid::from_raw(child.id() as i32), signal).expect("failed to signal torero-serve");
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(status) = child.try_wait().expect("failed to wait for torero-serve") {
                return status;
            }
            assert!(Instant::now() < deadline, "torero-serve did not exit");
            sleep(Duration::from_millis(10));
        }
    }
}

pub fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).expect("failed to connect to torero-serve");
    // Set timeouts to prevent tests from hanging
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
        .set_write_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

pub fn send_request(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = connect(addr);
    stream.write_all(request).expect("failed to send request");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .expect("failed to read response");
    response
}
