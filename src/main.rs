use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use torero_serve::config::Config;
use torero_serve::handler::Handler;
use torero_serve::listener::{install_signal_handlers, Listener};
use torero_serve::logger;
use torero_serve::pool::WorkerPool;
use torero_serve::queue::BoundedQueue;

/// Prints message to standard error and exits with code 1.
macro_rules! abort {
    ($($arg:tt)*) => ({
        eprint!("{}: ", env!("CARGO_PKG_NAME"));
        eprintln!($($arg)*);
        std::process::exit(1);
    })
}

fn main() {
    println!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    if let Err(e) = run() {
        abort!("{:#}", e);
    }
}

fn run() -> Result<()> {
    let config = Config::from_command_line()?;
    logger::init(config.log_level)?;
    install_signal_handlers()?;

    let listener = Listener::bind(config.socket_addr())?;
    let queue = Arc::new(BoundedQueue::new(config.queue_capacity));
    let handler = Handler::new(&config);
    let pool = WorkerPool::spawn(config.workers, Arc::clone(&queue), move |stream| {
        handler.handle(stream)
    })?;
    info!(
        "serving {} with {} workers, up to {} connections waiting",
        config.wwwroot,
        pool.size(),
        queue.capacity()
    );

    listener.run(&queue)?;

    // Workers die with the process; whatever they were serving is abandoned.
    info!("shutting down, {} connections left waiting", queue.len());
    Ok(())
}
