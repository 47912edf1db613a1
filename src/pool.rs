use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tracing::debug;

use crate::queue::BoundedQueue;

/// Fixed set of long-lived worker threads draining a [`BoundedQueue`].
///
/// Workers run until the process exits. A job that fails must report it itself; the worker only
/// moves on to the next item.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers, each looping over `queue.dequeue()` and handing the item to `job`.
    pub fn spawn<T, F>(size: usize, queue: Arc<BoundedQueue<T>>, job: F) -> Result<Self>
    where
        T: Send + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let workers = (0..size)
            .map(|id| {
                let queue = Arc::clone(&queue);
                let job = Arc::clone(&job);
                thread::Builder::new()
                    .name(format!("worker-{}", id))
                    .spawn(move || {
                        debug!("worker {} started", id);
                        loop {
                            job(queue.dequeue());
                        }
                    })
                    .with_context(|| format!("failed to spawn worker thread {}", id))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { workers })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn processes_every_item() {
        let queue = Arc::new(BoundedQueue::new(4));
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let pool = WorkerPool::spawn(3, Arc::clone(&queue), move |item: u32| {
            tx.lock().unwrap().send(item * 2).unwrap();
        })
        .unwrap();
        assert_eq!(pool.size(), 3);

        for item in 0..50 {
            queue.enqueue(item);
        }
        let results: HashSet<u32> = (0..50)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(results, (0..50).map(|item| item * 2).collect());
    }

    #[test]
    fn items_run_on_named_workers() {
        let queue = Arc::new(BoundedQueue::new(1));
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let _pool = WorkerPool::spawn(2, Arc::clone(&queue), move |_: ()| {
            let name = thread::current().name().map(str::to_string);
            tx.lock().unwrap().send(name).unwrap();
        })
        .unwrap();

        queue.enqueue(());
        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("worker-"), "unexpected thread name {}", name);
    }

    #[test]
    fn failed_job_does_not_stop_worker() {
        let queue = Arc::new(BoundedQueue::new(2));
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let _pool = WorkerPool::spawn(1, Arc::clone(&queue), move |item: i32| {
            let outcome: Result<i32, String> = if item < 0 {
                Err(format!("bad item {}", item))
            } else {
                Ok(item)
            };
            tx.lock().unwrap().send(outcome).unwrap();
        })
        .unwrap();

        queue.enqueue(-1);
        queue.enqueue(7);
        assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap().is_err());
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(7));
    }
}
