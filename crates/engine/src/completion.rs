//! Completion queue (spec.md §4.4, component C4): the hand-off point
//! where background workers deposit finished swap work for the single
//! executor thread to drain.
//!
//! Workers notify the executor through a self-pipe (`pipe(2)`, unix
//! only): the executor blocks in its own event loop on the pipe's read
//! end alongside its client sockets, and a worker finishing work writes
//! one byte to wake it rather than the executor having to poll.

use parking_lot::Mutex;
use std::collections::VecDeque;
use swapcore_core::SwapError;
use swapcore_storage::RioResult;

/// What a finished background RIO batch carries back to the executor.
pub enum CompletionPayload {
    /// The RIOs for this request ran to completion; results are in
    /// submission order.
    Rio(Vec<RioResult>),
    /// The engine call itself failed.
    Failed(SwapError),
}

/// One finished piece of work, tagged with the token the executor used
/// to track its in-flight swap context.
pub struct SwapResultEnvelope {
    /// Caller-chosen token identifying which in-flight request this
    /// result belongs to.
    pub token: usize,
    /// The outcome.
    pub payload: CompletionPayload,
}

struct Inner {
    queue: VecDeque<SwapResultEnvelope>,
}

/// Shared completion queue plus its wake-pipe.
pub struct CompletionQueue {
    inner: Mutex<Inner>,
    wake: Wake,
}

impl Default for CompletionQueue {
    fn default() -> Self {
        CompletionQueue::new()
    }
}

impl CompletionQueue {
    /// A fresh, empty queue with its wake-pipe opened.
    pub fn new() -> Self {
        CompletionQueue { inner: Mutex::new(Inner { queue: VecDeque::new() }), wake: Wake::open() }
    }

    /// Push one result and wake the executor.
    pub fn push(&self, envelope: SwapResultEnvelope) {
        self.inner.lock().queue.push_back(envelope);
        self.wake.signal();
    }

    /// Drain every currently queued result, clearing the wake signal.
    pub fn drain(&self) -> Vec<SwapResultEnvelope> {
        self.wake.clear();
        let mut guard = self.inner.lock();
        guard.queue.drain(..).collect()
    }

    /// `true` if nothing is queued right now.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    /// The file descriptor the executor's event loop should poll for
    /// readability alongside its client sockets.
    #[cfg(unix)]
    pub fn wake_fd(&self) -> std::os::unix::io::RawFd {
        self.wake.read_fd
    }

    /// Block the calling thread until at least one byte has been
    /// written to the wake pipe, then clear it. Used by callers with no
    /// event loop of their own (spec.md §9 "no async/await runtime is
    /// required on the executor side"); a real event-loop integration
    /// would instead register [`Self::wake_fd`] for readability.
    #[cfg(unix)]
    pub fn wait(&self) {
        self.wake.block_until_signaled();
    }
}

#[cfg(unix)]
struct Wake {
    read_fd: std::os::unix::io::RawFd,
    write_fd: std::os::unix::io::RawFd,
    last_eagain_log: Mutex<Option<std::time::Instant>>,
}

#[cfg(unix)]
impl Wake {
    fn open() -> Self {
        let mut fds = [0i32; 2];
        // SAFETY: `fds` is a valid two-element buffer for pipe(2).
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        assert_eq!(rc, 0, "pipe(2) failed while opening the completion-queue wake pipe");
        // Both ends are non-blocking: the write end so a full pipe
        // never stalls a worker thread (spec.md §4.7 — a failed write
        // just means a wake is already pending), the read end so
        // `clear` can drain every pending byte without hanging once the
        // pipe runs dry. `wait` parks on `poll(2)` instead of a blocking
        // `read`, the standard self-pipe idiom.
        unsafe {
            for fd in fds {
                let flags = libc::fcntl(fd, libc::F_GETFL);
                libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
            }
        }
        Wake { read_fd: fds[0], write_fd: fds[1], last_eagain_log: Mutex::new(None) }
    }

    fn signal(&self) {
        let byte = 1u8;
        // SAFETY: write_fd is a valid, open pipe write end; a short
        // write of one byte cannot happen, only EAGAIN if the pipe's
        // buffer is full, which only means a wake is already pending.
        let rc = unsafe { libc::write(self.write_fd, &byte as *const u8 as *const libc::c_void, 1) };
        if rc < 0 {
            self.log_eagain_rate_limited();
        }
    }

    fn log_eagain_rate_limited(&self) {
        let mut last = self.last_eagain_log.lock();
        let now = std::time::Instant::now();
        if last.map(|t| now.duration_since(t).as_secs() >= 1).unwrap_or(true) {
            tracing::warn!("completion-queue wake pipe full; a wake notification was dropped");
            *last = Some(now);
        }
    }

    /// Park until the pipe is readable, i.e. at least one wake byte is
    /// pending. Does not consume it; callers follow up with `clear`.
    fn block_until_signaled(&self) {
        let mut pfd = libc::pollfd { fd: self.read_fd, events: libc::POLLIN, revents: 0 };
        loop {
            // SAFETY: pfd is one valid pollfd entry; -1 timeout blocks
            // indefinitely until the read end becomes readable.
            let rc = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, -1) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
            }
            return;
        }
    }

    fn clear(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: buf is a valid 64-byte buffer; read_fd is
            // non-blocking, so a dry pipe returns EAGAIN rather than
            // hanging the executor thread.
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }
}

#[cfg(unix)]
impl Drop for Wake {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_drain_preserves_order() {
        let q = CompletionQueue::new();
        q.push(SwapResultEnvelope { token: 1, payload: CompletionPayload::Rio(Vec::new()) });
        q.push(SwapResultEnvelope { token: 2, payload: CompletionPayload::Rio(Vec::new()) });
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].token, 1);
        assert_eq!(drained[1].token, 2);
        assert!(q.is_empty());
    }
}
