//! Fences and the optional sync thread.
//!
//! Without the sync thread, pending fences are polled in submission order
//! with a zero timeout. With it, a background thread owning its own shared
//! GL context blocks on each fence in turn and wakes the render thread
//! through an eventfd.

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context as _, Result};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace, warn};
use virgl_core::limits::FENCE_WAIT_TIMEOUT_NS;
use virgl_gl::{GlApi, GlSync, SyncStatus};
use vmm_sys_util::eventfd::{EventFd, EFD_NONBLOCK};

use crate::callbacks::{GlContextHandle, GlContextParams, RendererCallbacks};

#[derive(Debug, Clone, Copy)]
struct Fence {
    id: u32,
    ctx_id: u32,
    sync: GlSync,
}

#[derive(Debug, Default)]
struct FenceLists {
    /// Submitted, not yet waited on by the sync thread.
    wait: VecDeque<Fence>,
    /// Signalled, not yet reported.
    signalled: Vec<Fence>,
    stopping: bool,
}

struct Shared {
    lists: Mutex<FenceLists>,
    cond: Condvar,
    eventfd: EventFd,
}

struct SyncThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    gl_ctx: GlContextHandle,
}

pub(crate) struct FenceManager {
    gl: Arc<dyn GlApi>,
    callbacks: Arc<dyn RendererCallbacks>,
    /// Submission-ordered fences when there is no sync thread.
    pending: VecDeque<Fence>,
    thread: Option<SyncThread>,
}

impl std::fmt::Debug for FenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FenceManager")
            .field("pending", &self.pending.len())
            .field("threaded", &self.thread.is_some())
            .finish()
    }
}

impl FenceManager {
    /// Build the manager, starting the sync thread when `threaded`. A thread
    /// that cannot be started leaves the manager polling.
    pub fn new(
        gl: Arc<dyn GlApi>,
        callbacks: Arc<dyn RendererCallbacks>,
        threaded: bool,
        version: (u32, u32),
    ) -> Self {
        let thread = if threaded {
            match SyncThread::start(&gl, &callbacks, version) {
                Ok(thread) => Some(thread),
                Err(e) => {
                    warn!("fence sync thread unavailable, polling instead: {e:#}");
                    None
                }
            }
        } else {
            None
        };
        Self {
            gl,
            callbacks,
            pending: VecDeque::new(),
            thread,
        }
    }

    pub fn is_threaded(&self) -> bool {
        self.thread.is_some()
    }

    pub fn create_fence(&mut self, fence_id: u32, ctx_id: u32) {
        let sync = self.gl.fence_sync();
        self.gl.flush();
        let fence = Fence {
            id: fence_id,
            ctx_id,
            sync,
        };
        trace!("fence {fence_id} for context {ctx_id}");
        match &self.thread {
            Some(thread) => {
                thread.shared.lists.lock().wait.push_back(fence);
                thread.shared.cond.notify_one();
            }
            None => self.pending.push_back(fence),
        }
    }

    /// Report the latest signalled fence through `write_fence`.
    pub fn check_fences(&mut self) {
        let mut latest = 0;
        match &self.thread {
            Some(thread) => {
                // Nonblocking; an empty counter reads as EAGAIN.
                match thread.shared.eventfd.read() {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => warn!("fence eventfd read failed: {e}"),
                }
                let signalled = std::mem::take(&mut thread.shared.lists.lock().signalled);
                for fence in signalled {
                    latest = latest.max(fence.id);
                    self.gl.delete_sync(fence.sync);
                }
            }
            None => {
                while let Some(fence) = self.pending.front().copied() {
                    let status = self.gl.client_wait_sync(fence.sync, false, 0);
                    if !status.is_signalled() {
                        if status == SyncStatus::WaitFailed {
                            warn!("wait on fence {} failed", fence.id);
                        }
                        break;
                    }
                    latest = fence.id;
                    self.gl.delete_sync(fence.sync);
                    self.pending.pop_front();
                }
            }
        }
        if latest != 0 {
            debug!("fence {latest} signalled");
            self.callbacks.write_fence(latest);
        }
    }

    /// Eventfd the embedder can poll, or -1 without the sync thread.
    pub fn poll_fd(&self) -> RawFd {
        self.thread.as_ref().map_or(-1, |t| t.shared.eventfd.as_raw_fd())
    }

    /// Forget every outstanding fence.
    pub fn reset(&mut self) {
        let mut dropped: Vec<Fence> = self.pending.drain(..).collect();
        if let Some(thread) = &self.thread {
            let mut lists = thread.shared.lists.lock();
            dropped.extend(lists.wait.drain(..));
            dropped.append(&mut lists.signalled);
        }
        for fence in dropped {
            trace!("dropping fence {} of context {}", fence.id, fence.ctx_id);
            self.gl.delete_sync(fence.sync);
        }
    }

    /// Stop the sync thread and drop every outstanding fence. Later fences
    /// are polled.
    pub fn shutdown(&mut self) {
        if let Some(thread) = &mut self.thread {
            thread.stop();
        }
        self.reset();
        // The thread has exited, so its context can go.
        if let Some(thread) = self.thread.take() {
            self.callbacks.destroy_gl_context(thread.gl_ctx);
        }
    }
}

impl Drop for FenceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Sync thread
// ---------------------------------------------------------------------------

impl SyncThread {
    fn start(
        gl: &Arc<dyn GlApi>,
        callbacks: &Arc<dyn RendererCallbacks>,
        (major_ver, minor_ver): (u32, u32),
    ) -> Result<Self> {
        let params = GlContextParams {
            shared: true,
            major_ver,
            minor_ver,
        };
        let gl_ctx = callbacks
            .create_gl_context(0, &params)
            .ok_or_else(|| anyhow!("no GL context for the sync thread"))?;
        let eventfd = match EventFd::new(EFD_NONBLOCK) {
            Ok(fd) => fd,
            Err(e) => {
                callbacks.destroy_gl_context(gl_ctx);
                return Err(e).context("creating fence eventfd");
            }
        };
        let shared = Arc::new(Shared {
            lists: Mutex::new(FenceLists::default()),
            cond: Condvar::new(),
            eventfd,
        });

        let handle = {
            let gl = Arc::clone(gl);
            let callbacks = Arc::clone(callbacks);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("virgl-fence-sync".to_owned())
                .spawn(move || sync_loop(gl.as_ref(), callbacks.as_ref(), &shared, gl_ctx))
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                callbacks.destroy_gl_context(gl_ctx);
                return Err(e).context("spawning fence sync thread");
            }
        };
        debug!("fence sync thread started on {gl_ctx:?}");
        Ok(Self {
            shared,
            handle: Some(handle),
            gl_ctx,
        })
    }

    fn stop(&mut self) {
        self.shared.lists.lock().stopping = true;
        self.shared.cond.notify_all();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("fence sync thread panicked");
            }
        }
    }
}

fn sync_loop(gl: &dyn GlApi, callbacks: &dyn RendererCallbacks, shared: &Shared, gl_ctx: GlContextHandle) {
    if !callbacks.make_current(0, Some(gl_ctx)) {
        error!("fence sync thread could not make its context current");
        return;
    }
    'fences: loop {
        let fence = {
            let mut lists = shared.lists.lock();
            while lists.wait.is_empty() && !lists.stopping {
                shared.cond.wait(&mut lists);
            }
            if lists.stopping {
                break;
            }
            match lists.wait.pop_front() {
                Some(fence) => fence,
                None => continue,
            }
        };

        loop {
            match gl.client_wait_sync(fence.sync, true, FENCE_WAIT_TIMEOUT_NS) {
                SyncStatus::AlreadySignaled | SyncStatus::ConditionSatisfied => break,
                SyncStatus::WaitFailed => {
                    warn!("wait on fence {} failed, reporting it anyway", fence.id);
                    break;
                }
                SyncStatus::TimeoutExpired => {
                    let mut lists = shared.lists.lock();
                    if lists.stopping {
                        // Hand it back so the owner deletes the sync.
                        lists.wait.push_front(fence);
                        break 'fences;
                    }
                }
            }
        }

        shared.lists.lock().signalled.push(fence);
        if let Err(e) = shared.eventfd.write(1) {
            warn!("fence eventfd write failed: {e}");
        }
    }
    callbacks.make_current(0, None);
    debug!("fence sync thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingCallbacks;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};
    use virgl_gl::mock::MockGl;

    fn manager(threaded: bool) -> (FenceManager, Arc<MockGl>, Arc<RecordingCallbacks>) {
        let gl = Arc::new(MockGl::new());
        let callbacks = Arc::new(RecordingCallbacks::default());
        let fences = FenceManager::new(gl.clone(), callbacks.clone(), threaded, (4, 5));
        (fences, gl, callbacks)
    }

    #[test]
    fn polled_fences_report_in_order() {
        let (mut fences, gl, callbacks) = manager(false);
        assert_eq!(fences.poll_fd(), -1);
        fences.create_fence(1, 0);
        fences.create_fence(2, 0);
        gl.set_auto_signal(false);
        fences.create_fence(3, 0);

        fences.check_fences();
        assert_eq!(callbacks.fences(), vec![2]);

        // Nothing new signalled: nothing reported.
        fences.check_fences();
        assert_eq!(callbacks.fences(), vec![2]);

        gl.signal_all();
        fences.check_fences();
        assert_eq!(callbacks.fences(), vec![2, 3]);
        assert_eq!(gl.count("DeleteSync"), 3);
    }

    #[test]
    fn sync_thread_signals_through_eventfd() {
        let (mut fences, gl, callbacks) = manager(true);
        assert!(fences.is_threaded());
        assert!(fences.poll_fd() >= 0);
        gl.set_auto_signal(false);
        fences.create_fence(7, 1);
        fences.create_fence(8, 1);
        gl.signal_all();

        let deadline = Instant::now() + Duration::from_secs(5);
        while callbacks.fences().last() != Some(&8) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            fences.check_fences();
        }
        let reported = callbacks.fences();
        assert_eq!(reported.last(), Some(&8));
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));

        drop(fences);
        assert_eq!(callbacks.destroyed_contexts(), 1);
    }

    #[test]
    fn idle_eventfd_reports_nothing() {
        let (mut fences, _gl, callbacks) = manager(true);
        // The counter was never written, so the nonblocking read would block.
        fences.check_fences();
        fences.check_fences();
        assert!(callbacks.fences().is_empty());
        assert_eq!(
            fences.thread.as_ref().map(|t| t.shared.eventfd.read().map_err(|e| e.kind())),
            Some(Err(std::io::ErrorKind::WouldBlock))
        );
    }
}
