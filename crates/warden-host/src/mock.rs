//! Mock host for supervisor testing

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::{BotChild, BotHost, ExitStatus, HostError, HostResult};

#[derive(Debug)]
struct ChildState {
    running: bool,
    status: Option<ExitStatus>,
    honors_terminate: bool,
    fail_terminate: bool,
    terminate_calls: u32,
    kill_calls: u32,
}

/// Handle a test keeps to observe and drive a mock child
#[derive(Clone)]
pub struct MockChildControl {
    state: Arc<Mutex<ChildState>>,
}

impl MockChildControl {
    /// Simulate the child exiting on its own
    pub fn exit(&self, status: ExitStatus) {
        let mut state = self.state.lock().unwrap();
        state.running = false;
        state.status = Some(status);
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn terminate_calls(&self) -> u32 {
        self.state.lock().unwrap().terminate_calls
    }

    pub fn kill_calls(&self) -> u32 {
        self.state.lock().unwrap().kill_calls
    }

    /// When false, the child ignores SIGTERM and only dies to kill()
    pub fn set_honors_terminate(&self, honors: bool) {
        self.state.lock().unwrap().honors_terminate = honors;
    }

    /// When true, terminate() returns an error instead of delivering
    pub fn set_fail_terminate(&self, fail: bool) {
        self.state.lock().unwrap().fail_terminate = fail;
    }
}

/// Mock child process
pub struct MockChild {
    id: u32,
    state: Arc<Mutex<ChildState>>,
}

impl BotChild for MockChild {
    fn id(&self) -> u32 {
        self.id
    }

    fn try_wait(&mut self) -> HostResult<Option<ExitStatus>> {
        let state = self.state.lock().unwrap();
        if state.running {
            Ok(None)
        } else {
            Ok(state.status)
        }
    }

    fn terminate(&mut self) -> HostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.terminate_calls += 1;
        if state.fail_terminate {
            return Err(HostError::SignalFailed("mock terminate failure".into()));
        }
        if state.running && state.honors_terminate {
            state.running = false;
            state.status = Some(ExitStatus::signaled(15));
        }
        // Already gone: no-op, like ESRCH on the real host
        Ok(())
    }

    fn kill(&mut self) -> HostResult<()> {
        let mut state = self.state.lock().unwrap();
        state.kill_calls += 1;
        if state.running {
            state.running = false;
            state.status = Some(ExitStatus::signaled(9));
        }
        Ok(())
    }
}

/// Mock host adapter for supervisor tests
pub struct MockHost {
    next_id: AtomicU32,
    children: Mutex<Vec<MockChildControl>>,
    spawned_argv: Mutex<Vec<Vec<String>>>,

    /// Configure spawn to fail
    pub fail_spawn: Mutex<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            children: Mutex::new(Vec::new()),
            spawned_argv: Mutex::new(Vec::new()),
            fail_spawn: Mutex::new(false),
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    /// Control handle for the most recently spawned child
    pub fn last_child(&self) -> Option<MockChildControl> {
        self.children.lock().unwrap().last().cloned()
    }

    /// Argv of the most recent spawn
    pub fn last_argv(&self) -> Option<Vec<String>> {
        self.spawned_argv.lock().unwrap().last().cloned()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BotHost for MockHost {
    type Child = MockChild;

    async fn spawn(&self, argv: &[String], _cwd: Option<&Path>) -> HostResult<MockChild> {
        if *self.fail_spawn.lock().unwrap() {
            return Err(HostError::SpawnFailed("mock spawn failure".into()));
        }

        let state = Arc::new(Mutex::new(ChildState {
            running: true,
            status: None,
            honors_terminate: true,
            fail_terminate: false,
            terminate_calls: 0,
            kill_calls: 0,
        }));

        self.children
            .lock()
            .unwrap()
            .push(MockChildControl { state: state.clone() });
        self.spawned_argv.lock().unwrap().push(argv.to_vec());

        Ok(MockChild {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            state,
        })
    }
}
