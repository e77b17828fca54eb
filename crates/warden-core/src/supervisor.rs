//! Bot process supervisor
//!
//! A single control loop that gates the bot subprocess on the trading
//! window: launch when the window opens, poll window state and child
//! liveness while it is open, stop gracefully when it closes, repeat.
//! The loop runs until an external interrupt; a child failure is never
//! fatal to the supervisor itself.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use warden_config::{BotConfig, Config, PollTiming};
use warden_host::{BotChild, BotHost, ExitStatus, HostError};

use crate::TradingWindow;

/// Interval between reap polls while waiting out the grace period
const REAP_POLL: Duration = Duration::from_millis(250);

/// Bound on post-SIGKILL reaping, so the loop never hangs on a zombie
const KILL_REAP_LIMIT: u32 = 20;

/// Supervisor state machine. WAITING is the initial state; STOPPING is
/// transient while a graceful stop is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Waiting,
    Running,
    Stopping,
}

/// What the control loop should do on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Stay in WAITING and sleep the waiting poll interval
    HoldWaiting,
    /// Launch the bot and enter RUNNING
    Launch,
    /// Stay in RUNNING and sleep the running poll interval
    HoldRunning,
    /// Enter STOPPING and terminate the bot
    BeginStop,
    /// The bot exited on its own; return to WAITING disarmed
    RecordExit,
}

/// Pure transition decision, testable in isolation from timing.
///
/// In RUNNING the window observation always wins over the liveness
/// observation, so a closing window is never misreported as an
/// unexpected exit.
pub(crate) fn decide(
    state: SupervisorState,
    armed: bool,
    window_active: bool,
    child_alive: bool,
) -> Action {
    match state {
        SupervisorState::Waiting => {
            if window_active && armed {
                Action::Launch
            } else {
                Action::HoldWaiting
            }
        }
        SupervisorState::Running => {
            if !window_active {
                Action::BeginStop
            } else if !child_alive {
                Action::RecordExit
            } else {
                Action::HoldRunning
            }
        }
        SupervisorState::Stopping => Action::BeginStop,
    }
}

/// Errors that abort the supervisor loop
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to launch bot: {0}")]
    Launch(#[source] HostError),
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the bot child process for its entire lifetime. At most one child
/// is live at any time.
pub struct Supervisor<H: BotHost> {
    window: TradingWindow,
    bot: BotConfig,
    timing: PollTiming,
    host: H,
    shutdown: watch::Receiver<bool>,
    state: SupervisorState,
    /// Disarmed after a self-initiated exit; re-arms once the window has
    /// been observed closed, so a crashed bot is not relaunched
    /// mid-window.
    armed: bool,
    child: Option<H::Child>,
    clock: Clock,
}

impl<H: BotHost> Supervisor<H> {
    pub fn new(config: Config, host: H, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            window: TradingWindow::from(&config.window),
            bot: config.bot,
            timing: config.timing,
            host,
            shutdown,
            state: SupervisorState::Waiting,
            armed: true,
            child: None,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the wall-clock source (tests)
    #[cfg(test)]
    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run the supervision loop until an external interrupt. Returns Ok
    /// on a clean interrupt shutdown; the only error is a failed launch.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        info!(
            window = %self.window.describe(),
            argv = ?self.bot.argv,
            "supervisor started"
        );

        while !*self.shutdown.borrow() {
            let now = (self.clock)();
            let window_active = self.window.is_active(now);

            // Re-arm launches only once the window has been seen closed
            if !window_active {
                self.armed = true;
            }

            // Liveness is probed only after the window check passed, so
            // a close is handled before an exit could be observed.
            let mut exit_status: Option<ExitStatus> = None;
            let child_alive = window_active
                && self.state == SupervisorState::Running
                && self.probe_child(&mut exit_status);

            match decide(self.state, self.armed, window_active, child_alive) {
                Action::HoldWaiting => {
                    info!(
                        local_time = %self.window.local_time(now),
                        window = %self.window.describe(),
                        "outside trading window, waiting"
                    );
                    if self.pause(self.timing.wait_poll).await {
                        break;
                    }
                }
                Action::Launch => {
                    let child = self
                        .host
                        .spawn(&self.bot.argv, self.bot.working_dir.as_deref())
                        .await
                        .map_err(|e| {
                            error!(error = %e, "failed to launch bot");
                            SupervisorError::Launch(e)
                        })?;

                    info!(
                        pid = child.id(),
                        local_time = %self.window.local_time(now),
                        "trading window open, bot launched"
                    );

                    self.child = Some(child);
                    self.state = SupervisorState::Running;
                }
                Action::HoldRunning => {
                    if self.pause(self.timing.run_poll).await {
                        break;
                    }
                }
                Action::BeginStop => {
                    self.state = SupervisorState::Stopping;
                    info!(
                        local_time = %self.window.local_time(now),
                        "trading window closed, stopping bot"
                    );

                    if let Some(child) = self.child.take() {
                        self.stop_child(child).await;
                    }

                    self.state = SupervisorState::Waiting;
                    if self.pause(self.timing.restart_pause).await {
                        break;
                    }
                }
                Action::RecordExit => {
                    // Crash and deliberate completion are treated the
                    // same: no restart until the next window open.
                    match exit_status {
                        Some(status) => warn!(
                            %status,
                            "bot exited on its own, standing down until the next window"
                        ),
                        None => warn!(
                            "bot exited on its own, standing down until the next window"
                        ),
                    }

                    self.child = None;
                    self.armed = false;
                    self.state = SupervisorState::Waiting;
                    if self.pause(self.timing.restart_pause).await {
                        break;
                    }
                }
            }
        }

        // External interrupt: any live child is stopped with the same
        // graceful/forced sequence before the supervisor exits.
        if let Some(child) = self.child.take() {
            info!("shutdown requested, stopping bot");
            self.stop_child(child).await;
        }

        info!("supervisor stopped");
        Ok(())
    }

    /// Non-blocking liveness check. Returns true while the child runs;
    /// records the exit status once it has exited. A failed check is
    /// logged and treated as still-alive so the next tick retries.
    fn probe_child(&mut self, exit_status: &mut Option<ExitStatus>) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };

        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                *exit_status = Some(status);
                false
            }
            Err(e) => {
                warn!(error = %e, "liveness check failed, retrying next tick");
                true
            }
        }
    }

    /// Graceful stop: SIGTERM, bounded wait up to the grace period, then
    /// SIGKILL. Never fails; any error on the termination request falls
    /// through to the forced kill.
    async fn stop_child(&self, mut child: H::Child) {
        let pid = child.id();

        match child.terminate() {
            Ok(()) => {
                let deadline = tokio::time::Instant::now() + self.timing.grace;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            info!(pid, %status, "bot stopped gracefully");
                            return;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            warn!(pid, error = %e, "reap failed while waiting for exit");
                            break;
                        }
                    }
                    if tokio::time::Instant::now() >= deadline {
                        warn!(
                            pid,
                            grace_secs = self.timing.grace.as_secs(),
                            "bot did not exit within grace period, killing"
                        );
                        break;
                    }
                    tokio::time::sleep(REAP_POLL).await;
                }
            }
            Err(e) => {
                warn!(pid, error = %e, "graceful termination request failed, killing");
            }
        }

        if let Err(e) = child.kill() {
            warn!(pid, error = %e, "force kill failed");
        }

        for _ in 0..KILL_REAP_LIMIT {
            match child.try_wait() {
                Ok(Some(status)) => {
                    info!(pid, %status, "bot stopped forcibly");
                    return;
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(100)).await,
                Err(_) => break,
            }
        }
        warn!(pid, "bot did not report exit after kill");
    }

    /// Interruptible sleep. Returns true if shutdown was requested; a
    /// closed shutdown channel also counts, since the loop could no
    /// longer be interrupted otherwise.
    async fn pause(&mut self, duration: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = shutdown.wait_for(|requested| *requested) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use warden_config::WindowConfig;
    use warden_host::MockHost;

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap()
    }

    fn test_config() -> Config {
        Config {
            window: WindowConfig {
                start_hour: 4,
                end_hour: 23,
                timezone: chrono_tz::UTC,
            },
            bot: BotConfig {
                argv: vec!["bot".to_string(), "--live".to_string()],
                working_dir: None,
            },
            timing: PollTiming::default(),
        }
    }

    struct Fixture {
        host: Arc<MockHost>,
        clock: Arc<Mutex<DateTime<Utc>>>,
        shutdown: watch::Sender<bool>,
        handle: tokio::task::JoinHandle<Result<(), SupervisorError>>,
    }

    fn start_supervisor(start: DateTime<Utc>) -> Fixture {
        let host = Arc::new(MockHost::new());
        let clock = Arc::new(Mutex::new(start));
        let (shutdown, rx) = watch::channel(false);

        let clock_src = clock.clone();
        let supervisor = Supervisor::new(test_config(), host.clone(), rx)
            .with_clock(Arc::new(move || *clock_src.lock().unwrap()));
        let handle = tokio::spawn(supervisor.run());

        Fixture {
            host,
            clock,
            shutdown,
            handle,
        }
    }

    impl Fixture {
        fn set_time(&self, now: DateTime<Utc>) {
            *self.clock.lock().unwrap() = now;
        }

        /// Let the supervisor take a few ticks of virtual time
        async fn settle(&self) {
            tokio::time::sleep(Duration::from_secs(180)).await;
        }

        async fn finish(self) -> Result<(), SupervisorError> {
            self.shutdown.send(true).unwrap();
            self.handle.await.unwrap()
        }
    }

    // Pure transition tests

    #[test]
    fn waiting_launches_only_when_active_and_armed() {
        use SupervisorState::*;

        assert_eq!(decide(Waiting, true, true, false), Action::Launch);
        assert_eq!(decide(Waiting, true, false, false), Action::HoldWaiting);
        assert_eq!(decide(Waiting, false, true, false), Action::HoldWaiting);
    }

    #[test]
    fn window_close_takes_precedence_over_dead_child() {
        // Both fired on the same tick: the close must win, so the stop
        // path runs instead of an unexpected-exit report.
        assert_eq!(
            decide(SupervisorState::Running, true, false, false),
            Action::BeginStop
        );
    }

    #[test]
    fn running_transitions() {
        use SupervisorState::*;

        assert_eq!(decide(Running, true, true, true), Action::HoldRunning);
        assert_eq!(decide(Running, true, true, false), Action::RecordExit);
        assert_eq!(decide(Running, true, false, true), Action::BeginStop);
    }

    #[test]
    fn one_launch_and_one_stop_per_day() {
        let tz = chrono_tz::America::New_York;
        let window = TradingWindow::new(4, 23, tz);

        let mut state = SupervisorState::Waiting;
        let mut armed = true;
        let mut launches = 0;
        let mut stops = 0;

        // Step through a full calendar day in minute increments
        let day_start = tz
            .with_ymd_and_hms(2025, 1, 15, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        for minute in 0..(24 * 60) {
            let now = day_start + chrono::Duration::minutes(minute);
            let active = window.is_active(now);
            if !active {
                armed = true;
            }
            let child_alive = state == SupervisorState::Running;

            match decide(state, armed, active, child_alive) {
                Action::Launch => {
                    assert!(active, "launched outside the window");
                    launches += 1;
                    state = SupervisorState::Running;
                }
                Action::BeginStop => {
                    stops += 1;
                    state = SupervisorState::Waiting;
                }
                Action::HoldWaiting | Action::HoldRunning => {}
                Action::RecordExit => panic!("no self-exit was simulated"),
            }
        }

        assert_eq!(launches, 1);
        assert_eq!(stops, 1);
    }

    // Control loop tests (virtual time)

    #[tokio::test(start_paused = true)]
    async fn launches_on_open_and_stops_on_close() {
        let fixture = start_supervisor(utc(15, 2, 0));

        // Before the window opens: no launch
        fixture.settle().await;
        assert_eq!(fixture.host.spawn_count(), 0);

        // Window opens
        fixture.set_time(utc(15, 4, 0));
        fixture.settle().await;
        assert_eq!(fixture.host.spawn_count(), 1);
        assert_eq!(
            fixture.host.last_argv().unwrap(),
            vec!["bot".to_string(), "--live".to_string()]
        );

        let child = fixture.host.last_child().unwrap();
        assert!(child.is_running());

        // Window closes: graceful termination, no force kill needed
        fixture.set_time(utc(15, 23, 0));
        fixture.settle().await;
        assert_eq!(child.terminate_calls(), 1);
        assert_eq!(child.kill_calls(), 0);
        assert!(!child.is_running());

        // Stays down while the window is closed
        fixture.settle().await;
        assert_eq!(fixture.host.spawn_count(), 1);

        fixture.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn self_exit_stands_down_until_next_window_open() {
        let fixture = start_supervisor(utc(15, 10, 0));
        fixture.settle().await;
        assert_eq!(fixture.host.spawn_count(), 1);

        // Bot exits on its own, mid-window, with a clean code; the
        // supervisor must not signal the dead process or relaunch.
        let child = fixture.host.last_child().unwrap();
        child.exit(warden_host::ExitStatus::with_code(0));
        fixture.settle().await;

        assert_eq!(child.terminate_calls(), 0);
        assert_eq!(child.kill_calls(), 0);
        assert_eq!(fixture.host.spawn_count(), 1, "relaunched mid-window");

        // Window closes, then reopens the next day: supervision resumes
        fixture.set_time(utc(15, 23, 30));
        fixture.settle().await;
        fixture.set_time(utc(16, 4, 30));
        fixture.settle().await;
        assert_eq!(fixture.host.spawn_count(), 2);

        fixture.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_waiting_exits_cleanly() {
        let fixture = start_supervisor(utc(15, 2, 0));
        fixture.settle().await;

        // No child was ever launched, so no stop call is issued
        assert_eq!(fixture.host.spawn_count(), 0);
        fixture.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_running_stops_child() {
        let fixture = start_supervisor(utc(15, 10, 0));
        fixture.settle().await;
        let child = fixture.host.last_child().unwrap();
        assert!(child.is_running());

        fixture.finish().await.unwrap();
        assert_eq!(child.terminate_calls(), 1);
        assert!(!child.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_child_is_killed_after_grace() {
        let fixture = start_supervisor(utc(15, 10, 0));
        fixture.settle().await;

        let child = fixture.host.last_child().unwrap();
        child.set_honors_terminate(false);

        fixture.set_time(utc(15, 23, 0));
        fixture.settle().await;

        assert_eq!(child.terminate_calls(), 1);
        assert!(child.kill_calls() >= 1);
        assert!(!child.is_running(), "child left running after forced kill");

        fixture.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_error_falls_back_to_kill() {
        let fixture = start_supervisor(utc(15, 10, 0));
        fixture.settle().await;

        let child = fixture.host.last_child().unwrap();
        child.set_fail_terminate(true);

        fixture.set_time(utc(15, 23, 0));
        fixture.settle().await;

        assert!(child.kill_calls() >= 1);
        assert!(!child.is_running());

        fixture.finish().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_is_fatal() {
        let host = Arc::new(MockHost::new());
        *host.fail_spawn.lock().unwrap() = true;

        let clock = Arc::new(Mutex::new(utc(15, 10, 0)));
        let (_shutdown, rx) = watch::channel(false);

        let clock_src = clock.clone();
        let supervisor = Supervisor::new(test_config(), host.clone(), rx)
            .with_clock(Arc::new(move || *clock_src.lock().unwrap()));

        let result = supervisor.run().await;
        assert!(matches!(result, Err(SupervisorError::Launch(_))));
    }
}
