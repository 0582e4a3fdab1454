//! Run state machine
//!
//! Consumes frames, detection events and timer notifications on a single
//! thread and turns them into timer commands. Every route lookup goes through
//! `Option`; a missing split is logged and the tick becomes a no-op.

use std::time::{Duration, Instant};

use super::events::{EngineEvent, RunEvent, RunEventKind};
use super::state::{RunPhase, RunSnapshot, RunState, Status};
use crate::config::AutosplitterConfig;
use crate::livesplit::{Timer, TimerPhase};
use crate::route::{EndCondition, Route, StartCondition};
use crate::vision::{DetectionCoordinator, DetectionEvent, Frame, SwitchDetector};

/// Default number of load-free frames before game time resumes
pub const DEFAULT_RESUME_AFTER_FRAMES: u32 = 10;

/// How long a `ResetDetected` is treated as the echo of our own `reset`
const RESET_ECHO_WINDOW: Duration = Duration::from_secs(3);

pub struct RunStateMachine<T: Timer> {
    timer: T,
    route: Option<Route>,
    coordinator: DetectionCoordinator,
    switch: SwitchDetector,
    state: RunState,
    /// Resume game time after more than this many load-free frames
    resume_after_frames: u32,
    timer_phase: Option<TimerPhase>,
    /// When we last sent `reset` ourselves; its echo from the monitor is ignored
    own_reset: Option<Instant>,
    has_signal: bool,
    events: Vec<RunEvent>,
}

impl<T: Timer> RunStateMachine<T> {
    pub fn new(timer: T, coordinator: DetectionCoordinator, switch: SwitchDetector) -> Self {
        Self {
            timer,
            route: None,
            coordinator,
            switch,
            state: RunState::new(),
            resume_after_frames: DEFAULT_RESUME_AFTER_FRAMES,
            timer_phase: None,
            own_reset: None,
            has_signal: false,
            events: Vec::new(),
        }
    }

    /// Build the detectors from configuration
    pub fn from_config(timer: T, config: &AutosplitterConfig) -> Self {
        let coordinator = DetectionCoordinator::from_config(&config.detection, &config.classifiers);
        Self::new(timer, coordinator, SwitchDetector::new(&config.switch))
            .with_resume_after_frames(config.detection.resume_after_frames)
    }

    pub fn with_resume_after_frames(mut self, frames: u32) -> Self {
        self.resume_after_frames = frames;
        self
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.load_route(route);
        self
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase
    }

    pub fn coordinator(&self) -> &DetectionCoordinator {
        &self.coordinator
    }

    /// Take the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, kind: RunEventKind) {
        self.events
            .push(RunEvent::new(kind, self.state.split_index, self.state.load_count));
    }

    fn clear_run(&mut self) {
        self.state.reset();
        self.coordinator.reset();
        self.switch.reset();
        if let Some(route) = self.route.as_mut() {
            route.reset_counters();
        }
    }

    /// Replace the route; any run in progress is dropped without touching the timer
    pub fn load_route(&mut self, route: Route) {
        log::info!("Route '{}' loaded with {} splits", route.name, route.len());
        self.route = Some(route);
        self.clear_run();
        self.emit(RunEventKind::RouteChanged);
    }

    pub fn close_route(&mut self) {
        if let Some(route) = self.route.take() {
            log::info!("Route '{}' closed", route.name);
        }
        self.clear_run();
        self.emit(RunEventKind::RouteChanged);
    }

    fn route_len(&self) -> usize {
        self.route.as_ref().map(|r| r.len()).unwrap_or(0)
    }

    /// Start the timer and begin tracking split 0
    pub fn start(&mut self) {
        if self.route_len() == 0 {
            log::warn!("Cannot start a run without splits");
            return;
        }
        if self.state.phase.is_started() {
            log::warn!("Run already started");
            return;
        }
        self.begin_run();
    }

    fn begin_run(&mut self) {
        self.timer.start_timer();
        self.clear_run();
        self.state.phase = RunPhase::Running;
        log::info!("Run started");
        self.emit(RunEventKind::RunStarted);
    }

    /// Advance requested from outside the detection path (button, hotkey)
    pub fn advance_on_external_signal(&mut self) {
        match self.state.phase {
            RunPhase::WaitingForFirstSplit => {
                self.timer.start_timer();
                self.state.phase = RunPhase::Running;
                log::info!("Run started on first split");
                self.emit(RunEventKind::RunStarted);
                self.complete_split(false);
            }
            RunPhase::Running => {
                let sends = self
                    .route
                    .as_ref()
                    .and_then(|r| r.split(self.state.split_index))
                    .map(|s| s.sends_split());
                match sends {
                    Some(sends) => self.complete_split(sends),
                    None => log::warn!("No split at index {}", self.state.split_index),
                }
            }
            phase => log::debug!("Advance ignored in {:?}", phase),
        }
    }

    /// Move past the current split, optionally sending `split`
    fn complete_split(&mut self, send_split: bool) {
        let from = self.state.split_index;
        if send_split {
            self.timer.split_timer();
        }

        let next = from + 1;
        self.state.split_index = next;
        self.emit(RunEventKind::SplitCompleted {
            from,
            sent_split: send_split,
        });

        if next >= self.route_len() {
            self.state.phase = RunPhase::WaitingForReset;
            log::info!("Run finished");
            self.emit(RunEventKind::RunFinished);
            return;
        }

        self.enter_split(next);
        log::info!("Split {} -> {}", from, next);
    }

    /// Per-split resets on entering `index`
    fn enter_split(&mut self, index: usize) {
        let Some(split) = self.route.as_ref().and_then(|r| r.split(index)) else {
            log::warn!("No split at index {}", index);
            return;
        };

        if split.reset_load_count {
            self.state.load_count = 0;
        }
        self.state.split_index = index;
        self.state.component_index = 0;
        // A load in progress still gets its resume
        self.state.frames_since_load = 0;
    }

    /// Manual skip; never sends a timer command and never moves past the last split
    pub fn skip_split(&mut self) {
        if self.state.phase != RunPhase::Running {
            log::debug!("Skip ignored in {:?}", self.state.phase);
            return;
        }

        let from = self.state.split_index;
        if from + 1 >= self.route_len() {
            log::debug!("Already at the last split");
            return;
        }

        self.enter_split(from + 1);
        log::info!("Skipped split {}", from);
        self.emit(RunEventKind::Skipped { from });
    }

    /// Manual step back; the timer is left as is
    pub fn undo_split(&mut self) {
        let from = self.state.split_index;
        if from == 0 || self.route_len() == 0 {
            log::debug!("Nothing to undo");
            return;
        }

        let target = (from - 1).min(self.route_len() - 1);
        if self.state.phase == RunPhase::WaitingForReset {
            self.state.phase = RunPhase::Running;
        }
        self.enter_split(target);
        log::info!("Undid split {}", target);
        self.emit(RunEventKind::Undone { from });
    }

    /// Reset the run and the timer
    pub fn reset_run(&mut self) {
        self.timer.reset_timer();
        if self.timer_phase != Some(TimerPhase::NotRunning) {
            self.own_reset = Some(Instant::now());
        }
        self.clear_run();
        log::info!("Run reset");
        self.emit(RunEventKind::RunReset { external: false });
    }

    /// Mirror a reset performed on the timer
    pub fn on_timer_reset(&mut self) {
        self.clear_run();
        log::info!("Run reset from LiveSplit");
        self.emit(RunEventKind::RunReset { external: true });
    }

    /// Dispatch one engine notification
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Detection(detection) => self.on_detection(detection),
            EngineEvent::ConnectivityChanged(connected) => {
                log::debug!("Timer connectivity now {}", connected);
                if !connected {
                    self.timer_phase = None;
                    self.own_reset = None;
                }
            }
            EngineEvent::PhaseChanged(phase) => {
                if phase != TimerPhase::NotRunning {
                    self.own_reset = None;
                }
                self.timer_phase = Some(phase);
            }
            EngineEvent::ResetDetected => {
                let echo = self
                    .own_reset
                    .take()
                    .is_some_and(|at| at.elapsed() < RESET_ECHO_WINDOW);
                if echo {
                    log::debug!("Ignoring LiveSplit reset we sent");
                } else {
                    self.on_timer_reset();
                }
            }
        }
    }

    /// Count a load against the current split
    fn on_detection(&mut self, detection: DetectionEvent) {
        if self.state.phase != RunPhase::Running {
            log::debug!("Detection ignored in {:?}", self.state.phase);
            return;
        }

        let index = self.state.split_index;
        let load_count = self.state.load_count.saturating_add(1);
        let Some(split) = self.route.as_mut().and_then(|r| r.splits.get_mut(index)) else {
            log::warn!("Detection with no split at index {}", index);
            return;
        };

        split.actual_loads = load_count;
        let expected = split.expected_loads;
        let completes = load_count >= expected;
        let sends = split.sends_split();

        self.state.load_count = load_count;
        self.state.last_load_type = Some(detection.load_type);
        log::info!("Load {}/{} ({})", load_count, expected, detection.load_type);
        self.emit(RunEventKind::LoadCounted {
            load_type: detection.load_type,
        });

        self.state.frames_since_load = 0;
        if !self.state.in_load {
            self.state.in_load = true;
            self.timer.pause_game_time();
            self.emit(RunEventKind::Paused);
        }

        if completes {
            self.complete_split(sends);
        }
    }

    fn track_load_exit(&mut self) {
        if !self.state.in_load {
            return;
        }
        if self.coordinator.is_active() {
            self.state.frames_since_load = 0;
            return;
        }

        self.state.frames_since_load += 1;
        if self.state.frames_since_load > self.resume_after_frames {
            self.state.in_load = false;
            self.state.frames_since_load = 0;
            self.timer.resume_game_time();
            self.emit(RunEventKind::Resumed);
        }
    }

    fn on_last_split(&self) -> bool {
        let len = self.route_len();
        len > 0 && self.state.split_index == len - 1
    }

    fn check_switch(&mut self, frame: &Frame) {
        let uses_switch = self
            .route
            .as_ref()
            .map(|r| r.end_condition == EndCondition::Switch)
            .unwrap_or(false);
        if !uses_switch || !self.on_last_split() {
            return;
        }

        self.switch.update(frame);
        if self.switch.check_switch_hit() {
            log::info!("Switch hit on the final split");
            let sends = self
                .route
                .as_ref()
                .and_then(|r| r.split(self.state.split_index))
                .map(|s| s.sends_split())
                .unwrap_or(false);
            self.complete_split(sends);
        }
    }

    /// One tick of the frame loop. `frame` is `None` when nothing was grabbed.
    pub fn process_frame(&mut self, frame: Option<&Frame>, now: Instant) {
        self.has_signal = frame.is_some();

        let start_condition = match self.route.as_ref() {
            Some(route) if !route.is_empty() => route.start_condition,
            _ => return,
        };
        if !self.timer.is_connected() {
            return;
        }

        if self.state.phase == RunPhase::Idle {
            match start_condition {
                StartCondition::FirstSplit => {
                    self.clear_run();
                    self.state.phase = RunPhase::WaitingForFirstSplit;
                    log::info!("Waiting for the first split");
                    self.emit(RunEventKind::ArmedForFirstSplit);
                }
                StartCondition::TimerSignal => self.state.phase = RunPhase::WaitingForTimerStart,
                StartCondition::Manual => {}
            }
        }

        match self.state.phase {
            RunPhase::WaitingForTimerStart => {
                if self.timer.current_time().is_some_and(|t| !t.is_zero()) {
                    self.begin_run();
                }
            }
            RunPhase::Running => {
                let Some(frame) = frame else {
                    return;
                };
                self.detect(frame, now);
            }
            _ => {}
        }
    }

    fn detect(&mut self, frame: &Frame, now: Instant) {
        let Some(requested) = self
            .route
            .as_ref()
            .and_then(|r| r.split(self.state.split_index))
            .map(|s| s.load_type)
        else {
            log::warn!("No split at index {}", self.state.split_index);
            return;
        };

        let detection = self
            .coordinator
            .poll(frame, requested, self.state.load_count, now);
        self.track_load_exit();

        if let Some(detection) = detection {
            self.on_detection(detection);
        }

        if self.state.phase == RunPhase::Running {
            self.check_switch(frame);
        }
    }

    /// Status derived from the current state
    pub fn status(&self) -> Status {
        let Some(route) = self.route.as_ref() else {
            return Status::NoRoute;
        };
        if route.is_empty() {
            return Status::EmptyRoute;
        }
        if !self.timer.is_connected() {
            return Status::TimerDisconnected;
        }
        match self.state.phase {
            RunPhase::WaitingForTimerStart => return Status::WaitingForTimerStart,
            RunPhase::WaitingForReset => return Status::WaitingForReset,
            _ => {}
        }
        if !self.has_signal {
            return Status::NoSignal;
        }

        let unavailable = self.coordinator.undetectable();
        if !unavailable.is_empty() {
            Status::Degraded(unavailable)
        } else if self.state.phase == RunPhase::Running {
            Status::Running
        } else {
            Status::Ready
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let split = self
            .route
            .as_ref()
            .and_then(|r| r.split(self.state.split_index));

        RunSnapshot {
            status: self.status(),
            phase: self.state.phase,
            route_name: self.route.as_ref().map(|r| r.name.clone()),
            split_count: self.route_len(),
            split_index: self.state.split_index,
            split_name: split.map(|s| s.name.clone()),
            component_index: self.state.component_index,
            load_count: self.state.load_count,
            expected_loads: split.map(|s| s.expected_loads),
            connected: self.timer.is_connected(),
            timer_phase: self.timer_phase,
            last_load_type: self.state.last_load_type,
            in_load: self.state.in_load,
        }
    }
}

impl<T: Timer> std::fmt::Debug for RunStateMachine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunStateMachine")
            .field("state", &self.state)
            .field("route", &self.route.as_ref().map(|r| &r.name))
            .field("timer_phase", &self.timer_phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livesplit::TimerCommand;
    use crate::route::{LoadType, Split};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct FakeTimer {
        sent: Arc<Mutex<Vec<TimerCommand>>>,
        time: Arc<Mutex<Option<Duration>>>,
    }

    impl Timer for FakeTimer {
        fn is_connected(&self) -> bool {
            true
        }

        fn send(&self, command: TimerCommand) {
            self.sent.lock().push(command);
        }

        fn current_time(&self) -> Option<Duration> {
            *self.time.lock()
        }
    }

    fn machine(route: Route) -> (RunStateMachine<FakeTimer>, FakeTimer) {
        let timer = FakeTimer::default();
        let machine =
            RunStateMachine::from_config(timer.clone(), &AutosplitterConfig::default()).with_route(route);
        (machine, timer)
    }

    fn load(machine: &mut RunStateMachine<FakeTimer>) {
        machine.handle_event(EngineEvent::Detection(DetectionEvent {
            load_type: LoadType::RegularFade,
            timestamp: Instant::now(),
        }));
    }

    #[test]
    fn test_missing_route_is_noop() {
        let timer = FakeTimer::default();
        let mut machine = RunStateMachine::from_config(timer.clone(), &AutosplitterConfig::default());
        machine.start();
        machine.advance_on_external_signal();
        machine.process_frame(Some(&Frame::filled([0, 0, 0])), Instant::now());
        assert_eq!(machine.phase(), RunPhase::Idle);
        assert_eq!(machine.status(), Status::NoRoute);
        assert!(timer.sent.lock().is_empty());
    }

    #[test]
    fn test_load_pauses_once() {
        let route = Route::new("r").with_split(Split::new("1-1", 3));
        let (mut machine, timer) = machine(route);
        machine.start();
        load(&mut machine);
        load(&mut machine);
        assert_eq!(machine.state().load_count, 2);
        assert_eq!(
            *timer.sent.lock(),
            vec![TimerCommand::StartTimer, TimerCommand::PauseGameTime]
        );
    }

    #[test]
    fn test_zero_expected_completes_on_first_load() {
        let route = Route::new("r")
            .with_split(Split::new("menu", 0))
            .with_split(Split::new("1-1", 1));
        let (mut machine, timer) = machine(route);
        machine.start();
        load(&mut machine);
        assert_eq!(machine.state().split_index, 1);
        assert_eq!(
            *timer.sent.lock(),
            vec![
                TimerCommand::StartTimer,
                TimerCommand::PauseGameTime,
                TimerCommand::Split
            ]
        );
    }

    #[test]
    fn test_zero_expected_also_advances_externally() {
        let route = Route::new("r")
            .with_split(Split::new("menu", 0))
            .with_split(Split::new("1-1", 1));
        let (mut machine, _) = machine(route);
        machine.start();
        machine.advance_on_external_signal();
        assert_eq!(machine.state().split_index, 1);
    }

    #[test]
    fn test_own_reset_echo_ignored() {
        let route = Route::new("r").with_split(Split::new("1-1", 2));
        let (mut machine, timer) = machine(route);
        machine.start();
        machine.handle_event(EngineEvent::PhaseChanged(TimerPhase::Running));
        machine.reset_run();
        machine.start();

        // The monitor reports the reset we sent after the new run began
        machine.handle_event(EngineEvent::PhaseChanged(TimerPhase::NotRunning));
        machine.handle_event(EngineEvent::ResetDetected);
        assert_eq!(machine.phase(), RunPhase::Running);
        assert_eq!(
            *timer.sent.lock(),
            vec![
                TimerCommand::StartTimer,
                TimerCommand::Reset,
                TimerCommand::StartTimer
            ]
        );

        // Only one echo is swallowed
        machine.handle_event(EngineEvent::PhaseChanged(TimerPhase::Running));
        machine.handle_event(EngineEvent::PhaseChanged(TimerPhase::NotRunning));
        machine.handle_event(EngineEvent::ResetDetected);
        assert_eq!(machine.phase(), RunPhase::Idle);
    }

    #[test]
    fn test_reset_from_idle_timer_is_not_an_echo() {
        let route = Route::new("r").with_split(Split::new("1-1", 2));
        let (mut machine, _) = machine(route);
        machine.handle_event(EngineEvent::PhaseChanged(TimerPhase::NotRunning));
        machine.reset_run();
        machine.start();
        machine.handle_event(EngineEvent::ResetDetected);
        assert_eq!(machine.phase(), RunPhase::Idle);
    }

    #[test]
    fn test_detection_ignored_before_start() {
        let route = Route::new("r").with_split(Split::new("1-1", 1));
        let (mut machine, timer) = machine(route);
        load(&mut machine);
        assert_eq!(machine.state().load_count, 0);
        assert!(timer.sent.lock().is_empty());
    }

    #[test]
    fn test_drain_events() {
        let route = Route::new("r").with_split(Split::new("1-1", 1));
        let (mut machine, _) = machine(route);
        machine.drain_events();
        machine.start();
        let kinds: Vec<_> = machine.drain_events().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![RunEventKind::RunStarted]);
        assert!(machine.drain_events().is_empty());
    }
}
