use std::{cell::Cell, rc::Rc};

/// Per-tick increment of simulated time. One quantum per display refresh,
/// so playback speed follows the refresh rate rather than wall-clock time.
pub const TIME_STEP: f32 = 0.001;
/// Smoothing factor pulling the velocity estimate toward the raw sample.
pub const MOUSE_SMOOTHING: f32 = 0.009;
/// Per-tick decay of the raw velocity sample absent new pointer input.
pub const SPEED_DECAY: f32 = 0.99;
/// Scale applied to pointer displacement magnitude (device pixels).
pub const POINTER_SCALE: f32 = 0.05;

pub const UNIFORM_TIME: &str = "time";
pub const UNIFORM_MOUSE: &str = "mouse";

/// Receiver for the scalar parameters published once per tick.
///
/// Backed by GL uniform locations in the web build; implementations must
/// ignore names they have no slot for (the pixel pass has no "mouse").
pub trait ParameterSink {
    fn set(&mut self, name: &str, value: f32);
}

/// Scheduling capability injected into [Animator].
///
/// `request_tick` asks the host to invoke [Animator::tick] once before the
/// next frame is drawn. The web host backs this with a pending flag polled
/// from the render loop; tests count calls and drive ticks synchronously.
pub trait TickScheduler {
    fn request_tick(&mut self);
}

/// Shared-flag scheduler for hosts that poll once per frame.
///
/// At most one tick is pending at a time, so a stopped animator simply
/// stops re-arming the flag and the loop goes quiet.
#[derive(Clone)]
pub struct FrameScheduler {
    pending: Rc<Cell<bool>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self { pending: Rc::new(Cell::new(false)) }
    }

    /// Consumes the pending request. Call once per frame; returns whether
    /// the animator asked to be ticked.
    pub fn take_pending(&self) -> bool {
        self.pending.replace(false)
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TickScheduler for FrameScheduler {
    fn request_tick(&mut self) {
        self.pending.set(true);
    }
}

/// Owns simulated time and the smoothed pointer-velocity signal.
///
/// Two states, running and stopped. Each `tick` advances time by a fixed
/// quantum, relaxes the velocity estimate toward the latest raw pointer
/// sample, publishes both to every registered sink, and re-arms the
/// scheduler. `stop` freezes all state; `play` resumes from the frozen
/// values with exactly one immediate tick.
pub struct Animator {
    time: f32,
    mouse: f32,
    speed: f32,
    last_x: f32,
    last_y: f32,
    playing: bool,
    sinks: Vec<Box<dyn ParameterSink>>,
    scheduler: Box<dyn TickScheduler>,
}

impl Animator {
    /// Creates a running animator and requests the first tick.
    pub fn new(scheduler: Box<dyn TickScheduler>) -> Self {
        let mut animator = Self {
            time: 0.0,
            mouse: 0.0,
            speed: 0.0,
            last_x: 0.0,
            last_y: 0.0,
            playing: true,
            sinks: Vec::new(),
            scheduler,
        };
        animator.scheduler.request_tick();
        animator
    }

    pub fn add_sink(&mut self, sink: Box<dyn ParameterSink>) {
        self.sinks.push(sink);
    }

    /// Records a pointer position in device pixels and derives a raw
    /// velocity sample from the displacement since the last position.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        let dx = x - self.last_x;
        let dy = y - self.last_y;
        self.speed = (dx * dx + dy * dy).sqrt() * POINTER_SCALE;
        self.last_x = x;
        self.last_y = y;
    }

    /// Advances one frame. No-op while stopped.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }
        self.time += TIME_STEP;
        self.mouse -= (self.mouse - self.speed) * MOUSE_SMOOTHING;
        self.speed *= SPEED_DECAY;
        for sink in self.sinks.iter_mut() {
            sink.set(UNIFORM_TIME, self.time);
            sink.set(UNIFORM_MOUSE, self.mouse);
        }
        self.scheduler.request_tick();
    }

    /// Freezes time and velocity. Idempotent.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Resumes from the frozen state with exactly one immediate tick.
    /// No-op if already running, so the tick chain is never doubled.
    pub fn play(&mut self) {
        if !self.playing {
            self.playing = true;
            self.tick();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn mouse_speed(&self) -> f32 {
        self.mouse
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;

    const EPS: f32 = 1e-6;

    struct RecordingSink {
        values: Rc<RefCell<Vec<(String, f32)>>>,
    }

    impl ParameterSink for RecordingSink {
        fn set(&mut self, name: &str, value: f32) {
            self.values.borrow_mut().push((name.to_string(), value));
        }
    }

    struct CountingScheduler {
        count: Rc<Cell<usize>>,
    }

    impl TickScheduler for CountingScheduler {
        fn request_tick(&mut self) {
            self.count.set(self.count.get() + 1);
        }
    }

    fn counting_animator() -> (Animator, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let scheduler = CountingScheduler { count: Rc::clone(&count) };
        (Animator::new(Box::new(scheduler)), count)
    }

    fn recording_animator() -> (Animator, Rc<RefCell<Vec<(String, f32)>>>) {
        let (mut animator, _) = counting_animator();
        let values = Rc::new(RefCell::new(Vec::new()));
        animator.add_sink(Box::new(RecordingSink { values: Rc::clone(&values) }));
        (animator, values)
    }

    #[test]
    fn test_time_advances_one_quantum_per_tick() {
        let (mut animator, _) = counting_animator();
        for n in 1..=10 {
            animator.tick();
            assert!((animator.time() - n as f32 * TIME_STEP).abs() < EPS);
        }
    }

    #[test]
    fn test_new_animator_is_running_and_requests_first_tick() {
        let (animator, count) = counting_animator();
        assert!(animator.is_playing());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_tick_rearms_scheduler_while_running() {
        let (mut animator, count) = counting_animator();
        animator.tick();
        animator.tick();
        assert_eq!(count.get(), 3); // construction + one per tick
    }

    #[test]
    fn test_stop_freezes_state() {
        let (mut animator, count) = counting_animator();
        animator.on_pointer_move(10.0, 0.0);
        animator.tick();
        let frozen_time = animator.time();
        let frozen_mouse = animator.mouse_speed();
        let requests = count.get();

        animator.stop();
        for _ in 0..5 {
            animator.tick();
        }
        assert_eq!(animator.time(), frozen_time);
        assert_eq!(animator.mouse_speed(), frozen_mouse);
        // a stopped tick must not re-arm the scheduler
        assert_eq!(count.get(), requests);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut animator, _) = counting_animator();
        animator.tick();
        animator.stop();
        let time = animator.time();
        animator.stop();
        assert!(!animator.is_playing());
        assert_eq!(animator.time(), time);
    }

    #[test]
    fn test_play_resumes_from_frozen_value() {
        let (mut animator, _) = counting_animator();
        for _ in 0..3 {
            animator.tick();
        }
        animator.stop();
        let frozen = animator.time();

        animator.play();
        assert!(animator.is_playing());
        // exactly one resume tick, not zero and not two
        assert!((animator.time() - (frozen + TIME_STEP)).abs() < EPS);
    }

    #[test]
    fn test_play_while_running_is_a_no_op() {
        let (mut animator, count) = counting_animator();
        animator.tick();
        let time = animator.time();
        let requests = count.get();
        animator.play();
        assert_eq!(animator.time(), time);
        assert_eq!(count.get(), requests);
    }

    #[test]
    fn test_pointer_move_scenario() {
        let (mut animator, _) = counting_animator();
        animator.on_pointer_move(10.0, 0.0);
        animator.on_pointer_move(20.0, 0.0);
        // raw sample = sqrt(10^2) * 0.05 = 0.5
        animator.tick();
        assert!((animator.mouse_speed() - 0.0045).abs() < EPS);
    }

    #[test]
    fn test_velocity_decays_toward_zero_without_input() {
        let (mut animator, _) = counting_animator();
        animator.on_pointer_move(0.0, 100.0);
        // let the estimate climb toward the sample first
        for _ in 0..200 {
            animator.tick();
        }
        let mut prev = animator.mouse_speed();
        assert!(prev > 0.0);
        for _ in 0..2000 {
            animator.tick();
            let cur = animator.mouse_speed();
            assert!(cur >= 0.0);
            assert!(cur <= prev + EPS);
            prev = cur;
        }
        assert!(animator.mouse_speed() < 0.01);
    }

    #[test]
    fn test_tick_publishes_time_and_mouse_to_sinks() {
        let (mut animator, values) = recording_animator();
        animator.tick();
        let recorded = values.borrow();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].0, UNIFORM_TIME);
        assert!((recorded[0].1 - TIME_STEP).abs() < EPS);
        assert_eq!(recorded[1].0, UNIFORM_MOUSE);
        assert!((recorded[1].1 - 0.0).abs() < EPS);
    }

    #[test]
    fn test_stopped_tick_publishes_nothing() {
        let (mut animator, values) = recording_animator();
        animator.stop();
        animator.tick();
        assert!(values.borrow().is_empty());
    }

    #[test]
    fn test_every_sink_receives_the_same_values() {
        let (mut animator, first) = recording_animator();
        let second = Rc::new(RefCell::new(Vec::new()));
        animator.add_sink(Box::new(RecordingSink { values: Rc::clone(&second) }));
        animator.tick();
        assert_eq!(*first.borrow(), *second.borrow());
    }

    #[test]
    fn test_frame_scheduler_pending_flag() {
        let mut scheduler = FrameScheduler::new();
        let poll = scheduler.clone();
        assert!(!poll.take_pending());
        scheduler.request_tick();
        assert!(poll.take_pending());
        // consumed; nothing pending until the next request
        assert!(!poll.take_pending());
    }
}
