use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use lapkey::app::App;
use lapkey::command::{Flow, Interpreter};
use lapkey::config::Config;
use lapkey::indicator::Indicator;
use lapkey::net::{Dispatch, GridCellActivation, PresentationAction};
use lapkey::power::PowerControl;
use lapkey::sensor::{EdgeWatcher, SensorEvent, SensorHandler};
use lapkey_gpio::GpioResult;
use lapkey_gpio::edge::{Edge, EdgeTrigger};
use lapkey_gpio::keypad::{GpioKeypad, Keypad, KeypadKey};
use lapkey_gpio::virt::{VirtualEdgeSource, VirtualInput, VirtualLine};

const MS: Duration = Duration::from_millis(1);

#[derive(Clone, Debug, Eq, PartialEq)]
enum Call {
    Presentation(PresentationAction),
    GridCell(u16, [u16; 2]),
    LapCount(String),
}

#[derive(Default)]
struct RecordingDispatch {
    calls: Mutex<Vec<Call>>,
}

impl RecordingDispatch {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn keypad_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::GridCell(..)))
            .collect()
    }
}

impl Dispatch for RecordingDispatch {
    fn notify_presentation(&self, action: PresentationAction) {
        self.calls.lock().unwrap().push(Call::Presentation(action));
    }

    fn activate_grid_cell(&self, port: u16, activation: &GridCellActivation) {
        assert_eq!(activation.action, "activate_grid_cell");
        self.calls.lock().unwrap().push(Call::GridCell(port, activation.cell));
    }

    fn deliver_lap_count(&self, count: &str) {
        self.calls.lock().unwrap().push(Call::LapCount(count.to_string()));
    }
}

#[derive(Debug, Default)]
struct RecordingPower {
    shutdowns: AtomicUsize,
    reboots: AtomicUsize,
}

impl PowerControl for RecordingPower {
    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }

    fn reboot(&self) {
        self.reboots.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out one key per read from a typed script.
#[derive(Debug)]
struct ScriptedKeypad {
    keys: Mutex<VecDeque<KeypadKey>>,
}

impl ScriptedKeypad {
    fn new(script: &str) -> Self {
        ScriptedKeypad {
            keys: Mutex::new(script.chars().filter_map(KeypadKey::from_char).collect()),
        }
    }

    fn remaining(&self) -> usize {
        self.keys.lock().unwrap().len()
    }
}

impl Keypad for ScriptedKeypad {
    type Key = KeypadKey;

    fn read(&self) -> GpioResult<Option<KeypadKey>> {
        Ok(self.keys.lock().unwrap().pop_front())
    }
}

struct Outcome {
    calls: Vec<Call>,
    flows: Vec<Flow>,
    pulses: usize,
    shutdowns: usize,
    reboots: usize,
    unread: usize,
}

/// Types `script` on the keypad and runs the main loop until the keys run out or it halts.
fn type_keys(script: &str) -> Outcome {
    let led = VirtualLine::new("led");
    let indicator = Indicator::new(&led, Duration::ZERO, Duration::ZERO);
    let dispatch = RecordingDispatch::default();
    let power = RecordingPower::default();
    let keypad = ScriptedKeypad::new(script);
    let mut app = App::new(&keypad, &indicator, Interpreter::new(&dispatch, &power, &indicator));

    let mut flows = Vec::new();
    while keypad.remaining() > 0 {
        let flow = app.update().unwrap();
        flows.push(flow);
        if flow == Flow::Halt {
            break;
        }
    }

    Outcome {
        calls: dispatch.calls(),
        flows,
        pulses: led.activations(),
        shutdowns: power.shutdowns.load(Ordering::SeqCst),
        reboots: power.reboots.load(Ordering::SeqCst),
        unread: keypad.remaining(),
    }
}

#[test]
fn lap_count_sent_then_triggered() {
    let outcome = type_keys("*1234#");

    assert_eq!(
        outcome.calls,
        vec![
            Call::LapCount("1234".to_string()),
            Call::Presentation(PresentationAction::Trigger),
        ]
    );
    assert_eq!(outcome.pulses, 6);
    assert!(outcome.flows.iter().all(|&flow| flow == Flow::Continue));
}

#[test]
fn shutdown_sequence_halts() {
    let outcome = type_keys("*9999#*1#");

    assert!(outcome.calls.is_empty());
    assert_eq!(outcome.shutdowns, 1);
    assert_eq!(outcome.reboots, 0);
    // One pulse per key, then five for the shutdown.
    assert_eq!(outcome.pulses, 6 + 5);
    assert_eq!(outcome.flows.last(), Some(&Flow::Halt));
    // Nothing after the shutdown sequence is handled.
    assert_eq!(outcome.unread, 3);
}

#[test]
fn reboot_sequence_halts() {
    let outcome = type_keys("*9998#");

    assert!(outcome.calls.is_empty());
    assert_eq!(outcome.reboots, 1);
    assert_eq!(outcome.shutdowns, 0);
    assert_eq!(outcome.pulses, 6 + 5);
    assert_eq!(outcome.flows.last(), Some(&Flow::Halt));
}

#[test]
fn clear_sequence_only_clears() {
    let outcome = type_keys("*00#");

    assert_eq!(outcome.calls, vec![Call::Presentation(PresentationAction::Clear)]);
    assert_eq!(outcome.pulses, 4);
}

#[test]
fn keys_outside_recording_do_nothing() {
    let outcome = type_keys("1234#00#9999#9998##0");

    assert!(outcome.calls.is_empty());
    assert_eq!(outcome.shutdowns + outcome.reboots, 0);
    assert_eq!(outcome.pulses, 20);
}

#[test]
fn empty_sequence_is_ignored() {
    let outcome = type_keys("*#");

    assert!(outcome.calls.is_empty());
    assert_eq!(outcome.pulses, 2);
}

#[test]
fn second_asterisk_restarts_recording() {
    let outcome = type_keys("*12*34#");

    assert_eq!(
        outcome.calls,
        vec![
            Call::LapCount("34".to_string()),
            Call::Presentation(PresentationAction::Trigger),
        ]
    );
}

#[test]
fn recordings_follow_each_other() {
    let outcome = type_keys("*7#5*00#*42#");

    assert_eq!(
        outcome.calls,
        vec![
            Call::LapCount("7".to_string()),
            Call::Presentation(PresentationAction::Trigger),
            Call::Presentation(PresentationAction::Clear),
            Call::LapCount("42".to_string()),
            Call::Presentation(PresentationAction::Trigger),
        ]
    );
}

#[test]
fn special_sequences_need_exact_match() {
    let outcome = type_keys("*99999#");

    assert_eq!(outcome.shutdowns, 0);
    assert_eq!(outcome.calls[0], Call::LapCount("99999".to_string()));
}

/// Runs both sensor watchers and the handler on edges fed by `feed`, until the sources are
/// dropped. Returns the dispatched calls and the indicator pulse count.
fn run_sensors(feed: impl FnOnce(&VirtualEdgeSource, &VirtualEdgeSource)) -> (Vec<Call>, usize) {
    let config = Config::default();
    let led = VirtualLine::new("led");
    let indicator = Indicator::new(&led, Duration::ZERO, Duration::ZERO);
    let dispatch = RecordingDispatch::default();
    let handler = SensorHandler::new(&config.sensors, &indicator, &dispatch);

    let (source_a, input_a) = VirtualEdgeSource::new("pin21", EdgeTrigger::Falling);
    let (source_b, input_b) = VirtualEdgeSource::new("pin23", EdgeTrigger::Falling);

    let (events, received) = mpsc::channel();
    let watchers = [input_a, input_b]
        .into_iter()
        .enumerate()
        .map(|(sensor, input)| {
            EdgeWatcher::new(sensor, Box::new(input), config.timing.bounce())
                .spawn(events.clone())
                .unwrap()
        })
        .collect::<Vec<_>>();
    drop(events);

    feed(&source_a, &source_b);
    drop((source_a, source_b));

    handler.run(received, &AtomicBool::new(true));
    for watcher in watchers {
        watcher.join().unwrap();
    }

    (dispatch.calls(), led.activations())
}

#[test]
fn sensor_drop_activates_cell_once() {
    let (calls, pulses) = run_sensors(|a, _| {
        a.push(Edge::Falling, 20 * MS);
        // Contact bounce, well inside the 500 ms window.
        for i in 1..=5 {
            a.push(Edge::Rising, (20 + 10 * i) * MS);
            a.push(Edge::Falling, (25 + 10 * i) * MS);
        }
    });

    assert_eq!(calls, vec![Call::GridCell(5201, [11, 2])]);
    assert_eq!(pulses, 1);
}

#[test]
fn short_pulses_far_apart_each_count() {
    let (calls, pulses) = run_sensors(|a, _| {
        for i in 0..5 {
            let start = i * 600 * MS;
            a.push(Edge::Falling, start);
            a.push(Edge::Rising, start + Duration::from_micros(300));
        }
    });

    assert_eq!(calls, vec![Call::GridCell(5201, [11, 2]); 5]);
    assert_eq!(pulses, 5);
}

#[test]
fn short_pulses_in_real_time() {
    let (calls, _) = run_sensors(|a, _| {
        a.pulse_low(Duration::from_micros(300));
        thread::sleep(550 * MS);
        a.pulse_low(Duration::from_micros(300));
    });

    assert_eq!(calls.len(), 2);
}

#[test]
fn sensors_bounce_independently() {
    let (calls, pulses) = run_sensors(|a, b| {
        a.push(Edge::Falling, 0 * MS);
        b.push(Edge::Falling, 100 * MS);
        a.push(Edge::Falling, 200 * MS);
        b.push(Edge::Falling, 700 * MS);
    });

    let mut cells = calls
        .into_iter()
        .map(|call| match call {
            Call::GridCell(_, cell) => cell,
            other => panic!("unexpected {:?}", other),
        })
        .collect::<Vec<_>>();
    cells.sort();
    assert_eq!(cells, vec![[11, 1], [11, 1], [11, 2]]);
    assert_eq!(pulses, 3);
}

/// A key matrix where presses are queued and each one is held for two row reads.
struct PressQueue {
    cols: [VirtualLine; KeypadKey::COLS],
    pending: Arc<Mutex<VecDeque<(usize, usize)>>>,
    held: Arc<Mutex<Option<(usize, usize, usize)>>>,
}

impl PressQueue {
    fn new(script: &str) -> Self {
        let positions = script
            .chars()
            .filter_map(|c| {
                (0..KeypadKey::ROWS)
                    .flat_map(|r| (0..KeypadKey::COLS).map(move |col| (r, col)))
                    .find(|&pos| KeypadKey::from_position(pos).map(KeypadKey::to_char) == Some(c))
            })
            .collect();

        PressQueue {
            cols: std::array::from_fn(|i| VirtualLine::new(&format!("col{i}"))),
            pending: Arc::new(Mutex::new(positions)),
            held: Arc::default(),
        }
    }

    fn done(&self) -> bool {
        self.pending.lock().unwrap().is_empty() && self.held.lock().unwrap().is_none()
    }

    fn rows(&self) -> [VirtualInput; KeypadKey::ROWS] {
        std::array::from_fn(|row| {
            let cols = self.cols.clone();
            let pending = self.pending.clone();
            let held = self.held.clone();
            VirtualInput::from_fn(&format!("row{row}"), move || {
                let mut held = held.lock().unwrap();
                match *held {
                    None => *held = pending.lock().unwrap().pop_front().map(|(r, c)| (r, c, 2)),
                    // Released, the line reads idle once before the next press.
                    Some((_, _, 0)) => {
                        *held = None;
                        return Ok(false);
                    }
                    Some(_) => {}
                }
                match *held {
                    Some((r, c, reads)) if r == row && cols[c].level() => {
                        *held = Some((r, c, reads - 1));
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            })
        })
    }
}

#[test]
fn sensor_events_do_not_disturb_keypad() {
    let config = Config::default();
    let led = VirtualLine::new("led");
    let indicator = Indicator::new(&led, Duration::from_millis(1), Duration::ZERO);
    let dispatch = RecordingDispatch::default();
    let power = RecordingPower::default();
    let handler = SensorHandler::new(&config.sensors, &indicator, &dispatch);

    let matrix = PressQueue::new("*1234#*00#");
    let rows = matrix.rows();
    let keypad = GpioKeypad::new(
        [&matrix.cols[0], &matrix.cols[1], &matrix.cols[2]],
        [&rows[0], &rows[1], &rows[2], &rows[3]],
    )
    .with_release_poll(Duration::ZERO);
    let mut app = App::new(&keypad, &indicator, Interpreter::new(&dispatch, &power, &indicator));

    let running = AtomicBool::new(true);
    let sent = AtomicUsize::new(0);

    thread::scope(|s| {
        let (events, received) = mpsc::channel();
        let (running, sent) = (&running, &sent);
        s.spawn(move || {
            while running.load(Ordering::SeqCst) {
                let sensor = sent.fetch_add(1, Ordering::SeqCst) % 2;
                events.send(SensorEvent { sensor }).unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        });
        let handler = &handler;
        // Drains until the sender side is done, whatever the main loop does.
        s.spawn(move || handler.run(received, &AtomicBool::new(true)));

        for _ in 0..200 {
            if matrix.done() {
                break;
            }
            assert_eq!(app.update().unwrap(), Flow::Continue);
        }
        running.store(false, Ordering::SeqCst);
    });

    assert!(matrix.done());
    assert_eq!(
        dispatch.keypad_calls(),
        vec![
            Call::LapCount("1234".to_string()),
            Call::Presentation(PresentationAction::Trigger),
            Call::Presentation(PresentationAction::Clear),
        ]
    );

    let sent = sent.load(Ordering::SeqCst);
    let grid_cells = dispatch.calls().len() - 3;
    assert_eq!(grid_cells, sent);
    assert_eq!(led.activations(), 10 + sent);
    assert!(matrix.cols.iter().all(|c| !c.level()));
}
