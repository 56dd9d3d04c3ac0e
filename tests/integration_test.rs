// Integration tests for pulsebus
// These exercise the public API across hubs, background tasks and sockets

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pulsebus::bridge::{ControllerBridge, RemoteController};
use pulsebus::config::{ExcitementConfig, GyroConfig};
use pulsebus::error::{BridgeError, BusError, ComponentError};
use pulsebus::headband::HeadMovement;
use pulsebus::heart::{ExcitementMonitor, HeartMonitor, HeartSource};
use pulsebus::messaging::{Message, MessageKind};
use pulsebus::outputs::{OutputComponent, VirtualOutput};
use pulsebus::runtime::{App, BackgroundTask, Component, Context, RetryPolicy};
use pulsebus::scenes::{Consent, HeadStop};
use pulsebus::signal::{Axis, BiasCalibration, CalibrationStore, FileStore, Gesture, MemoryStore};

const TIMEOUT: Duration = Duration::from_secs(2);

fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

fn activate(app: &App, name: &str) {
    app.broadcast(Message::new(MessageKind::SetActive { active: true }).to(name));
}

/// Owns a background task and records the order of its callbacks
struct Worker {
    name: String,
    task: Option<BackgroundTask>,
    task_exited: Arc<AtomicBool>,
    log: Arc<Mutex<Vec<String>>>,
}

impl Worker {
    fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> (Self, Arc<AtomicBool>) {
        let task_exited = Arc::new(AtomicBool::new(false));
        let worker = Self {
            name: name.to_string(),
            task: None,
            task_exited: Arc::clone(&task_exited),
            log: Arc::clone(log),
        };
        (worker, task_exited)
    }
}

impl Component for Worker {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        let flag = Arc::clone(&self.task_exited);
        self.task = Some(BackgroundTask::spawn(format!("{}-task", self.name), move |token| {
            while token.sleep(Duration::from_millis(5)) {}
            flag.store(true, Ordering::SeqCst);
        })?);
        Ok(())
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        match message.kind() {
            MessageKind::SetMode { mode } if message.is_addressed_to(&self.name) => match mode.as_str() {
                "sync" => {
                    let result = ctx.call("peer", "whoami", vec![], TIMEOUT);
                    let entry = match result {
                        Ok(value) => format!("sync ok {}", value),
                        Err(BusError::ReentrantCall(target)) => format!("sync refused {}", target),
                        Err(e) => format!("sync error {}", e),
                    };
                    self.log.lock().push(entry);
                }
                "async" => {
                    let call_id = ctx.call_with_reply("peer", "whoami", vec![])?;
                    self.log.lock().push(format!("async sent {}", call_id));
                }
                "fail" => return Err(ComponentError::invalid_argument("receive", "asked to fail")),
                "panic" => {
                    let empty: Vec<u32> = Vec::new();
                    let index = empty.len();
                    self.log.lock().push(format!("unreachable {}", empty[index]));
                }
                other => self.log.lock().push(format!("{} saw {}", self.name, other)),
            },
            MessageKind::CallReply { call_id, result } if message.is_addressed_to(&self.name) => {
                let value = result.clone().unwrap_or_else(|e| json!(e));
                self.log.lock().push(format!("async reply {} {}", call_id, value));
            }
            _ => {}
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["whoami", "crash"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "whoami" => Ok(json!(self.name)),
            "crash" => panic!("{} crashed", self.name),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }

    fn stop(&mut self, _ctx: &mut Context<'_>) {
        if let Some(mut task) = self.task.take() {
            task.cancel_and_join();
        }
        self.log.lock().push(format!("{} stopped", self.name));
    }
}

fn set_mode(target: &str, mode: &str) -> Message {
    Message::new(MessageKind::SetMode {
        mode: mode.to_string(),
    })
    .to(target)
}

#[test]
fn test_shutdown_stops_every_component_and_task() {
    let app = App::new();
    let (events, _tap) = app.subscribe();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = app.add_hub("first").unwrap();
    let second = app.add_hub("second").unwrap();
    let (a, a_exited) = Worker::new("a", &log);
    let (b, b_exited) = Worker::new("b", &log);
    app.add_component(first, Box::new(a)).unwrap();
    app.add_component(second, Box::new(b)).unwrap();
    assert_eq!(app.component_names(), vec!["a", "b"]);

    app.shutdown();

    // shutdown() returns only after every stop() ran and joined its task
    assert!(a_exited.load(Ordering::SeqCst));
    assert!(b_exited.load(Ordering::SeqCst));
    assert!(app.component_names().is_empty());

    let mut stopped: Vec<String> = events
        .try_iter()
        .filter_map(|m| match m.kind() {
            MessageKind::ComponentStopped { name } => Some(name.clone()),
            _ => None,
        })
        .collect();
    stopped.sort();
    assert_eq!(stopped, vec!["a", "b"]);
}

#[test]
fn test_failing_component_stops_alone() {
    let app = App::new();
    let (events, _tap) = app.subscribe();
    let log = Arc::new(Mutex::new(Vec::new()));

    let hub = app.add_hub("main").unwrap();
    let (a, a_exited) = Worker::new("a", &log);
    let (b, _) = Worker::new("b", &log);
    app.add_component(hub, Box::new(a)).unwrap();
    app.add_component(hub, Box::new(b)).unwrap();

    app.broadcast(set_mode("a", "fail"));
    assert!(wait_for(|| events.try_iter().any(|m| matches!(
        m.kind(),
        MessageKind::ComponentStopped { name } if name == "a"
    ))));
    assert!(a_exited.load(Ordering::SeqCst));
    assert!(!app.contains("a"));

    // The rest of the hub keeps working
    assert_eq!(app.call("b", "whoami", vec![], TIMEOUT).unwrap(), json!("b"));
    app.shutdown();
}

fn stopped_names(events: &crossbeam_channel::Receiver<Arc<Message>>) -> Vec<String> {
    events
        .try_iter()
        .filter_map(|m| match m.kind() {
            MessageKind::ComponentStopped { name } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_panicking_component_stops_alone() {
    let app = App::new();
    let (events, _tap) = app.subscribe();
    let log = Arc::new(Mutex::new(Vec::new()));

    let hub = app.add_hub("main").unwrap();
    let (bad, bad_exited) = Worker::new("bad", &log);
    let (good, good_exited) = Worker::new("good", &log);
    app.add_component(hub, Box::new(bad)).unwrap();
    app.add_component(hub, Box::new(good)).unwrap();

    app.broadcast(set_mode("bad", "panic"));
    app.broadcast(set_mode("good", "after"));

    assert!(wait_for(|| log.lock().iter().any(|e| e == "good saw after")));
    assert!(wait_for(|| !app.contains("bad")));
    assert!(bad_exited.load(Ordering::SeqCst));
    assert!(!good_exited.load(Ordering::SeqCst));
    assert!(log.lock().iter().any(|e| e == "bad stopped"));
    assert!(app.contains("good"));
    assert_eq!(app.call("good", "whoami", vec![], TIMEOUT).unwrap(), json!("good"));
    assert!(stopped_names(&events).contains(&"bad".to_string()));

    app.shutdown();
    assert!(good_exited.load(Ordering::SeqCst));
}

#[test]
fn test_panicking_call_fails_and_stops_the_target() {
    let app = App::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let hub = app.add_hub("main").unwrap();
    let (bad, bad_exited) = Worker::new("bad", &log);
    let (good, _) = Worker::new("good", &log);
    app.add_component(hub, Box::new(bad)).unwrap();
    app.add_component(hub, Box::new(good)).unwrap();

    match app.call("bad", "crash", vec![], TIMEOUT) {
        Err(BusError::CallFailed { component, message, .. }) => {
            assert_eq!(component, "bad");
            assert!(message.contains("bad crashed"));
        }
        other => panic!("unexpected call result: {:?}", other),
    }
    assert!(wait_for(|| !app.contains("bad")));
    assert!(bad_exited.load(Ordering::SeqCst));
    assert_eq!(app.call("good", "whoami", vec![], TIMEOUT).unwrap(), json!("good"));

    app.shutdown();
}

#[test]
fn test_call_semantics_between_components() {
    let app = App::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = app.add_hub("first").unwrap();
    let second = app.add_hub("second").unwrap();
    let (caller, _) = Worker::new("caller", &log);
    let (peer, _) = Worker::new("peer", &log);
    app.add_component(first, Box::new(caller)).unwrap();
    app.add_component(first, Box::new(peer)).unwrap();

    // Same hub: a blocking call is refused, a reply call goes through
    app.broadcast(set_mode("caller", "sync"));
    app.broadcast(set_mode("caller", "async"));
    assert!(wait_for(|| log.lock().iter().any(|e| e.starts_with("async reply"))));
    {
        let log = log.lock();
        assert_eq!(log[0], "sync refused peer");
        assert_eq!(log[1], "async sent 1");
        assert_eq!(log[2], "async reply 1 \"peer\"");
    }

    // Different hub: a blocking call works
    let (remote, _) = Worker::new("remote", &log);
    app.add_component(second, Box::new(remote)).unwrap();
    assert!(wait_for(|| app.contains("remote")));
    assert_eq!(app.call("remote", "whoami", vec![], TIMEOUT).unwrap(), json!("remote"));

    assert!(matches!(
        app.call("remote", "explode", vec![], TIMEOUT),
        Err(BusError::UnknownMethod { .. })
    ));
    assert!(matches!(
        app.call("nobody", "whoami", vec![], TIMEOUT),
        Err(BusError::ComponentNotFound(_))
    ));
    app.shutdown();
}

#[test]
fn test_heart_replay_drives_excitement() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.jsonl");
    let lines: String = (0..30).map(|t| format!("[{}, {}, []]\n", t * 1_000_000_000i64, 60 + t % 3)).collect();
    std::fs::write(&path, lines).unwrap();

    let app = App::new();
    let (events, _tap) = app.subscribe();
    let inputs = app.add_hub("inputs").unwrap();
    let main = app.add_hub("main").unwrap();
    app.add_component(main, Box::new(ExcitementMonitor::new("excitement", &ExcitementConfig::default())))
        .unwrap();
    app.add_component(
        inputs,
        Box::new(HeartMonitor::new(
            "heart",
            HeartSource::from_path(&path),
            RetryPolicy::fixed(Duration::from_millis(10)),
        )),
    )
    .unwrap();

    let mut beats = 0;
    let deadline = Instant::now() + TIMEOUT;
    loop {
        let message = events.recv_deadline(deadline).expect("replay did not finish");
        match message.kind() {
            MessageKind::HeartBeat { backlog, .. } => {
                assert!(!backlog);
                beats += 1;
            }
            MessageKind::ComponentStopped { name } if name == "heart" => break,
            _ => {}
        }
    }
    assert_eq!(beats, 30);

    // Heart beats were queued on the main hub before this call
    let last_rate = app.call("excitement", "last_rate", vec![], TIMEOUT).unwrap();
    assert_eq!(last_rate, json!(62.0));
    let state = app.call("excitement", "state", vec![], TIMEOUT).unwrap();
    assert!(state.is_string());
    app.shutdown();
}

#[test]
fn test_calibration_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let store: Arc<dyn CalibrationStore> = Arc::new(FileStore::new(dir.path()));
    let mut first = BiasCalibration::new(Axis::Y, 4, Arc::clone(&store));
    assert!(!first.is_calibrated());
    for raw in [1.0, 2.0, 3.0, 2.0] {
        assert_eq!(first.correct(raw), None);
    }
    assert_eq!(first.correct(5.0), Some(3.0));
    assert_eq!(first.bias(), Some(2.0));

    // A new session finds the stored bias and corrects from the first sample
    let store: Arc<dyn CalibrationStore> = Arc::new(FileStore::new(dir.path()));
    let mut second = BiasCalibration::new(Axis::Y, 4, store);
    assert!(second.is_calibrated());
    assert_eq!(second.correct(2.5), Some(0.5));

    // Other axes are still uncalibrated
    let store: Arc<dyn CalibrationStore> = Arc::new(FileStore::new(dir.path()));
    assert!(!BiasCalibration::new(Axis::X, 4, store).is_calibrated());
}

#[test]
fn test_gyro_nod_reaches_taps() {
    let store = MemoryStore::new();
    for axis in Axis::ALL {
        store.save(axis.name(), 0.0).unwrap();
    }

    let app = App::new();
    let (events, _tap) = app.subscribe();
    let hub = app.add_hub("main").unwrap();
    let head = HeadMovement::new("head", "yesno", GyroConfig::default(), Arc::new(store)).unwrap();
    app.add_component(hub, Box::new(head)).unwrap();

    let samples = MessageKind::GyroSamples {
        samples: vec![[0.0, 100.0, 0.0]; 4],
        timestamps: vec![0.0, 0.02, 0.04, 0.06],
    };

    // Inactive: nothing happens
    app.broadcast(samples.clone());
    assert_eq!(app.call("head", "is_active", vec![], TIMEOUT).unwrap(), json!(false));

    activate(&app, "head");
    app.broadcast(samples);
    app.call("head", "mode", vec![], TIMEOUT).unwrap();

    let gestures: Vec<Gesture> = events
        .try_iter()
        .filter_map(|m| match m.kind() {
            MessageKind::HeadYesNo { gesture, .. } => Some(*gesture),
            _ => None,
        })
        .collect();
    assert_eq!(gestures, vec![Gesture::Yes]);
    app.shutdown();
}

#[test]
fn test_scene_drives_output_group() {
    let app = App::new();
    let scenes = app.add_hub("scenes").unwrap();
    let outputs = app.add_hub("outputs").unwrap();

    app.add_component(scenes, Box::new(HeadStop::new("stop", 1))).unwrap();
    app.add_component(outputs, Box::new(OutputComponent::new("lamp", 1, Box::new(VirtualOutput::new("Lamp")))))
        .unwrap();
    app.add_component(outputs, Box::new(OutputComponent::new("other", 2, Box::new(VirtualOutput::new("Other")))))
        .unwrap();

    let gyro = MessageKind::HeadGyro {
        x: 13.0,
        y: 0.0,
        z: 0.0,
        dx: 0.0,
        dy: 0.0,
        dz: 0.0,
    };

    // Inactive scene ignores the headband
    app.broadcast(gyro.clone());
    assert_eq!(app.call("stop", "power", vec![], TIMEOUT).unwrap(), json!(0.0));

    activate(&app, "stop");
    app.broadcast(gyro);
    let power = |name: &str| app.call(name, "power", vec![], TIMEOUT).unwrap();
    assert!(wait_for(|| power("lamp") == json!(0.5)));
    assert_eq!(power("other"), json!(0.0));

    app.broadcast(MessageKind::EmergencyStop);
    assert!(wait_for(|| power("lamp") == json!(0.0)));
    app.shutdown();
}

#[test]
fn test_consent_decays_power() {
    let app = App::new();
    let hub = app.add_hub("main").unwrap();
    app.add_component(hub, Box::new(Consent::new("consent", 1))).unwrap();
    app.add_component(hub, Box::new(OutputComponent::new("toy", 1, Box::new(VirtualOutput::new("Toy")))))
        .unwrap();

    activate(&app, "consent");
    // 1.0 / 52 * 52 / 5
    app.broadcast(MessageKind::HeadYesNo {
        gesture: Gesture::Yes,
        intensity: 1.0,
        ts: 0.0,
        frames: 52,
    });

    let power = || {
        app.call("toy", "power", vec![], TIMEOUT)
            .unwrap()
            .as_f64()
            .unwrap()
    };
    assert!(wait_for(|| (power() - 0.2).abs() < 1e-6));
    // Decay ticks every 500ms
    assert!(wait_for(|| power() < 0.19));

    app.broadcast(Message::new(MessageKind::SetActive { active: false }).to("consent"));
    app.shutdown();
}

#[test]
fn test_controller_bridge_serves_exported_methods() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("controller.socket");
    let listener = UnixListener::bind(&socket).unwrap();

    let app = App::new();
    let hub = app.add_hub("main").unwrap();
    app.add_component(hub, Box::new(ExcitementMonitor::new("excitement", &ExcitementConfig::default())))
        .unwrap();
    app.add_component(
        hub,
        Box::new(ControllerBridge::new(
            "controller",
            &socket,
            RetryPolicy::fixed(Duration::from_millis(10)),
            TIMEOUT,
        )),
    )
    .unwrap();

    let (stream, _) = listener.accept().unwrap();
    let mut remote = RemoteController::new(stream, TIMEOUT).unwrap();

    assert_eq!(remote.call("excitement", "state", vec![]).unwrap(), json!("coast"));
    assert_eq!(remote.call("controller", "is_connected", vec![]).unwrap(), json!(true));
    assert!(matches!(
        remote.call("excitement", "fly", vec![]),
        Err(BridgeError::Remote(e)) if e.contains("fly")
    ));

    app.shutdown();
}
