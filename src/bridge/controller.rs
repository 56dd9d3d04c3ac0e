/// Exported methods over a Unix socket
///
/// A parent process (for example a UI) listens on a socket and starts this
/// program with `--controller <socket>`. The child connects back and serves
/// calls to exported methods; the parent issues them with a
/// [`RemoteController`].
use crossbeam_utils::atomic::AtomicCell;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, ErrorKind};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BridgeError, ComponentError};
use crate::messaging::Message;
use crate::runtime::{App, BackgroundTask, CancelToken, Component, Context, RetryPolicy};

use super::protocol::{parse_frame, write_frame, Request, Response};

/// Poll interval for cancellation while waiting for requests
const READ_POLL: Duration = Duration::from_millis(200);

/// Answer requests from `stream` until it closes or `token` is cancelled
pub fn serve(app: &App, stream: UnixStream, token: &CancelToken, call_timeout: Duration) -> Result<(), BridgeError> {
    stream.set_read_timeout(Some(READ_POLL))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();

    while token.read_line(&mut reader, &mut line)? {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let request: Request = match parse_frame(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("{:#}", anyhow::Error::from(e));
                continue;
            }
        };
        tracing::debug!("Controller call {}", request.description());

        let Request {
            id,
            target,
            method,
            args,
        } = request;
        let result = app.call(&target, &method, args, call_timeout);
        if let Err(e) = &result {
            tracing::warn!("Controller call #{} failed: {}", id, e);
        }
        write_frame(&mut writer, &Response::from_result(id, result))?;
    }
    Ok(())
}

/// Child side of the controller socket
pub struct ControllerBridge {
    name: String,
    path: PathBuf,
    retry: RetryPolicy,
    call_timeout: Duration,
    connected: Arc<AtomicCell<bool>>,
    task: Option<BackgroundTask>,
}

impl ControllerBridge {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            retry,
            call_timeout,
            connected: Arc::new(AtomicCell::new(false)),
            task: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load()
    }
}

impl Component for ControllerBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        let app = ctx.app().clone();
        let path = self.path.clone();
        let retry = self.retry;
        let call_timeout = self.call_timeout;
        let connected = Arc::clone(&self.connected);

        let task = BackgroundTask::spawn(format!("{}-controller", self.name), move |token| {
            let what = format!("Connecting to controller at {}", path.display());
            // Reconnect whenever the parent goes away
            while let Some(stream) = retry.run(&token, &what, || UnixStream::connect(&path)) {
                tracing::info!("Connected to controller at {}", path.display());
                connected.store(true);
                let result = serve(&app, stream, &token, call_timeout);
                connected.store(false);
                match result {
                    Ok(()) if token.is_cancelled() => return,
                    Ok(()) => tracing::info!("Controller closed the connection"),
                    Err(e) => tracing::error!("{:#}", anyhow::Error::from(e)),
                }
            }
        })?;
        self.task = Some(task);
        Ok(())
    }

    fn receive(&mut self, _message: &Message, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["path", "is_connected"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "path" => Ok(json!(self.path.display().to_string())),
            "is_connected" => Ok(json!(self.is_connected())),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }

    fn stop(&mut self, _ctx: &mut Context<'_>) {
        if let Some(mut task) = self.task.take() {
            task.cancel_and_join();
        }
    }
}

/// Parent side of the controller socket
pub struct RemoteController {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    line: Vec<u8>,
    next_id: u64,
}

impl RemoteController {
    pub fn connect(path: &Path, timeout: Duration) -> Result<Self, BridgeError> {
        let stream = UnixStream::connect(path).map_err(|source| BridgeError::ConnectFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::new(stream, timeout)
    }

    /// Wrap an accepted stream; `timeout` bounds the wait for each reply
    pub fn new(stream: UnixStream, timeout: Duration) -> Result<Self, BridgeError> {
        stream.set_read_timeout(Some(timeout))?;
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            line: Vec::new(),
            next_id: 1,
        })
    }

    /// Call an exported method in the child and wait for its reply
    pub fn call(&mut self, target: &str, method: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request {
            id,
            target: target.to_string(),
            method: method.to_string(),
            args,
        };
        write_frame(&mut self.writer, &request)?;

        loop {
            let response: Response = parse_frame(&self.next_line()?)?;
            if response.id() == id {
                return response.into_result();
            }
            // Late reply to a call that already timed out
            tracing::debug!("Dropping stale controller reply #{}", response.id());
        }
    }

    fn next_line(&mut self) -> Result<Vec<u8>, BridgeError> {
        loop {
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => return Err(BridgeError::Closed),
                Ok(_) if self.line.ends_with(b"\n") => return Ok(std::mem::take(&mut self.line)),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(BridgeError::Timeout)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
