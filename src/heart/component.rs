/// Bus components for heart-rate input and excitement detection
use serde_json::{json, Value};

use crate::config::ExcitementConfig;
use crate::error::ComponentError;
use crate::messaging::{Message, MessageKind};
use crate::runtime::{BackgroundTask, Component, Context, RetryPolicy};
use crate::signal::{Excitement, ExcitementState};

use super::receiver::HeartSource;

/// Posts a `HeartBeat` for every sample read from a heart-rate source
///
/// Reading happens on an owned background task. When a replay file runs out
/// the monitor shuts itself down, which observers see as `ComponentStopped`.
pub struct HeartMonitor {
    name: String,
    source: HeartSource,
    retry: RetryPolicy,
    task: Option<BackgroundTask>,
}

impl HeartMonitor {
    pub fn new(name: impl Into<String>, source: HeartSource, retry: RetryPolicy) -> Self {
        Self {
            name: name.into(),
            source,
            retry,
            task: None,
        }
    }
}

impl Component for HeartMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        let sender = ctx.sender();
        let source = self.source.clone();
        let retry = self.retry;

        let task = BackgroundTask::spawn(format!("{}-reader", self.name), move |token| {
            let result = source.run(&token, retry, |sample, backlog| {
                sender.send(MessageKind::HeartBeat { sample, backlog });
            });
            if let Err(e) = result {
                tracing::error!("{:#}", anyhow::Error::from(e));
            }
            if !token.is_cancelled() {
                tracing::info!("Heart rate source {} finished", source.path().display());
                sender.send_message(Message::new(MessageKind::Shutdown).to(sender.source()));
            }
        })?;
        self.task = Some(task);
        Ok(())
    }

    fn receive(&mut self, _message: &Message, _ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["source", "is_live"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "source" => Ok(json!(self.source.path().display().to_string())),
            "is_live" => Ok(json!(self.source.is_live())),
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }

    fn stop(&mut self, _ctx: &mut Context<'_>) {
        if let Some(mut task) = self.task.take() {
            task.cancel_and_join();
        }
    }
}

/// Runs the excitement detector on incoming heart beats
///
/// Posts `ExcitementChanged` whenever the state or the interesting flag
/// changes.
pub struct ExcitementMonitor {
    name: String,
    excitement: Excitement,
    last_state: Option<ExcitementState>,
    last_interesting: bool,
}

impl ExcitementMonitor {
    pub fn new(name: impl Into<String>, config: &ExcitementConfig) -> Self {
        Self {
            name: name.into(),
            excitement: Excitement::new(config),
            last_state: None,
            last_interesting: false,
        }
    }

    pub fn excitement(&self) -> &Excitement {
        &self.excitement
    }
}

impl Component for ExcitementMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self, message: &Message, ctx: &mut Context<'_>) -> Result<(), ComponentError> {
        let MessageKind::HeartBeat { sample, .. } = message.kind() else {
            return Ok(());
        };

        let state = self.excitement.process(sample.clone());
        let interesting = self.excitement.is_interesting();
        tracing::debug!("{}", self.excitement.status_line());

        if self.last_state != Some(state) || self.last_interesting != interesting {
            self.last_state = Some(state);
            self.last_interesting = interesting;
            ctx.send(MessageKind::ExcitementChanged {
                state,
                summary: self.excitement.summary().to_string(),
            });
        }
        Ok(())
    }

    fn exports(&self) -> &'static [&'static str] {
        &["state", "last_rate", "summary", "hspans"]
    }

    fn call(&mut self, method: &str, _args: &[Value], _ctx: &mut Context<'_>) -> Result<Value, ComponentError> {
        match method {
            "state" => Ok(json!(self.excitement.state())),
            "last_rate" => Ok(json!(self.excitement.last_rate())),
            "summary" => Ok(json!(self.excitement.summary())),
            "hspans" => {
                let spans: Vec<Value> = self
                    .excitement
                    .hspans()
                    .iter()
                    .map(|span| {
                        json!({
                            "start": span.min_sample.time,
                            "end": span.max_sample.time,
                            "start_rate": span.min_sample.rate,
                            "end_rate": span.max_sample.rate,
                        })
                    })
                    .collect();
                Ok(Value::Array(spans))
            }
            _ => Err(ComponentError::unknown_method(&self.name, method)),
        }
    }
}
