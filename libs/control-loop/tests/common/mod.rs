#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::sync::{Arc, Mutex};

use agent_api::{Bindings, TopicBinding};
use control_loop::{MetricsError, MetricsSink};

/// Control pipe stand-in. Each entry of the script is what one check
/// finds readable; an empty entry means nothing was written.
#[derive(Clone, Default)]
pub struct ScriptedPipe {
    script: Arc<Mutex<VecDeque<Option<Vec<u8>>>>>,
}

impl ScriptedPipe {
    pub fn checks(per_check: &[&str]) -> Self {
        let pipe = Self::default();
        for bytes in per_check {
            pipe.push(bytes);
        }
        pipe
    }

    /// Queue `bytes` for the next check that has nothing scripted yet.
    pub fn push(&self, bytes: &str) {
        let mut script = self.script.lock().unwrap();
        if !bytes.is_empty() {
            script.push_back(Some(bytes.as_bytes().to_vec()));
        }
        script.push_back(None);
    }
}

impl Read for ScriptedPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.lock().unwrap().pop_front() {
            Some(Some(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Some(None) | None => Err(io::Error::from(ErrorKind::WouldBlock)),
        }
    }
}

/// Metrics sink that remembers every call, optionally failing each one.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(String, i64)>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, i64)> {
        self.sent.lock().unwrap().clone()
    }

    /// Values reported under `metric`, in order.
    pub fn values(&self, metric: &str) -> Vec<i64> {
        self.sent()
            .into_iter()
            .filter(|(m, _)| m == metric)
            .map(|(_, v)| v)
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    async fn send(&self, metric: &str, value: i64) -> Result<(), MetricsError> {
        self.sent.lock().unwrap().push((metric.to_string(), value));
        if self.fail {
            return Err(MetricsError::Spawn {
                sender: "recording".into(),
                source: io::Error::other("sink down"),
            });
        }
        Ok(())
    }
}

pub fn producer_bindings() -> Bindings {
    Bindings::new(TopicBinding::single("orders"), TopicBinding::single("orders-dr"))
}

pub fn consumer_bindings() -> Bindings {
    Bindings::new(
        TopicBinding::pair("orders", "audit"),
        TopicBinding::pair("orders-dr", "audit-dr"),
    )
}

pub fn numbered_lines(n: usize) -> String {
    (0..n).map(|i| format!("line {i}\n")).collect()
}
