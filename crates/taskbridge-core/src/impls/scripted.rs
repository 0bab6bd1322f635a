//! ScriptedComms - canned supervisor answers for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::domain::errors::CommsError;
use crate::domain::messages::{ToSupervisor, ToTask};
use crate::ports::SupervisorComms;
use crate::sync::lock;

/// A [`SupervisorComms`] that replays scripted responses and records every
/// request it receives.
///
/// Queued responses are consumed first, in order. Once the queue is empty the
/// fallback response (if any) answers every request. With neither, the
/// channel behaves as if the supervisor went away.
#[derive(Debug, Default)]
pub struct ScriptedComms {
    script: Mutex<Script>,
}

#[derive(Debug, Default)]
struct Script {
    queued: VecDeque<ToTask>,
    fallback: Option<ToTask>,
    requests: Vec<ToSupervisor>,
}

impl ScriptedComms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every request (after the queue drains) with `response`.
    pub fn answering(response: ToTask) -> Self {
        let comms = Self::new();
        comms.respond_always(response);
        comms
    }

    pub fn push(&self, response: ToTask) {
        lock(&self.script).queued.push_back(response);
    }

    pub fn respond_always(&self, response: ToTask) {
        lock(&self.script).fallback = Some(response);
    }

    pub fn requests(&self) -> Vec<ToSupervisor> {
        lock(&self.script).requests.clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.script).requests.len()
    }

    /// Forgets recorded requests and pending responses.
    pub fn reset(&self) {
        let mut script = lock(&self.script);
        script.queued.clear();
        script.fallback = None;
        script.requests.clear();
    }
}

impl SupervisorComms for ScriptedComms {
    fn send(&self, request: ToSupervisor) -> Result<ToTask, CommsError> {
        let mut script = lock(&self.script);
        script.requests.push(request);
        match script.queued.pop_front() {
            Some(response) => Ok(response),
            None => script.fallback.clone().ok_or(CommsError::Disconnected),
        }
    }
}
