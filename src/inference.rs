//! Boundary to the language-model service
//!
//! The engine only needs a raw text reply per submitted prompt. Requests for
//! one turn are all dispatched up front, each on its own task with its own
//! deadline, and awaited afterwards in acting order. A request that times out
//! or fails resolves to `Reply::Unavailable` and never affects the others.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::AgentId;
use crate::error::InferenceError;
use crate::prompt::PromptContext;
use crate::sim::{Action, parse};

/// What came back for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    /// Raw reply text, possibly not a valid command
    Text(String),
    /// No reply: timeout, transport failure or aborted request
    Unavailable { reason: String },
}

impl Reply {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Reply::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reply::Unavailable { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text),
            Reply::Unavailable { .. } => None,
        }
    }

    /// Parsed command; a missing reply counts as `Invalid`
    pub fn command(&self) -> Action {
        self.text().map_or(Action::Invalid, parse)
    }
}

impl From<Result<String, InferenceError>> for Reply {
    fn from(result: Result<String, InferenceError>) -> Self {
        match result {
            Ok(text) => Reply::Text(text),
            Err(err) => Reply::unavailable(err.to_string()),
        }
    }
}

/// One bot's request for one turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceRequest {
    pub agent_id: AgentId,
    /// The player's instruction for this round
    pub prompt: String,
    pub context: PromptContext,
}

/// The language-model service
#[async_trait]
pub trait Inference: Send + Sync {
    /// Produce the raw reply text for one request
    async fn submit(&self, request: InferenceRequest) -> Result<String, InferenceError>;
}

/// A dispatched request whose reply has not been collected yet
#[derive(Debug)]
pub struct PendingReply {
    pub agent_id: AgentId,
    handle: JoinHandle<Result<String, InferenceError>>,
}

impl PendingReply {
    /// Wait for the reply (bounded by the dispatch deadline)
    pub async fn resolve(self) -> Reply {
        let result = match self.handle.await {
            Ok(result) => result,
            Err(join_err) => Err(InferenceError::Aborted(join_err.to_string())),
        };
        if let Err(err) = &result {
            log::warn!("Bot {} got no reply: {}", self.agent_id, err);
        }
        Reply::from(result)
    }
}

/// Spawn one request on its own task with its own deadline
///
/// Must be called from within a tokio runtime.
pub fn dispatch(inference: &Arc<dyn Inference>, request: InferenceRequest, timeout: Duration) -> PendingReply {
    let agent_id = request.agent_id;
    let inference = Arc::clone(inference);
    let handle = tokio::spawn(async move {
        tokio::time::timeout(timeout, inference.submit(request))
            .await
            .unwrap_or(Err(InferenceError::Timeout(timeout)))
    });
    PendingReply { agent_id, handle }
}

/// A canned step of a `ScriptedInference` queue
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Text(String),
    /// Reply after sleeping
    Delayed(Duration, String),
    Fail(InferenceError),
}

#[derive(Debug, Default)]
struct Script {
    queues: HashMap<AgentId, VecDeque<ScriptedReply>>,
    fallback: HashMap<AgentId, String>,
    received: Vec<InferenceRequest>,
}

/// Inference service that plays back queued replies per bot
///
/// Once a bot's queue is empty it answers with its fallback text, or a
/// transport error when it has none.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInference {
    script: Arc<Mutex<Script>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // The script holds plain data, a poisoned lock is still usable
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue one reply
    pub fn reply(self, agent_id: AgentId, text: impl Into<String>) -> Self {
        self.push(agent_id, ScriptedReply::Text(text.into()))
    }

    /// Queue several replies in order
    pub fn replies<I, S>(self, agent_id: AgentId, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .fold(self, |script, text| script.reply(agent_id, text))
    }

    /// Queue a reply that arrives after `delay`
    pub fn delayed(self, agent_id: AgentId, delay: Duration, text: impl Into<String>) -> Self {
        self.push(agent_id, ScriptedReply::Delayed(delay, text.into()))
    }

    /// Queue a failure
    pub fn failing(self, agent_id: AgentId, err: InferenceError) -> Self {
        self.push(agent_id, ScriptedReply::Fail(err))
    }

    /// Answer with `text` whenever the queue is empty
    pub fn always(self, agent_id: AgentId, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_script(|s| {
            s.fallback.insert(agent_id, text);
        })
    }

    pub fn push(self, agent_id: AgentId, step: ScriptedReply) -> Self {
        self.with_script(|s| s.queues.entry(agent_id).or_default().push_back(step))
    }

    /// Every request received so far, in arrival order
    pub fn received(&self) -> Vec<InferenceRequest> {
        self.lock().received.clone()
    }
}

#[async_trait]
impl Inference for ScriptedInference {
    async fn submit(&self, request: InferenceRequest) -> Result<String, InferenceError> {
        let agent_id = request.agent_id;
        let step = {
            let mut script = self.lock();
            script.received.push(request);
            let queued = script.queues.get_mut(&agent_id).and_then(VecDeque::pop_front);
            queued.or_else(|| script.fallback.get(&agent_id).cloned().map(ScriptedReply::Text))
        };

        match step {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(ScriptedReply::Fail(err)) => Err(err),
            None => Err(InferenceError::Transport(format!(
                "no scripted reply left for bot {}",
                agent_id
            ))),
        }
    }
}
