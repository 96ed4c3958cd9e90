//! Scripted generation backend for tests: fixed fragment sequences,
//! mid-stream failures, refused connections, stalls, and gated completion.

use std::sync::Arc;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::{stream as futures_stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{FragmentStream, GenerationBackend};
use crate::types::RagError;

#[derive(Clone)]
enum Behavior {
    /// Yield the scripted items; an `Err` item ends the stream.
    Scripted(Vec<Result<String, String>>),
    /// Yield the fragments, then wait for the gate before finishing.
    Gated(Vec<String>, Arc<Notify>),
    /// Fail before the stream opens.
    Refusing(String),
    /// Never yield anything; exercises caller-side timeouts.
    Stalled,
}

pub struct MockGenerationBackend {
    behavior: Behavior,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockGenerationBackend {
    pub fn scripted<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = fragments.into_iter().map(|f| Ok(f.into())).collect();
        Self::with_behavior(Behavior::Scripted(script))
    }

    /// Yields the fragments, then fails mid-stream with `error`.
    pub fn scripted_with_error<I, S>(fragments: I, error: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script: Vec<Result<String, String>> =
            fragments.into_iter().map(|f| Ok(f.into())).collect();
        script.push(Err(error.to_string()));
        Self::with_behavior(Behavior::Scripted(script))
    }

    /// Yields the fragments, then holds the stream open until `gate` is
    /// notified.
    pub fn gated<I, S>(fragments: I, gate: Arc<Notify>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        Self::with_behavior(Behavior::Gated(fragments, gate))
    }

    pub fn refusing(error: &str) -> Self {
        Self::with_behavior(Behavior::Refusing(error.to_string()))
    }

    pub fn stalled() -> Self {
        Self::with_behavior(Behavior::Stalled)
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts seen so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, prompt: &str) -> Result<FragmentStream, RagError> {
        self.prompts.lock().push(prompt.to_string());

        match self.behavior.clone() {
            Behavior::Refusing(error) => Err(RagError::Generation(error)),
            Behavior::Stalled => Ok(futures_stream::pending().boxed()),
            Behavior::Scripted(script) => {
                let fragments = stream! {
                    for item in script {
                        match item {
                            Ok(text) => yield Ok(text),
                            Err(message) => {
                                yield Err(RagError::Generation(message));
                                break;
                            }
                        }
                    }
                };
                Ok(fragments.boxed())
            }
            Behavior::Gated(fragments, gate) => {
                let fragments = stream! {
                    for text in fragments {
                        yield Ok(text);
                    }
                    gate.notified().await;
                };
                Ok(fragments.boxed())
            }
        }
    }
}
