//! Operator confirmation input

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{ConsentError, ConsentResult};

/// Source of confirmation lines
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    /// Read one line of operator input. `None` means the input is closed.
    async fn read_line(&self) -> ConsentResult<Option<String>>;
}

/// Reads confirmation lines from stdin on the blocking pool, so waiting
/// for the operator never stalls tasks on the async runtime.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl ConfirmationPrompt for ConsolePrompt {
    async fn read_line(&self) -> ConsentResult<Option<String>> {
        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            let n = std::io::stdin().lock().read_line(&mut line)?;
            Ok::<_, std::io::Error>((n, line))
        })
        .await
        .map_err(|e| ConsentError::Prompt(e.to_string()))?;

        match read {
            Ok((0, _)) => Ok(None),
            Ok((_, line)) => Ok(Some(line)),
            Err(e) => Err(ConsentError::Prompt(e.to_string())),
        }
    }
}

/// Prompt that replays fixed answers and counts reads
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    reads: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of times the gate asked for input
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationPrompt for ScriptedPrompt {
    async fn read_line(&self) -> ConsentResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front())
    }
}
