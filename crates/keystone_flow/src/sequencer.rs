//! # Action Sequencer
//!
//! A resumable list of asynchronous steps driven by an instruction pointer.
//!
//! ## Execution Model
//!
//! ```text
//!   pointer ──> [0] add ──> [1] delay ──> [2] add ──> [3] goto "L" ─┐
//!                               ^                                   │
//!                               └──────── label "L" = 1 <───────────┘
//! ```
//!
//! Steps run strictly in pointer order and each is awaited fully before the
//! next starts. A jump replaces the normal increment: the pointer is set to
//! the label's recorded position and execution resumes from that step.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──run──> Running ──ok──> Idle
//!                  │
//!                  └──step failed──> Failed ──run──> Running
//! ```
//!
//! The first failing step aborts the run; remaining steps are not executed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use keystone_core::{BoxError, IntoOutcome, SequencerConfig};
use thiserror::Error;

/// Values below this are read as seconds by [`Sequencer::delay_secs_or_millis`].
pub const SECONDS_THRESHOLD: f64 = 20.0;

type Action = Box<dyn FnMut() -> BoxFuture<'static, Result<(), BoxError>> + Send>;
type Condition = Box<dyn FnMut() -> bool + Send>;

/// Errors raised while building or running a sequence.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// A jump referenced a label that has not been declared yet.
    #[error("label \"{0}\" not found")]
    UnknownLabel(String),

    /// A step failed; the steps after it were not executed.
    #[error("step {index} failed: {source}")]
    StepFailed {
        /// Position of the failing step.
        index: usize,
        /// The step's error.
        #[source]
        source: BoxError,
    },
}

/// Result type for sequencer operations.
pub type SequencerResult<T> = Result<T, SequencerError>;

/// Sequencer behaviour switches, usually taken from the `[sequencer]`
/// table of the runtime configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequencerOptions {
    /// Wipe steps and labels after a successful run.
    pub auto_clear: bool,
    /// Trace every executed step at debug level.
    pub debug: bool,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            auto_clear: true,
            debug: false,
        }
    }
}

impl From<&SequencerConfig> for SequencerOptions {
    fn from(config: &SequencerConfig) -> Self {
        Self {
            auto_clear: config.auto_clear,
            debug: config.debug,
        }
    }
}

/// Lifecycle state of a sequencer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequencerState {
    /// Not running. Initial state and the state after a successful run.
    #[default]
    Idle,
    /// A run is in progress.
    Running,
    /// The last run stopped at a failing step.
    Failed,
}

enum Step {
    Action {
        name: &'static str,
        action: Action,
    },
    Delay(Duration),
    Goto {
        label: String,
        target: usize,
        condition: Option<Condition>,
    },
    Parallel(Vec<Action>),
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Self::Action { name, .. } => format!("action {name}"),
            Self::Delay(duration) => format!("delay {duration:?}"),
            Self::Goto { label, .. } => format!("goto {label}"),
            Self::Parallel(actions) => format!("parallel x{}", actions.len()),
        }
    }
}

enum Next {
    Advance,
    Jump(usize),
}

/// Resumable list of asynchronous steps.
pub struct Sequencer {
    steps: Vec<Step>,
    labels: HashMap<String, usize>,
    pointer: usize,
    state: SequencerState,
    options: SequencerOptions,
}

impl Sequencer {
    /// Creates an empty sequencer.
    #[must_use]
    pub fn new(options: SequencerOptions) -> Self {
        Self {
            steps: Vec::new(),
            labels: HashMap::new(),
            pointer: 0,
            state: SequencerState::Idle,
            options,
        }
    }

    /// Appends a step that calls `action` and awaits its future.
    ///
    /// Arguments are bound by capturing them in the closure. The future may
    /// resolve to `()` or `Result<(), E>`.
    pub fn add<F, Fut>(&mut self, action: F) -> &mut Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        self.steps.push(Step::Action {
            name: std::any::type_name::<F>(),
            action: boxed(action),
        });
        self
    }

    /// Appends a step that calls a synchronous `action`.
    pub fn add_sync<F, O>(&mut self, mut action: F) -> &mut Self
    where
        F: FnMut() -> O + Send + 'static,
        O: IntoOutcome,
    {
        self.steps.push(Step::Action {
            name: std::any::type_name::<F>(),
            action: Box::new(move || future::ready(action().into_outcome()).boxed()),
        });
        self
    }

    /// Appends a step that completes after `duration` has elapsed.
    pub fn delay(&mut self, duration: Duration) -> &mut Self {
        self.steps.push(Step::Delay(duration));
        self
    }

    /// Appends a delay whose unit is inferred from its magnitude.
    ///
    /// Values below [`SECONDS_THRESHOLD`] are seconds, anything else is
    /// milliseconds: `2.5` waits 2.5s, `250.0` waits 250ms. Prefer
    /// [`Sequencer::delay`] in new code.
    pub fn delay_secs_or_millis(&mut self, value: f64) -> &mut Self {
        self.delay(infer_delay(value))
    }

    /// Records the current step count under `name`.
    ///
    /// The jump target is the step appended right after this call.
    /// Re-declaring a label moves it.
    pub fn label(&mut self, name: impl Into<String>) -> &mut Self {
        self.labels.insert(name.into(), self.steps.len());
        self
    }

    /// Appends an unconditional jump to `label`.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::UnknownLabel`] if `label` has not been
    /// declared yet; nothing is appended.
    pub fn goto(&mut self, label: &str) -> SequencerResult<&mut Self> {
        self.push_goto(label, None)
    }

    /// Appends a jump to `label` taken only while `condition` returns `true`.
    ///
    /// The condition is evaluated each time the step is reached; when it
    /// returns `false` execution falls through to the next step.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::UnknownLabel`] if `label` has not been
    /// declared yet; nothing is appended.
    pub fn goto_if<C>(&mut self, label: &str, condition: C) -> SequencerResult<&mut Self>
    where
        C: FnMut() -> bool + Send + 'static,
    {
        self.push_goto(label, Some(Box::new(condition)))
    }

    fn push_goto(
        &mut self,
        label: &str,
        condition: Option<Condition>,
    ) -> SequencerResult<&mut Self> {
        let target = *self
            .labels
            .get(label)
            .ok_or_else(|| SequencerError::UnknownLabel(label.to_string()))?;

        self.steps.push(Step::Goto {
            label: label.to_string(),
            target,
            condition,
        });
        Ok(self)
    }

    /// Appends a step that starts every action concurrently.
    ///
    /// The step completes once all of them have settled. If any failed, the
    /// step fails with the first failure in argument order.
    pub fn parallel<I, F, Fut>(&mut self, actions: I) -> &mut Self
    where
        I: IntoIterator<Item = F>,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoOutcome,
    {
        let actions = actions.into_iter().map(boxed).collect();
        self.steps.push(Step::Parallel(actions));
        self
    }

    /// Executes every step from the start.
    ///
    /// On success the sequencer returns to [`SequencerState::Idle`] and, when
    /// `auto_clear` is set, is wiped so it can be reused from empty.
    ///
    /// # Errors
    ///
    /// Returns [`SequencerError::StepFailed`] for the first failing step. The
    /// sequencer is left in [`SequencerState::Failed`] with its steps intact.
    pub async fn run(&mut self) -> SequencerResult<()> {
        self.pointer = 0;
        self.state = SequencerState::Running;
        let debug = self.options.debug;

        while self.pointer < self.steps.len() {
            let index = self.pointer;
            let step = &mut self.steps[index];
            if debug {
                tracing::debug!(index, step = %step.describe(), "sequencer step");
            }

            let next = execute(step).await;
            match next {
                Ok(Next::Advance) => self.pointer += 1,
                Ok(Next::Jump(target)) => self.pointer = target,
                Err(source) => {
                    self.state = SequencerState::Failed;
                    tracing::warn!(index, error = %source, "sequencer step failed");
                    return Err(SequencerError::StepFailed { index, source });
                }
            }
        }

        self.state = SequencerState::Idle;
        if self.options.auto_clear {
            self.clear();
        }
        Ok(())
    }

    /// Discards every step and label.
    pub fn clear(&mut self) {
        self.steps.clear();
        self.labels.clear();
        self.pointer = 0;
    }

    /// Number of queued steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no steps are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Current instruction pointer.
    #[must_use]
    pub const fn pointer(&self) -> usize {
        self.pointer
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SequencerState {
        self.state
    }

    /// The options this sequencer was built with.
    #[must_use]
    pub const fn options(&self) -> SequencerOptions {
        self.options
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(SequencerOptions::default())
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("steps", &self.steps.iter().map(Step::describe).collect::<Vec<_>>())
            .field("labels", &self.labels)
            .field("pointer", &self.pointer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn boxed<F, Fut>(mut action: F) -> Action
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: IntoOutcome,
{
    Box::new(move || {
        let pending = action();
        async move { pending.await.into_outcome() }.boxed()
    })
}

async fn execute(step: &mut Step) -> Result<Next, BoxError> {
    match step {
        Step::Action { action, .. } => {
            action().await?;
            Ok(Next::Advance)
        }
        Step::Delay(duration) => {
            tokio::time::sleep(*duration).await;
            Ok(Next::Advance)
        }
        Step::Goto {
            target, condition, ..
        } => {
            let taken = condition.as_mut().map_or(true, |condition| condition());
            Ok(if taken { Next::Jump(*target) } else { Next::Advance })
        }
        Step::Parallel(actions) => {
            let pending: Vec<_> = actions.iter_mut().map(|action| action()).collect();
            let outcomes = future::join_all(pending).await;
            outcomes.into_iter().collect::<Result<Vec<()>, _>>()?;
            Ok(Next::Advance)
        }
    }
}

/// Converts a unit-less delay: below [`SECONDS_THRESHOLD`] is seconds,
/// otherwise milliseconds. Negative values and NaN become zero; anything
/// too large for a [`Duration`] saturates to [`Duration::MAX`].
#[must_use]
pub fn infer_delay(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    let secs = if value < SECONDS_THRESHOLD {
        value
    } else {
        value / 1000.0
    };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
