//! Linear pipeline engine
//!
//! A [`Pipeline`] runs an ordered list of [`Stage`]s over a caller-owned context:
//!
//! - stages run one after another; a stage may end the run early through
//!   [`PipelineContext::terminate`]
//! - the first stage error stops the run and is handed to every [`FailureHandler`];
//!   errors raised by the handlers themselves are logged and dropped
//! - every [`DoneHandler`] runs afterwards, whatever happened, each one isolated from
//!   the others
//!
//! There is no retry and no concurrency between stages.

use async_trait::async_trait;

use crate::error::As2Error;

/// Context threaded through a pipeline run.
pub trait PipelineContext: Send {
    /// Stop the run after the current stage, without treating it as a failure.
    fn terminate(&mut self);

    fn is_terminated(&self) -> bool;
}

#[async_trait]
pub trait Stage<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn process(&self, ctx: &mut C) -> Result<(), As2Error>;
}

#[async_trait]
pub trait FailureHandler<C: Send>: Send + Sync {
    async fn on_failure(&self, ctx: &mut C, error: &As2Error) -> Result<(), As2Error>;
}

#[async_trait]
pub trait DoneHandler<C: Send>: Send + Sync {
    async fn on_done(&self, ctx: &mut C) -> Result<(), As2Error>;
}

/// How the stage sequence ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed,
    Terminated { by: &'static str },
    Failed { stage: &'static str, error: As2Error },
}

impl PipelineOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed { .. })
    }

    /// Convert into a `Result`, treating early termination as success.
    pub fn into_result(self) -> Result<(), As2Error> {
        match self {
            PipelineOutcome::Failed { error, .. } => Err(error),
            _ => Ok(()),
        }
    }
}

pub struct Pipeline<C: Send> {
    name: &'static str,
    stages: Vec<Box<dyn Stage<C>>>,
    failure_handlers: Vec<Box<dyn FailureHandler<C>>>,
    done_handlers: Vec<Box<dyn DoneHandler<C>>>,
}

impl<C: PipelineContext> Pipeline<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
            failure_handlers: Vec::new(),
            done_handlers: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: impl Stage<C> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn on_failure(mut self, handler: impl FailureHandler<C> + 'static) -> Self {
        self.failure_handlers.push(Box::new(handler));
        self
    }

    pub fn on_done(mut self, handler: impl DoneHandler<C> + 'static) -> Self {
        self.done_handlers.push(Box::new(handler));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&self, ctx: &mut C) -> PipelineOutcome {
        let outcome = self.run_stages(ctx).await;

        if let PipelineOutcome::Failed { stage, error } = &outcome {
            tracing::debug!(
                pipeline = self.name,
                stage = *stage,
                error = %error,
                "Pipeline stage failed, running failure handlers"
            );
            for handler in &self.failure_handlers {
                if let Err(e) = handler.on_failure(ctx, error).await {
                    tracing::error!(
                        pipeline = self.name,
                        error = %e,
                        "Failure handler raised an error"
                    );
                }
            }
        }

        for handler in &self.done_handlers {
            if let Err(e) = handler.on_done(ctx).await {
                tracing::error!(
                    pipeline = self.name,
                    error = %e,
                    "Done handler raised an error"
                );
            }
        }

        outcome
    }

    async fn run_stages(&self, ctx: &mut C) -> PipelineOutcome {
        for stage in &self.stages {
            if let Err(error) = stage.process(ctx).await {
                return PipelineOutcome::Failed {
                    stage: stage.name(),
                    error,
                };
            }
            if ctx.is_terminated() {
                tracing::debug!(
                    pipeline = self.name,
                    stage = stage.name(),
                    "Pipeline terminated early"
                );
                return PipelineOutcome::Terminated { by: stage.name() };
            }
        }
        PipelineOutcome::Completed
    }
}
