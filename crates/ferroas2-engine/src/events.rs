//! Pipeline steps that report to the event sink.

use std::sync::Arc;

use async_trait::async_trait;
use ferroas2_core::{
    As2Error, DoneHandler, EventSink, FailureHandler, Phase, PipelineContext, Stage,
};

/// A pipeline context that can name the message it is working on.
pub(crate) trait MessageScoped {
    fn event_message_id(&self) -> String;
}

/// Publishes `text` when run as a stage or done handler, and an error event carrying
/// the failure when run as a failure handler.
pub(crate) struct Emit {
    events: Arc<dyn EventSink>,
    phase: Phase,
    text: &'static str,
}

impl Emit {
    pub(crate) fn new(events: Arc<dyn EventSink>, phase: Phase, text: &'static str) -> Self {
        Self {
            events,
            phase,
            text,
        }
    }
}

#[async_trait]
impl<C> Stage<C> for Emit
where
    C: PipelineContext + MessageScoped + Send,
{
    fn name(&self) -> &'static str {
        "ServerEvent"
    }

    async fn process(&self, ctx: &mut C) -> Result<(), As2Error> {
        self.events
            .info(self.phase, &ctx.event_message_id(), self.text);
        Ok(())
    }
}

#[async_trait]
impl<C> DoneHandler<C> for Emit
where
    C: PipelineContext + MessageScoped + Send,
{
    async fn on_done(&self, ctx: &mut C) -> Result<(), As2Error> {
        self.events
            .info(self.phase, &ctx.event_message_id(), self.text);
        Ok(())
    }
}

#[async_trait]
impl<C> FailureHandler<C> for Emit
where
    C: PipelineContext + MessageScoped + Send,
{
    async fn on_failure(&self, ctx: &mut C, error: &As2Error) -> Result<(), As2Error> {
        self.events.error(
            self.phase,
            &ctx.event_message_id(),
            self.text,
            Some(&error.to_string()),
        );
        Ok(())
    }
}
