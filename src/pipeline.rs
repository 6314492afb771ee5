//! C10 — Pipeline Orchestrator: wires C4 -> C5 -> C7/C8 -> C6 -> C9 and
//! exposes exactly one outcome per run, state-machine style like
//! `cosmos::workflow::{WorkflowState, Workflow}`.

use crate::config::Config;
use crate::context_engine::ContextEngine;
use crate::error::TransportError;
use crate::model::{CrashReport, FixSuggestion, PatchResult};
use crate::patcher::{self, PatchOptions};
use crate::prompt;
use crate::ratelimit::RateLimiter;
use crate::response;
use crate::transport::{CallParams, Transport};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Parsed,
    Prompted,
    Responded,
    Reviewed,
    Applied,
    Rejected,
    Failed,
    Skipped,
    NoFix,
    AiError,
}

/// Terminal result of one pipeline run against one `CrashReport`.
pub enum Outcome {
    Applied(PatchResult),
    Rejected,
    Failed(PatchResult),
    Skipped,
    NoFix,
    AiError(String),
}

/// Called after a valid `FixSuggestion` is produced, before it is applied.
/// Returning `false` yields `Outcome::Rejected` without touching disk.
pub type ConfirmFn<'a> = dyn Fn(&FixSuggestion) -> bool + 'a;

pub struct Pipeline {
    context_engine: ContextEngine,
    transport: Transport,
    rate_limiter: RateLimiter,
    config: Config,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            context_engine: ContextEngine::new(),
            transport: Transport::new(),
            rate_limiter: RateLimiter::new(5, 60),
            config,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub async fn run(
        &mut self,
        report: &CrashReport,
        confirm: &ConfirmFn<'_>,
        cancel: &watch::Receiver<bool>,
    ) -> Outcome {
        self.state = PipelineState::Idle;

        let Some(ctx) = self.context_engine.process(report) else {
            self.state = PipelineState::Skipped;
            return Outcome::Skipped;
        };
        self.state = PipelineState::Parsed;

        let Some(api_key) = self.config.api_key() else {
            self.state = PipelineState::Skipped;
            return Outcome::Skipped;
        };

        let system_prompt = prompt::system_prompt();
        let user_payload = prompt::build_user_payload(&ctx);
        let Ok(user_payload_json) = serde_json::to_string(&user_payload) else {
            self.state = PipelineState::Failed;
            return Outcome::AiError("failed to encode prompt payload".to_string());
        };
        self.state = PipelineState::Prompted;

        if *cancel.borrow() {
            self.state = PipelineState::Skipped;
            return Outcome::Skipped;
        }

        let params = CallParams {
            provider: self.config.provider,
            api_key: &api_key,
            model: &self.config.model,
            endpoint: self.config.endpoint.as_deref(),
            system_prompt,
            user_payload: &user_payload_json,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            timeout: self.config.timeout(),
            retry_count: self.config.retry_count,
        };

        let response_text = match self.transport.call(params, &self.rate_limiter, cancel).await {
            Ok(text) => text,
            Err(TransportError::Cancelled) => {
                self.state = PipelineState::Skipped;
                return Outcome::Skipped;
            }
            Err(err) => {
                self.state = PipelineState::AiError;
                return Outcome::AiError(err.to_string());
            }
        };
        self.state = PipelineState::Responded;

        let Some(fix) = response::parse(&response_text) else {
            self.state = PipelineState::NoFix;
            return Outcome::NoFix;
        };

        if !confirm(&fix) {
            self.state = PipelineState::Rejected;
            return Outcome::Rejected;
        }
        self.state = PipelineState::Reviewed;

        let options = PatchOptions {
            root_directory: self
                .config
                .root_directory
                .clone()
                .unwrap_or(report.working_directory.clone()),
            allow_outside_root: false,
            create_backup: self.config.auto_backup,
            verify_content: true,
        };

        let result = patcher::apply(&fix, &options);
        if result.success {
            self.state = PipelineState::Applied;
            Outcome::Applied(result)
        } else {
            self.state = PipelineState::Failed;
            Outcome::Failed(result)
        }
    }
}
