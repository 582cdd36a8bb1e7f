use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use provision_contracts::{ExecOutput, GuestChannel, ProvisionError};

/// A remote channel answering from a queue of scripted responses.
///
/// Once the queue is empty every command succeeds with empty output, so
/// scripts only need to cover the interesting prefix of a conversation.
#[derive(Default)]
pub struct ScriptedChannel {
    responses: Mutex<VecDeque<Result<ExecOutput, ProvisionError>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, stdout: &str) {
        self.push(Ok(ExecOutput::ok(stdout)));
    }

    pub fn push_exit(&self, exit_code: i32, stderr: &str) {
        self.push(Ok(ExecOutput::failed(exit_code, stderr)));
    }

    pub fn push_err(&self, error: ProvisionError) {
        self.push(Err(error));
    }

    /// Queue a fully specified output (exit code, stdout and stderr).
    pub fn push_response(&self, output: ExecOutput) {
        self.push(Ok(output));
    }

    fn push(&self, response: Result<ExecOutput, ProvisionError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }

    /// Every command executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl GuestChannel for ScriptedChannel {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ProvisionError> {
        self.commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(command.to_string());

        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(ExecOutput::ok("")))
    }
}
