//! ZhipuAI asynchronous completion jobs
//!
//! A job is submitted to `async/chat/completions`, which answers with a task
//! id. The result is then polled from `async-result/{id}` until its
//! `task_status` leaves `PROCESSING`.

use serde_json::Value;
use tracing::{Instrument, debug, info_span};

use super::provider::ChatZhipuAI;
use super::types::TaskStatus;
use crate::error::{Error, Result};
use crate::types::{CallOptions, ChatResult, Message};

impl ChatZhipuAI {
    /// Submit an async completion job and return its task id
    pub async fn submit_async_job(&self, messages: &[Message], options: &CallOptions) -> Result<String> {
        let request = self.build_request(messages, options, false)?;
        let url = self.endpoint("async/chat/completions");
        let body = request.to_body()?;

        let (url, body) = (url.as_str(), &body);
        let response = self
            .config()
            .retry
            .run(options.callbacks.as_deref(), move || self.post_json(url, body))
            .await?;

        let task_id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("async job response has no `id`"))?;
        debug!(task_id, "Submitted ZhipuAI async job");
        Ok(task_id.to_string())
    }

    /// Fetch the current state of an async job
    pub async fn poll_async_job(&self, task_id: &str) -> Result<TaskStatus> {
        let url = self.endpoint(&format!("async-result/{}", task_id));
        let response = self.get_json(&url).await?;
        self.task_status(&response)
    }

    /// Submit a job, then poll it at a fixed interval until it settles.
    ///
    /// Fails with [`Error::Timeout`] once `max_polls` polls have not produced
    /// a result.
    pub async fn generate_async(&self, messages: &[Message], options: CallOptions) -> Result<ChatResult> {
        let span = info_span!("zhipuai.generate_async", model = %self.model_name());

        async move {
            let task_id = self.submit_async_job(messages, &options).await?;
            let config = self.config();

            for poll in 1..=config.max_polls {
                match self.poll_async_job(&task_id).await? {
                    TaskStatus::Success(result) => return Ok(result),
                    TaskStatus::Failed => {
                        return Err(Error::provider_error(format!(
                            "Async job {} failed",
                            task_id
                        )));
                    }
                    TaskStatus::Processing => {
                        debug!(task_id = %task_id, poll, "Async job still processing");
                        if poll < config.max_polls && !config.poll_interval.is_zero() {
                            tokio::time::sleep(config.poll_interval).await;
                        }
                    }
                }
            }

            Err(Error::Timeout(format!(
                "Async job {} still processing after {} polls",
                task_id, config.max_polls
            )))
        }
        .instrument(span)
        .await
    }

    fn task_status(&self, response: &Value) -> Result<TaskStatus> {
        let status = response
            .get("task_status")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("async result has no `task_status`"))?;

        match status {
            "PROCESSING" => Ok(TaskStatus::Processing),
            "SUCCESS" => Ok(TaskStatus::Success(self.create_chat_result(response)?)),
            "FAIL" => Ok(TaskStatus::Failed),
            other => Err(Error::malformed(format!("unknown task status `{}`", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::zhipuai::types::ZhipuAIConfig;
    use serde_json::json;

    fn model() -> ChatZhipuAI {
        ChatZhipuAI::new(ZhipuAIConfig::new("k")).unwrap()
    }

    #[test]
    fn test_task_status_states() {
        let chat = model();

        assert_eq!(
            chat.task_status(&json!({ "task_status": "PROCESSING" })).unwrap(),
            TaskStatus::Processing
        );
        assert_eq!(
            chat.task_status(&json!({ "task_status": "FAIL" })).unwrap(),
            TaskStatus::Failed
        );

        let success = chat
            .task_status(&json!({
                "task_status": "SUCCESS",
                "choices": [{
                    "finish_reason": "stop",
                    "message": { "role": "assistant", "content": "done" }
                }],
                "usage": { "total_tokens": 3 }
            }))
            .unwrap();
        let TaskStatus::Success(result) = success else {
            panic!("Expected Success");
        };
        assert_eq!(result.text(), Some("done"));
    }

    #[test]
    fn test_unknown_or_missing_status_is_malformed() {
        let chat = model();
        assert!(matches!(
            chat.task_status(&json!({ "task_status": "QUEUED" })),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            chat.task_status(&json!({})),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_successful_job_without_choices_is_malformed() {
        let chat = model();
        assert!(matches!(
            chat.task_status(&json!({ "task_status": "SUCCESS" })),
            Err(Error::MalformedResponse(_))
        ));
    }
}
