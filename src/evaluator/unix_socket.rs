use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::UnixStream,
    time::timeout,
};

use crate::arbitration::{
    error::{EvaluatorError, EvaluatorErrorKind},
    ports::EvaluatorPort,
};

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EvaluatorRequest<'a> {
    Eval { source: &'a str },
}

#[derive(Debug, Deserialize)]
struct EvaluatorReply {
    ok: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// NDJSON client for a remote script engine. One connection per evaluation,
/// one request line and one reply line.
pub struct UnixSocketEvaluator {
    socket_path: PathBuf,
    timeout: Duration,
}

impl UnixSocketEvaluator {
    pub fn new(socket_path: PathBuf, timeout_ms: u64) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_millis(timeout_ms.max(1)),
        }
    }

    async fn round_trip(&self, source: &str) -> Result<String, EvaluatorError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|err| {
            EvaluatorError::new(
                EvaluatorErrorKind::Unavailable,
                format!("connect {}: {err}", self.socket_path.display()),
            )
        })?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(&EvaluatorRequest::Eval { source })
            .map_err(|err| EvaluatorError::new(EvaluatorErrorKind::Protocol, err.to_string()))?;
        line.push('\n');
        write_half
            .write_all(line.as_bytes())
            .await
            .map_err(|err| EvaluatorError::new(EvaluatorErrorKind::Unavailable, err.to_string()))?;

        let mut lines = BufReader::new(read_half).lines();
        let reply_line = lines
            .next_line()
            .await
            .map_err(|err| EvaluatorError::new(EvaluatorErrorKind::Unavailable, err.to_string()))?
            .ok_or_else(|| {
                EvaluatorError::new(
                    EvaluatorErrorKind::Protocol,
                    "evaluator closed the connection without a reply",
                )
            })?;
        let reply: EvaluatorReply = serde_json::from_str(&reply_line)
            .map_err(|err| EvaluatorError::new(EvaluatorErrorKind::Protocol, err.to_string()))?;

        if reply.ok {
            Ok(reply.result.unwrap_or_default())
        } else {
            Err(EvaluatorError::rejected(
                reply
                    .error
                    .unwrap_or_else(|| "evaluation failed".to_string()),
            ))
        }
    }
}

#[async_trait]
impl EvaluatorPort for UnixSocketEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<String, EvaluatorError> {
        match timeout(self.timeout, self.round_trip(expression)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    target: "evaluator",
                    socket_path = %self.socket_path.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "evaluation_timed_out"
                );
                Err(EvaluatorError::new(
                    EvaluatorErrorKind::Timeout,
                    format!("no reply within {}ms", self.timeout.as_millis()),
                ))
            }
        }
    }
}
