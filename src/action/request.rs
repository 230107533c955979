use super::ActionHandler;
use crate::error::{DeckError, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long a request may wait for its response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A persistent connection that answers requests.
///
/// Connecting and reconnecting is the job of the plugin's liveness probe;
/// `send_receive` only uses whatever connection is currently up and fails
/// if there is none.
#[async_trait]
pub trait RequestClient: Send + Sync + 'static {
    type Request: Debug + Send + Sync;

    /// Send `request` and wait for its matching response. Returns the
    /// response status.
    async fn send_receive(&self, request: &Self::Request) -> Result<String>;
}

/// Send one fixed request on press.
pub struct RequestAction<C: RequestClient> {
    client: Arc<C>,
    request: C::Request,
    timeout: Duration,
}

impl<C: RequestClient> RequestAction<C> {
    pub fn new(client: Arc<C>, request: C::Request) -> Self {
        Self {
            client,
            request,
            timeout: RESPONSE_TIMEOUT,
        }
    }
}

#[async_trait]
impl<C: RequestClient> ActionHandler for RequestAction<C> {
    fn describe(&self) -> String {
        format!("{:?}", self.request)
    }

    async fn invoke(&self) -> Result<()> {
        let status = tokio::time::timeout(self.timeout, self.client.send_receive(&self.request))
            .await
            .map_err(|_| DeckError::Timeout {
                what: self.describe(),
                after: self.timeout,
            })??;
        info!(request = ?self.request, "response: {status}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{press, PressOutcome};
    use crate::button::{Appearance, Button, DeckButton};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedClient {
        sent: Mutex<Vec<String>>,
        hang: bool,
        fail: bool,
    }

    #[async_trait]
    impl RequestClient for ScriptedClient {
        type Request = String;

        async fn send_receive(&self, request: &String) -> Result<String> {
            self.sent.lock().unwrap().push(request.clone());
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.fail {
                return Err(DeckError::NotLive("scripted".into()));
            }
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn sends_bound_request() {
        let client = Arc::new(ScriptedClient::default());
        let action = RequestAction::new(client.clone(), "scene:webcam".to_string());
        action.invoke().await.unwrap();
        assert_eq!(*client.sent.lock().unwrap(), vec!["scene:webcam".to_string()]);
    }

    #[tokio::test]
    async fn dropped_connection_is_a_failed_press() {
        let client = Arc::new(ScriptedClient {
            fail: true,
            ..ScriptedClient::default()
        });
        let b = DeckButton::new(4, Appearance::default());
        b.set_action_handler(Arc::new(RequestAction::new(client, "x".to_string())));
        assert_eq!(press(&b).await, PressOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_request_times_out() {
        let client = Arc::new(ScriptedClient {
            hang: true,
            ..ScriptedClient::default()
        });
        let action = RequestAction::new(client, "x".to_string());
        let err = action.invoke().await.unwrap_err();
        assert!(matches!(err, DeckError::Timeout { after, .. } if after == RESPONSE_TIMEOUT));
    }
}
