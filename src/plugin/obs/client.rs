use super::protocol::{self, op, Envelope, Hello, Identified, Identify, RequestResponse};
use crate::action::RequestClient;
use crate::error::{DeckError, Result};
use async_trait::async_trait;
use async_tungstenite::tokio::ConnectStream;
use async_tungstenite::tungstenite::Message;
use async_tungstenite::WebSocketStream;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

type Socket = WebSocketStream<ConnectStream>;

/// Requests this client knows how to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsRequest {
    SetCurrentProgramScene { scene: String },
    GetVersion,
}

impl ObsRequest {
    #[must_use]
    pub const fn request_type(&self) -> &'static str {
        match self {
            Self::SetCurrentProgramScene { .. } => "SetCurrentProgramScene",
            Self::GetVersion => "GetVersion",
        }
    }

    fn request_data(&self) -> Option<Value> {
        match self {
            Self::SetCurrentProgramScene { scene } => Some(json!({ "sceneName": scene })),
            Self::GetVersion => None,
        }
    }
}

/// A single obs-websocket connection, shared by the liveness probe and the
/// scene buttons. Requests are serialized on the connection.
pub struct ObsClient {
    url: String,
    password: Option<String>,
    timeout: Duration,
    socket: Mutex<Option<Socket>>,
    next_id: AtomicU64,
}

impl ObsClient {
    pub fn new(host: &str, port: u16, password: Option<String>, timeout: Duration) -> Self {
        Self {
            url: format!("ws://{host}:{port}"),
            password,
            timeout,
            socket: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Liveness probe: check the current connection, reconnecting if there
    /// is none or it stopped answering. Each step is bounded by the timeout.
    pub async fn probe(&self) -> bool {
        let mut socket = self.socket.lock().await;

        if let Some(ws) = socket.as_mut() {
            match tokio::time::timeout(self.timeout, self.call(ws, &ObsRequest::GetVersion)).await {
                Ok(Ok(_)) => return true,
                Ok(Err(e)) => debug!("OBS health check failed: {e}"),
                Err(_) => debug!("OBS health check timed out"),
            }
            *socket = None;
        }

        match tokio::time::timeout(self.timeout, self.connect()).await {
            Ok(Ok(ws)) => {
                info!("connected to OBS at {}", self.url);
                *socket = Some(ws);
                true
            }
            Ok(Err(e)) => {
                debug!("OBS connect to {} failed: {e}", self.url);
                false
            }
            Err(_) => {
                debug!("OBS connect to {} timed out", self.url);
                false
            }
        }
    }

    /// Close the connection, if any.
    pub async fn disconnect(&self) {
        if let Some(mut ws) = self.socket.lock().await.take() {
            let _ = ws.close(None).await;
        }
    }

    /// Open the websocket and complete the Hello/Identify handshake.
    async fn connect(&self) -> Result<Socket> {
        let (mut ws, _) = async_tungstenite::tokio::connect_async(self.url.as_str()).await?;

        let hello: Hello = read_op(&mut ws, op::HELLO).await?;
        debug!(
            "OBS {} speaks rpc {}",
            hello.obs_web_socket_version, hello.rpc_version
        );

        let authentication = match (&hello.authentication, &self.password) {
            (Some(auth), Some(password)) => Some(protocol::auth_response(
                password,
                &auth.salt,
                &auth.challenge,
            )),
            (Some(_), None) => {
                return Err(DeckError::Protocol(
                    "OBS requires a password but none is configured".into(),
                ));
            }
            (None, _) => None,
        };

        let identify = Identify {
            rpc_version: protocol::RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        };
        ws.send(Message::text(protocol::encode(op::IDENTIFY, &identify)?))
            .await?;

        let identified: Identified = read_op(&mut ws, op::IDENTIFIED).await?;
        debug!("OBS negotiated rpc {}", identified.negotiated_rpc_version);
        Ok(ws)
    }

    /// Send a request and wait for the response carrying the same id.
    async fn call(&self, ws: &mut Socket, request: &ObsRequest) -> Result<RequestResponse> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let frame = protocol::Request {
            request_type: request.request_type().to_string(),
            request_id: request_id.clone(),
            request_data: request.request_data(),
        };
        ws.send(Message::text(protocol::encode(op::REQUEST, &frame)?))
            .await?;

        loop {
            let envelope = next_envelope(ws).await?;
            if envelope.op != op::REQUEST_RESPONSE {
                continue;
            }
            let response: RequestResponse = serde_json::from_value(envelope.d)?;
            if response.request_id == request_id {
                return Ok(response);
            }
            debug!("ignoring response to stale request {}", response.request_id);
        }
    }
}

#[async_trait]
impl RequestClient for ObsClient {
    type Request = ObsRequest;

    async fn send_receive(&self, request: &ObsRequest) -> Result<String> {
        let mut socket = self.socket.lock().await;
        let Some(ws) = socket.as_mut() else {
            return Err(DeckError::NotLive("OBS".into()));
        };

        let response = match self.call(ws, request).await {
            Ok(response) => response,
            Err(e) => {
                // Leave reconnecting to the probe.
                *socket = None;
                return Err(e);
            }
        };

        let status = response.request_status.describe();
        if response.request_status.result {
            Ok(status)
        } else {
            Err(DeckError::Request {
                request: response.request_type,
                status,
            })
        }
    }
}

/// Read frames until one with `expected` opcode arrives.
async fn read_op<T: DeserializeOwned>(ws: &mut Socket, expected: u8) -> Result<T> {
    loop {
        let envelope = next_envelope(ws).await?;
        if envelope.op == expected {
            return Ok(serde_json::from_value(envelope.d)?);
        }
        debug!("skipping op {} while waiting for op {expected}", envelope.op);
    }
}

async fn next_envelope(ws: &mut Socket) -> Result<Envelope> {
    loop {
        let message = ws
            .next()
            .await
            .ok_or_else(|| DeckError::Protocol("OBS closed the connection".into()))??;
        match message {
            Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
            Message::Close(frame) => {
                let reason = frame.map_or_else(String::new, |f| format!(": {}", f.reason.as_str()));
                return Err(DeckError::Protocol(format!(
                    "OBS closed the connection{reason}"
                )));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::plugin::obs::protocol::{AuthChallenge, RequestStatus};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const SALT: &str = "salt";
    const CHALLENGE: &str = "challenge";

    /// A one-connection obs-websocket server. Knows the scenes "webcam" and
    /// "desk"; returns the request types it saw.
    pub(crate) async fn fake_obs(password: Option<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = async_tungstenite::tokio::accept_async(stream).await.unwrap();
            let mut seen = Vec::new();

            let hello = json!({
                "obsWebSocketVersion": "5.5.0",
                "rpcVersion": 1,
                "authentication": password.map(|_| AuthChallenge {
                    challenge: CHALLENGE.into(),
                    salt: SALT.into(),
                }),
            });
            ws.send(Message::text(protocol::encode(op::HELLO, &hello).unwrap()))
                .await
                .unwrap();

            while let Some(Ok(message)) = ws.next().await {
                let Message::Text(text) = message else { continue };
                let envelope: Envelope = serde_json::from_str(text.as_str()).unwrap();
                match envelope.op {
                    op::IDENTIFY => {
                        let identify: Identify = serde_json::from_value(envelope.d).unwrap();
                        let expected =
                            password.map(|p| protocol::auth_response(p, SALT, CHALLENGE));
                        if identify.authentication != expected {
                            // Real OBS closes with 4009; dropping is enough here.
                            break;
                        }
                        let done = json!({ "negotiatedRpcVersion": 1 });
                        ws.send(Message::text(protocol::encode(op::IDENTIFIED, &done).unwrap()))
                            .await
                            .unwrap();
                    }
                    op::REQUEST => {
                        let request: protocol::Request = serde_json::from_value(envelope.d).unwrap();
                        seen.push(request.request_type.clone());
                        let scene = request
                            .request_data
                            .as_ref()
                            .and_then(|d| d.get("sceneName"))
                            .and_then(Value::as_str);
                        let status = match (request.request_type.as_str(), scene) {
                            ("SetCurrentProgramScene", Some("webcam" | "desk")) | ("GetVersion", _) => {
                                RequestStatus { result: true, code: 100, comment: None }
                            }
                            _ => RequestStatus {
                                result: false,
                                code: 600,
                                comment: Some("No source was found".into()),
                            },
                        };
                        let response = RequestResponse {
                            request_type: request.request_type,
                            request_id: request.request_id,
                            request_status: status,
                            response_data: None,
                        };
                        ws.send(Message::text(
                            protocol::encode(op::REQUEST_RESPONSE, &response).unwrap(),
                        ))
                        .await
                        .unwrap();
                    }
                    _ => {}
                }
            }
            seen
        });

        (port, handle)
    }

    fn scene(name: &str) -> ObsRequest {
        ObsRequest::SetCurrentProgramScene { scene: name.into() }
    }

    fn client(port: u16, password: Option<&str>) -> ObsClient {
        ObsClient::new("127.0.0.1", port, password.map(Into::into), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn request_without_connection_is_not_live() {
        let c = client(1, None);
        let err = c.send_receive(&scene("webcam")).await.unwrap_err();
        assert!(matches!(err, DeckError::NotLive(_)));
    }

    #[tokio::test]
    async fn unreachable_server_probes_false() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let c = client(port, None);
        assert!(!c.probe().await);
        let err = c.send_receive(&scene("webcam")).await.unwrap_err();
        assert!(matches!(err, DeckError::NotLive(_)));
    }

    #[tokio::test]
    async fn connects_with_password_and_switches_scene() {
        let (port, server) = fake_obs(Some("hunter2")).await;
        let c = client(port, Some("hunter2"));

        assert!(c.probe().await);
        assert_eq!(c.send_receive(&scene("webcam")).await.unwrap(), "ok (100)");

        let err = c.send_receive(&scene("nope")).await.unwrap_err();
        assert!(matches!(&err, DeckError::Request { status, .. } if status.contains("600")));

        // Still connected: the probe only health-checks.
        assert!(c.probe().await);
        c.disconnect().await;

        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec!["SetCurrentProgramScene", "SetCurrentProgramScene", "GetVersion"]
        );
    }

    #[tokio::test]
    async fn wrong_password_probes_false() {
        let (port, _server) = fake_obs(Some("hunter2")).await;
        let c = client(port, Some("letmein"));
        assert!(!c.probe().await);
        let err = c.send_receive(&scene("webcam")).await.unwrap_err();
        assert!(matches!(err, DeckError::NotLive(_)));
    }

    #[tokio::test]
    async fn missing_password_probes_false() {
        let (port, _server) = fake_obs(Some("hunter2")).await;
        assert!(!client(port, None).probe().await);
    }
}
