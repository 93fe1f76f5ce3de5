use crate::cli::Args;
use crate::config::policy::RequestPolicy;
use crate::error::SubmitRejection;
use crate::exchange::ExchangeClient;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::session::Session;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use chrono::Utc;
use log::{ debug, info, warn, error };
use futures::{ Sink, SinkExt, StreamExt };
use url::form_urlencoded;

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;
const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

type BoxError = Box<dyn Error + Send + Sync>;

fn load_tls_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, BoxError> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

/// Extracts the client's key from the `X-API-Key` header or the `api_key`
/// query parameter, header first.
fn provided_api_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if from_header.is_some() {
        return from_header;
    }

    let query = req.uri().query()?;
    form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .find(|(name, _)| name == "api_key")
        .map(|(_, value)| value)
}

fn unauthorized() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Unauthorized".to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

pub async fn start_ws_server(
    args: &Args,
    exchange: ExchangeClient,
    policy: Option<RequestPolicy>
) -> Result<(), BoxError> {
    let addr = args.server_addr.as_str();
    let api_key = args.server_api_key.clone().filter(|k| !k.trim().is_empty());
    if api_key.is_some() {
        info!("Server configured with API Key authentication.");
    } else {
        warn!("Server configured WITHOUT API Key authentication. Connections are open.");
    }

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let listener = TcpListener::bind(addr).await?;
    let protocol = if tls_acceptor.is_some() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let exchange = exchange.clone();
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, exchange, policy, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as BoxError)
                    }
                }
            } else {
                process_connection(peer, stream, exchange, policy, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    exchange: ExchangeClient,
    policy: Option<RequestPolicy>,
    required_api_key: Option<String>
) -> Result<(), BoxError>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(required) = &required_api_key else {
            debug!("{} no API key required", peer);
            return Ok(response);
        };
        if provided_api_key(req).as_deref() != Some(required.as_str()) {
            warn!("{}: bad or missing API key", peer);
            return Err(unauthorized());
        }
        info!("{} authenticated", peer);
        Ok(response)
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => handle_connection(peer, ws, exchange, Session::new(policy)).await,
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as BoxError)
        }
    }
}

async fn send<T>(tx: &mut T, msg: &ServerMessage) -> Result<(), BoxError>
    where T: Sink<Message> + Unpin, T::Error: Error + Send + Sync + 'static
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await.map_err(|e| Box::new(e) as BoxError)
}

fn quota_frame(session: &mut Session) -> Option<ServerMessage> {
    let policy = *session.policy()?;
    let remaining = session.remaining(Utc::now())?;
    Some(ServerMessage::Quota {
        remaining,
        limit: policy.max_turns_per_window,
        cooldown_hours: policy.cooldown_hours,
    })
}

/// Serves one session over an established socket. Frames are handled in
/// arrival order and the next frame is not read until the current turn has
/// settled.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    exchange: ExchangeClient,
    mut session: Session
) -> Result<(), BoxError>
    where S: AsyncRead + AsyncWrite + Unpin
{
    info!("New WebSocket connection: {} (session {})", peer, session.id());
    let (mut tx, mut rx) = websocket.split();

    if let Some(frame) = quota_frame(&mut session) {
        send(&mut tx, &frame).await?;
    }

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let error_msg = ServerMessage::Error {
                message: "Message too large".to_string(),
            };
            if let Err(e) = send(&mut tx, &error_msg).await {
                error!("Failed to send size limit error to {}: {}", peer, e);
            }
            break;
        }

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
                continue;
            }
            // tungstenite answers pings itself on the next read or write.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                continue;
            }
        };

        let content = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Chat { content }) => content,
            Err(e) => {
                error!("Failed to parse message from {}: {}", peer, e);
                let error_msg = ServerMessage::Error {
                    message: format!("Failed to parse message: {}", e),
                };
                send(&mut tx, &error_msg).await?;
                continue;
            }
        };

        let turn = match session.begin_turn(&content, Utc::now()) {
            Ok(turn) => turn,
            Err(rejection) => {
                debug!("Session {}: rejected submission: {}", session.id(), rejection);
                if rejection != SubmitRejection::EmptyInput {
                    let rejected = ServerMessage::Rejected { reason: rejection.to_string() };
                    send(&mut tx, &rejected).await?;
                }
                continue;
            }
        };

        send(&mut tx, &ServerMessage::Processing).await?;

        let outcome = exchange.settle(&mut session, turn).await;
        let response = ServerMessage::Response {
            content: outcome.reply,
            timestamp: Utc::now().timestamp(),
        };
        send(&mut tx, &response).await?;

        if let Some(frame) = quota_frame(&mut session) {
            send(&mut tx, &frame).await?;
        }
    }

    info!(
        "WebSocket connection closed for {} (session {}, {} message(s))",
        peer,
        session.id(),
        session.size()
    );
    Ok(())
}
