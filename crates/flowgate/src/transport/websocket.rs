use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::Transport;

fn default_websocket_host() -> String {
    "0.0.0.0".to_string()
}

fn default_websocket_port() -> u16 {
    8255
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSocketSourceConfig {
    #[serde(default = "default_websocket_host")]
    pub websocket_host: String,
    #[serde(default = "default_websocket_port")]
    pub websocket_port: u16,
}

/// A server-push source. Unlike the other transports this one does not pull bytes on demand:
/// a background task accepts connections and forwards every text frame it receives into an
/// internal channel. From the decoder's point of view it is still just a transport that
/// produces chunks; it is blind to the fact that the producer is network-driven.
pub struct WebSocketTransport {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl WebSocketTransport {
    pub async fn bind(config: &WebSocketSourceConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.websocket_host, config.websocket_port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding websocket listener on {addr}"))?;
        let (tx, rx) = mpsc::channel(128);

        tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "websocket listener accept failed");
                        continue;
                    }
                };
                let tx = tx.clone();
                tokio::spawn(async move {
                    let ws = match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws) => ws,
                        Err(e) => {
                            warn!(error = %e, %peer, "websocket handshake failed");
                            return;
                        }
                    };
                    let (_, mut read) = ws.split();
                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                if tx.send(text.into_bytes()).await.is_err() {
                                    return;
                                }
                            }
                            Ok(Message::Binary(bytes)) => {
                                if tx.send(bytes).await.is_err() {
                                    return;
                                }
                            }
                            Ok(Message::Close(_)) => {
                                debug!(%peer, "websocket peer closed connection");
                                return;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(error = %e, %peer, "websocket read error");
                                return;
                            }
                        }
                    }
                });
            }
        });

        Ok(Self { rx })
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.rx.recv().await {
            Some(mut bytes) => {
                bytes.push(b'\n');
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }
}
