//! Control server — one task per connection, capped by a semaphore.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use kisslight_app::ports::MessageBus;
use kisslight_app::services::dispatcher::Dispatcher;
use kisslight_domain::protocol::{MAX_REQUEST_LEN, Response};

use crate::config::ServerConfig;
use crate::error::ControlError;

/// Bytes read before a line counts as too long, leaving room for `\r\n`.
const LINE_LIMIT: usize = MAX_REQUEST_LEN + 2;

/// Accepts control clients and serves their requests.
pub struct ControlServer<B> {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<B>>,
    permits: Arc<Semaphore>,
}

impl<B> ControlServer<B>
where
    B: MessageBus + Send + Sync + 'static,
{
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Bind`] when the address is unavailable.
    pub async fn bind(
        config: &ServerConfig,
        dispatcher: Arc<Dispatcher<B>>,
    ) -> Result<Self, ControlError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ControlError::Bind {
                addr: addr.clone(),
                source,
            })?;
        Ok(Self {
            listener,
            dispatcher,
            permits: Arc::new(Semaphore::new(config.max_clients)),
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Propagates the socket error.
    pub fn local_addr(&self) -> Result<SocketAddr, ControlError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn serve(self) {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept control connection");
                    continue;
                }
            };
            match Arc::clone(&self.permits).try_acquire_owned() {
                Ok(permit) => {
                    let dispatcher = Arc::clone(&self.dispatcher);
                    tokio::spawn(async move {
                        tracing::debug!(%peer, "control client connected");
                        if let Err(err) = serve_client(stream, &dispatcher, permit).await {
                            tracing::warn!(%err, %peer, "control connection failed");
                        }
                        tracing::debug!(%peer, "control client disconnected");
                    });
                }
                Err(_) => {
                    tracing::warn!(%peer, "client capacity full, turning connection away");
                    tokio::spawn(reject(stream));
                }
            }
        }
    }
}

async fn serve_client<B: MessageBus>(
    stream: TcpStream,
    dispatcher: &Dispatcher<B>,
    _permit: OwnedSemaphorePermit,
) -> Result<(), ControlError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(LINE_LIMIT);

    loop {
        let response = match read_request(&mut reader, &mut buf).await? {
            Line::Eof => return Ok(()),
            Line::TooLong => Response::BadRequest,
            Line::Text(line) if line.trim().is_empty() => continue,
            Line::Text(line) => dispatcher.handle_line(&line).await,
        };
        writer.write_all(response.to_string().as_bytes()).await?;
        if response.closes_connection() {
            writer.shutdown().await?;
            return Ok(());
        }
    }
}

async fn reject(mut stream: TcpStream) {
    let line = Response::ClientCapacityFull.to_string();
    if let Err(err) = stream.write_all(line.as_bytes()).await {
        tracing::debug!(%err, "failed to notify rejected client");
    }
    let _ = stream.shutdown().await;
}

#[derive(Debug, PartialEq, Eq)]
enum Line {
    Text(String),
    TooLong,
    Eof,
}

/// Read one request line, never buffering more than [`LINE_LIMIT`] bytes.
async fn read_request<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(LINE_LIMIT as u64)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(Line::Eof);
    }
    if read == LINE_LIMIT && buf.last() != Some(&b'\n') {
        discard_line(reader).await?;
        return Ok(Line::TooLong);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Line::Text(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(pos) = available.iter().position(|byte| *byte == b'\n') {
            reader.consume(pos + 1);
            return Ok(());
        }
        let len = available.len();
        reader.consume(len);
    }
}
