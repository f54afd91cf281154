// =============================================================================
// STDIO SERVER LOOP
// =============================================================================
//
// Line-delimited JSON-RPC: one message per line in, one response per line
// out. stdout belongs to the protocol, so all logging goes to stderr.
//
// Every `tools/call` runs on its own task so a slow Google call doesn't hold
// up the rest of the session. Responses from all tasks funnel through one
// channel into a single writer, which keeps lines from interleaving. Replies
// to concurrent calls may therefore come back out of order; the `id` ties
// them together.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::jsonrpc::{handle_request, parse_line, JsonRpcResponse};
use crate::core::tools::Dispatcher;

const OUTBOUND_QUEUE: usize = 64;

/// Serves the process's own stdin/stdout until stdin closes.
pub async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> io::Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    serve(dispatcher, stdin, tokio::io::stdout()).await
}

pub async fn serve<R, W>(dispatcher: Arc<Dispatcher>, mut input: R, output: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<JsonRpcResponse>(OUTBOUND_QUEUE);
    let writer = tokio::spawn(write_responses(rx, output));

    tracing::info!("Serving {} tools over stdio", dispatcher.registry().len());

    // Lines are read as bytes; a stray non-UTF-8 line gets a parse error
    // reply instead of ending the session.
    let mut line = Vec::new();
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let request = match parse_line(&line) {
            Ok(request) => request,
            Err(response) => {
                tracing::warn!("Rejected malformed message");
                if tx.send(response).await.is_err() {
                    break;
                }
                continue;
            }
        };

        if request.method == "tools/call" {
            let dispatcher = Arc::clone(&dispatcher);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = handle_request(&dispatcher, request).await {
                    // The writer only goes away once the session is over.
                    let _ = tx.send(response).await;
                }
            });
        } else if let Some(response) = handle_request(&dispatcher, request).await {
            if tx.send(response).await.is_err() {
                break;
            }
        }
    }

    tracing::info!("Input closed, waiting for in-flight calls");
    drop(tx);

    match writer.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
    }
}

/// Drains the channel until every sender (the read loop and any in-flight
/// tool call) has been dropped.
async fn write_responses<W>(
    mut rx: mpsc::Receiver<JsonRpcResponse>,
    mut output: W,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');

        if let Err(e) = output.write_all(&line).await {
            tracing::error!("Failed to write response: {}", e);
            return Err(e);
        }
        output.flush().await?;
    }
    Ok(())
}
