use crate::ServerController;
use crate::server::ServerId;
use futures_lite::StreamExt;
use futures_lite::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

/// Feed newline-delimited output from `reader` into
/// [`ServerController::on_process_output`] until the stream ends.
///
/// Each line is handled to completion before the next is read, so protocol
/// events are applied in the order the process printed them.
pub fn spawn_output_reader<R>(
    controller: ServerController,
    server_id: ServerId,
    reader: R,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if let Err(e) = controller.on_process_output(server_id.as_str(), &line).await {
                        tracing::warn!(server_id = %server_id, error = %e, "Failed to handle output line");
                    }
                }
                Err(e) => {
                    tracing::warn!(server_id = %server_id, error = %e, "Failed to read process output");
                    break;
                }
            }
        }

        tracing::debug!(server_id = %server_id, "Process output closed");
    })
}
