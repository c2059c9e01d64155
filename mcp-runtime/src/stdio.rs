//! Content-Length framed JSON-RPC over stdin/stdout.

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::rpc::{McpServer, RpcError, error_response};

/// Largest frame body accepted; a bigger `Content-Length` ends the session.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

pub async fn serve_stdio(server: &McpServer) -> Result<(), String> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    serve(server, &mut reader, &mut stdout).await
}

/// Message loop over any framed reader/writer pair; returns on clean EOF.
pub async fn serve<R, W>(server: &McpServer, reader: &mut R, writer: &mut W) -> Result<(), String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = read_frame(reader)
            .await
            .map_err(|e| format!("Failed to read MCP message: {e}"))?;
        let Some(frame) = frame else {
            break;
        };

        let responses = match serde_json::from_slice::<Value>(&frame) {
            Ok(incoming) => server.handle_incoming_message(incoming).await,
            Err(err) => {
                tracing::debug!(event = "rpc_parse_error", error = %err, "Unparseable MCP frame");
                vec![error_response(Value::Null, RpcError::parse_error())]
            }
        };
        for response in responses {
            write_framed_json(writer, &response)
                .await
                .map_err(|e| format!("Failed to write MCP response: {e}"))?;
        }
    }

    Ok(())
}

pub async fn read_framed_json<R>(reader: &mut R) -> Result<Option<Value>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let Some(payload) = read_frame(reader).await? else {
        return Ok(None);
    };
    let json: Value = serde_json::from_slice(&payload).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Invalid JSON payload: {e}"),
        )
    })?;
    Ok(Some(json))
}

/// Raw body of the next frame, or `None` on clean EOF.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        if line == "\r\n" || line == "\n" {
            break;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            let parsed = value.trim().parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    if content_length > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Content-Length {content_length} exceeds {MAX_FRAME_BYTES} bytes"),
        ));
    }
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_framed_json<W>(writer: &mut W, value: &Value) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
        body.len()
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
