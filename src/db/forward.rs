use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{info, warn};

/// Longer lines are logged in pieces of at most this many bytes
const MAX_LINE: usize = 64 * 1024;

/// Relay every line of a tool's diagnostic stream to the log, prefixed with the tool name.
///
/// Runs until end-of-stream and returns the number of lines forwarded.
/// Invalid UTF-8 is replaced rather than aborting the stream.
pub async fn forward_lines<R>(reader: R, tool: &'static str) -> (&'static str, usize)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut forwarded = 0;

    loop {
        buf.clear();
        match (&mut reader).take(MAX_LINE as u64).read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                info!("{}: {}", tool, line.trim_end_matches(&['\r', '\n'][..]));
                forwarded += 1;
            }
            Err(err) => {
                warn!("Stopped reading {} output: {}", tool, err);
                break;
            }
        }
    }

    (tool, forwarded)
}
