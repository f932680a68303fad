//! Per-connection writer loop
//!
//! Drains a subscription onto a client transport. The loop is the only
//! reader of the subscription's queue and the only place a client-side
//! disconnect turns into an unsubscribe.

use std::future::Future;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::broker::Subscription;
use crate::error::Result;

use super::encoder::EventEncoder;
use super::gzip::GzipFramer;
use super::headers::BodyEncoding;

/// Why a writer loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The client went away
    Disconnected,
    /// The broker closed the subscription
    Closed,
}

/// Write every item of `subscription` to `writer` until one side ends
///
/// `encoding` must match the `Content-Encoding` sent with the response
/// headers. `disconnected` resolves when the transport reports the client is
/// gone. A write failure unsubscribes and is returned to the caller; it
/// never affects other subscribers.
pub async fn stream_events<W, F>(
    subscription: &mut Subscription,
    writer: &mut W,
    encoding: BodyEncoding,
    disconnected: F,
) -> Result<StreamEnd>
where
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(disconnected);
    let mut encoder = EventEncoder::new();
    let mut gzip = match encoding {
        BodyEncoding::Gzip => Some(GzipFramer::new()),
        BodyEncoding::Identity => None,
    };
    let mut written = 0u64;

    loop {
        tokio::select! {
            _ = &mut disconnected => {
                subscription.unsubscribe();
                tracing::debug!(
                    subscription = %subscription.id(),
                    channel = %subscription.channel(),
                    written = written,
                    "Client disconnected"
                );
                return Ok(StreamEnd::Disconnected);
            }
            item = subscription.recv() => {
                let Some(item) = item else {
                    tracing::debug!(
                        subscription = %subscription.id(),
                        channel = %subscription.channel(),
                        written = written,
                        "Subscription closed by broker"
                    );
                    if let Some(framer) = gzip.take() {
                        write_frame(writer, &framer.finish()?).await?;
                    }
                    return Ok(StreamEnd::Closed);
                };

                encoder.encode(&item);
                let frame = encoder.finish();
                let result = match gzip.as_mut() {
                    Some(framer) => match framer.compress(&frame) {
                        Ok(chunk) => write_frame(writer, &chunk).await,
                        Err(e) => Err(e),
                    },
                    None => write_frame(writer, &frame).await,
                };

                if let Err(e) = result {
                    subscription.unsubscribe();
                    tracing::debug!(
                        subscription = %subscription.id(),
                        channel = %subscription.channel(),
                        error = %e,
                        "Stream write failed"
                    );
                    return Err(e.into());
                }
                written += 1;
            }
        }
    }
}

async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
