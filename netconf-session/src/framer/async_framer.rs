use crate::error::{NetconfClientError, NetconfClientResult};
use crate::framer::{NETCONF_1_0_TERMINATOR, NETCONF_1_1_END_OF_CHUNKS};
use log::trace;
use memmem::{Searcher, TwoWaySearcher};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Splits `stream` into a reading and a writing framer sharing one framing mode.
pub fn split<S>(stream: S) -> (FrameReader<ReadHalf<S>>, FrameWriter<WriteHalf<S>>)
where
    S: AsyncRead + AsyncWrite,
{
    let upgraded = Arc::new(AtomicBool::new(false));
    let (read, write) = tokio::io::split(stream);
    (
        FrameReader::new(read, upgraded.clone()),
        FrameWriter::new(write, upgraded),
    )
}

/// Reads whole NETCONF messages from a byte stream.
pub struct FrameReader<R> {
    read_buffer: Vec<u8>,
    upgraded: Arc<AtomicBool>,

    channel: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(channel: R, upgraded: Arc<AtomicBool>) -> Self {
        FrameReader {
            read_buffer: Vec::new(),
            upgraded,
            channel,
        }
    }

    pub async fn read_frame(&mut self) -> NetconfClientResult<String> {
        let frame = if self.upgraded.load(Ordering::Acquire) {
            self.read_chunked().await?
        } else {
            self.read_until_terminator().await?
        };
        trace!("Frame:\n{}", frame);
        Ok(frame)
    }

    async fn read_chunked(&mut self) -> NetconfClientResult<String> {
        let mut message = Vec::new();
        loop {
            let chunk_size = self.read_header().await?;
            if chunk_size == 0 {
                break;
            }
            // Peer supplied size, copied in bounded pieces.
            let mut remaining = chunk_size as usize;
            let mut buffer = [0u8; 4096];
            while remaining > 0 {
                let piece = remaining.min(buffer.len());
                self.read_exact(&mut buffer[..piece]).await?;
                message.extend_from_slice(&buffer[..piece]);
                remaining -= piece;
            }
        }
        Ok(String::from_utf8_lossy(&message).trim().to_string())
    }

    async fn read_until_terminator(&mut self) -> NetconfClientResult<String> {
        let mut buffer = [0u8; 256];
        let search = TwoWaySearcher::new(NETCONF_1_0_TERMINATOR.as_bytes());
        let pos = loop {
            if let Some(pos) = search.search_in(&self.read_buffer) {
                break pos;
            }
            let bytes = self.channel.read(&mut buffer).await?;
            if bytes == 0 {
                return Err(NetconfClientError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream closed before end of message",
                )));
            }
            self.read_buffer.extend(&buffer[..bytes]);
        };
        let frame = String::from_utf8_lossy(&self.read_buffer[..pos])
            .trim()
            .to_string();
        self.read_buffer
            .drain(..pos + NETCONF_1_0_TERMINATOR.len());
        Ok(frame)
    }

    // Bytes read past the end of a base:1.0 frame are consumed before the channel.
    async fn read_exact(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        let buffered = buffer.len().min(self.read_buffer.len());
        buffer[..buffered].copy_from_slice(&self.read_buffer[..buffered]);
        self.read_buffer.drain(..buffered);
        if buffered < buffer.len() {
            self.channel.read_exact(&mut buffer[buffered..]).await?;
        }
        Ok(())
    }

    async fn read_header(&mut self) -> NetconfClientResult<u32> {
        let mut buffer = [0u8; 2];
        self.read_exact(&mut buffer).await?;
        if buffer[0] != b'\n' {
            return Err(NetconfClientError::MalformedChunk {
                expected: '\n',
                actual: buffer[0].into(),
            });
        }

        if buffer[1] != b'#' {
            return Err(NetconfClientError::MalformedChunk {
                expected: '#',
                actual: buffer[1].into(),
            });
        }

        let mut chunk_size: u32 = 0;
        loop {
            let mut buffer = [0u8; 1];
            self.read_exact(&mut buffer).await?;
            match buffer[0] {
                b'#' => continue,
                b'\n' => return Ok(chunk_size),
                digit if digit.is_ascii_digit() => {
                    chunk_size = chunk_size
                        .checked_mul(10)
                        .and_then(|size| size.checked_add(u32::from(digit - b'0')))
                        .ok_or_else(|| {
                            NetconfClientError::new("chunk size out of range".to_string())
                        })?;
                }
                other => {
                    return Err(NetconfClientError::MalformedChunk {
                        expected: '0',
                        actual: other.into(),
                    })
                }
            }
        }
    }
}

/// Writes NETCONF messages, switching to chunked framing once upgraded.
pub struct FrameWriter<W> {
    upgraded: Arc<AtomicBool>,

    channel: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(channel: W, upgraded: Arc<AtomicBool>) -> Self {
        FrameWriter { upgraded, channel }
    }

    /// Switches both halves to base:1.1 chunked framing.
    pub fn upgrade(&self) {
        self.upgraded.store(true, Ordering::Release);
    }

    pub fn is_upgraded(&self) -> bool {
        self.upgraded.load(Ordering::Acquire)
    }

    pub async fn write_frame(&mut self, message: &[u8]) -> NetconfClientResult<()> {
        if self.is_upgraded() {
            self.channel
                .write_all(format!("\n#{}\n", message.len()).as_bytes())
                .await?;
            self.channel.write_all(message).await?;
            self.channel
                .write_all(NETCONF_1_1_END_OF_CHUNKS.as_bytes())
                .await?;
        } else {
            self.channel.write_all(message).await?;
            self.channel
                .write_all(NETCONF_1_0_TERMINATOR.as_bytes())
                .await?;
        }
        self.channel.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> NetconfClientResult<()> {
        self.channel.shutdown().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.channel
    }
}
