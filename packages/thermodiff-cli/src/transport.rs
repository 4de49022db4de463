// Serial transport for the acquisition controller
//
// The port is split into two tasks: a reader that forwards complete lines
// into a bounded channel, and a writer that drains outgoing commands. The
// controller sees both through `ChannelLineSource`, whose `read_line` is a
// non-blocking `try_recv`. When the reader task ends (EOF or read error) the
// line channel closes and the source reports the link as lost.

use thermodiff::{AcquisitionError, LineSource};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_serial::SerialPortBuilderExt;

const LINE_QUEUE: usize = 1024;
const COMMAND_QUEUE: usize = 16;

/// Channel ends of an open serial connection.
pub struct Link {
    port: String,
    lines: mpsc::Receiver<String>,
    commands: mpsc::Sender<String>,
}

impl Link {
    pub fn new(
        port: impl Into<String>,
        lines: mpsc::Receiver<String>,
        commands: mpsc::Sender<String>,
    ) -> Self {
        Self {
            port: port.into(),
            lines,
            commands,
        }
    }
}

/// Open `port` and spawn its reader and writer tasks.
pub fn open(port: &str, baud_rate: u32) -> thermodiff::Result<Link> {
    log::info!("Opening serial port: {} at {} baud", port, baud_rate);

    let stream = tokio_serial::new(port, baud_rate)
        .open_native_async()
        .map_err(|e| AcquisitionError::Transport(format!("Failed to open {}: {}", port, e)))?;

    let (read_half, write_half) = tokio::io::split(stream);
    let (line_tx, line_rx) = mpsc::channel(LINE_QUEUE);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE);

    tokio::spawn(read_lines(port.to_string(), read_half, line_tx));
    tokio::spawn(write_commands(port.to_string(), write_half, command_rx));

    log::info!("Serial port {} opened", port);
    Ok(Link::new(port, line_rx, command_tx))
}

async fn read_lines<R>(port: String, reader: R, sender: mpsc::Sender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                log::warn!("Serial port {} closed", port);
                break;
            }
            Ok(_) => {
                // Boot chatter may contain invalid UTF-8; keep what decodes
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                if line.is_empty() {
                    continue;
                }
                log::trace!("<- {}", line);
                if sender.send(line).await.is_err() {
                    log::debug!("Line receiver dropped, stopping reader for {}", port);
                    break;
                }
            }
            Err(e) => {
                log::error!("Serial read error on {}: {}", port, e);
                break;
            }
        }
    }
}

async fn write_commands<W>(port: String, mut writer: W, mut commands: mpsc::Receiver<String>)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(command) = commands.recv().await {
        log::debug!("-> {}", command);
        let framed = format!("{}\n", command);
        if let Err(e) = async {
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await
        }
        .await
        {
            log::error!("Serial write error on {}: {}", port, e);
            break;
        }
    }
}

/// `LineSource` backed by the channels of the current [`Link`], if any.
#[derive(Default)]
pub struct ChannelLineSource {
    link: Option<Link>,
    lost: bool,
}

impl ChannelLineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, link: Link) {
        self.link = Some(link);
        self.lost = false;
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// True once after the link dropped.
    pub fn take_lost(&mut self) -> bool {
        std::mem::take(&mut self.lost)
    }
}

impl LineSource for ChannelLineSource {
    fn read_line(&mut self) -> Option<String> {
        let link = self.link.as_mut()?;

        match link.lines.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::warn!("Lost connection to {}", link.port);
                self.link = None;
                self.lost = true;
                None
            }
        }
    }

    fn write_line(&mut self, line: &str) -> thermodiff::Result<()> {
        let link = self
            .link
            .as_ref()
            .ok_or_else(|| AcquisitionError::Transport("serial port not connected".to_string()))?;

        link.commands
            .try_send(line.to_string())
            .map_err(|e| AcquisitionError::Transport(format!("{}: {}", link.port, e)))
    }
}
