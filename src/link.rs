// link.rs - Serial connection to the robot
use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BAUD: u32 = 115_200;
const READ_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("serial link is not open")]
    NotOpen,

    #[error("serial i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(#[from] serialport::Error),
}

/// Byte pipe to the robot. Implementations may block on I/O.
pub trait SerialLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Reads exactly `n` bytes or fails.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, LinkError>;

    fn is_open(&self) -> bool;

    fn close(&mut self);
}

pub struct PortLink {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl PortLink {
    /// Reads time out after one second.
    pub fn open(path: &str, baud: u32) -> Result<Self, LinkError> {
        log::info!("Trying {}...", path);
        let port = serialport::new(path, baud).timeout(READ_TIMEOUT).open()?;
        log::info!("Connected to {} at {} baud", path, baud);
        Ok(Self {
            name: path.to_string(),
            port: Some(port),
        })
    }
}

impl SerialLink for PortLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        let port = self.port.as_mut().ok_or(LinkError::NotOpen)?;
        let mut buf = vec![0u8; n];
        port.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            log::info!("Closed {}", self.name);
        }
    }
}

/// First port the OS reports that can actually be opened.
pub fn first_available_port() -> Option<String> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::warn!("Port enumeration failed: {}", e);
            return None;
        }
    };

    ports
        .into_iter()
        .map(|info| info.port_name)
        .find(|name| match serialport::new(name, DEFAULT_BAUD).open() {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Skipping {}: {}", name, e);
                false
            }
        })
}

/// In-memory link. Clones share the same buffers, so a test can keep one
/// handle while the console owns another.
#[derive(Clone, Default)]
pub struct MemoryLink {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    incoming: Arc<Mutex<VecDeque<u8>>>,
    fail_writes: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every successful write, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn queue_incoming(&self, bytes: &[u8]) {
        if let Ok(mut incoming) = self.incoming.lock() {
            incoming.extend(bytes);
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl SerialLink for MemoryLink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write refused",
            )));
        }
        if let Ok(mut written) = self.written.lock() {
            written.push(bytes.to_vec());
        }
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        let mut incoming = self
            .incoming
            .lock()
            .map_err(|_| std::io::Error::other("incoming buffer poisoned"))?;
        if incoming.len() < n {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "not enough bytes",
            )));
        }
        Ok(incoming.drain(..n).collect())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
