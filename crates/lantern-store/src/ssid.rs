//! SSID binding — the narrow adapter between the service list and the
//! wireless driver.
//!
//! An SSID is an opaque byte string of at most 32 bytes, not a C string:
//! it may contain NULs and arbitrary description bytes. The store talks to
//! the radio only through [`SsidBinding`], so tests and development setups
//! can substitute the file- or memory-backed stand-ins.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::path::PathBuf;
use std::sync::Mutex;

/// Hardware cap on SSID length, in bytes.
pub const SSID_MAX_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SsidError {
    #[error("SSID exceeds {SSID_MAX_LEN} bytes")]
    TooLong,

    #[error("ssid binding I/O: {0}")]
    Os(#[from] io::Error),
}

/// Sets and reads the advertised SSID.
pub trait SsidBinding: Send + Sync {
    /// Publishes `ssid`. Fails with [`SsidError::TooLong`] past the 32-byte
    /// cap and [`SsidError::Os`] when the underlying driver call fails.
    fn set_ssid(&self, ssid: &[u8]) -> Result<(), SsidError>;

    /// Reads back the currently advertised SSID (empty if none was set).
    fn get_ssid(&self) -> Result<Vec<u8>, SsidError>;
}

// ── Wireless driver binding ──────────────────────────────────────────────────

// Wireless-extensions ioctl numbers and the essid view of struct iwreq.
const SIOCSIWESSID: libc::c_ulong = 0x8B1A;
const SIOCGIWESSID: libc::c_ulong = 0x8B1B;
const IFNAMSIZ: usize = 16;

#[repr(C)]
struct IwPoint {
    pointer: *mut libc::c_void,
    length: u16,
    flags: u16,
}

#[repr(C)]
struct IwreqEssid {
    ifr_name: [u8; IFNAMSIZ],
    essid: IwPoint,
}

/// Drives the SSID of a wireless interface through the wireless-extensions
/// ioctls, the way `iwconfig <if> essid` does.
pub struct WirelessSsid {
    interface: String,
}

impl WirelessSsid {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    fn kernel_socket(&self) -> Result<OwnedFd, SsidError> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    fn request(&self, essid: IwPoint) -> Result<IwreqEssid, SsidError> {
        let name = self.interface.as_bytes();
        if name.len() >= IFNAMSIZ {
            return Err(SsidError::Os(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("interface name too long: {}", self.interface),
            )));
        }
        let mut ifr_name = [0u8; IFNAMSIZ];
        ifr_name[..name.len()].copy_from_slice(name);
        Ok(IwreqEssid { ifr_name, essid })
    }
}

impl SsidBinding for WirelessSsid {
    fn set_ssid(&self, ssid: &[u8]) -> Result<(), SsidError> {
        if ssid.len() > SSID_MAX_LEN {
            return Err(SsidError::TooLong);
        }

        let socket = self.kernel_socket()?;
        let mut req = self.request(IwPoint {
            pointer: ssid.as_ptr() as *mut libc::c_void,
            length: ssid.len() as u16,
            flags: 1,
        })?;

        let rc = unsafe { libc::ioctl(socket.as_raw_fd(), SIOCSIWESSID, &mut req) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }

    fn get_ssid(&self) -> Result<Vec<u8>, SsidError> {
        let socket = self.kernel_socket()?;
        let mut buffer = [0u8; SSID_MAX_LEN];
        let mut req = self.request(IwPoint {
            pointer: buffer.as_mut_ptr() as *mut libc::c_void,
            length: buffer.len() as u16,
            flags: 0,
        })?;

        let rc = unsafe { libc::ioctl(socket.as_raw_fd(), SIOCGIWESSID, &mut req) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let len = (req.essid.length as usize).min(SSID_MAX_LEN);
        Ok(buffer[..len].to_vec())
    }
}

// ── Stand-ins ────────────────────────────────────────────────────────────────

/// File-backed SSID — lets the daemon and the CGI binary share an
/// advertised SSID across processes on machines without a radio.
pub struct FileSsid {
    path: PathBuf,
}

impl FileSsid {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SsidBinding for FileSsid {
    fn set_ssid(&self, ssid: &[u8]) -> Result<(), SsidError> {
        if ssid.len() > SSID_MAX_LEN {
            return Err(SsidError::TooLong);
        }
        std::fs::write(&self.path, ssid)?;
        Ok(())
    }

    fn get_ssid(&self) -> Result<Vec<u8>, SsidError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory SSID for tests.
#[derive(Default)]
pub struct MemorySsid {
    current: Mutex<Vec<u8>>,
}

impl MemorySsid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SsidBinding for MemorySsid {
    fn set_ssid(&self, ssid: &[u8]) -> Result<(), SsidError> {
        if ssid.len() > SSID_MAX_LEN {
            return Err(SsidError::TooLong);
        }
        *self.current.lock().unwrap() = ssid.to_vec();
        Ok(())
    }

    fn get_ssid(&self) -> Result<Vec<u8>, SsidError> {
        Ok(self.current.lock().unwrap().clone())
    }
}
