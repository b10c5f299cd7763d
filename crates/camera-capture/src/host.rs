//! Host queries: OS distribution and IPv4 interfaces

use std::net::Ipv4Addr;
use tracing::{debug, warn};

use crate::args::Platform;

const OS_RELEASE: &str = "/etc/os-release";

/// Synchronous host information used by the camera
pub trait HostInfo: Send + Sync {
    /// Distribution name, e.g. "Ubuntu 22.04.3 LTS"
    fn distribution(&self) -> Option<String>;

    /// IPv4 addresses of all interfaces
    fn ipv4_addresses(&self) -> Vec<Ipv4Addr>;

    /// Command-line quirks for this host
    fn platform(&self) -> Platform {
        let ubuntu = self
            .distribution()
            .map(|d| d.contains("Ubuntu"))
            .unwrap_or(false);
        if ubuntu {
            debug!("Host runs Ubuntu");
        }
        Platform { ubuntu }
    }
}

/// The machine this process runs on
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn distribution(&self) -> Option<String> {
        match std::fs::read_to_string(OS_RELEASE) {
            Ok(contents) => parse_os_release(&contents),
            Err(e) => {
                warn!("Cannot read {}: {}", OS_RELEASE, e);
                None
            }
        }
    }

    fn ipv4_addresses(&self) -> Vec<Ipv4Addr> {
        interface_ipv4_addresses()
    }
}

/// Pick PRETTY_NAME (or NAME) from os-release contents
pub fn parse_os_release(contents: &str) -> Option<String> {
    let field = |key: &str| {
        contents.lines().find_map(|line| {
            let value = line.strip_prefix(key)?.strip_prefix('=')?;
            Some(value.trim().trim_matches('"').to_string())
        })
    };
    field("PRETTY_NAME").or_else(|| field("NAME"))
}

/// Path component the RTSP server publishes a device under
///
/// Only alphanumerics are kept, so `/dev/video0` becomes `devvideo0`.
pub fn rtsp_path(device: &str) -> String {
    device.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Every RTSP URL a client could reach the stream at
pub fn stream_addresses(addresses: &[Ipv4Addr], port: u16, device: &str) -> Vec<String> {
    let path = rtsp_path(device);
    addresses
        .iter()
        .map(|ip| format!("rtsp://{}:{}/{}", ip, port, path))
        .collect()
}

fn interface_ipv4_addresses() -> Vec<Ipv4Addr> {
    let mut addrs = Vec::new();
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();

    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        warn!("getifaddrs failed: {}", std::io::Error::last_os_error());
        return addrs;
    }

    let mut cursor = ifap;
    while !cursor.is_null() {
        let ifa = unsafe { &*cursor };
        if !ifa.ifa_addr.is_null() {
            let family = unsafe { (*ifa.ifa_addr).sa_family };
            if i32::from(family) == libc::AF_INET {
                let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                addrs.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            }
        }
        cursor = ifa.ifa_next;
    }

    unsafe { libc::freeifaddrs(ifap) };
    addrs
}
