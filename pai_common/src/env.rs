//! Environment variables injected by OpenPAI into every job container.

use ::std::net::Ipv4Addr;

use ::anyhow::anyhow;

use crate::error::{PaiError, Result};

/// URI of the cluster's default file system, e.g. `hdfs://10.0.0.1:9000`.
pub const DEFAULT_FS_URI: &str = "PAI_DEFAULT_FS_URI";
/// Name of the user who submitted the running job.
pub const USER_NAME: &str = "PAI_USER_NAME";
/// Set to a non-empty value inside a job container.
pub const CONTAINER_ID: &str = "PAI_CONTAINER_ID";

/// Read a required environment variable.
pub fn require(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|e| PaiError::environment(anyhow!("{} is not available: {}", name, e)))
}

/// Whether the marker variable `marker` is set to a non-empty value.
pub fn in_job_container(marker: &str) -> bool {
    std::env::var(marker).is_ok_and(|value| !value.is_empty())
}

/// Extract the first IPv4 address found in `s`.
/// The leftmost run of four dot separated groups of 1 to 3 digits is taken,
/// so `1234.5.6.7` yields `234.5.6.7` and leading zeros are accepted.
/// That run must be a valid address: `999.1.1.1` is an error, not `99.1.1.1`.
pub fn get_ip(s: &str) -> Result<Ipv4Addr> {
    let groups = (0..s.len())
        .find_map(|start| dotted_quad_at(s, start))
        .ok_or_else(|| PaiError::environment(anyhow!("no IPv4 address found in {:?}", s)))?;
    let mut octets = [0u8; 4];
    for (octet, group) in octets.iter_mut().zip(groups) {
        *octet = group.parse().map_err(|_| {
            PaiError::environment(anyhow!("{} in {:?} is not an IPv4 octet", group, s))
        })?;
    }
    Ok(Ipv4Addr::from(octets))
}

/// Four dot separated digit groups starting at byte `start`.
/// Only the last group may be followed by more digits, which are left out.
fn dotted_quad_at(s: &str, start: usize) -> Option<[&str; 4]> {
    let bytes = s.as_bytes();
    let mut groups = [""; 4];
    let mut pos = start;
    for (i, group) in groups.iter_mut().enumerate() {
        if i > 0 {
            if bytes.get(pos) != Some(&b'.') {
                return None;
            }
            pos += 1;
        }
        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        let len = if i < 3 { digits } else { digits.min(3) };
        if !(1..=3).contains(&len) {
            return None;
        }
        *group = &s[pos..pos + len];
        pos += len;
    }
    Some(groups)
}

/// IPv4 address of the default file system.
pub fn default_fs_ip() -> Result<Ipv4Addr> {
    get_ip(&require(DEFAULT_FS_URI)?)
}

pub fn user_name() -> Result<String> {
    require(USER_NAME)
}
