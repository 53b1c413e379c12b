//! Downlink bandwidth hint for the wifi link estimate

use crate::config::{HintSource, LinkConfig};
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

const SYSFS_NET: &str = "/sys/class/net";

/// Detect the interface carrying the default route using `ip route`
pub fn detect_default_interface() -> Result<String> {
    let output = Command::new("ip")
        .args(["route", "show", "default"])
        .output()
        .context("Failed to execute 'ip route' command")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get default route");
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("Default route output: {}", stdout);

    parse_default_route_device(&stdout)
        .ok_or_else(|| anyhow::anyhow!("Could not parse default interface from 'ip route' output"))
}

/// Device name from output like
/// `default via 192.168.1.1 dev wlan0 proto dhcp metric 600`
fn parse_default_route_device(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.starts_with("default"))
        .find_map(|line| {
            let mut parts = line.split_whitespace();
            parts.find(|&p| p == "dev")?;
            parts.next().map(str::to_string)
        })
}

/// Negotiated link rate in Mbps as exposed by the kernel
pub fn read_link_speed(sysfs_root: &Path, device: &str) -> Result<f64> {
    let path = sysfs_root.join(device).join("speed");
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {:?}", path))?;

    let speed: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Unexpected link speed {:?} for {}", raw.trim(), device))?;

    // Drivers report -1 when the rate is unknown
    if speed <= 0.0 {
        anyhow::bail!("Link speed of {} is unknown", device);
    }
    Ok(speed)
}

/// Resolve the configured hint source once, at startup.
///
/// Every failure degrades to `None`, which makes the engine use its
/// fallback link speed.
pub fn resolve(config: &LinkConfig) -> Option<f64> {
    match config.hint_source {
        HintSource::None => None,
        HintSource::Static => {
            if config.static_mbps.is_none() {
                warn!("link.hint_source is \"static\" but link.static_mbps is not set");
            }
            config.static_mbps
        }
        HintSource::Interface => {
            let device = match &config.interface {
                Some(device) => device.clone(),
                None => match detect_default_interface() {
                    Ok(device) => device,
                    Err(e) => {
                        warn!("No link hint: {}", e);
                        return None;
                    }
                },
            };

            match read_link_speed(Path::new(SYSFS_NET), &device) {
                Ok(speed) => {
                    info!("Link hint from {}: {} Mbps", device, speed);
                    Some(speed)
                }
                Err(e) => {
                    warn!("No link hint: {}", e);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_sysfs(name: &str, device: &str, speed: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("swiftsense-{}-{}", name, std::process::id()));
        let dir = root.join(device);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("speed"), speed).unwrap();
        root
    }

    #[test]
    fn parses_device_from_default_route() {
        let output = "default via 192.168.1.1 dev wlp3s0 proto dhcp src 192.168.1.23 metric 600\n";
        assert_eq!(parse_default_route_device(output), Some("wlp3s0".to_string()));
    }

    #[test]
    fn first_default_route_wins() {
        let output = "\
default via 10.0.0.1 dev eth0 proto static metric 100
default via 192.168.1.1 dev wlan0 proto dhcp metric 600
";
        assert_eq!(parse_default_route_device(output), Some("eth0".to_string()));
    }

    #[test]
    fn no_default_route() {
        assert_eq!(parse_default_route_device(""), None);
        assert_eq!(
            parse_default_route_device("10.0.0.0/24 dev eth0 proto kernel scope link\n"),
            None
        );
    }

    #[test]
    fn reads_speed_file() {
        let root = scratch_sysfs("speed-ok", "eth0", "1000\n");
        assert_eq!(read_link_speed(&root, "eth0").unwrap(), 1000.0);
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn unknown_speed_is_rejected() {
        let root = scratch_sysfs("speed-unknown", "wlan0", "-1\n");
        assert!(read_link_speed(&root, "wlan0").is_err());
        std::fs::remove_dir_all(root).unwrap();
    }

    #[test]
    fn missing_device_is_rejected() {
        let root = std::env::temp_dir().join("swiftsense-no-such-sysfs");
        assert!(read_link_speed(&root, "eth9").is_err());
    }

    #[test]
    fn static_and_disabled_sources() {
        let mut config = LinkConfig {
            hint_source: HintSource::Static,
            static_mbps: Some(12.5),
            ..LinkConfig::default()
        };
        assert_eq!(resolve(&config), Some(12.5));

        config.hint_source = HintSource::None;
        assert_eq!(resolve(&config), None);
    }
}
