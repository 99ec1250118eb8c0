use anyhow::Result;
use std::net::IpAddr;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig) -> Result<()> {
    anyhow::ensure!(cfg.host.parse::<IpAddr>().is_ok(), "link.host is not an IP address: {}", cfg.host);
    anyhow::ensure!(cfg.port > 0, "link.port must be nonzero");
    anyhow::ensure!(
        cfg.response_timeout_ms >= 500 && cfg.response_timeout_ms <= 30_000,
        "link.response_timeout_ms should be 500..30000"
    );
    Ok(())
}
