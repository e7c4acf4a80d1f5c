//! LAN service advertisement over mDNS/DNS-SD.

use std::collections::HashMap;

use mdns_sd::{ServiceDaemon, ServiceInfo};

/// DNS-SD service type clients browse for.
pub const SERVICE_TYPE: &str = "_wifitransfer._tcp.local.";

/// Handle for a registered DNS-SD service. Dropping it without calling
/// `shutdown` leaves the advertisement up until the process exits.
pub struct ServiceAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

impl ServiceAdvertiser {
    /// Register the service on all interfaces, advertising the given port.
    pub fn register(service_name: &str, port: u16) -> Result<Self, mdns_sd::Error> {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "lanshare".to_string());

        let mut properties = HashMap::new();
        properties.insert("name".to_string(), service_name.to_string());
        properties.insert("path".to_string(), "/files".to_string());

        let info = ServiceInfo::new(
            SERVICE_TYPE,
            &host,
            &format!("{}.local.", host),
            "",
            port,
            properties,
        )?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();
        let daemon = ServiceDaemon::new()?;
        daemon.register(info)?;
        log::info!("Registering service '{}' as {} on port {}", service_name, fullname, port);

        Ok(Self { daemon, fullname })
    }

    /// Unregister the service and shut the daemon down.
    pub fn shutdown(self) {
        if let Err(e) = self.daemon.unregister(&self.fullname) {
            log::warn!("Error unregistering service: {}", e);
        }
        let _ = self.daemon.shutdown();
    }
}
