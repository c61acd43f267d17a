//! configuration file handling module
//! This module provides structures and methods related to configuration
//! file handling and to the runtime host configuration.
use crate::constants::*;

// std
use std::net::IpAddr;

/// Main Configuration Structure
#[derive(Debug, Deserialize)]
pub struct CConfig {
    pub debug: Option<u8>,
    pub time_zone: Option<String>,
    pub time_format: Option<String>,
    pub pid: Option<String>,
    pub working_dir: Option<String>,
    pub main_log: Option<String>,
    pub error_log: Option<String>,
    pub host: Option<HConfig>,
    pub udp: Option<UConfig>,
}

impl CConfig {
    // debug() getter
    pub fn debug(&self) -> u8 {
        self.debug.unwrap_or(DEBUG_LEVEL_INFO)
    }
    // time_zone() getter
    // 0 = local time (the default), 1 = utc
    pub fn time_zone(&self) -> u8 {
        match self.time_zone.as_ref().map(|s| &s[..]) {
            Some("utc") => 1,
            _ => 0,
        }
    }
    // time_format() getter
    // 0 = no timestamps (the default), 1 = short, 2 = rfc2822
    pub fn time_format(&self) -> u8 {
        match self.time_format.as_ref().map(|s| &s[..]) {
            Some("short") => 1,
            Some("rfc2822") => 2,
            _ => 0,
        }
    }
    // pid() getter
    pub fn pid(&self) -> String {
        self.pid
            .clone()
            .unwrap_or_else(|| RUDPD_DFLT_PIDFILE.to_string())
    }
    // working_dir() getter
    pub fn working_dir(&self) -> String {
        self.working_dir
            .clone()
            .unwrap_or_else(|| RUDPD_DFLT_WORKDIR.to_string())
    }
    // main_log() getter
    pub fn main_log(&self) -> String {
        self.main_log
            .clone()
            .unwrap_or_else(|| RUDPD_DFLT_LOGFILE.to_string())
    }
    // error_log() getter
    pub fn error_log(&self) -> String {
        self.error_log
            .clone()
            .unwrap_or_else(|| RUDPD_DFLT_ELOGFILE.to_string())
    }
    // host() getter
    pub fn host(&self) -> &HConfig {
        self.host
            .as_ref()
            .expect("error(config): the [host] table is missing")
    }
    // udp() getter
    pub fn udp(&self) -> &UConfig {
        self.udp
            .as_ref()
            .expect("error(config): the [udp] table is missing")
    }
}

/// Host Configuration Structure
#[derive(Debug, Deserialize)]
pub struct HConfig {
    interface: String,
    mac: Option<String>,
    ip: Option<String>,
    subnet: Option<String>,
    router: Option<String>,
}

impl HConfig {
    // interface() getter
    pub fn interface(&self) -> &String {
        &self.interface
    }
    // mac() getter
    pub fn mac(&self) -> [u8; 6] {
        match &self.mac {
            Some(s) => parse_mac(s),
            None => panic!("error(config): no host MAC address configured"),
        }
    }
    // ip() getter
    pub fn ip(&self) -> [u8; 4] {
        parse_ipv4(&self.ip, "host IP address")
    }
    // subnet() getter
    pub fn subnet(&self) -> [u8; 4] {
        parse_ipv4(&self.subnet, "subnet mask")
    }
    // router() getter
    pub fn router(&self) -> [u8; 4] {
        parse_ipv4(&self.router, "router address")
    }
}

/// UDP Configuration Structure
#[derive(Debug, Deserialize)]
pub struct UConfig {
    src_port: Option<u16>,
    dst_port: Option<u16>,
    dest_ip: Option<String>,
}

impl UConfig {
    // src_port() getter
    pub fn src_port(&self) -> u16 {
        match self.src_port {
            Some(v) => v,
            None => panic!("error(config): no UDP source port configured"),
        }
    }
    // dst_port() getter
    pub fn dst_port(&self) -> u16 {
        match self.dst_port {
            Some(v) => v,
            None => panic!("error(config): no UDP destination port configured"),
        }
    }
    // dest_ip() getter
    pub fn dest_ip(&self) -> [u8; 4] {
        parse_ipv4(&self.dest_ip, "UDP destination address")
    }
}

// parse_ipv4() function
// convert an IPv4 address string to an array of four 8-bits unsigned integers
fn parse_ipv4(addr: &Option<String>, what: &str) -> [u8; 4] {
    match addr {
        Some(ip) => match ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => ip.octets(),
            Ok(IpAddr::V6(_ipv6)) => panic!("error(config): only IPv4 addresses are supported"),
            Err(e) => panic!("error(config): cannot parse {}: {}", what, e),
        },
        None => panic!("error(config): no {} configured", what),
    }
}

// parse_mac() function
// convert a colon-separated MAC address string to an array of six
// 8-bits unsigned integers
fn parse_mac(s: &str) -> [u8; 6] {
    let mut mac = [0u8; 6];
    let octets: Vec<&str> = s.split(':').collect();
    if octets.len() != 6 {
        panic!("error(config): invalid MAC address {}", s);
    }
    for (i, o) in octets.iter().enumerate() {
        mac[i] = match u8::from_str_radix(o, 16) {
            Ok(v) => v,
            Err(_) => panic!("error(config): invalid MAC address {}", s),
        };
    }
    mac
}

// decode_config() function
/// load and decode the TOML configuration file
pub fn decode_config(filename: String) -> CConfig {
    let raw = match std::fs::read_to_string(&filename) {
        Ok(s) => s,
        Err(e) => panic!("error(config): cannot read {}: {}", filename, e),
    };
    match toml::from_str(&raw) {
        Ok(c) => c,
        Err(e) => panic!("error(config): cannot parse {}: {}", filename, e),
    }
}

/// Runtime Host Configuration Structure
///
/// Written only during initialization; afterwards shared read-only with the
/// receive worker and the UDP send path. Addresses are stored in network
/// byte order.
#[derive(Debug, Default)]
pub struct HostConfig {
    mac: [u8; 6],
    ip: [u8; 4],
    subnet: [u8; 4],
    router: [u8; 4],
    udp_src_port: u16,
    udp_dst_port: u16,
    udp_dest_ip: [u8; 4],
}

// HostConfig Implementation
impl HostConfig {
    // new() method
    pub fn new() -> HostConfig {
        HostConfig::default()
    }
    // from_cconfig() method
    // build the runtime host configuration from a decoded configuration file
    pub fn from_cconfig(config: &CConfig) -> HostConfig {
        let mut host = HostConfig::new();
        host.set_mac(config.host().mac());
        host.set_ip(config.host().ip());
        host.set_subnet(config.host().subnet());
        host.set_router(config.host().router());
        host.set_udp_src_port(config.udp().src_port());
        host.set_udp_dst_port(config.udp().dst_port());
        host.set_udp_dest_ip(config.udp().dest_ip());
        host
    }
    // set_mac() setter
    pub fn set_mac(&mut self, mac: [u8; 6]) {
        self.mac = mac;
    }
    // set_ip() setter
    pub fn set_ip(&mut self, ip: [u8; 4]) {
        self.ip = ip;
    }
    // set_subnet() setter
    pub fn set_subnet(&mut self, subnet: [u8; 4]) {
        self.subnet = subnet;
    }
    // set_router() setter
    pub fn set_router(&mut self, router: [u8; 4]) {
        self.router = router;
    }
    // set_udp_src_port() setter
    pub fn set_udp_src_port(&mut self, port: u16) {
        self.udp_src_port = port;
    }
    // set_udp_dst_port() setter
    pub fn set_udp_dst_port(&mut self, port: u16) {
        self.udp_dst_port = port;
    }
    // set_udp_dest_ip() setter
    pub fn set_udp_dest_ip(&mut self, ip: [u8; 4]) {
        self.udp_dest_ip = ip;
    }
    // mac() getter
    pub fn mac(&self) -> &[u8; 6] {
        &self.mac
    }
    // ip() getter
    pub fn ip(&self) -> &[u8; 4] {
        &self.ip
    }
    // subnet() getter
    pub fn subnet(&self) -> &[u8; 4] {
        &self.subnet
    }
    // router() getter
    pub fn router(&self) -> &[u8; 4] {
        &self.router
    }
    // udp_src_port() getter
    pub fn udp_src_port(&self) -> u16 {
        self.udp_src_port
    }
    // udp_dst_port() getter
    pub fn udp_dst_port(&self) -> u16 {
        self.udp_dst_port
    }
    // udp_dest_ip() getter
    pub fn udp_dest_ip(&self) -> &[u8; 4] {
        &self.udp_dest_ip
    }
}

// Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_mac_address() {
        assert_eq!(
            parse_mac("02:4e:49:47:45:02"),
            [0x02, 0x4e, 0x49, 0x47, 0x45, 0x02]
        );
    }

    #[test]
    #[should_panic]
    fn parse_short_mac_address() {
        parse_mac("02:4e:49");
    }

    #[test]
    fn decode_full_config() {
        let raw = r#"
            debug = 5
            time_zone = "utc"
            time_format = "short"

            [host]
            interface = "eth0"
            mac = "02:4e:49:47:45:02"
            ip = "192.168.1.102"
            subnet = "255.255.255.0"
            router = "192.168.1.1"

            [udp]
            src_port = 5000
            dst_port = 7000
            dest_ip = "192.168.1.101"
        "#;
        let config: CConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.debug(), 5);
        assert_eq!(config.time_zone(), 1);
        assert_eq!(config.host().interface(), "eth0");
        assert_eq!(config.host().ip(), [192, 168, 1, 102]);
        assert_eq!(config.udp().src_port(), 5000);

        let host = HostConfig::from_cconfig(&config);
        assert_eq!(host.mac(), &[0x02, 0x4e, 0x49, 0x47, 0x45, 0x02]);
        assert_eq!(host.subnet(), &[255, 255, 255, 0]);
        assert_eq!(host.udp_dest_ip(), &[192, 168, 1, 101]);
    }
}
