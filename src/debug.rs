//! debugging module
//! This module provides debugging and display related functions.
use crate::arp::ArpCache;
use crate::constants::*;

// chrono
use chrono::{DateTime, Local, Utc};

// itertools
use itertools::Itertools;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

/// Verbose Structure
///
/// Holds the verbosity level and timestamping options of the debug output
#[derive(Debug, Clone)]
pub struct Verbose {
    level: u8,       // verbosity level
    time_zone: u8,   // timestamps time zone (0 local, 1 utc)
    time_format: u8, // timestamps format (0 disabled, 1 short, 2 rfc2822)
}

// Verbose Implementation
impl Verbose {
    // new() method
    pub fn new(level: u8, time_zone: u8, time_format: u8) -> Verbose {
        Verbose {
            level,
            time_zone,
            time_format,
        }
    }
    // level() getter
    pub fn level(&self) -> u8 {
        self.level
    }
}

// print_debug() function
/// print a debugging message according to the configured verbosity level
pub fn print_debug(debug: &Verbose, msg_level: u8, msg_src: &str, msg: String) {
    if debug.level < msg_level {
        return;
    }

    // format the timestamp according to the configured time zone and format
    let ts = match debug.time_format {
        1 => match debug.time_zone {
            1 => {
                let now: DateTime<Utc> = Utc::now();
                format!("{}", now.format("%b %e %T"))
            }
            _ => {
                let now: DateTime<Local> = Local::now();
                format!("{}", now.format("%b %e %T"))
            }
        },
        2 => match debug.time_zone {
            1 => Utc::now().to_rfc2822(),
            _ => Local::now().to_rfc2822(),
        },
        _ => String::new(),
    };

    if ts.is_empty() {
        println!("{}: {}", msg_src, msg);
    } else {
        println!("[{}] {}: {}", ts, msg_src, msg);
    }
}

// format_mac() function
/// format a MAC address in colon-separated hexadecimal notation
pub fn format_mac(mac: &[u8]) -> String {
    format!(
        "{}",
        mac.iter().format_with(":", |b, f| f(&format_args!("{:02x}", b)))
    )
}

// format_ipv4() function
/// format an IPv4 address in dotted decimal notation
pub fn format_ipv4(ip: &[u8]) -> String {
    format!("{}", ip.iter().format("."))
}

// dump_eth_frame() function
/// display the header fields of a received Ethernet frame
pub fn dump_eth_frame(frame: &[u8]) {
    if frame.len() < ETHER_FRAME_SIZE {
        return;
    }

    let ethertype = NetworkEndian::read_u16(&frame[ETHER_TYPE_POS..ETHER_TYPE_POS + 2]);
    println!("Ethernet Frame:");
    println!(" Destination MAC: {}", format_mac(&frame[0..6]));
    println!(" Source MAC: {}", format_mac(&frame[6..12]));
    println!(" EtherType: {:#06x}", ethertype);

    match ethertype {
        ETHER_P_ARP if frame.len() >= ARP_FRAME_SIZE => dump_arp_fields(frame),
        ETHER_P_IP if frame.len() >= IP_FRAME_OFFSET + IP_HDR_SIZE => dump_ip_fields(frame),
        _ => {}
    }
}

// dump_arp_fields() function
/// display the fields of an ARP frame
fn dump_arp_fields(frame: &[u8]) {
    let opcode = NetworkEndian::read_u16(&frame[ARP_OPCODE_POS..ARP_OPCODE_POS + 2]);
    println!(" ARP:");
    println!("  Opcode: {}", opcode);
    println!(
        "  Sender: {} ({})",
        format_ipv4(&frame[ARP_SENDER_IP_POS..ARP_SENDER_IP_POS + 4]),
        format_mac(&frame[ARP_SENDER_MAC_POS..ARP_SENDER_MAC_POS + 6])
    );
    println!(
        "  Target: {} ({})",
        format_ipv4(&frame[ARP_TARGET_IP_POS..ARP_TARGET_IP_POS + 4]),
        format_mac(&frame[ARP_TARGET_MAC_POS..ARP_TARGET_MAC_POS + 6])
    );
}

// dump_ip_fields() function
/// display the fields of an IPv4 packet, and its UDP header when applicable
fn dump_ip_fields(frame: &[u8]) {
    println!(" IPv4:");
    println!("  Version/IHL: {:#04x}", frame[IP_FRAME_OFFSET]);
    println!(
        "  Total Length: {}",
        NetworkEndian::read_u16(&frame[IP_TOTAL_LEN_POS..IP_TOTAL_LEN_POS + 2])
    );
    println!("  TTL: {}", frame[IP_FRAME_OFFSET + 8]);
    println!("  Protocol: {}", frame[IP_FRAME_OFFSET + 9]);
    println!("  Source IP: {}", format_ipv4(&frame[IP_SRC_POS..IP_SRC_POS + 4]));
    println!("  Destination IP: {}", format_ipv4(&frame[IP_DST_POS..IP_DST_POS + 4]));

    if frame[IP_FRAME_OFFSET + 9] == IP_UPPER_PROTO_UDP
        && frame.len() >= UDP_FRAME_OFFSET + UDP_HDR_SIZE
    {
        println!("  UDP:");
        println!(
            "   Source Port: {}",
            NetworkEndian::read_u16(&frame[UDP_SRC_PORT_POS..UDP_SRC_PORT_POS + 2])
        );
        println!(
            "   Destination Port: {}",
            NetworkEndian::read_u16(&frame[UDP_DST_PORT_POS..UDP_DST_PORT_POS + 2])
        );
        println!(
            "   Length: {}",
            NetworkEndian::read_u16(&frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2])
        );
    }
}

// dump_arp_cache() function
/// display every slot of the ARP cache with its age and resolution state
pub fn dump_arp_cache(cache: &ArpCache, now: u32) {
    println!("ARP Cache:");
    for (idx, slot) in cache.slots().iter().enumerate() {
        println!(
            " [{}] {} {} age={}ms state={}",
            idx,
            format_ipv4(slot.ip()),
            format_mac(slot.mac()),
            now.wrapping_sub(slot.ts()),
            slot.state_name(now),
        );
    }
}

// Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mac_formatting() {
        let mac = [0x02, 0x4e, 0x49, 0x47, 0x45, 0x02];
        assert_eq!(format_mac(&mac), "02:4e:49:47:45:02");
    }

    #[test]
    fn ipv4_formatting() {
        let ip = [192, 168, 1, 102];
        assert_eq!(format_ipv4(&ip), "192.168.1.102");
    }
}
