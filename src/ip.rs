//! internet protocol module
//! This module builds outgoing IPv4 headers, forwards datagrams to their
//! next hop and validates incoming packets.
use crate::arp::{self, ArpShared};
use crate::checksums;
use crate::config::HostConfig;
use crate::constants::*;
use crate::debug::{format_ipv4, print_debug, Verbose};
use crate::ethernet;
use crate::os::drivers::MacDriver;
use crate::timers::Clock;
use crate::udp;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

// std
use std::io;
use std::sync::{mpsc, Mutex};

// build_ipv4_header() function
/// complete the 20-byte IPv4 header of the frame under construction; the
/// total length is derived from the UDP length field already in place
pub fn build_ipv4_header(frame: &mut [u8], src_ip: &[u8; 4], dest_ip: &[u8; 4], ident: u16) {
    let udp_len = NetworkEndian::read_u16(&frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2]);

    frame[IP_FRAME_OFFSET] = IP_V4_VERSION;
    frame[IP_FRAME_OFFSET + 1] = 0; // DSCP/ECN
    NetworkEndian::write_u16(
        &mut frame[IP_TOTAL_LEN_POS..IP_TOTAL_LEN_POS + 2],
        udp_len + IP_HDR_SIZE as u16,
    );
    NetworkEndian::write_u16(&mut frame[IP_IDENT_POS..IP_IDENT_POS + 2], ident);
    NetworkEndian::write_u16(&mut frame[IP_FLAGS_POS..IP_FLAGS_POS + 2], 0);
    frame[IP_FRAME_OFFSET + 8] = IP_TTL_DFLT;
    frame[IP_FRAME_OFFSET + 9] = IP_UPPER_PROTO_UDP;
    NetworkEndian::write_u16(&mut frame[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], 0);
    frame[IP_SRC_POS..IP_SRC_POS + 4].copy_from_slice(src_ip);
    frame[IP_DST_POS..IP_DST_POS + 4].copy_from_slice(dest_ip);

    // header checksum over the completed 20 bytes
    let cks = checksums::checksum(&frame[IP_FRAME_OFFSET..IP_FRAME_OFFSET + IP_HDR_SIZE]);
    NetworkEndian::write_u16(&mut frame[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], cks);
}

// ip_dispatch_udp() function
/// finish the IPv4 header of the outgoing UDP frame and forward it
pub fn ip_dispatch_udp(
    frame: &mut [u8],
    host: &HostConfig,
    dest_ip: &[u8; 4],
    arp: &Mutex<ArpShared>,
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<()> {
    build_ipv4_header(frame, host.ip(), dest_ip, clock.ticks() as u16);
    ip_forward(frame, host, arp, driver, clock, debug)
}

// on_subnet() function
// byte-wise masked comparison of the destination against our network
fn on_subnet(dest_ip: &[u8; 4], host_ip: &[u8; 4], mask: &[u8; 4]) -> bool {
    for i in 0..4 {
        if dest_ip[i] & mask[i] != host_ip[i] & mask[i] {
            return false;
        }
    }
    true
}

// ip_forward() function
/// deliver the frame directly when the destination is on our subnet, via
/// the default router otherwise; unresolvable next hops drop the frame
pub fn ip_forward(
    frame: &mut [u8],
    host: &HostConfig,
    arp: &Mutex<ArpShared>,
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<()> {
    let mut dest_ip = [0u8; 4];
    dest_ip.copy_from_slice(&frame[IP_DST_POS..IP_DST_POS + 4]);

    let next_hop = if on_subnet(&dest_ip, host.ip(), host.subnet()) {
        dest_ip
    } else {
        *host.router()
    };

    match arp::enquire_arp(arp, host, &next_hop, driver, clock, debug)? {
        Some(mac) => ethernet::dispatch_ip(frame, &mac, host.mac(), driver),
        None => {
            print_debug(
                debug,
                DEBUG_LEVEL_MEDIUM,
                DEBUG_SRC_IP,
                format!(
                    "dropping datagram for {}, next hop unresolved",
                    format_ipv4(&dest_ip)
                ),
            );
            Ok(())
        }
    }
}

// ip_check() function
/// validate a received IPv4 packet and return its protocol number, or
/// zero when any check fails
pub fn ip_check(frame: &[u8], host_ip: &[u8; 4]) -> u8 {
    if frame.len() < IP_FRAME_OFFSET + IP_HDR_SIZE {
        return 0;
    }

    // header checksum must verify to zero
    if checksums::checksum(&frame[IP_FRAME_OFFSET..IP_FRAME_OFFSET + IP_HDR_SIZE]) != 0 {
        return 0;
    }
    // IPv4 with a plain 20-byte header only
    if frame[IP_FRAME_OFFSET] != IP_V4_VERSION {
        return 0;
    }
    // no fragments: neither a fragment offset nor the more-fragments bit
    if NetworkEndian::read_u16(&frame[IP_FLAGS_POS..IP_FLAGS_POS + 2]) & IP_FRAG_MASK != 0 {
        return 0;
    }
    // addressed to us
    if &frame[IP_DST_POS..IP_DST_POS + 4] != host_ip {
        return 0;
    }

    frame[IP_FRAME_OFFSET + 9]
}

// ip_in() function
/// dispatch a validated IPv4 packet to its transport protocol
pub fn ip_in(
    in_frame: &[u8],
    host: &HostConfig,
    sink: &Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    debug: &Verbose,
) {
    match ip_check(in_frame, host.ip()) {
        IP_UPPER_PROTO_UDP => udp::udp_in(in_frame, host, sink, debug),
        // unknown upper protocol
        _ => {}
    }
}
