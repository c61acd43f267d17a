//! user datagram protocol module
//! This module composes outgoing datagrams with the pseudo-header checksum
//! and validates and delivers incoming ones.
use crate::arp::ArpShared;
use crate::checksums;
use crate::config::HostConfig;
use crate::constants::*;
use crate::debug::{print_debug, Verbose};
use crate::ip;
use crate::os::drivers::MacDriver;
use crate::timers::Clock;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

// std
use std::io;
use std::sync::{mpsc, Mutex};

// pseudo_header_add() function
// accumulate the 12-byte pseudo-header: both addresses, the zero-padded
// protocol word and the UDP length
fn pseudo_header_add(mut sum: u32, src_ip: &[u8; 4], dst_ip: &[u8; 4], udp_len: u16) -> u32 {
    sum = checksums::checksum_add(sum, src_ip);
    sum = checksums::checksum_add(sum, dst_ip);
    sum += IP_UPPER_PROTO_UDP as u32;
    sum += udp_len as u32;
    sum
}

// build_udp_datagram() function
/// write the UDP header into the frame, copy the payload into place while
/// accumulating its checksum, and patch the checksum in network order
pub fn build_udp_datagram(
    frame: &mut [u8],
    payload: &[u8],
    src_port: u16,
    dst_port: u16,
    src_ip: &[u8; 4],
    dst_ip: &[u8; 4],
) {
    let udp_len = (payload.len() + UDP_HDR_SIZE) as u16;

    NetworkEndian::write_u16(&mut frame[UDP_SRC_PORT_POS..UDP_SRC_PORT_POS + 2], src_port);
    NetworkEndian::write_u16(&mut frame[UDP_DST_PORT_POS..UDP_DST_PORT_POS + 2], dst_port);
    NetworkEndian::write_u16(&mut frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2], udp_len);
    NetworkEndian::write_u16(&mut frame[UDP_CHECKSUM_POS..UDP_CHECKSUM_POS + 2], 0);

    let mut sum = pseudo_header_add(0, src_ip, dst_ip, udp_len);
    sum = checksums::checksum_add(sum, &frame[UDP_FRAME_OFFSET..UDP_PAYLOAD_POS]);
    // single pass over the payload: copy into the frame and checksum
    sum = checksums::checksum_add_move(
        sum,
        payload,
        &mut frame[UDP_PAYLOAD_POS..UDP_PAYLOAD_POS + payload.len()],
    );

    let cks = checksums::checksum_fold(sum);
    NetworkEndian::write_u16(&mut frame[UDP_CHECKSUM_POS..UDP_CHECKSUM_POS + 2], cks);
}

// udp_send() function
/// send a datagram to the configured destination; resolution failures and
/// oversized payloads drop it silently, as datagram semantics allow
pub fn udp_send(
    frame: &mut [u8],
    payload: &[u8],
    host: &HostConfig,
    arp: &Mutex<ArpShared>,
    driver: &dyn MacDriver,
    clock: &dyn Clock,
    debug: &Verbose,
) -> io::Result<()> {
    if payload.len() > UDP_MAX_PAYLOAD {
        print_debug(
            debug,
            DEBUG_LEVEL_LOW,
            DEBUG_SRC_UDP,
            format!(
                "dropping oversized payload of {} bytes (max {})",
                payload.len(),
                UDP_MAX_PAYLOAD
            ),
        );
        return Ok(());
    }

    let dest_ip = *host.udp_dest_ip();
    build_udp_datagram(
        frame,
        payload,
        host.udp_src_port(),
        host.udp_dst_port(),
        host.ip(),
        &dest_ip,
    );

    ip::ip_dispatch_udp(frame, host, &dest_ip, arp, driver, clock, debug)
}

// udp_check() function
/// recompute the checksum over the pseudo-header and the datagram exactly
/// as received; a zero result marks a valid datagram
pub fn udp_check(frame: &[u8]) -> u16 {
    let udp_len = NetworkEndian::read_u16(&frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2]) as usize;
    if udp_len < UDP_HDR_SIZE || UDP_FRAME_OFFSET + udp_len > frame.len() {
        return 0xFFFF;
    }

    let mut src_ip = [0u8; 4];
    src_ip.copy_from_slice(&frame[IP_SRC_POS..IP_SRC_POS + 4]);
    let mut dst_ip = [0u8; 4];
    dst_ip.copy_from_slice(&frame[IP_DST_POS..IP_DST_POS + 4]);

    let mut sum = pseudo_header_add(0, &src_ip, &dst_ip, udp_len as u16);
    sum = checksums::checksum_add(sum, &frame[UDP_FRAME_OFFSET..UDP_FRAME_OFFSET + udp_len]);
    checksums::checksum_fold(sum)
}

// udp_in() function
/// validate a received datagram and deliver its payload to the registered
/// application sink when the destination port is ours
pub fn udp_in(
    in_frame: &[u8],
    host: &HostConfig,
    sink: &Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    debug: &Verbose,
) {
    if in_frame.len() < UDP_FRAME_OFFSET + UDP_HDR_SIZE {
        return;
    }
    if udp_check(in_frame) != 0 {
        print_debug(
            debug,
            DEBUG_LEVEL_MEDIUM,
            DEBUG_SRC_UDP,
            format!("dropping datagram with invalid checksum"),
        );
        return;
    }

    // only the configured local port is open
    let dst_port = NetworkEndian::read_u16(&in_frame[UDP_DST_PORT_POS..UDP_DST_PORT_POS + 2]);
    if dst_port != host.udp_src_port() {
        return;
    }

    let udp_len = NetworkEndian::read_u16(&in_frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2]) as usize;
    let payload = &in_frame[UDP_PAYLOAD_POS..UDP_FRAME_OFFSET + udp_len];

    match sink.lock().unwrap().as_ref() {
        Some(tx) => {
            if tx.send(payload.to_vec()).is_err() {
                print_debug(
                    debug,
                    DEBUG_LEVEL_LOW,
                    DEBUG_SRC_UDP,
                    format!("delivery channel closed, payload dropped"),
                );
            }
        }
        // no sink registered: echo through the debug printer
        None => print_debug(
            debug,
            DEBUG_LEVEL_INFO,
            DEBUG_SRC_UDP,
            format!(
                "received {} bytes datagram on port {}: {}",
                payload.len(),
                dst_port,
                String::from_utf8_lossy(payload)
            ),
        ),
    }
}

// Tests
#[cfg(test)]
mod test {
    use super::*;

    const HOST_IP: [u8; 4] = [192, 168, 1, 102];
    const PEER_IP: [u8; 4] = [192, 168, 1, 101];

    fn host_config() -> HostConfig {
        let mut host = HostConfig::new();
        host.set_mac([0x02, 0x4e, 0x49, 0x47, 0x45, 0x02]);
        host.set_ip(HOST_IP);
        host.set_subnet([255, 255, 255, 0]);
        host.set_router([192, 168, 1, 1]);
        host.set_udp_src_port(5000);
        host.set_udp_dst_port(7000);
        host.set_udp_dest_ip(PEER_IP);
        host
    }

    fn quiet() -> Verbose {
        Verbose::new(0, 0, 0)
    }

    // compose a full frame the way the send path does, as seen by a
    // receiver whose addresses mirror ours
    fn loopback_frame(payload: &[u8], dst_port: u16) -> Vec<u8> {
        let mut frame = vec![0u8; ETHER_MAX_FRAME_SIZE];
        build_udp_datagram(&mut frame, payload, 7000, dst_port, &PEER_IP, &HOST_IP);
        ip::build_ipv4_header(&mut frame, &PEER_IP, &HOST_IP, 0x0042);
        frame.truncate(UDP_PAYLOAD_POS + payload.len());
        frame
    }

    #[test]
    fn datagram_header_and_payload_layout() {
        let mut frame = [0u8; ETHER_MAX_FRAME_SIZE];
        let payload = b"hello";
        build_udp_datagram(&mut frame, payload, 5000, 7000, &HOST_IP, &PEER_IP);

        assert_eq!(NetworkEndian::read_u16(&frame[34..36]), 5000);
        assert_eq!(NetworkEndian::read_u16(&frame[36..38]), 7000);
        assert_eq!(NetworkEndian::read_u16(&frame[38..40]), 13);
        // the payload was moved into place byte-exactly
        assert_eq!(&frame[42..47], payload);
    }

    #[test]
    fn self_sent_datagram_verifies_to_zero() {
        let frame = loopback_frame(b"ping", 5000);
        assert_eq!(udp_check(&frame), 0);
    }

    #[test]
    fn zero_length_payload_is_well_defined() {
        let frame = loopback_frame(b"", 5000);
        assert_eq!(NetworkEndian::read_u16(&frame[38..40]), 8);
        assert_eq!(udp_check(&frame), 0);
    }

    #[test]
    fn odd_length_payload_verifies() {
        let frame = loopback_frame(b"odd", 5000);
        assert_eq!(udp_check(&frame), 0);
    }

    #[test]
    fn corrupted_payload_fails_check() {
        let mut frame = loopback_frame(b"ping", 5000);
        frame[UDP_PAYLOAD_POS] ^= 0x01;
        assert_ne!(udp_check(&frame), 0);
    }

    #[test]
    fn truncated_length_field_fails_check() {
        let mut frame = loopback_frame(b"ping", 5000);
        // length larger than the frame
        NetworkEndian::write_u16(&mut frame[UDP_LENGTH_POS..UDP_LENGTH_POS + 2], 1000);
        assert_ne!(udp_check(&frame), 0);
    }

    #[test]
    fn matching_port_delivers_payload() {
        let host = host_config();
        let (tx, rx) = mpsc::channel();
        let sink = Mutex::new(Some(tx));

        udp_in(&loopback_frame(b"ping", 5000), &host, &sink, &quiet());

        assert_eq!(rx.try_recv().unwrap(), b"ping".to_vec());
    }

    #[test]
    fn foreign_port_is_dropped() {
        let host = host_config();
        let (tx, rx) = mpsc::channel();
        let sink = Mutex::new(Some(tx));

        udp_in(&loopback_frame(b"ping", 5001), &host, &sink, &quiet());

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn maximum_payload_fills_the_frame() {
        let mut frame = [0u8; ETHER_MAX_FRAME_SIZE];
        let payload = [0x5a; UDP_MAX_PAYLOAD];
        build_udp_datagram(&mut frame, &payload, 7000, 5000, &PEER_IP, &HOST_IP);
        ip::build_ipv4_header(&mut frame, &PEER_IP, &HOST_IP, 1);

        // the largest payload ends exactly at the frame boundary
        let total_len = NetworkEndian::read_u16(&frame[IP_TOTAL_LEN_POS..IP_TOTAL_LEN_POS + 2]);
        assert_eq!(total_len as usize, UDP_MAX_PAYLOAD + UDP_HDR_SIZE + IP_HDR_SIZE);
        assert_eq!(ETHER_FRAME_SIZE + total_len as usize, ETHER_MAX_FRAME_SIZE);
        assert_eq!(udp_check(&frame), 0);
    }

    #[test]
    fn oversized_payload_is_dropped_before_resolution() {
        use crate::timers::MonotonicClock;
        use std::sync::Mutex;

        struct CountingDriver(Mutex<usize>);
        impl MacDriver for CountingDriver {
            fn get_frame(&self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::WouldBlock, "no ingress"))
            }
            fn put_frame(&self, _frame: &[u8]) -> io::Result<()> {
                *self.0.lock().unwrap() += 1;
                Ok(())
            }
        }

        let host = host_config();
        let arp = Mutex::new(ArpShared::new());
        let driver = CountingDriver(Mutex::new(0));
        let clock = MonotonicClock::new();
        let mut frame = [0u8; ETHER_MAX_FRAME_SIZE];
        let payload = vec![0u8; UDP_MAX_PAYLOAD + 1];

        udp_send(&mut frame, &payload, &host, &arp, &driver, &clock, &quiet()).unwrap();

        // nothing reached the wire, not even a resolution request
        assert_eq!(*driver.0.lock().unwrap(), 0);
    }

    #[test]
    fn invalid_checksum_is_dropped() {
        let host = host_config();
        let (tx, rx) = mpsc::channel();
        let sink = Mutex::new(Some(tx));

        let mut frame = loopback_frame(b"ping", 5000);
        frame[UDP_CHECKSUM_POS] ^= 0xff;
        udp_in(&frame, &host, &sink, &quiet());

        assert!(rx.try_recv().is_err());
    }
}
