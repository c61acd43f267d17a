//! ethernet framing module
//! This module provides the Ethernet II header handling shared by the ARP
//! and IP dispatch paths, and the ingress destination filter.
use crate::constants::*;
use crate::os::drivers::MacDriver;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

// std
use std::io;

// eth_check() function
/// return the EtherType of a received frame addressed to us or to the
/// broadcast address, zero otherwise
pub fn eth_check(frame: &[u8], host_mac: &[u8; 6]) -> u16 {
    if frame.len() < ETHER_FRAME_SIZE {
        return 0;
    }

    // the destination filter accepts our unicast MAC and the broadcast MAC
    let dst = &frame[ETHER_DST_MAC_POS..ETHER_DST_MAC_POS + 6];
    if dst != host_mac && dst != ETHER_BROADCAST_MAC {
        return 0;
    }

    NetworkEndian::read_u16(&frame[ETHER_TYPE_POS..ETHER_TYPE_POS + 2])
}

// dispatch_arp() function
/// fill the Ethernet header of an ARP frame and hand it to the MAC driver
pub fn dispatch_arp(
    frame: &mut [u8],
    target_mac: &[u8; 6],
    host_mac: &[u8; 6],
    driver: &dyn MacDriver,
) -> io::Result<()> {
    frame[ETHER_DST_MAC_POS..ETHER_DST_MAC_POS + 6].copy_from_slice(target_mac);
    frame[ETHER_SRC_MAC_POS..ETHER_SRC_MAC_POS + 6].copy_from_slice(host_mac);
    NetworkEndian::write_u16(&mut frame[ETHER_TYPE_POS..ETHER_TYPE_POS + 2], ETHER_P_ARP);

    driver.put_frame(&frame[..ARP_FRAME_SIZE])
}

// dispatch_ip() function
/// fill the Ethernet header of an IP frame and hand it to the MAC driver;
/// the on-wire length is taken from the IP total length field
pub fn dispatch_ip(
    frame: &mut [u8],
    target_mac: &[u8; 6],
    host_mac: &[u8; 6],
    driver: &dyn MacDriver,
) -> io::Result<()> {
    frame[ETHER_DST_MAC_POS..ETHER_DST_MAC_POS + 6].copy_from_slice(target_mac);
    frame[ETHER_SRC_MAC_POS..ETHER_SRC_MAC_POS + 6].copy_from_slice(host_mac);
    NetworkEndian::write_u16(&mut frame[ETHER_TYPE_POS..ETHER_TYPE_POS + 2], ETHER_P_IP);

    let total_len =
        NetworkEndian::read_u16(&frame[IP_TOTAL_LEN_POS..IP_TOTAL_LEN_POS + 2]) as usize;

    driver.put_frame(&frame[..ETHER_FRAME_SIZE + total_len])
}

// Tests
#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    const HOST_MAC: [u8; 6] = [0x02, 0x4e, 0x49, 0x47, 0x45, 0x02];

    struct CaptureDriver {
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl CaptureDriver {
        fn new() -> CaptureDriver {
            CaptureDriver {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl MacDriver for CaptureDriver {
        fn get_frame(&self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no ingress"))
        }
        fn put_frame(&self, frame: &[u8]) -> io::Result<()> {
            self.sent.lock().unwrap().push(frame.to_vec());
            Ok(())
        }
    }

    #[test]
    fn check_accepts_our_unicast() {
        let mut frame = [0u8; 60];
        frame[0..6].copy_from_slice(&HOST_MAC);
        frame[12] = 0x08;
        frame[13] = 0x00;
        assert_eq!(eth_check(&frame, &HOST_MAC), ETHER_P_IP);
    }

    #[test]
    fn check_accepts_broadcast() {
        let mut frame = [0u8; 60];
        frame[0..6].copy_from_slice(&ETHER_BROADCAST_MAC);
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert_eq!(eth_check(&frame, &HOST_MAC), ETHER_P_ARP);
    }

    #[test]
    fn check_rejects_foreign_unicast() {
        let mut frame = [0u8; 60];
        frame[0..6].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        frame[12] = 0x08;
        frame[13] = 0x00;
        assert_eq!(eth_check(&frame, &HOST_MAC), 0);
    }

    #[test]
    fn check_rejects_runt_frame() {
        let frame = [0u8; 10];
        assert_eq!(eth_check(&frame, &HOST_MAC), 0);
    }

    #[test]
    fn ip_dispatch_length_from_total_length_field() {
        let driver = CaptureDriver::new();
        let mut frame = [0u8; ETHER_MAX_FRAME_SIZE];
        // IP total length of 28 bytes -> 42 bytes on the wire
        NetworkEndian::write_u16(&mut frame[IP_TOTAL_LEN_POS..IP_TOTAL_LEN_POS + 2], 28);
        let target = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];
        dispatch_ip(&mut frame, &target, &HOST_MAC, &driver).unwrap();

        let sent = driver.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 42);
        assert_eq!(&sent[0][0..6], &target);
        assert_eq!(&sent[0][6..12], &HOST_MAC);
        assert_eq!(NetworkEndian::read_u16(&sent[0][12..14]), ETHER_P_IP);
    }
}
