//! Constants module
//! This module regroups all the program's and protocols constants.

// Program Constants
pub const RUDPD_DFLT_CFG_FILE: &str = "/etc/rudpd/rudpd.conf";
pub const RUDPD_DFLT_PIDFILE: &str = "/var/run/rudpd.pid";
pub const RUDPD_DFLT_WORKDIR: &str = "/tmp";
pub const RUDPD_DFLT_LOGFILE: &str = "/var/log/rudpd.log";
pub const RUDPD_DFLT_ELOGFILE: &str = "/var/log/rudpd-error.log";
pub const RUDPD_NAME: &str = env!("CARGO_PKG_NAME");
pub const RUDPD_VERSION: &str = env!("CARGO_PKG_VERSION");

// Debug Constants
pub const DEBUG_LEVEL_INFO: u8 = 0;
pub const DEBUG_LEVEL_LOW: u8 = 1;
pub const DEBUG_LEVEL_MEDIUM: u8 = 2;
pub const DEBUG_LEVEL_HIGH: u8 = 3;
pub const DEBUG_LEVEL_EXTENSIVE: u8 = 5;
pub const DEBUG_SRC_INFO: &str = "info";
pub const DEBUG_SRC_MAIN: &str = "main";
pub const DEBUG_SRC_ETHER: &str = "ether";
pub const DEBUG_SRC_ARP: &str = "arp";
pub const DEBUG_SRC_CACHE: &str = "arp-cache";
pub const DEBUG_SRC_IP: &str = "ip";
pub const DEBUG_SRC_UDP: &str = "udp";
pub const DEBUG_SRC_WORKER: &str = "worker";
pub const DEBUG_SRC_THREAD: &str = "thread";
pub const DEBUG_SRC_NETDEV: &str = "netdev";

// Ethernet Constants
pub const ETHER_P_IP: u16 = 0x0800; // IPv4 (/usr/include/linux/if_ether.h)
pub const ETHER_P_ARP: u16 = 0x0806;
pub const ETHER_FRAME_SIZE: usize = 14;
pub const ETHER_MAX_FRAME_SIZE: usize = 1518;
pub const ETHER_BROADCAST_MAC: [u8; 6] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
pub const ETHER_DST_MAC_POS: usize = 0;
pub const ETHER_SRC_MAC_POS: usize = 6;
pub const ETHER_TYPE_POS: usize = 12;

// ARP Constants
pub const ARP_HW_TYPE: u16 = 1; // ethernet
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;
pub const ARP_FRAME_SIZE: usize = 42;
// fixed header for IPv4-over-Ethernet resolution:
// hardware type, protocol type, hardware length, protocol length
pub const ARP_FIXED_HDR: [u8; 6] = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04];
pub const ARP_FIXED_HDR_POS: usize = 14;
pub const ARP_OPCODE_POS: usize = 20;
pub const ARP_SENDER_MAC_POS: usize = 22;
pub const ARP_SENDER_IP_POS: usize = 28;
pub const ARP_TARGET_MAC_POS: usize = 32;
pub const ARP_TARGET_IP_POS: usize = 38;

// ARP Cache Constants
pub const ARP_CACHE_SIZE: usize = 8;
pub const ARP_CACHE_TTL: u32 = 1_200_000; // 20 minutes in milliseconds
pub const ARP_ENQUIRE_ATTEMPTS: usize = 2;
pub const ARP_ENQUIRE_SHORT_WAIT: u64 = 500; // milliseconds
pub const ARP_ENQUIRE_LONG_WAIT: u64 = 1500;

// IP Constants
pub const IP_FRAME_OFFSET: usize = 14;
pub const IP_HDR_SIZE: usize = 20;
pub const IP_V4_VERSION: u8 = 0x45;
pub const IP_TTL_DFLT: u8 = 64;
pub const IP_UPPER_PROTO_UDP: u8 = 17;
pub const IP_TOTAL_LEN_POS: usize = 16;
pub const IP_IDENT_POS: usize = 18;
pub const IP_FLAGS_POS: usize = 20;
pub const IP_CHECKSUM_POS: usize = 24;
pub const IP_SRC_POS: usize = 26;
pub const IP_DST_POS: usize = 30;
// mask covering MF and the fragment offset, leaving DF alone
pub const IP_FRAG_MASK: u16 = 0x3FFF;

// UDP Constants
pub const UDP_FRAME_OFFSET: usize = 34;
pub const UDP_HDR_SIZE: usize = 8;
pub const UDP_SRC_PORT_POS: usize = 34;
pub const UDP_DST_PORT_POS: usize = 36;
pub const UDP_LENGTH_POS: usize = 38;
pub const UDP_CHECKSUM_POS: usize = 40;
pub const UDP_PAYLOAD_POS: usize = 42;
pub const UDP_MAX_PAYLOAD: usize = ETHER_MAX_FRAME_SIZE - UDP_PAYLOAD_POS;
