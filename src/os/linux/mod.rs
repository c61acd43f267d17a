//! Linux Operating System support

// netdev support
pub mod netdev;
