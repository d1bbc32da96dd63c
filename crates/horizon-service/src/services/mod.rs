//! System service modules registered at boot.

pub mod cecd;
pub mod http;
pub mod ns;
pub mod soc;
pub mod srv;
