pub mod attendance;
pub mod nfc;
pub mod response;
