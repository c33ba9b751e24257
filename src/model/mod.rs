pub mod attendance;
pub mod device_info;
pub mod person;
