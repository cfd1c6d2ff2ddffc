pub mod enums;
pub mod outline;
