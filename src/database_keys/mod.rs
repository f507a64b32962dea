mod generate;

pub use generate::*;

/// Length of a server-assigned user id.
pub const USER_ID_LENGTH: usize = 16;
