use super::*;

use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Random alphanumeric key of the given length.
pub fn generate_key(length: usize) -> String {
    let rng = thread_rng();

    rng.sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn generate_user_id() -> String {
    generate_key(USER_ID_LENGTH)
}
