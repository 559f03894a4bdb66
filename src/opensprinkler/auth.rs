//! Stored credential
//!
//! Only the MD5 digest of the password is kept in the store.

use crate::utils;

use super::store::{self, layout, Store};

/// Password after a factory reset
pub const DEFAULT_PASSWORD: &str = "opendoor";

pub type Digest = [u8; layout::PASSWORD_SIZE];

pub fn digest(password: &str) -> Digest {
    md5::compute(password.as_bytes()).0
}

pub fn password_load(store: &dyn Store) -> Digest {
    let mut stored = [0u8; layout::PASSWORD_SIZE];
    store.read_block(layout::PASSWORD, &mut stored);
    stored
}

pub fn password_save(store: &mut dyn Store, password: &str) -> store::Result<()> {
    store.write_block(layout::PASSWORD, &digest(password))
}

/// Check `password` against the stored digest
pub fn verify(store: &dyn Store, password: &str) -> bool {
    utils::constant_time_eq(&password_load(store), &digest(password))
}
