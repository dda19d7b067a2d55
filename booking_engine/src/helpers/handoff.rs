use rand::Rng;
use svc_common::Secret;

pub const HANDOFF_CODE_LENGTH: usize = 6;

/// Generates a fresh numeric handoff code, zero-padded to [`HANDOFF_CODE_LENGTH`] digits.
pub fn new_handoff_code() -> Secret<String> {
    let n = rand::thread_rng().gen_range(0..1_000_000u32);
    Secret::new(format!("{n:06}"))
}
