//! Result codes returned to guest code by the kernel libraries.
//!
//! Values follow the firmware convention: `KE_OK` on success, a negative
//! number otherwise. They travel through `v0` as the two's complement `u32`.

pub const KE_OK: i32 = 0;
pub const KE_ERROR: i32 = -1;

pub const KE_ILLEGAL_CONTEXT: i32 = -100;
pub const KE_ILLEGAL_INTRCODE: i32 = -101;
pub const KE_FOUND_HANDLER: i32 = -104;
pub const KE_NOTFOUND_HANDLER: i32 = -105;

pub const KE_NO_MEMORY: i32 = -400;
pub const KE_ILLEGAL_ENTRY: i32 = -402;
pub const KE_ILLEGAL_PRIORITY: i32 = -403;
pub const KE_ILLEGAL_MODE: i32 = -405;
pub const KE_ILLEGAL_THID: i32 = -406;
pub const KE_UNKNOWN_THID: i32 = -407;
pub const KE_UNKNOWN_SEMID: i32 = -408;
pub const KE_UNKNOWN_EVFID: i32 = -409;
pub const KE_DORMANT: i32 = -413;
pub const KE_NOT_DORMANT: i32 = -414;
pub const KE_SEMA_ZERO: i32 = -419;
pub const KE_EVF_COND: i32 = -421;
pub const KE_EVF_MULTI: i32 = -422;
pub const KE_EVF_ILPAT: i32 = -423;
pub const KE_WAIT_DELETE: i32 = -425;

/// Encodes a firmware result code the way guest code reads it from `v0`.
pub const fn to_guest(code: i32) -> u32 {
    code as u32
}
