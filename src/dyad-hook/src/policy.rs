//! Applicability decisions for the interposed entry points, kept free of
//! `unsafe` and libc so they can be exercised directly (spec §4.5 step 2).

use libc::{O_ACCMODE, O_CREAT, O_RDONLY};

/// `open`'s sentinel for "this is a plain read": no `O_CREAT` and the
/// access-mode bits are `O_RDONLY`. Checking `flags & O_ACCMODE` rather than
/// the raw flags is deliberate — `O_RDONLY` is `0`, so comparing the whole
/// `flags` word against it would reject any read-only open that also sets
/// an unrelated bit such as `O_CLOEXEC`.
pub fn open_is_subscribe_candidate(flags: libc::c_int) -> bool {
    flags & O_CREAT == 0 && flags & O_ACCMODE == O_RDONLY
}

/// `O_CREAT` carries a mode argument; its absence means the real third
/// argument must not be forwarded at all (spec §9 Open Questions).
pub fn open_takes_mode_arg(flags: libc::c_int) -> bool {
    flags & O_CREAT != 0
}

/// `fopen`'s subscribe sentinel is the literal mode string `"r"` (spec
/// §4.5 step 2); `"r+"`, `"rb"`, and friends are deliberately excluded.
pub fn fopen_is_subscribe_candidate(mode: &str) -> bool {
    mode == "r"
}

/// Whether an `open` call whose flags are `flags` should, on success, be
/// tracked as a publish candidate for the eventual matching `close`.
pub fn open_is_publish_candidate(flags: libc::c_int) -> bool {
    flags & O_ACCMODE == libc::O_WRONLY
}

/// `fopen`'s publish sentinel.
pub fn fopen_is_publish_candidate(mode: &str) -> bool {
    mode == "w" || mode == "wb"
}
