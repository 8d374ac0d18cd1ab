//! Black-box coverage of the hook applicability table (spec §4.5 step 2),
//! exercised through the crate's public API the way a caller outside the
//! crate would.

use dyad_hook::policy::{
    fopen_is_publish_candidate, fopen_is_subscribe_candidate, open_is_publish_candidate,
    open_is_subscribe_candidate, open_takes_mode_arg,
};

#[test]
fn open_flag_table() {
    let cases: &[(libc::c_int, bool, bool, bool)] = &[
        (libc::O_RDONLY, true, false, false),
        (libc::O_RDONLY | libc::O_CREAT, false, true, false),
        (libc::O_WRONLY, false, false, true),
        (libc::O_RDWR, false, false, false),
        (libc::O_WRONLY | libc::O_CREAT, false, true, true),
    ];

    for &(flags, subscribe, takes_mode, publish) in cases {
        assert_eq!(open_is_subscribe_candidate(flags), subscribe, "flags={flags:#o}");
        assert_eq!(open_takes_mode_arg(flags), takes_mode, "flags={flags:#o}");
        assert_eq!(open_is_publish_candidate(flags), publish, "flags={flags:#o}");
    }
}

#[test]
fn fopen_mode_table() {
    assert!(fopen_is_subscribe_candidate("r"));
    assert!(!fopen_is_subscribe_candidate("r+"));
    assert!(!fopen_is_subscribe_candidate("w"));

    assert!(fopen_is_publish_candidate("w"));
    assert!(fopen_is_publish_candidate("wb"));
    assert!(!fopen_is_publish_candidate("r"));
    assert!(!fopen_is_publish_candidate("a"));
}
