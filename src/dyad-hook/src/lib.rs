//! Interposed `open`/`fopen`/`close`/`fclose` (spec §4.5). Exported at a
//! fixed C ABI so a pre-load mechanism can shadow the libc originals; the
//! real functions are resolved lazily via [`real`] and invoked on every
//! code path regardless of whether coordination ran.
//!
//! `open`'s real C signature is variadic (`open(path, flags, ...)`); stable
//! Rust has no variadic functions, so this follows the common interposition
//! trick of declaring the mode argument unconditionally. Under the calling
//! conventions glibc/musl actually use, a fixed integer argument occupies
//! the same register/stack slot a variadic one would, so this is safe as
//! long as the mode value is only read (and only forwarded to the real
//! `open`) when `O_CREAT` says the caller supplied one.

pub mod policy;
mod real;
mod registry;

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::{Path, PathBuf};

use dyad_core::context::{shared_state, ReentryGuard, SharedState};
use dyad_types::ManagedPath;
use tracing::debug;

#[ctor::ctor]
fn on_load() {
    let _ = tracing_subscriber::fmt::try_init();
    dyad_core::lifecycle::init();
}

#[ctor::dtor]
fn on_unload() {
    dyad_core::lifecycle::teardown();
}

unsafe fn cstr_to_path(p: *const c_char) -> Option<PathBuf> {
    if p.is_null() {
        return None;
    }
    CStr::from_ptr(p).to_str().ok().map(PathBuf::from)
}

fn consumer_prefix(state: &SharedState) -> Option<ManagedPath> {
    state.config.path_cons.clone().map(ManagedPath::new)
}

fn producer_prefix(state: &SharedState) -> Option<ManagedPath> {
    state.config.path_prod.clone().map(ManagedPath::new)
}

/// Sets `DYAD_CHECK_ENV=ok` after a hook body completes without error, when
/// `DYAD_SYNC_CHECK` asked for it (spec §6, "Exit codes and success
/// markers").
fn mark_check_ok() {
    if let Some(state) = shared_state() {
        if state.config.check {
            std::env::set_var("DYAD_CHECK_ENV", "ok");
        }
    }
}

fn is_directory(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}

fn try_subscribe_before_open(path: &Path) {
    if is_directory(path) {
        return;
    }
    let Some(state) = shared_state() else { return };
    let Some(transport) = state.transport.as_ref() else {
        return;
    };
    let Some(prefix) = consumer_prefix(state) else {
        return;
    };

    match dyad_core::subscribe::subscribe(transport.as_ref(), &state.config, &prefix, path) {
        Ok(()) => mark_check_ok(),
        Err(e) => debug!(?path, error = %e, "dyad: subscribe did not run"),
    }
}

fn try_publish_after_close(path: &Path) {
    let Some(_guard) = ReentryGuard::enter() else {
        return;
    };
    let Some(state) = shared_state() else { return };
    let Some(transport) = state.transport.as_ref() else {
        return;
    };
    let Some(prefix) = producer_prefix(state) else {
        return;
    };

    match dyad_core::publish::publish(transport.as_ref(), &state.config, &prefix, path) {
        Ok(()) => mark_check_ok(),
        Err(e) => debug!(?path, error = %e, "dyad: publish did not run"),
    }
}

fn fsync_parent_dir(path: &Path) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    let (Some(real_open), Some(real_close)) = (real::open_real(), real::close_real()) else {
        return;
    };
    let Ok(cpath) = CString::new(parent.to_string_lossy().into_owned()) else {
        return;
    };

    // SAFETY: real_open/real_close are the unhooked libc entry points;
    // opening and closing the parent directory here does not re-enter this
    // module's own open/close.
    unsafe {
        let fd = real_open(cpath.as_ptr(), libc::O_RDONLY, 0);
        if fd >= 0 {
            libc::fsync(fd);
            real_close(fd);
        }
    }
}

/// Forces `fd`'s data durable and, if `DYAD_SYNC_DIR` is set, its parent
/// directory entry too, before the real close runs (spec §4.5 step 3).
fn flush_before_close(fd: c_int, entry: &registry::OpenedFile) {
    unsafe {
        libc::fsync(fd);
    }
    if let Some(state) = shared_state() {
        if state.config.sync_dir {
            fsync_parent_dir(&entry.path);
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: libc::mode_t) -> c_int {
    let Some(real_open) = real::open_real() else {
        return -1;
    };
    let forwarded_mode = if policy::open_takes_mode_arg(flags) {
        mode
    } else {
        0
    };

    let Some(user_path) = cstr_to_path(path) else {
        return real_open(path, flags, forwarded_mode);
    };

    if policy::open_is_subscribe_candidate(flags) {
        if let Some(_guard) = ReentryGuard::enter() {
            try_subscribe_before_open(&user_path);
        }
    }

    let fd = real_open(path, flags, forwarded_mode);
    if fd >= 0 && policy::open_is_publish_candidate(flags) {
        if let Some(state) = shared_state() {
            if let Some(prefix) = producer_prefix(state) {
                if matches!(prefix.user_path(&user_path), Ok(Some(_))) {
                    registry::register_fd(fd, user_path, true);
                }
            }
        }
    }
    fd
}

#[no_mangle]
pub unsafe extern "C" fn close(fd: c_int) -> c_int {
    let Some(real_close) = real::close_real() else {
        return -1;
    };

    let opened = registry::take_fd(fd);
    if let Some(entry) = &opened {
        if entry.write_only {
            flush_before_close(fd, entry);
        }
    }

    let ret = real_close(fd);

    if ret == 0 {
        if let Some(entry) = opened {
            if entry.write_only {
                try_publish_after_close(&entry.path);
            }
        }
    }
    ret
}

#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut libc::FILE {
    let Some(real_fopen) = real::fopen_real() else {
        return std::ptr::null_mut();
    };

    let user_path = cstr_to_path(path);
    let mode_str = if mode.is_null() {
        None
    } else {
        CStr::from_ptr(mode).to_str().ok().map(str::to_owned)
    };

    if let (Some(p), Some(m)) = (&user_path, &mode_str) {
        if policy::fopen_is_subscribe_candidate(m) {
            if let Some(_guard) = ReentryGuard::enter() {
                try_subscribe_before_open(p);
            }
        }
    }

    let stream = real_fopen(path, mode);
    if !stream.is_null() {
        if let (Some(p), Some(m)) = (user_path, mode_str) {
            if policy::fopen_is_publish_candidate(&m) {
                if let Some(state) = shared_state() {
                    if let Some(prefix) = producer_prefix(state) {
                        if matches!(prefix.user_path(&p), Ok(Some(_))) {
                            registry::register_file(stream, p, true);
                        }
                    }
                }
            }
        }
    }
    stream
}

#[no_mangle]
pub unsafe extern "C" fn fclose(stream: *mut libc::FILE) -> c_int {
    let Some(real_fclose) = real::fclose_real() else {
        return libc::EOF;
    };

    let opened = registry::take_file(stream);
    if let Some(entry) = &opened {
        if entry.write_only {
            libc::fflush(stream);
            let fd = libc::fileno(stream);
            if fd >= 0 {
                flush_before_close(fd, entry);
            }
        }
    }

    let ret = real_fclose(stream);

    if ret == 0 {
        if let Some(entry) = opened {
            if entry.write_only {
                try_publish_after_close(&entry.path);
            }
        }
    }
    ret
}
