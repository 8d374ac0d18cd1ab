//! Next-symbol resolution (spec §4.5 step 1, §9 "Dynamic symbol chaining").
//! Each real entry point is resolved once, lazily, from `RTLD_NEXT` and
//! cached; `libc::dlsym(RTLD_NEXT, ...)` is the same call the teacher's
//! profiler symbolicator uses to find a symbol's start address.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::sync::OnceLock;

use libc::{dlsym, FILE, RTLD_NEXT};

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, libc::mode_t) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type CloseFn = unsafe extern "C" fn(c_int) -> c_int;
type FcloseFn = unsafe extern "C" fn(*mut FILE) -> c_int;

static OPEN_REAL: OnceLock<Option<OpenFn>> = OnceLock::new();
static FOPEN_REAL: OnceLock<Option<FopenFn>> = OnceLock::new();
static CLOSE_REAL: OnceLock<Option<CloseFn>> = OnceLock::new();
static FCLOSE_REAL: OnceLock<Option<FcloseFn>> = OnceLock::new();

unsafe fn resolve(name: &CStr) -> *mut c_void {
    dlsym(RTLD_NEXT, name.as_ptr())
}

macro_rules! real_symbol {
    ($name:literal, $cell:expr, $ty:ty) => {{
        *$cell.get_or_init(|| {
            let sym = unsafe { resolve(CStr::from_bytes_with_nul($name).unwrap()) };
            if sym.is_null() {
                tracing::error!("dyad: failed to resolve real symbol {:?}", $name);
                None
            } else {
                Some(unsafe { std::mem::transmute::<*mut c_void, $ty>(sym) })
            }
        })
    }};
}

pub fn open_real() -> Option<OpenFn> {
    real_symbol!(b"open\0", OPEN_REAL, OpenFn)
}

pub fn fopen_real() -> Option<FopenFn> {
    real_symbol!(b"fopen\0", FOPEN_REAL, FopenFn)
}

pub fn close_real() -> Option<CloseFn> {
    real_symbol!(b"close\0", CLOSE_REAL, CloseFn)
}

pub fn fclose_real() -> Option<FcloseFn> {
    real_symbol!(b"fclose\0", FCLOSE_REAL, FcloseFn)
}
