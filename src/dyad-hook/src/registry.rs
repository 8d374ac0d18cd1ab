//! Tracks which open descriptors/streams are publish candidates, since
//! `close`/`fclose` only receive a descriptor, not a path (spec §4.5 step 2:
//! "the descriptor maps to a real path and the file was opened write-only").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Clone)]
pub struct OpenedFile {
    pub path: PathBuf,
    pub write_only: bool,
}

static FD_TABLE: Mutex<Option<HashMap<i32, OpenedFile>>> = Mutex::new(None);
static FILE_TABLE: Mutex<Option<HashMap<usize, OpenedFile>>> = Mutex::new(None);

fn with_fd_table<R>(f: impl FnOnce(&mut HashMap<i32, OpenedFile>) -> R) -> R {
    let mut guard = FD_TABLE.lock().unwrap();
    f(guard.get_or_insert_with(HashMap::new))
}

fn with_file_table<R>(f: impl FnOnce(&mut HashMap<usize, OpenedFile>) -> R) -> R {
    let mut guard = FILE_TABLE.lock().unwrap();
    f(guard.get_or_insert_with(HashMap::new))
}

pub fn register_fd(fd: i32, path: PathBuf, write_only: bool) {
    with_fd_table(|t| t.insert(fd, OpenedFile { path, write_only }));
}

pub fn take_fd(fd: i32) -> Option<OpenedFile> {
    with_fd_table(|t| t.remove(&fd))
}

pub fn register_file(stream: *mut libc::FILE, path: PathBuf, write_only: bool) {
    with_file_table(|t| t.insert(stream as usize, OpenedFile { path, write_only }));
}

pub fn take_file(stream: *mut libc::FILE) -> Option<OpenedFile> {
    with_file_table(|t| t.remove(&(stream as usize)))
}
