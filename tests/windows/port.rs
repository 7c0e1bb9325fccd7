use std::collections::BTreeSet;
use std::io::{Read, Write};

use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::System::Pipes::CreatePipe;
use windows_sys::Win32::System::Threading::{GetCurrentProcess, GetProcessHandleCount};

use wposix::windows_native::WindowsPort;
use wposix::*;

use super::TempDir;

fn port() -> WindowsPort {
    WindowsPort::default()
}

fn handle_count() -> u32 {
    let mut count = 0u32;
    assert_ne!(unsafe { GetProcessHandleCount(GetCurrentProcess(), &mut count) }, 0);
    count
}

#[test]
fn files_and_directories_get_fixed_permissions() {
    let tmp = TempDir::new("modes");
    let path = tmp.join("a.txt");
    let port = port();

    let mut fd = port.creat(&path, 0o600).expect("creat");
    let fresh = port.fstat(fd.as_raw()).unwrap();
    assert_eq!(fresh.mode, S_IFREG | 0o644);
    assert_eq!(fresh.size, 0);
    fd.write_all(b"hello").unwrap();
    assert_eq!(port.fstat(fd.as_raw()).unwrap().size, 5);
    drop(fd);

    let file = port.stat(&path).expect("stat file");
    assert_eq!(file.mode, S_IFREG | 0o644);
    assert_eq!(file.size, 5);
    assert_eq!(file.nlink, 1);

    let dir = port.stat(tmp.as_str()).expect("stat dir");
    assert_eq!(dir.mode, S_IFDIR | 0o755);
    assert_eq!(dir.size, 0);
}

#[test]
fn stat_and_fstat_agree_on_identity() {
    let tmp = TempDir::new("ident");
    let path = tmp.join("id.bin");
    let port = port();
    let fd = port.creat(&path, 0o644).unwrap();

    let by_fd = port.fstat(fd.as_raw()).unwrap();
    let by_path = port.stat(&path).unwrap();
    assert_eq!(by_fd.dev, by_path.dev);
    assert_eq!(by_fd.ino, by_path.ino);
    assert_eq!(by_fd.uid, 0);
    assert_eq!(by_fd.rdev, 0);

    let other = tmp.join("other.bin");
    port.creat(&other, 0o644).unwrap();
    assert_ne!(port.stat(&other).unwrap().ino, by_path.ino);
}

#[test]
fn legacy_file_ids_are_stable() {
    let tmp = TempDir::new("legacy");
    let path = tmp.join("legacy.bin");
    let legacy = WindowsPort::new(PortConfig::with_flags(WPOSIX_FLAG_LEGACY_FILE_IDS));
    legacy.creat(&path, 0o644).unwrap();

    let first = legacy.stat(&path).unwrap();
    let second = legacy.stat(&path).unwrap();
    assert_eq!(first.ino, second.ino);
    assert_eq!(first.dev, second.dev);
    assert!(first.is_file());
}

#[test]
fn timestamps_are_unix_seconds() {
    let tmp = TempDir::new("times");
    let path = tmp.join("t");
    let port = port();
    port.creat(&path, 0o644).unwrap();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    let meta = port.stat(&path).unwrap();
    assert!((meta.mtime - now).abs() < 120, "mtime {} now {now}", meta.mtime);
}

#[test]
fn errors_follow_posix_names() {
    let tmp = TempDir::new("errors");
    let port = port();
    let missing = tmp.join("missing.txt");
    assert_eq!(port.open(&missing, OpenFlags::READ, 0).unwrap_err(), Error::NotFound);
    assert_eq!(port.stat(&missing).unwrap_err(), Error::NotFound);

    let path = tmp.join("x.txt");
    let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
    port.open(&path, flags, 0).unwrap();
    assert_eq!(port.open(&path, flags, 0).unwrap_err(), Error::AlreadyExists);
    assert_eq!(port.fstat(-1).unwrap_err(), Error::BadDescriptor);
}

#[test]
fn closed_and_out_of_range_descriptors_are_bad() {
    let tmp = TempDir::new("closed_fd");
    let port = port();
    let fd = port.creat(&tmp.join("gone"), 0o644).unwrap();
    // A high slot that was open once; lower ones may be reused by other tests.
    let closed = 2000;
    assert_eq!(unsafe { libc::dup2(fd.as_raw(), closed) }, 0);
    assert_eq!(unsafe { libc::close(closed) }, 0);
    drop(fd);

    for bad in [closed, 1 << 20] {
        assert_eq!(port.fstat(bad).unwrap_err(), Error::BadDescriptor, "fstat({bad})");
        assert_eq!(
            port.lseek(bad, 0, Whence::Current).unwrap_err(),
            Error::BadDescriptor,
            "lseek({bad})"
        );
    }

    let mut st = Stat::default();
    errno::set(0);
    assert_eq!(wposix_fstat(closed, &mut st), -1);
    assert_eq!(errno::get(), libc::EBADF);
    errno::set(0);
    assert_eq!(wposix_lseek(closed, 0, libc::SEEK_SET), -1);
    assert_eq!(errno::get(), libc::EBADF);
}

#[test]
fn temporary_files_vanish_on_close() {
    let tmp = TempDir::new("temporary");
    let path = tmp.join("scratch");
    let port = port();
    let flags = OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TEMPORARY;
    let fd = port.open(&path, flags, 0).unwrap();
    assert!(port.stat(&path).is_ok());
    fd.close().unwrap();
    assert_eq!(port.stat(&path).unwrap_err(), Error::NotFound);
}

#[test]
fn append_lands_at_end() {
    let tmp = TempDir::new("append");
    let path = tmp.join("log.txt");
    let port = port();
    let mut fd = port.creat(&path, 0o644).unwrap();
    fd.write_all(b"one").unwrap();
    drop(fd);

    let mut fd = port.open(&path, OpenFlags::WRITE | OpenFlags::APPEND, 0).unwrap();
    port.lseek(fd.as_raw(), 0, Whence::Start).unwrap();
    fd.write_all(b"two").unwrap();
    drop(fd);
    assert_eq!(std::fs::read(&path).unwrap(), b"onetwo");
}

#[test]
fn readdir_lists_unicode_names_once() {
    let tmp = TempDir::new("readdir");
    let port = port();
    let names = ["plain.txt", "caf\u{e9}.txt", "\u{65e5}\u{672c}.lua"];
    for name in names {
        port.creat(&tmp.join(name), 0o644).unwrap();
    }
    port.mkdir(&tmp.join("sub"), 0o755).unwrap();

    let mut dir = port.opendir(tmp.as_str()).unwrap();
    let mut seen = BTreeSet::new();
    while let Some(entry) = dir.read().unwrap() {
        assert_eq!(entry.d_ino, 0);
        assert!(seen.insert(entry.name().to_owned()));
    }
    assert!(dir.read().unwrap().is_none());
    dir.close().unwrap();

    assert!(seen.contains(".") && seen.contains(".."));
    for name in names.iter().chain(["sub"].iter()) {
        assert!(seen.contains(*name), "missing {name}");
    }
    assert_eq!(seen.len(), names.len() + 3);
}

#[test]
fn empty_pattern_directory_and_file_errors() {
    let tmp = TempDir::new("opendir");
    let port = port();
    let file = tmp.join("f");
    port.creat(&file, 0o644).unwrap();
    assert_eq!(port.opendir(&file).unwrap_err(), Error::InvalidArgument);
    assert_eq!(port.opendir(&tmp.join("nope")).unwrap_err(), Error::NotFound);
}

#[test]
fn directory_streams_do_not_leak_handles() {
    let tmp = TempDir::new("handles");
    let port = port();
    port.creat(&tmp.join("a"), 0o644).unwrap();

    let warm = port.opendir(tmp.as_str()).unwrap();
    warm.close().unwrap();

    // Concurrent tests open handles too; a leak grows by one per stream.
    let before = handle_count();
    for _ in 0..64 {
        let mut dir = port.opendir(tmp.as_str()).unwrap();
        while dir.read().unwrap().is_some() {}
        dir.close().unwrap();
    }
    for _ in 0..64 {
        let dir = port.opendir(tmp.as_str()).unwrap();
        drop(dir);
    }
    assert!(handle_count() < before + 16, "before {before}, after {}", handle_count());
}

#[test]
fn pipes_are_fifos_and_not_seekable() {
    let mut read: HANDLE = 0;
    let mut write: HANDLE = 0;
    assert_ne!(
        unsafe { CreatePipe(&mut read, &mut write, std::ptr::null(), 0) },
        0
    );
    let fd = unsafe { libc::open_osfhandle(read as libc::intptr_t, 0) };
    assert!(fd >= 0);
    let fd = unsafe { Descriptor::from_raw(fd) };

    let port = port();
    assert_eq!(port.lseek(fd.as_raw(), 0, Whence::Current).unwrap_err(), Error::NotSeekable);
    let meta = port.fstat(fd.as_raw()).unwrap();
    assert_eq!(meta.mode, S_IFIFO | 0o644);
    assert_eq!(meta.size, 0);

    unsafe { CloseHandle(write) };
}

#[test]
fn mkdir_then_stat() {
    let tmp = TempDir::new("mkdir");
    let port = port();
    let path = tmp.join("child");
    port.mkdir(&path, 0).unwrap();
    assert!(port.stat(&path).unwrap().is_dir());
    assert_eq!(port.mkdir(&path, 0).unwrap_err(), Error::AlreadyExists);
}

#[test]
fn getcwd_capacity_rules() {
    let port = port();
    let cwd = port.getcwd(4096).unwrap();
    let expected = std::env::current_dir().unwrap();
    assert_eq!(cwd, expected.to_str().unwrap());
    assert_eq!(port.getcwd(cwd.len()).unwrap_err(), Error::RangeExceeded);
    assert_eq!(port.getcwd(cwd.len() + 1).unwrap(), cwd);
    assert_eq!(port.getcwd(usize::MAX).unwrap_err(), Error::OutOfMemory);
}

#[test]
fn fopen_is_binary() {
    let tmp = TempDir::new("fopen");
    let path = tmp.join("s.txt");
    let port = port();
    let mut out = port.fopen(&path, "w").unwrap();
    out.write_all(b"a\nb\n").unwrap();
    out.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"a\nb\n");

    let mut input = port.fopen(&path, "r").unwrap();
    let mut back = Vec::new();
    input.read_to_end(&mut back).unwrap();
    assert_eq!(back, b"a\nb\n");
}

#[test]
fn getenv_folds_case() {
    let port = port();
    let upper = port.getenv("PATH");
    assert!(upper.is_some());
    assert_eq!(port.getenv("path"), upper);
    assert_eq!(port.getenv("Path"), upper);

    let exact = WindowsPort::with_env_source(
        PortConfig::with_flags(WPOSIX_FLAG_EXACT_ENV_CASE),
        Box::new(StaticEnv::from_pairs([("Path", "x")])),
    );
    assert_eq!(exact.getenv("Path"), Some("x"));
    assert_eq!(exact.getenv("PATH"), None);
}
