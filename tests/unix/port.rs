use std::collections::BTreeSet;
use std::io::{Read, Write};

use wposix::*;

use super::TempDir;

fn port() -> HostPort {
    HostPort::default()
}

#[test]
fn creat_then_stat_reports_size() {
    let tmp = TempDir::new("creat");
    let path = tmp.join("a.txt");
    let port = port();

    let mut fd = port.creat(&path, 0o644).expect("creat");
    fd.write_all(b"hello").unwrap();
    let meta = port.fstat(fd.as_raw()).expect("fstat");
    assert!(meta.is_file());
    assert_eq!(meta.size, 5);
    fd.close().unwrap();

    let meta = port.stat(&path).expect("stat");
    assert!(meta.is_file());
    assert_eq!(meta.size, 5);
    assert!(meta.nlink >= 1);
}

#[test]
fn missing_file_is_not_found() {
    let tmp = TempDir::new("missing");
    let port = port();
    let missing = tmp.join("nope.txt");
    assert_eq!(port.open(&missing, OpenFlags::READ, 0).unwrap_err(), Error::NotFound);
    assert_eq!(port.stat(&missing).unwrap_err(), Error::NotFound);
    assert_eq!(port.opendir(&missing).unwrap_err(), Error::NotFound);
}

#[test]
fn exclusive_create_refuses_existing() {
    let tmp = TempDir::new("excl");
    let path = tmp.join("once.txt");
    let port = port();
    let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;

    port.open(&path, flags, 0o600).expect("first create");
    assert_eq!(port.open(&path, flags, 0o600).unwrap_err(), Error::AlreadyExists);
}

#[test]
fn open_without_access_is_rejected() {
    let tmp = TempDir::new("noaccess");
    let path = tmp.join("x");
    assert_eq!(
        port().open(&path, OpenFlags::CREATE, 0o600).unwrap_err(),
        Error::InvalidArgument
    );
}

#[test]
fn append_writes_land_at_end() {
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
fn readdir_yields_each_entry_once() {
    let tmp = TempDir::new("readdir");
    let port = port();
    for name in ["a.txt", "b.txt", "caf\u{e9}.txt"] {
        port.creat(&tmp.join(name), 0o644).unwrap();
    }
    port.mkdir(&tmp.join("sub"), 0o755).unwrap();

    let mut dir = port.opendir(tmp.as_str()).expect("opendir");
    let mut seen = BTreeSet::new();
    while let Some(entry) = dir.read().expect("readdir") {
        assert!(seen.insert(entry.name().to_owned()), "duplicate {}", entry.name());
    }
    assert!(dir.read().unwrap().is_none());
    assert!(dir.read().unwrap().is_none());
    dir.close().expect("closedir");

    seen.remove(".");
    seen.remove("..");
    let expected: BTreeSet<String> = ["a.txt", "b.txt", "caf\u{e9}.txt", "sub"]
        .into_iter()
        .map(str::to_owned)
        .collect();
    assert_eq!(seen, expected);
}

#[cfg(target_os = "linux")]
#[test]
fn readdir_skips_names_that_are_not_utf8() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let tmp = TempDir::new("readdir_bytes");
    let raw_name = std::path::Path::new(tmp.as_str()).join(OsStr::from_bytes(b"bad\xff"));
    std::fs::File::create(raw_name).unwrap();
    let port = port();
    port.creat(&tmp.join("good"), 0o644).unwrap();

    let mut dir = port.opendir(tmp.as_str()).unwrap();
    let mut seen = BTreeSet::new();
    while let Some(entry) = dir.read().unwrap() {
        seen.insert(entry.name().to_owned());
    }
    dir.close().unwrap();
    assert_eq!(
        seen,
        BTreeSet::from([".".to_owned(), "..".to_owned(), "good".to_owned()])
    );
}

#[test]
fn dir_stream_iterates_names() {
    let tmp = TempDir::new("iter");
    let port = port();
    port.creat(&tmp.join("only"), 0o644).unwrap();

    let names: Vec<String> = port
        .opendir(tmp.as_str())
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert!(names.iter().any(|n| n == "only"));
}

#[test]
fn opendir_on_a_file_fails() {
    let tmp = TempDir::new("dirfile");
    let path = tmp.join("plain");
    let port = port();
    port.creat(&path, 0o644).unwrap();
    assert!(port.opendir(&path).is_err());
}

#[test]
fn mkdir_creates_and_refuses_existing() {
    let tmp = TempDir::new("mkdir");
    let path = tmp.join("child");
    let port = port();

    port.mkdir(&path, 0o755).expect("mkdir");
    assert!(port.stat(&path).unwrap().is_dir());
    assert_eq!(port.mkdir(&path, 0o755).unwrap_err(), Error::AlreadyExists);
    assert_eq!(
        port.mkdir(&tmp.join("no/such/parent"), 0o755).unwrap_err(),
        Error::NotFound
    );
}

#[test]
fn seeking_a_pipe_is_not_seekable() {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    let read_end = unsafe { Descriptor::from_raw(fds[0]) };
    let write_end = unsafe { Descriptor::from_raw(fds[1]) };

    let port = port();
    assert_eq!(
        port.lseek(read_end.as_raw(), 0, Whence::Current).unwrap_err(),
        Error::NotSeekable
    );
    assert_eq!(port.fstat(write_end.as_raw()).unwrap().file_type(), FileType::Fifo);
}

#[test]
fn lseek_reports_offsets() {
    let tmp = TempDir::new("lseek");
    let path = tmp.join("data");
    let port = port();
    let mut fd = port
        .open(&path, OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE, 0o644)
        .unwrap();
    fd.write_all(b"0123456789").unwrap();

    assert_eq!(port.lseek(fd.as_raw(), 0, Whence::End).unwrap(), 10);
    assert_eq!(port.lseek(fd.as_raw(), 4, Whence::Start).unwrap(), 4);
    let mut buf = [0u8; 3];
    fd.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"456");
    assert_eq!(port.lseek(fd.as_raw(), -1, Whence::Current).unwrap(), 6);
}

#[test]
fn fstat_rejects_closed_descriptor() {
    assert_eq!(port().fstat(-1).unwrap_err(), Error::BadDescriptor);
}

#[test]
fn getcwd_matches_std_and_checks_capacity() {
    let port = port();
    let expected = std::env::current_dir().unwrap();
    let expected = expected.to_str().unwrap();

    assert_eq!(port.getcwd(4096).unwrap(), expected);
    assert_eq!(port.getcwd(expected.len() + 1).unwrap(), expected);
    assert_eq!(port.getcwd(expected.len()).unwrap_err(), Error::RangeExceeded);
    assert_eq!(port.getcwd(1).unwrap_err(), Error::RangeExceeded);
}

#[test]
fn fopen_round_trip() {
    let tmp = TempDir::new("fopen");
    let path = tmp.join("stream.bin");
    let port = port();

    let mut out = port.fopen(&path, "w").expect("fopen w");
    out.write_all(b"line\r\n").unwrap();
    out.flush().unwrap();
    out.close().unwrap();

    let mut input = port.fopen(&path, "r").expect("fopen r");
    let mut text = Vec::new();
    input.read_to_end(&mut text).unwrap();
    assert_eq!(text, b"line\r\n");

    assert_eq!(port.fopen(&path, "q").unwrap_err(), Error::InvalidArgument);
    assert_eq!(port.fopen(&path, "wx").unwrap_err(), Error::AlreadyExists);
    assert_eq!(
        port.fopen(&tmp.join("absent"), "r").unwrap_err(),
        Error::NotFound
    );
}

#[test]
fn stream_read_errors_are_not_end_of_file() {
    let tmp = TempDir::new("fread_err");
    let path = tmp.join("write_only");
    let port = port();

    let mut out = port.fopen(&path, "w").expect("fopen w");
    let mut buf = [0u8; 8];
    let err = out.read(&mut buf).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    let mut all = Vec::new();
    assert!(out.read_to_end(&mut all).is_err());
    assert!(all.is_empty());

    out.write_all(b"still usable").unwrap();
    out.close().unwrap();

    let mut input = port.fopen(&path, "r").unwrap();
    assert_eq!(input.read(&mut []).unwrap(), 0);
    let mut back = Vec::new();
    input.read_to_end(&mut back).unwrap();
    assert_eq!(back, b"still usable");
    assert_eq!(input.read(&mut buf).unwrap(), 0);
}

#[test]
fn getenv_reads_injected_snapshot_once() {
    let env = StaticEnv::from_pairs([
        ("WPOSIX_A", "1"),
        ("WPOSIX_B", "two=2"),
        ("=D:", "D:\\data"),
    ]);
    let port = HostPort::with_env_source(PortConfig::default(), Box::new(env));

    assert_eq!(port.getenv("WPOSIX_A"), Some("1"));
    assert_eq!(port.getenv("WPOSIX_B"), Some("two=2"));
    assert_eq!(port.getenv("WPOSIX"), None);
    assert_eq!(port.getenv(""), None);
    assert_eq!(port.getenv("WPOSIX_A=1"), None);
    assert_eq!(port.getenv("=D:"), Some("D:\\data"));
    assert_eq!(port.getenv("WPOSIX_B=two"), Some("2"));

    let first = port.getenv("WPOSIX_A").unwrap().as_ptr();
    let second = port.getenv("WPOSIX_A").unwrap().as_ptr();
    assert_eq!(first, second);
}
