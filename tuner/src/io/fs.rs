//! Dry-run-aware filesystem primitives.
//!
//! Every mutating primitive logs its shell equivalent before touching
//! anything and becomes a no-op under dry-run. Primitives that only observe
//! state (`which`, `files_differ`, `open_read`) always run for real, so a
//! simulated run can still inspect existing configuration and sources.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use nix::unistd::{AccessFlags, access};
use tracing::debug;

use crate::core::types::RunMode;

const DIFF_CHUNK_BYTES: usize = 4096;

/// Filesystem operations bound to one run mode.
#[derive(Debug, Clone, Copy)]
pub struct FileOps {
    mode: RunMode,
}

impl FileOps {
    pub fn new(mode: RunMode) -> Self {
        Self { mode }
    }

    fn dry_run(self) -> bool {
        self.mode.is_dry_run()
    }

    /// `mkdir -p`: create with parents; an existing directory is success.
    pub fn create_dir_all(self, path: &Path) -> Result<()> {
        debug!("mkdir -p {}", path.display());
        if self.dry_run() || path.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(path).with_context(|| format!("mkdir {}", path.display()))
    }

    /// `touch`: create if absent and refresh the modification time.
    pub fn touch(self, path: &Path) -> Result<()> {
        debug!("touch {}", path.display());
        if self.dry_run() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("touch {}", path.display()))?;
        file.set_modified(SystemTime::now())
            .with_context(|| format!("touch {}", path.display()))
    }

    /// `chmod`.
    pub fn chmod(self, path: &Path, mode: u32) -> Result<()> {
        debug!("chmod {:o} {}", mode, path.display());
        if self.dry_run() {
            return Ok(());
        }
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {mode:o} {}", path.display()))
    }

    /// `rm -f`: remove a file; an absent path is success.
    pub fn remove_file(self, path: &Path) -> Result<()> {
        debug!("rm -f {}", path.display());
        if self.dry_run() {
            return Ok(());
        }
        match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                Err(err).with_context(|| format!("rm {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    /// `rm -rf`: recursive removal; an absent path is success. A symlink is
    /// removed as a link, never followed into its target.
    pub fn remove_tree(self, path: &Path) -> Result<()> {
        debug!("rm -rf {}", path.display());
        if self.dry_run() {
            return Ok(());
        }
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
        };
        let removed = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        removed.with_context(|| format!("rm -rf {}", path.display()))
    }

    /// `ln`: create a hard link.
    pub fn hard_link(self, src: &Path, dst: &Path) -> Result<()> {
        debug!("ln {} {}", src.display(), dst.display());
        if self.dry_run() {
            return Ok(());
        }
        fs::hard_link(src, dst)
            .with_context(|| format!("ln {} {}", src.display(), dst.display()))
    }

    /// `cp`: byte copy of one file, permission bits included.
    pub fn copy_file(self, src: &Path, dst: &Path) -> Result<()> {
        debug!("cp {} {}", src.display(), dst.display());
        if self.dry_run() {
            return Ok(());
        }
        fs::copy(src, dst)
            .map(|_| ())
            .with_context(|| format!("cp {} {}", src.display(), dst.display()))
    }

    /// `cp -r`: recursive copy of a directory tree. Symlinks are recreated
    /// as symlinks. The destination must not exist yet.
    pub fn copy_tree(self, src: &Path, dst: &Path) -> Result<()> {
        debug!("cp -r {} {}", src.display(), dst.display());
        if self.dry_run() {
            return Ok(());
        }
        copy_tree_entries(src, dst)
            .with_context(|| format!("cp -r {} {}", src.display(), dst.display()))
    }

    /// Replace `dst` with a hard link to `src`, falling back to a byte copy
    /// when the link would cross filesystems. Any other link failure
    /// propagates.
    pub fn link_or_copy(self, src: &Path, dst: &Path) -> Result<()> {
        debug!("ln -f {} {}", src.display(), dst.display());
        if self.dry_run() {
            return Ok(());
        }
        match fs::remove_file(dst) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                return Err(err).with_context(|| format!("rm {}", dst.display()));
            }
            _ => {}
        }
        link_else_copy(src, dst, |src, dst| fs::hard_link(src, dst))
    }

    /// `cd`: change the process working directory. Runs for real even under
    /// dry-run, because later path resolution depends on it.
    pub fn chdir(self, path: &Path) -> Result<()> {
        debug!("cd {}", path.display());
        std::env::set_current_dir(path).with_context(|| format!("cd {}", path.display()))
    }

    /// `which`: resolve an executable name against `PATH`.
    ///
    /// A name containing a directory separator skips the search and is
    /// checked directly, coming back in absolute form. Otherwise each
    /// non-empty `PATH` entry is tried in order and the first executable
    /// match wins, canonicalized.
    pub fn which(self, name: &str) -> Option<PathBuf> {
        debug!("which {}", name);
        which_in(name, std::env::var_os("PATH"))
    }

    /// `cmp`-style bytewise comparison; true when the contents differ.
    pub fn files_differ(self, a: &Path, b: &Path) -> Result<bool> {
        debug!("diff {} {}", a.display(), b.display());
        let mut file_a = File::open(a).with_context(|| format!("open {}", a.display()))?;
        let mut file_b = File::open(b).with_context(|| format!("open {}", b.display()))?;
        let mut buf_a = [0u8; DIFF_CHUNK_BYTES];
        let mut buf_b = [0u8; DIFF_CHUNK_BYTES];
        loop {
            let len_a = read_full(&mut file_a, &mut buf_a)
                .with_context(|| format!("read {}", a.display()))?;
            let len_b = read_full(&mut file_b, &mut buf_b)
                .with_context(|| format!("read {}", b.display()))?;
            if buf_a[..len_a] != buf_b[..len_b] {
                return Ok(true);
            }
            if len_a == 0 {
                return Ok(false);
            }
        }
    }

    /// Open for reading. Never intercepted; dry-run still reads real files.
    pub fn open_read(self, path: &Path) -> Result<File> {
        File::open(path).with_context(|| format!("open {}", path.display()))
    }

    /// Open for writing (create or truncate). Under dry-run the returned
    /// handle buffers in memory and the path is never touched.
    pub fn open_write(self, path: &Path) -> Result<WriteHandle> {
        if self.dry_run() {
            debug!("# write {}", path.display());
            return Ok(WriteHandle::Simulated(Vec::new()));
        }
        let file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(WriteHandle::Real(file))
    }

    /// Open for appending (creating if needed); intercepted under dry-run
    /// like [`Self::open_write`].
    pub fn open_append(self, path: &Path) -> Result<WriteHandle> {
        if self.dry_run() {
            debug!("# append {}", path.display());
            return Ok(WriteHandle::Simulated(Vec::new()));
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open {} for append", path.display()))?;
        Ok(WriteHandle::Real(file))
    }
}

/// A handle produced by an open-for-write request.
///
/// Under dry-run the simulated variant buffers writes in memory so callers
/// proceed as if the file existed; reads from it report end-of-stream.
#[derive(Debug)]
pub enum WriteHandle {
    Real(File),
    Simulated(Vec<u8>),
}

impl WriteHandle {
    pub fn is_simulated(&self) -> bool {
        matches!(self, WriteHandle::Simulated(_))
    }

    /// Bytes accumulated by a simulated handle; `None` for real files.
    pub fn simulated_bytes(&self) -> Option<&[u8]> {
        match self {
            WriteHandle::Simulated(buf) => Some(buf),
            WriteHandle::Real(_) => None,
        }
    }
}

impl Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            WriteHandle::Real(file) => file.write(buf),
            WriteHandle::Simulated(sink) => {
                sink.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WriteHandle::Real(file) => file.flush(),
            WriteHandle::Simulated(_) => Ok(()),
        }
    }
}

impl Read for WriteHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            WriteHandle::Real(file) => file.read(buf),
            WriteHandle::Simulated(_) => Ok(0),
        }
    }
}

fn which_in(name: &str, search_path: Option<OsString>) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.parent().is_some_and(|p| !p.as_os_str().is_empty()) {
        if is_executable(direct) {
            return std::path::absolute(direct).ok();
        }
        return None;
    }
    let search_path = search_path?;
    for dir in std::env::split_paths(&search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let candidate = dir.join(name);
        if is_executable(&candidate)
            && let Ok(resolved) = fs::canonicalize(&candidate)
        {
            return Some(resolved);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

fn crosses_devices(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EXDEV)
}

/// Attempt `link(src, dst)`; a cross-device failure falls back to a byte
/// copy, any other failure propagates. The link operation is injectable so
/// the fallback is exercisable on a single filesystem.
fn link_else_copy<F>(src: &Path, dst: &Path, link: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> io::Result<()>,
{
    match link(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if crosses_devices(&err) => {
            debug!("link crosses filesystems, copying instead");
            fs::copy(src, dst)
                .map(|_| ())
                .with_context(|| format!("cp {} {}", src.display(), dst.display()))
        }
        Err(err) => Err(err).with_context(|| format!("ln {} {}", src.display(), dst.display())),
    }
}

/// Read until `buf` is full or the file ends; returns bytes filled.
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

fn copy_tree_entries(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        let kind = entry.file_type()?;
        if kind.is_dir() {
            copy_tree_entries(&entry.path(), &target)?;
        } else if kind.is_symlink() {
            let link = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link, &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::MetadataExt;

    use tempfile::tempdir;

    use super::*;

    fn real() -> FileOps {
        FileOps::new(RunMode::Real)
    }

    fn dry() -> FileOps {
        FileOps::new(RunMode::DryRun)
    }

    #[test]
    fn create_dir_all_is_idempotent() {
        let dir = tempdir().expect("tempdir");
        let nested = dir.path().join("a/b/c");
        real().create_dir_all(&nested).expect("first");
        real().create_dir_all(&nested).expect("second");
        assert!(nested.is_dir());
    }

    #[test]
    fn touch_creates_and_refreshes_mtime() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("stamp");
        real().touch(&path).expect("create");
        assert!(path.is_file());

        let old = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        File::options()
            .write(true)
            .open(&path)
            .expect("open")
            .set_modified(old)
            .expect("age the file");
        real().touch(&path).expect("refresh");
        let mtime = fs::metadata(&path).expect("stat").modified().expect("mtime");
        assert!(mtime > old);
    }

    #[test]
    fn remove_file_tolerates_absence() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("gone");
        real().remove_file(&path).expect("absent is ok");
        real().touch(&path).expect("touch");
        real().remove_file(&path).expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn remove_tree_removes_nested_content() {
        let dir = tempdir().expect("tempdir");
        let root = dir.path().join("tree");
        fs::create_dir_all(root.join("sub")).expect("mkdir");
        fs::write(root.join("sub/file"), b"x").expect("write");
        real().remove_tree(&root).expect("remove");
        assert!(!root.exists());
        real().remove_tree(&root).expect("absent is ok");
    }

    #[test]
    fn remove_tree_unlinks_symlink_without_following() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("target");
        fs::create_dir(&target).expect("mkdir");
        fs::write(target.join("keep"), b"x").expect("write");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).expect("symlink");

        real().remove_tree(&link).expect("remove link");
        assert!(!link.symlink_metadata().is_ok_and(|m| m.is_symlink()));
        assert!(target.join("keep").exists(), "target must survive");
    }

    #[test]
    fn chmod_applies_mode_bits() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("script");
        fs::write(&path, b"#!/bin/sh\n").expect("write");
        real().chmod(&path, 0o755).expect("chmod");
        let mode = fs::metadata(&path).expect("stat").mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn hard_link_shares_the_inode() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"data").expect("write");
        real().hard_link(&src, &dst).expect("link");
        assert_eq!(
            fs::metadata(&src).expect("stat src").ino(),
            fs::metadata(&dst).expect("stat dst").ino()
        );
    }

    #[test]
    fn copy_file_copies_bytes() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"payload").expect("write");
        real().copy_file(&src, &dst).expect("copy");
        assert_eq!(fs::read(&dst).expect("read"), b"payload");
    }

    #[test]
    fn copy_tree_preserves_layout_and_symlinks() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("inner")).expect("mkdir");
        fs::write(src.join("inner/file"), b"deep").expect("write");
        std::os::unix::fs::symlink("inner/file", src.join("alias")).expect("symlink");

        let dst = dir.path().join("dst");
        real().copy_tree(&src, &dst).expect("copy");
        assert_eq!(fs::read(dst.join("inner/file")).expect("read"), b"deep");
        assert!(dst.join("alias").symlink_metadata().expect("lstat").is_symlink());
    }

    #[test]
    fn copy_tree_refuses_existing_destination() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir(&src).expect("mkdir src");
        fs::create_dir(&dst).expect("mkdir dst");
        assert!(real().copy_tree(&src, &dst).is_err());
    }

    #[test]
    fn link_or_copy_links_on_same_filesystem() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"data").expect("write");
        fs::write(&dst, b"old").expect("write old");

        real().link_or_copy(&src, &dst).expect("link");
        assert_eq!(
            fs::metadata(&src).expect("stat").ino(),
            fs::metadata(&dst).expect("stat").ino()
        );
        assert_eq!(fs::read(&dst).expect("read"), b"data");
    }

    #[test]
    fn link_or_copy_requires_source() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("missing");
        let dst = dir.path().join("dst");
        assert!(real().link_or_copy(&src, &dst).is_err());
    }

    #[test]
    fn cross_device_errors_are_recognized() {
        assert!(crosses_devices(&io::Error::from_raw_os_error(libc::EXDEV)));
        assert!(!crosses_devices(&io::Error::from_raw_os_error(libc::ENOENT)));
    }

    #[test]
    fn link_or_copy_copies_when_the_link_crosses_devices() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"payload").expect("write");

        link_else_copy(&src, &dst, |_, _| {
            Err(io::Error::from_raw_os_error(libc::EXDEV))
        })
        .expect("fallback");
        assert_eq!(fs::read(&dst).expect("read"), b"payload");
        assert_ne!(
            fs::metadata(&src).expect("stat").ino(),
            fs::metadata(&dst).expect("stat").ino(),
            "fallback is a copy, not a link"
        );
    }

    #[test]
    fn link_or_copy_propagates_other_link_failures() {
        let dir = tempdir().expect("tempdir");
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"payload").expect("write");

        let result = link_else_copy(&src, &dst, |_, _| {
            Err(io::Error::from_raw_os_error(libc::EPERM))
        });
        assert!(result.is_err());
        assert!(!dst.exists(), "no copy on a non-device failure");
    }

    #[test]
    fn files_differ_spots_content_and_length_changes() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a");
        let b = dir.path().join("b");

        fs::write(&a, b"same bytes").expect("write");
        fs::write(&b, b"same bytes").expect("write");
        assert!(!real().files_differ(&a, &a).expect("compare"));
        assert!(!real().files_differ(&a, &b).expect("compare"));

        fs::write(&b, b"same byteZ").expect("write");
        assert!(real().files_differ(&a, &b).expect("compare"));

        fs::write(&b, b"same bytes and more").expect("write");
        assert!(real().files_differ(&a, &b).expect("compare"));
        assert!(real().files_differ(&b, &a).expect("compare"));
    }

    #[test]
    fn files_differ_handles_multi_chunk_files() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let mut bytes = vec![0u8; DIFF_CHUNK_BYTES * 3 + 17];
        fs::write(&a, &bytes).expect("write");
        bytes[DIFF_CHUNK_BYTES * 2 + 5] = 1;
        fs::write(&b, &bytes).expect("write");
        assert!(real().files_differ(&a, &b).expect("compare"));
    }

    #[test]
    fn files_differ_requires_both_files() {
        let dir = tempdir().expect("tempdir");
        let a = dir.path().join("a");
        fs::write(&a, b"x").expect("write");
        assert!(real().files_differ(&a, &dir.path().join("missing")).is_err());
    }

    #[test]
    fn which_resolves_along_search_path() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir(&first).expect("mkdir");
        fs::create_dir(&second).expect("mkdir");

        // Same name in both; only the second entry is executable.
        fs::write(first.join("tool"), b"").expect("write");
        fs::write(second.join("tool"), b"#!/bin/sh\n").expect("write");
        fs::set_permissions(second.join("tool"), fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let path = std::env::join_paths([&first, &second]).expect("join paths");
        let found = which_in("tool", Some(path)).expect("found");
        assert_eq!(found, second.join("tool").canonicalize().expect("canonical"));
    }

    #[test]
    fn which_skips_empty_path_entries() {
        let dir = tempdir().expect("tempdir");
        let bin = dir.path().join("bin");
        fs::create_dir(&bin).expect("mkdir");
        fs::write(bin.join("tool"), b"#!/bin/sh\n").expect("write");
        fs::set_permissions(bin.join("tool"), fs::Permissions::from_mode(0o755))
            .expect("chmod");

        let mut path = OsString::from(":");
        path.push(&bin);
        assert!(which_in("tool", Some(path)).is_some());
    }

    #[test]
    fn which_without_search_path_finds_nothing() {
        assert_eq!(which_in("tool", None), None);
        assert_eq!(which_in("tool", Some(OsString::new())), None);
    }

    #[test]
    fn which_checks_direct_paths_without_searching() {
        let dir = tempdir().expect("tempdir");
        let tool = dir.path().join("tool");
        fs::write(&tool, b"#!/bin/sh\n").expect("write");

        let name = tool.to_str().expect("utf8 path");
        assert_eq!(which_in(name, None), None, "not executable yet");

        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).expect("chmod");
        let found = which_in(name, None).expect("found");
        assert!(found.is_absolute());
        assert_eq!(found, std::path::absolute(&tool).expect("absolute"));
    }

    #[test]
    fn dry_run_skips_every_mutation() {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();
        fs::write(base.join("src"), b"data").expect("write");

        dry().create_dir_all(&base.join("made")).expect("mkdir");
        dry().touch(&base.join("stamp")).expect("touch");
        dry().copy_file(&base.join("src"), &base.join("copy")).expect("cp");
        dry().copy_tree(&base.join("src"), &base.join("tree")).expect("cp -r");
        dry().hard_link(&base.join("src"), &base.join("hard")).expect("ln");
        dry().link_or_copy(&base.join("src"), &base.join("either")).expect("ln -f");
        dry().remove_file(&base.join("src")).expect("rm");
        dry().remove_tree(base).expect("rm -rf");
        dry().chmod(&base.join("src"), 0o600).expect("chmod");

        assert!(base.join("src").exists(), "dry-run must not remove");
        assert!(!base.join("made").exists());
        assert!(!base.join("stamp").exists());
        assert!(!base.join("copy").exists());
        assert!(!base.join("tree").exists());
        assert!(!base.join("hard").exists());
        assert!(!base.join("either").exists());
    }

    #[test]
    fn dry_run_write_is_buffered_in_memory() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out");
        let mut handle = dry().open_write(&path).expect("open");
        assert!(handle.is_simulated());
        handle.write_all(b"simulated").expect("write");
        handle.flush().expect("flush");
        assert_eq!(handle.simulated_bytes(), Some(b"simulated".as_slice()));
        assert!(!path.exists());

        let mut buf = [0u8; 8];
        assert_eq!(handle.read(&mut buf).expect("read"), 0);
    }

    #[test]
    fn dry_run_read_uses_the_real_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("cfg");
        fs::write(&path, b"contents").expect("write");
        let mut contents = String::new();
        dry()
            .open_read(&path)
            .expect("open")
            .read_to_string(&mut contents)
            .expect("read");
        assert_eq!(contents, "contents");
    }

    #[test]
    fn real_write_handles_hit_disk() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out");
        let mut handle = real().open_write(&path).expect("open");
        assert!(!handle.is_simulated());
        handle.write_all(b"persisted").expect("write");
        drop(handle);
        assert_eq!(fs::read(&path).expect("read"), b"persisted");

        let mut appender = real().open_append(&path).expect("open append");
        appender.write_all(b" more").expect("append");
        drop(appender);
        assert_eq!(fs::read(&path).expect("read"), b"persisted more");
    }
}
