// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The thin slice of OS-specific init duties: console acquisition, early
//! mounts, Ctrl-Alt-Delete routing, and the final reboot/power-off.
//! Everything here is a no-op or an ENOSYS on platforms without it.

use std::os::fd::AsRawFd;

/// Point fd 0-2 at `/dev/console` and make it the controlling terminal.
pub fn own_console() {
    let Ok(tty) = std::fs::OpenOptions::new().read(true).write(true).open("/dev/console")
    else {
        return;
    };
    let fd = tty.as_raw_fd();
    let _ = nix::unistd::dup2(fd, 0);
    let _ = nix::unistd::dup2(fd, 1);
    let _ = nix::unistd::dup2(fd, 2);
    drop(tty);
    unsafe {
        libc::ioctl(0, libc::TIOCSCTTY as _, 1);
    }
}

/// Mount `/dev` and `/run` when booting on a bare kernel.
#[cfg(target_os = "linux")]
pub fn init_mounts() {
    use nix::mount::{mount, MsFlags};
    use std::path::Path;

    if !Path::new("/dev/null").exists() && !mounted("/dev") {
        let _ = mount(
            Some("dev"),
            "/dev",
            Some("devtmpfs"),
            MsFlags::MS_NOSUID,
            Some("mode=0755"),
        );
    }
    if !mounted("/run") {
        let _ = mount(
            Some("run"),
            "/run",
            Some("tmpfs"),
            MsFlags::MS_NOSUID | MsFlags::MS_NODEV,
            Some("mode=0755"),
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub fn init_mounts() {}

/// Only detects toplevel mount points, which is all boot needs.
#[cfg(target_os = "linux")]
fn mounted(dir: &str) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(root) = std::fs::metadata("/") else { return true };
    let Ok(target) = std::fs::metadata(dir) else {
        return true; // can't mount if the mountpoint doesn't exist
    };
    root.dev() != target.dev()
}

/// Route Ctrl-Alt-Delete to SIGINT (disabled) or to the kernel (enabled).
/// Failing to disable it means we run inside a container.
#[cfg(target_os = "linux")]
pub fn set_ctrl_alt_del(enabled: bool) -> nix::Result<()> {
    nix::sys::reboot::set_cad_enabled(enabled)
}

#[cfg(not(target_os = "linux"))]
pub fn set_ctrl_alt_del(_enabled: bool) -> nix::Result<()> {
    Ok(())
}

#[cfg(target_os = "linux")]
pub fn remount_root_readonly() -> nix::Result<()> {
    use nix::mount::{mount, MsFlags};
    mount(
        Some("/"),
        "/",
        None::<&str>,
        MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
        None::<&str>,
    )
}

#[cfg(not(target_os = "linux"))]
pub fn remount_root_readonly() -> nix::Result<()> {
    Ok(())
}

pub fn sync_disks() {
    nix::unistd::sync();
}

/// Reboot or power off. Returns only on failure.
#[cfg(target_os = "linux")]
pub fn power_cycle(reboot: bool) -> nix::Result<()> {
    use nix::sys::reboot::{reboot as sys_reboot, RebootMode};
    let mode = if reboot { RebootMode::RB_AUTOBOOT } else { RebootMode::RB_POWER_OFF };
    sys_reboot(mode).map(|_| ())
}

#[cfg(not(target_os = "linux"))]
pub fn power_cycle(_reboot: bool) -> nix::Result<()> {
    Err(nix::errno::Errno::ENOSYS)
}
