//! Real-time scheduling helpers (Linux SCHED_FIFO / mlockall).

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    RT_ONCE.get_or_init(|| {
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc != 0 {
            eprintln!(
                "Warning: mlockall failed: {}; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'",
                std::io::Error::last_os_error()
            );
        }

        let max = unsafe { libc::sched_get_priority_max(libc::SCHED_FIFO) };
        let param = libc::sched_param {
            sched_priority: if max < 0 { 99 } else { max },
        };
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            eprintln!(
                "Warning: sched_setscheduler(SCHED_FIFO) failed: {}; hint: needs CAP_SYS_NICE or root",
                std::io::Error::last_os_error()
            );
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool) {
    if rt {
        eprintln!("Warning: real-time mode is only supported on Linux");
    }
}
