//! Status and performance texts shown to operators.

use std::{fmt::Write as _, time::Duration};

use {
    maxrelay_forwarder::EngineStatus,
    maxrelay_store::Store,
    sysinfo::{Disks, MINIMUM_CPU_UPDATE_INTERVAL, System},
};

/// `Nd Nh Nm Ns`, every unit always present.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!(
        "{}d {}h {}m {}s",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "✅" } else { "❌" }
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

pub fn status_report(authorized: bool, status: &EngineStatus, store: &Store) -> String {
    let settings = store.settings();
    let selected = match store.selected_destination() {
        Some(id) => store
            .destination_label(&id)
            .unwrap_or_else(|| id.to_string()),
        None => "not selected".to_string(),
    };

    let mut out = String::from("📊 Status\n\n");
    let _ = writeln!(out, "Authorized: {}", yes_no(authorized));
    let _ = writeln!(out, "Forwarding: {}", yes_no(status.forwarding_active));
    let _ = writeln!(out, "MAX login confirmed: {}", yes_no(status.source_ready));
    let _ = writeln!(out, "Phase: {}", status.phase);
    let _ = writeln!(out, "Destination: {selected}");
    let _ = writeln!(out, "Registered chats: {}", store.destination_count());
    let _ = writeln!(out, "Forwarded this run: {}", status.total_forwarded);
    if status.consecutive_errors > 0 {
        let _ = writeln!(out, "Consecutive errors: {}", status.consecutive_errors);
    }
    if let Some(err) = settings.last_error {
        let _ = writeln!(out, "Last error: {err}");
    }
    out.trim_end().to_string()
}

/// Host metrics sampled for the performance report.
#[derive(Debug, Clone)]
pub struct HostSnapshot {
    pub os: String,
    pub cpu_cores: usize,
    pub cpu_usage_percent: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub disk_used: u64,
    pub disk_total: u64,
}

impl HostSnapshot {
    /// Samples CPU usage over the minimum interval sysinfo needs.
    pub async fn sample() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_all();
        tokio::time::sleep(MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_usage();

        let disks = Disks::new_with_refreshed_list();
        let root = disks
            .list()
            .iter()
            .find(|d| d.mount_point() == std::path::Path::new("/"))
            .or_else(|| disks.list().first());
        let (disk_total, disk_available) = root
            .map(|d| (d.total_space(), d.available_space()))
            .unwrap_or_default();

        Self {
            os: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            cpu_cores: sys.cpus().len(),
            cpu_usage_percent: sys.global_cpu_usage(),
            memory_used: sys.used_memory(),
            memory_total: sys.total_memory(),
            disk_used: disk_total.saturating_sub(disk_available),
            disk_total,
        }
    }
}

pub fn performance_report(status: &EngineStatus, store: &Store, host: &HostSnapshot) -> String {
    let mut out = String::from("📈 Performance\n\n");
    let _ = writeln!(out, "Uptime: {}", format_uptime(status.uptime));
    let _ = writeln!(out, "Forwarded this run: {}", status.total_forwarded);
    let _ = writeln!(out, "Remembered messages: {}", store.total_processed());
    let _ = writeln!(out, "Registered chats: {}", store.destination_count());
    let _ = writeln!(
        out,
        "Forwarding: {} | MAX login: {}",
        yes_no(status.forwarding_active),
        yes_no(status.source_ready)
    );

    out.push_str("\n🖥 Host\n");
    let _ = writeln!(out, "OS: {}", host.os);
    let _ = writeln!(
        out,
        "CPU: {} cores, {:.1}% used",
        host.cpu_cores, host.cpu_usage_percent
    );
    let _ = writeln!(
        out,
        "Memory: {:.1} / {:.1} GiB",
        gib(host.memory_used),
        gib(host.memory_total)
    );
    if host.disk_total > 0 {
        let _ = writeln!(
            out,
            "Disk: {:.1} / {:.1} GiB",
            gib(host.disk_used),
            gib(host.disk_total)
        );
    }
    out.trim_end().to_string()
}
