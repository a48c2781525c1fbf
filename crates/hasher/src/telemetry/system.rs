//! Process and host resource gauges, sampled on each metric collection.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use opentelemetry::metrics::{Meter, ObservableGauge};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Convert a per-core CPU percentage into a utilization ratio of the whole
/// machine. `1.0` means every logical CPU is busy.
fn utilization(percent_of_one_core: f32, cpus: usize) -> f64 {
    f64::from(percent_of_one_core) / 100.0 / cpus.max(1) as f64
}

/// Wraps a [`System`] handle. Each reading refreshes only the data it returns.
struct Sampler {
    system: System,
    pid: Option<Pid>,
    cpus: usize,
}

impl Sampler {
    fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
            cpus: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
        }
    }

    fn refresh_process(&mut self, kind: ProcessRefreshKind) -> Option<&sysinfo::Process> {
        let pid = self.pid?;
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, kind);
        self.system.process(pid)
    }

    /// CPU used by this process since the previous reading, as a 0..=1 ratio.
    fn process_cpu_utilization(&mut self) -> Option<f64> {
        let cpus = self.cpus;
        self.refresh_process(ProcessRefreshKind::nothing().with_cpu())
            .map(|process| utilization(process.cpu_usage(), cpus))
    }

    /// Resident memory of this process, in bytes.
    fn process_memory_bytes(&mut self) -> Option<u64> {
        self.refresh_process(ProcessRefreshKind::nothing().with_memory())
            .map(sysinfo::Process::memory)
    }

    /// Memory in use on the host, in bytes.
    fn system_memory_used_bytes(&mut self) -> u64 {
        self.system.refresh_memory();
        self.system.used_memory()
    }
}

/// Registered system gauges. Dropping this value stops nothing; it is kept by
/// the telemetry guard so the instruments live as long as the provider.
pub struct SystemMetrics {
    _cpu: ObservableGauge<f64>,
    _memory: ObservableGauge<u64>,
    _system_memory: ObservableGauge<u64>,
}

impl SystemMetrics {
    /// Register `process.cpu.utilization`, `process.memory.usage`, and
    /// `system.memory.usage` on `meter`.
    pub fn register(meter: &Meter) -> Self {
        let sampler = Arc::new(Mutex::new(Sampler::new()));

        let cpu_sampler = Arc::clone(&sampler);
        let cpu = meter
            .f64_observable_gauge("process.cpu.utilization")
            .with_description("CPU usage of the service process across all logical CPUs")
            .with_unit("1")
            .with_callback(move |observer| {
                if let Some(ratio) = cpu_sampler
                    .lock()
                    .ok()
                    .and_then(|mut s| s.process_cpu_utilization())
                {
                    observer.observe(ratio, &[]);
                }
            })
            .build();

        let memory_sampler = Arc::clone(&sampler);
        let memory = meter
            .u64_observable_gauge("process.memory.usage")
            .with_description("Resident memory of the service process")
            .with_unit("By")
            .with_callback(move |observer| {
                if let Some(bytes) = memory_sampler
                    .lock()
                    .ok()
                    .and_then(|mut s| s.process_memory_bytes())
                {
                    observer.observe(bytes, &[]);
                }
            })
            .build();

        let system_memory = meter
            .u64_observable_gauge("system.memory.usage")
            .with_description("Memory in use on the host")
            .with_unit("By")
            .with_callback(move |observer| {
                if let Ok(mut s) = sampler.lock() {
                    observer.observe(s.system_memory_used_bytes(), &[]);
                }
            })
            .build();

        Self {
            _cpu: cpu,
            _memory: memory,
            _system_memory: system_memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider as _;
    use opentelemetry_sdk::metrics::SdkMeterProvider;

    #[test]
    fn sampler_reads_each_value_independently() {
        let mut sampler = Sampler::new();
        assert!(sampler.pid.is_some());
        assert!(sampler.cpus >= 1);
        assert!(sampler.process_memory_bytes().is_some_and(|b| b > 0));
        assert!(sampler.system_memory_used_bytes() > 0);
        assert!(sampler.process_cpu_utilization().is_some());
    }

    #[test]
    fn utilization_is_a_ratio_of_all_cpus() {
        assert_eq!(utilization(0.0, 8), 0.0);
        assert_eq!(utilization(200.0, 4), 0.5);
        assert_eq!(utilization(400.0, 4), 1.0);
        assert_eq!(utilization(50.0, 0), 0.5);
    }

    #[test]
    fn register_on_reader_less_provider() {
        let provider = SdkMeterProvider::default();
        let meter = provider.meter("system-test");
        let _metrics = SystemMetrics::register(&meter);
    }
}
