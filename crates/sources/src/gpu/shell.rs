//! Shell backend invoking `nvidia-smi` and `dcgmi`

use super::native::percent;
use super::runner::{CommandRunner, SystemRunner};
use gpu_probe_core::constants::{NOT_APPLICABLE_SENTINEL, NOT_SUPPORTED, VALUE_NOT_AVAILABLE};
use gpu_probe_core::{Backend, BackendKind, Composite, DeviceRef, Registry};
use gpu_probe_types::{
    Clocks, Field, FieldOutput, FieldResult, MemoryUsage, ProcessEntry, ShellConfig, Utilization,
};
use serde_json::Value;
use std::time::Duration;

/// Trimmed command text and whether the command exited with status 0
struct Execution {
    text: String,
    success: bool,
}

impl Execution {
    /// Error message for an unusable output
    fn error(&self) -> String {
        if self.text == NOT_APPLICABLE_SENTINEL {
            VALUE_NOT_AVAILABLE.to_string()
        } else {
            self.text.clone()
        }
    }
}

/// Backend that shells out to the NVIDIA command-line tools
///
/// Every field costs one subprocess. Scalar values are reported as the raw
/// CLI text.
pub struct ShellBackend<R = SystemRunner> {
    runner: R,
    config: ShellConfig,
}

impl ShellBackend<SystemRunner> {
    pub fn new(config: ShellConfig) -> Self {
        let runner = SystemRunner::new(Duration::from_millis(config.timeout_ms));
        Self::with_runner(runner, config)
    }
}

impl<R: CommandRunner> ShellBackend<R> {
    pub fn with_runner(runner: R, config: ShellConfig) -> Self {
        Self { runner, config }
    }

    fn execute(&self, program: &str, args: Vec<String>) -> Execution {
        match self.runner.run(program, &args) {
            Ok(output) => Execution {
                text: output.text(),
                success: output.success(),
            },
            Err(e) => Execution {
                text: e.to_string(),
                success: false,
            },
        }
    }

    fn smi_query(&self, device: DeviceRef, query: &str) -> Execution {
        self.execute(
            &self.config.smi_path,
            vec![
                "-i".to_string(),
                device.index.to_string(),
                format!("--query-gpu={}", query),
                "--format=csv,noheader,nounits".to_string(),
            ],
        )
    }

    fn scalar(&self, device: DeviceRef, query: &str) -> FieldResult<String> {
        let execution = self.smi_query(device, query);
        if execution.success && execution.text != NOT_APPLICABLE_SENTINEL {
            FieldResult::ok(execution.text)
        } else {
            FieldResult::failed(execution.error())
        }
    }

    /// Query two values at once and parse them into a composite.
    ///
    /// `fill` stores whichever sides parse and returns false if either did not.
    fn pair<T: Default>(
        &self,
        device: DeviceRef,
        query: &str,
        fill: impl FnOnce(&mut T, Option<&str>, Option<&str>) -> bool,
    ) -> FieldResult<T> {
        let execution = self.smi_query(device, query);
        if !execution.success {
            return FieldResult::failed(execution.error());
        }

        let mut parts = execution.text.split(", ").map(str::trim);
        let (first, second) = (parts.next(), parts.next());

        let mut composite = Composite::new(T::default());
        if !fill(composite.value_mut(), first, second) {
            composite.fail(format!("Parse error: {}", execution.text));
        }
        composite.finish()
    }

    fn memory(&self, device: DeviceRef) -> FieldResult<MemoryUsage> {
        self.pair(device, "memory.total,memory.used", |mem: &mut MemoryUsage, total, used| {
            let total = total.and_then(|s| s.parse::<f64>().ok());
            let used = used.and_then(|s| s.parse::<f64>().ok());
            if let Some(total) = total {
                mem.memory_total_mib = total as u64;
            }
            if let Some(used) = used {
                mem.memory_used_mib = used as u64;
            }
            match (total, used) {
                (Some(total), Some(used)) => {
                    mem.memory_usage_percent = percent(used, total);
                    true
                }
                _ => false,
            }
        })
    }

    fn clocks(&self, device: DeviceRef) -> FieldResult<Clocks> {
        self.pair(device, "clocks.gr,clocks.mem", |clocks: &mut Clocks, gpu, mem| {
            let gpu = gpu.and_then(|s| s.parse::<u32>().ok());
            let mem = mem.and_then(|s| s.parse::<u32>().ok());
            if let Some(mhz) = gpu {
                clocks.gpu_clock_mhz = mhz;
            }
            if let Some(mhz) = mem {
                clocks.memory_clock_mhz = mhz;
            }
            gpu.is_some() && mem.is_some()
        })
    }

    fn utilization(&self, device: DeviceRef) -> FieldResult<Utilization> {
        self.pair(
            device,
            "utilization.gpu,utilization.memory",
            |util: &mut Utilization, gpu, mem| {
                let gpu = gpu.and_then(|s| s.parse::<u32>().ok());
                let mem = mem.and_then(|s| s.parse::<u32>().ok());
                if let Some(percent) = gpu {
                    util.gpu_utilization_percent = percent;
                }
                if let Some(percent) = mem {
                    util.memory_utilization_percent = percent;
                }
                gpu.is_some() && mem.is_some()
            },
        )
    }

    fn health(&self, device: DeviceRef) -> FieldResult<Value> {
        let execution = self.execute(
            &self.config.dcgmi_path,
            vec![
                "health".to_string(),
                "--host".to_string(),
                self.config.dcgm_host.clone(),
                "-g".to_string(),
                device.index.to_string(),
                "-c".to_string(),
                "-j".to_string(),
            ],
        );
        let empty = || Value::from("");
        if !execution.success {
            return FieldResult::failed_with(empty(), execution.text);
        }
        match serde_json::from_str::<Value>(&execution.text) {
            Ok(body) => FieldResult::ok(body),
            Err(_) => FieldResult::failed_with(empty(), execution.text),
        }
    }
}

fn unsupported() -> FieldOutput {
    FieldResult::<String>::failed(NOT_SUPPORTED).into()
}

impl<R: CommandRunner + 'static> Backend for ShellBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Shell
    }

    fn device_count(&self) -> u32 {
        let args = vec![
            "--query-gpu=name".to_string(),
            "--format=csv,noheader".to_string(),
        ];
        match self.runner.run(&self.config.smi_path, &args) {
            Ok(output) if output.success() => output
                .stdout
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count() as u32,
            Ok(output) => {
                log::warn!("Failed to get GPU count: {}", output.text());
                0
            }
            Err(e) => {
                log::warn!("Failed to get GPU count: {}", e);
                0
            }
        }
    }

    fn register(registry: &mut Registry<Self>) {
        registry.register(Field::Name, |b, d| b.scalar(d, "gpu_name").into());
        registry.register(Field::Serial, |b, d| b.scalar(d, "serial").into());
        registry.register(Field::Uuid, |b, d| b.scalar(d, "uuid").into());
        registry.register(Field::Vbios, |b, d| b.scalar(d, "vbios_version").into());
        registry.register(Field::Driver, |b, d| b.scalar(d, "driver_version").into());
        registry.register(Field::Temperature, |b, d| b.scalar(d, "temperature.gpu").into());
        registry.register(Field::FanSpeed, |b, d| b.scalar(d, "fan.speed").into());
        registry.register(Field::MinorNumber, |_, _| unsupported());
        registry.register(Field::PerformanceState, |b, d| b.scalar(d, "pstate").into());
        registry.register(Field::PcieGeneration, |_, _| unsupported());
        registry.register(Field::PcieWidth, |_, _| unsupported());
        registry.register(Field::PowerDraw, |b, d| b.scalar(d, "power.draw").into());
        registry.register(Field::PowerLimit, |b, d| b.scalar(d, "power.limit").into());
        registry.register(Field::Clocks, |b, d| b.clocks(d).into());
        registry.register(Field::Memory, |b, d| b.memory(d).into());
        registry.register(Field::Utilization, |b, d| b.utilization(d).into());
        registry.register(Field::Ecc, |b, d| b.scalar(d, "ecc.mode.current").into());
        registry.register(Field::Processes, |_, _| Vec::<ProcessEntry>::new().into());
        registry.register(Field::Health, |b, d| b.health(d).into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::runner::{CommandOutput, RunError};
    use gpu_probe_core::QueryEngine;
    use gpu_probe_types::{DeviceSelector, Selection};
    use serde_json::json;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Mutex;

    /// Answers commands from a script keyed by the joined command line
    #[derive(Default)]
    struct ScriptedRunner {
        script: HashMap<String, CommandOutput>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn on(mut self, command: &str, stdout: &str, exit_code: i32) -> Self {
            self.script
                .insert(command.to_string(), CommandOutput::new(stdout, exit_code));
            self
        }

        fn smi(self, index: u32, query: &str, stdout: &str, exit_code: i32) -> Self {
            let command = format!(
                "nvidia-smi -i {} --query-gpu={} --format=csv,noheader,nounits",
                index, query
            );
            self.on(&command, stdout, exit_code)
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, RunError> {
            let command = format!("{} {}", program, args.join(" "));
            self.calls.lock().unwrap().push(command.clone());
            self.script.get(&command).cloned().ok_or_else(|| RunError::Spawn {
                program: program.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "not scripted"),
            })
        }
    }

    fn engine(runner: ScriptedRunner) -> QueryEngine<ShellBackend<ScriptedRunner>> {
        QueryEngine::new(ShellBackend::with_runner(runner, ShellConfig::default()))
    }

    fn json_of(
        engine: &QueryEngine<ShellBackend<ScriptedRunner>>,
        index: u32,
        field: Field,
    ) -> Value {
        serde_json::to_value(engine.query_field(DeviceRef::new(index), field).unwrap()).unwrap()
    }

    #[test]
    fn test_registry_is_total() {
        assert!(engine(ScriptedRunner::default()).registry().is_total());
    }

    #[test]
    fn test_scalar_success_is_raw_text() {
        let engine = engine(ScriptedRunner::default().smi(0, "temperature.gpu", "61\n", 0));
        assert_eq!(
            json_of(&engine, 0, Field::Temperature),
            json!({"value": "61", "has_error": false, "error": ""})
        );
        let calls = engine.backend().runner.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            ["nvidia-smi -i 0 --query-gpu=temperature.gpu --format=csv,noheader,nounits"]
        );
    }

    #[test]
    fn test_scalar_nonzero_exit_reports_output() {
        let engine = engine(ScriptedRunner::default().smi(
            1,
            "serial",
            "No devices were found",
            1,
        ));
        assert_eq!(
            json_of(&engine, 1, Field::Serial),
            json!({"value": "", "has_error": true, "error": "No devices were found"})
        );
    }

    #[test]
    fn test_sentinel_is_not_available() {
        let engine = engine(ScriptedRunner::default().smi(0, "fan.speed", "[N/A]", 0));
        assert_eq!(
            json_of(&engine, 0, Field::FanSpeed),
            json!({"value": "", "has_error": true, "error": "Value not available"})
        );
    }

    #[test]
    fn test_missing_tool_is_field_failure() {
        let engine = engine(ScriptedRunner::default());
        let value = json_of(&engine, 0, Field::Name);
        assert_eq!(value["has_error"], json!(true));
        assert_eq!(
            value["error"],
            json!("Failed to execute nvidia-smi: not scripted")
        );
    }

    #[test]
    fn test_memory_pair() {
        let engine = engine(ScriptedRunner::default().smi(
            0,
            "memory.total,memory.used",
            "24564, 6141",
            0,
        ));
        let value = json_of(&engine, 0, Field::Memory);
        assert_eq!(value["has_error"], json!(false));
        assert_eq!(value["value"]["memory_total_mib"], json!(24564));
        assert_eq!(value["value"]["memory_used_mib"], json!(6141));
        let percent = value["value"]["memory_usage_percent"].as_f64().unwrap();
        assert!((percent - 25.0).abs() < 0.1);
    }

    #[test]
    fn test_pair_parse_error_keeps_parsed_side() {
        let engine = engine(ScriptedRunner::default().smi(
            0,
            "clocks.gr,clocks.mem",
            "1980, [N/A]",
            0,
        ));
        assert_eq!(
            json_of(&engine, 0, Field::Clocks),
            json!({
                "value": {"gpu_clock_mhz": 1980, "memory_clock_mhz": 0},
                "has_error": true,
                "error": "Parse error: 1980, [N/A]"
            })
        );
    }

    #[test]
    fn test_pair_single_value_is_parse_error() {
        let engine = engine(ScriptedRunner::default().smi(
            0,
            "utilization.gpu,utilization.memory",
            "87",
            0,
        ));
        let value = json_of(&engine, 0, Field::Utilization);
        assert_eq!(value["error"], json!("Parse error: 87"));
        assert_eq!(value["value"]["gpu_utilization_percent"], json!(87));
    }

    #[test]
    fn test_pair_nonzero_exit_is_zero_composite() {
        let engine = engine(ScriptedRunner::default().smi(
            0,
            "utilization.gpu,utilization.memory",
            "GPU is lost",
            15,
        ));
        assert_eq!(
            json_of(&engine, 0, Field::Utilization),
            json!({
                "value": {"gpu_utilization_percent": 0, "memory_utilization_percent": 0},
                "has_error": true,
                "error": "GPU is lost"
            })
        );
    }

    #[test]
    fn test_unsupported_fields() {
        let engine = engine(ScriptedRunner::default());
        for field in [Field::MinorNumber, Field::PcieGeneration, Field::PcieWidth] {
            assert_eq!(
                json_of(&engine, 0, field),
                json!({"value": "", "has_error": true, "error": "Not Supported"})
            );
        }
        assert_eq!(json_of(&engine, 0, Field::Processes), json!([]));
        assert!(engine.backend().runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_health_parses_dcgmi_json() {
        let body = r#"{"body": {"Overall Health": {"value": "Healthy"}}}"#;
        let engine = engine(
            ScriptedRunner::default()
                .on("dcgmi health --host localhost -g 0 -c -j", body, 0)
                .on("dcgmi health --host localhost -g 1 -c -j", "not json", 0),
        );
        assert_eq!(
            json_of(&engine, 0, Field::Health)["value"]["body"]["Overall Health"]["value"],
            json!("Healthy")
        );
        assert_eq!(
            json_of(&engine, 1, Field::Health),
            json!({"value": "", "has_error": true, "error": "not json"})
        );
    }

    #[test]
    fn test_count_from_lines() {
        let list = "NVIDIA GeForce RTX 4090\nNVIDIA RTX A6000\n\n";
        let engine = engine(ScriptedRunner::default().on(
            "nvidia-smi --query-gpu=name --format=csv,noheader",
            list,
            0,
        ));
        assert_eq!(engine.backend().device_count(), 2);

        let failing = self::engine(ScriptedRunner::default());
        assert_eq!(failing.backend().device_count(), 0);
    }

    #[test]
    fn test_query_single_device() {
        let engine = engine(
            ScriptedRunner::default()
                .on("nvidia-smi --query-gpu=name --format=csv,noheader", "A\nB\n", 0)
                .smi(1, "gpu_name", "NVIDIA RTX A6000", 0),
        );
        let doc = engine.query(
            DeviceSelector::Index(1),
            &Selection::from_tokens(["count", "name"]),
        );
        assert_eq!(doc.count, Some(2));
        let report = doc.device(1).unwrap();
        assert_eq!(
            report[&Field::Name].reading().unwrap().value,
            json!("NVIDIA RTX A6000")
        );
    }
    fn missing_tool_engine() -> QueryEngine<ShellBackend> {
        QueryEngine::new(ShellBackend::new(ShellConfig {
            smi_path: "gpu-no-such-tool".to_string(),
            ..ShellConfig::default()
        }))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_system_runner_inside_multi_thread_runtime() {
        let engine = missing_tool_engine();
        let doc = engine.query(DeviceSelector::All, &Selection::from_tokens(["count", "name"]));
        assert_eq!(doc.count, Some(0));
        assert_eq!(doc.error.as_deref(), Some("No NVIDIA GPUs found"));
        drop(engine);
    }

    #[tokio::test]
    async fn test_system_runner_inside_current_thread_runtime() {
        let engine = missing_tool_engine();
        assert_eq!(engine.backend().device_count(), 0);

        let output = engine.query_field(DeviceRef::new(0), Field::Name).unwrap();
        let result = output.reading().unwrap();
        assert!(result.has_error);
        assert!(result.error.starts_with("Failed to execute gpu-no-such-tool"));
        drop(engine);
    }
}
