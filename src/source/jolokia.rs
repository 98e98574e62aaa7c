//! Counter source backed by a Jolokia HTTP/JSON management endpoint.
//!
//! All counters come from the standard `java.lang` platform beans and are
//! fetched with a single bulk read per sample. A failed round trip means the
//! target is gone; a failed individual read only defaults that counter.

use crate::config::TargetConfig;
use crate::core::{CollectorCounters, CounterSource, MemoryUsage, RawCounters, UNKNOWN_HOST};
use crate::source::SourceError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const NANOS_PER_MILLI: u64 = 1_000_000;

const OPERATING_SYSTEM: &str = "java.lang:type=OperatingSystem";
const GARBAGE_COLLECTORS: &str = "java.lang:type=GarbageCollector,name=*";
const MEMORY: &str = "java.lang:type=Memory";
const CLASS_LOADING: &str = "java.lang:type=ClassLoading";
const THREADING: &str = "java.lang:type=Threading";
const RUNTIME: &str = "java.lang:type=Runtime";

// Positions of the entries in the bulk request built by `counter_requests`.
const CPU_TIME: usize = 0;
const COLLECTORS: usize = 1;
const HEAP: usize = 2;
const NON_HEAP: usize = 3;
const LOADED_CLASSES: usize = 4;
const THREADS: usize = 5;
const DAEMON_THREADS: usize = 6;
const RUNTIME_NAME: usize = 7;

/// One entry of a Jolokia bulk response.
#[derive(Debug, Deserialize)]
struct ReadResponse {
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Reads process counters from a Jolokia agent attached to a JVM.
pub struct JolokiaSource {
    client: reqwest::Client,
    url: String,
    expected_pid: Option<u32>,
    epoch: Instant,
    connected: bool,
}

impl JolokiaSource {
    /// Creates a source for the endpoint at `url` (e.g. `http://127.0.0.1:8778/jolokia`).
    ///
    /// If `expected_pid` is set, `connect` verifies that the endpoint belongs
    /// to that process.
    pub fn new(
        url: impl Into<String>,
        expected_pid: Option<u32>,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let url = url.into().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SourceError::Connect {
                target: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url,
            expected_pid,
            epoch: Instant::now(),
            connected: false,
        })
    }

    pub fn from_config(config: &TargetConfig) -> Result<Self, SourceError> {
        let url = config.url.clone().ok_or_else(|| SourceError::Connect {
            target: "<unset>".to_string(),
            reason: "no management endpoint configured (target.url)".to_string(),
        })?;
        Self::new(
            url,
            config.pid,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn connect_error(&self, reason: impl ToString) -> SourceError {
        SourceError::Connect {
            target: self.url.clone(),
            reason: reason.to_string(),
        }
    }

    fn monotonic_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    async fn bulk_read(&self, requests: &Value) -> Result<Vec<ReadResponse>, SourceError> {
        let response = self
            .client
            .post(&self.url)
            .json(requests)
            .send()
            .await
            .map_err(|e| SourceError::Read(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::Read(format!(
                "endpoint answered with HTTP {}",
                response.status()
            )));
        }

        response
            .json::<Vec<ReadResponse>>()
            .await
            .map_err(|e| SourceError::Read(format!("malformed bulk response: {e}")))
    }

    async fn verify_pid(&self, expected: u32) -> Result<(), SourceError> {
        let request = json!([{ "type": "read", "mbean": RUNTIME, "attribute": "Name" }]);
        let responses = self
            .bulk_read(&request)
            .await
            .map_err(|e| self.connect_error(e))?;

        let runtime_name = responses
            .first()
            .and_then(successful_value)
            .and_then(Value::as_str)
            .ok_or_else(|| self.connect_error("runtime name is not readable"))?;

        match parse_runtime_name(runtime_name).0 {
            Some(pid) if pid == expected => Ok(()),
            Some(pid) => Err(self.connect_error(format!(
                "no JVM with PID {expected} found (endpoint serves PID {pid})"
            ))),
            None => Err(self.connect_error(format!(
                "cannot determine PID from runtime name '{runtime_name}'"
            ))),
        }
    }
}

#[async_trait]
impl CounterSource for JolokiaSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        let version_url = format!("{}/version", self.url);
        let response = self
            .client
            .get(&version_url)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;
        if !response.status().is_success() {
            return Err(self.connect_error(format!(
                "connection refused with HTTP {}",
                response.status()
            )));
        }

        if let Some(pid) = self.expected_pid {
            self.verify_pid(pid).await?;
        }

        self.connected = true;
        info!(url = %self.url, pid = ?self.expected_pid, "Connected to management endpoint");
        Ok(())
    }

    async fn read(&mut self) -> Result<RawCounters, SourceError> {
        if !self.connected {
            return Err(SourceError::NotConnected);
        }

        let timestamp = self.monotonic_nanos();
        let responses = self.bulk_read(&counter_requests()).await?;
        if responses.len() != RUNTIME_NAME + 1 {
            return Err(SourceError::Read(format!(
                "expected {} bulk entries, got {}",
                RUNTIME_NAME + 1,
                responses.len()
            )));
        }

        Ok(counters_from_responses(timestamp, &responses))
    }

    async fn disconnect(&mut self) -> Result<(), SourceError> {
        if self.connected {
            debug!(url = %self.url, "Disconnecting from management endpoint");
        }
        self.connected = false;
        Ok(())
    }
}

fn counter_requests() -> Value {
    json!([
        { "type": "read", "mbean": OPERATING_SYSTEM, "attribute": "ProcessCpuTime" },
        {
            "type": "read",
            "mbean": GARBAGE_COLLECTORS,
            "attribute": ["CollectionCount", "CollectionTime"]
        },
        { "type": "read", "mbean": MEMORY, "attribute": "HeapMemoryUsage" },
        { "type": "read", "mbean": MEMORY, "attribute": "NonHeapMemoryUsage" },
        { "type": "read", "mbean": CLASS_LOADING, "attribute": "LoadedClassCount" },
        { "type": "read", "mbean": THREADING, "attribute": "ThreadCount" },
        { "type": "read", "mbean": THREADING, "attribute": "DaemonThreadCount" },
        { "type": "read", "mbean": RUNTIME, "attribute": "Name" },
    ])
}

fn successful_value(response: &ReadResponse) -> Option<&Value> {
    if response.status == 200 {
        Some(&response.value)
    } else {
        debug!(
            status = response.status,
            error = response.error.as_deref().unwrap_or(""),
            "Counter unavailable, using default"
        );
        None
    }
}

fn counters_from_responses(timestamp: u64, responses: &[ReadResponse]) -> RawCounters {
    let value = |index: usize| responses.get(index).and_then(successful_value);
    let number = |index: usize| value(index).and_then(Value::as_u64).unwrap_or(0);

    let host_identity = value(RUNTIME_NAME)
        .and_then(Value::as_str)
        .and_then(|name| parse_runtime_name(name).1)
        .unwrap_or(UNKNOWN_HOST)
        .to_string();

    RawCounters {
        timestamp,
        total_cpu_time_nanos: value(CPU_TIME).and_then(Value::as_u64),
        collectors: value(COLLECTORS).and_then(parse_collectors),
        heap: value(HEAP).map(parse_memory_usage).unwrap_or_default(),
        non_heap: value(NON_HEAP).map(parse_memory_usage).unwrap_or_default(),
        loaded_class_count: number(LOADED_CLASSES),
        thread_count: number(THREADS),
        daemon_thread_count: number(DAEMON_THREADS),
        host_identity,
    }
}

/// Parses the value of a wildcard collector read, keyed by full bean name.
fn parse_collectors(value: &Value) -> Option<BTreeMap<String, CollectorCounters>> {
    let beans = value.as_object()?;
    let collectors = beans
        .iter()
        .filter_map(|(bean, attributes)| {
            let name = collector_name(bean)?;
            let count = attributes.get("CollectionCount").and_then(Value::as_u64);
            let time_millis = attributes.get("CollectionTime").and_then(Value::as_u64);
            Some((
                name.to_string(),
                CollectorCounters {
                    collection_count: count.unwrap_or(0),
                    collection_time_nanos: time_millis.unwrap_or(0).saturating_mul(NANOS_PER_MILLI),
                },
            ))
        })
        .collect();
    Some(collectors)
}

/// Extracts the `name` key property from a bean name such as
/// `java.lang:name=G1 Young Generation,type=GarbageCollector`.
fn collector_name(bean: &str) -> Option<&str> {
    let (_, properties) = bean.split_once(':')?;
    properties
        .split(',')
        .find_map(|property| property.strip_prefix("name="))
}

fn parse_memory_usage(value: &Value) -> MemoryUsage {
    // An undefined maximum is reported as -1 and maps to 0.
    let field = |name: &str| value.get(name).and_then(Value::as_u64).unwrap_or(0);
    MemoryUsage {
        committed: field("committed"),
        used: field("used"),
        max: field("max"),
    }
}

/// Splits a runtime name of the form `<pid>@<host>`.
fn parse_runtime_name(name: &str) -> (Option<u32>, Option<&str>) {
    match name.split_once('@') {
        Some((pid, host)) => {
            let host = (!host.is_empty()).then_some(host);
            (pid.parse().ok(), host)
        }
        None => (None, None),
    }
}
