use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3345").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Wall-clock timeout for one conversion attempt, in seconds.
    #[serde(default = "default_convert_timeout_secs")]
    pub convert_timeout_secs: u64,

    /// Number of long-lived conversion workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum number of jobs resident in the queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Render width used when the request does not override it.
    #[serde(default = "default_width")]
    pub default_width: u32,

    /// Render height used when the request does not override it.
    #[serde(default = "default_height")]
    pub default_height: u32,

    /// Diagonal compression factor used when the request does not override it.
    #[serde(default = "default_scale")]
    pub default_scale: u32,

    /// Period of the retention sweeper, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Age beyond which the sweeper removes an artifact, in seconds.
    #[serde(default = "default_max_file_age_secs")]
    pub max_file_age_secs: u64,

    /// Maximum accepted request body size, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// How long a submission may wait for queue room before it is rejected,
    /// in seconds.
    #[serde(default = "default_enqueue_wait_secs")]
    pub enqueue_wait_secs: u64,

    /// Directory holding per-job input and output artifacts.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// External renderer program invoked per job.
    #[serde(default = "default_converter_cmd")]
    pub converter_cmd: PathBuf,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3345".to_string()
}

fn default_convert_timeout_secs() -> u64 {
    30
}

fn default_worker_count() -> usize {
    10
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    1024
}

fn default_scale() -> u32 {
    1
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_max_file_age_secs() -> u64 {
    36_000
}

fn default_max_body_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_enqueue_wait_secs() -> u64 {
    30
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("/tmp/step-preview")
}

fn default_converter_cmd() -> PathBuf {
    PathBuf::from("step-render")
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.convert_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_file_age(&self) -> Duration {
        Duration::from_secs(self.max_file_age_secs)
    }

    pub fn enqueue_wait(&self) -> Duration {
        Duration::from_secs(self.enqueue_wait_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            convert_timeout_secs: default_convert_timeout_secs(),
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            default_width: default_width(),
            default_height: default_height(),
            default_scale: default_scale(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_file_age_secs: default_max_file_age_secs(),
            max_body_bytes: default_max_body_bytes(),
            enqueue_wait_secs: default_enqueue_wait_secs(),
            temp_dir: default_temp_dir(),
            converter_cmd: default_converter_cmd(),
        }
    }
}
