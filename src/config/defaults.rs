use super::*;

impl Default for Config {
    fn default() -> Self {
        Self {
            octopus: OctopusConfig::default(),
            logging: LoggingConfig::default(),
            export: ExportConfig::default(),
            tariffs: Vec::new(),
            charge_sensors: Vec::new(),
            meters: Vec::new(),
            poll_interval_ms: 30_000,
            timezone: "Europe/London".to_string(),
            state_file: "/data/auriga_state.json".to_string(),
        }
    }
}

impl Default for OctopusConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.octopus.energy/v1".to_string(),
            product_code: "AGILE-18-02-21".to_string(),
            api_key: None,
            request_timeout_secs: 10.0,
            // Agile price cap; the daily minimum search starts from here
            capped_rate: 35.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/auriga.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}
