//! Registry configuration

use std::time::Duration;

/// Hard cap on the number of instance slots
pub const MAX_INSTANCES: usize = 8192;

/// Instance registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Number of instance slots (capped at [`MAX_INSTANCES`])
    pub max_instances: usize,

    /// Collection name used in listings and links (`/procs/<id>.json`)
    pub prefix: String,

    /// Optional base prepended to self links, e.g. `http://127.0.0.1:8080`
    pub href_base: Option<String>,

    /// Input queue capacity of new instances
    pub fifo_in_capacity: usize,

    /// Output queue capacity of new instances
    pub fifo_out_capacity: usize,

    /// Statistics period of new instances
    pub stats_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_instances: 64,
            prefix: "procs".to_string(),
            href_base: None,
            fifo_in_capacity: 16,
            fifo_out_capacity: 16,
            stats_interval: Duration::from_secs(1),
        }
    }
}

impl RegistryConfig {
    /// Set the number of slots
    pub fn max_instances(mut self, max: usize) -> Self {
        self.max_instances = max.min(MAX_INSTANCES);
        self
    }

    /// Set the collection prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the link base
    pub fn href_base(mut self, base: impl Into<String>) -> Self {
        self.href_base = Some(base.into());
        self
    }

    /// Set both queue capacities
    pub fn fifo_capacities(mut self, input: usize, output: usize) -> Self {
        self.fifo_in_capacity = input;
        self.fifo_out_capacity = output;
        self
    }

    /// Set the statistics period
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Self link of instance `id`
    pub fn href(&self, id: usize) -> String {
        format!(
            "{}/{}/{}.json",
            self.href_base.as_deref().unwrap_or(""),
            self.prefix,
            id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_instances, 64);
        assert_eq!(config.prefix, "procs");
        assert_eq!(config.fifo_in_capacity, 16);
        assert_eq!(config.stats_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_max_instances_capped() {
        let config = RegistryConfig::default().max_instances(usize::MAX);
        assert_eq!(config.max_instances, MAX_INSTANCES);
    }

    #[test]
    fn test_href() {
        let config = RegistryConfig::default();
        assert_eq!(config.href(3), "/procs/3.json");

        let config = RegistryConfig::default()
            .prefix("nodes")
            .href_base("http://127.0.0.1:8080");
        assert_eq!(config.href(0), "http://127.0.0.1:8080/nodes/0.json");
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .max_instances(8)
            .fifo_capacities(2, 4)
            .stats_interval(Duration::from_millis(100));
        assert_eq!(config.max_instances, 8);
        assert_eq!(config.fifo_in_capacity, 2);
        assert_eq!(config.fifo_out_capacity, 4);
        assert_eq!(config.stats_interval, Duration::from_millis(100));
    }
}
