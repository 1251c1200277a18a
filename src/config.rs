use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use crate::optimizer::PackingConfig;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            engine: EngineConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const HOST_VAR: &'static str = "PALLET_STACKER_API_HOST";
    const PORT_VAR: &'static str = "PALLET_STACKER_API_PORT";
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        Self::from_values(env_string(Self::HOST_VAR), env_string(Self::PORT_VAR))
    }

    fn from_values(host: Option<String>, port: Option<String>) -> Self {
        let host_value = host.unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    var = Self::HOST_VAR,
                    value = %host_value,
                    %err,
                    "could not parse host, using {}",
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        };

        let port = parse_with_warning(
            Self::PORT_VAR,
            port,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Defaults for stacking runs. Requests may override gap and buffer capacity.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    packing: PackingConfig,
}

impl EngineConfig {
    const GAP_VAR: &'static str = "PALLET_STACKER_GAP";
    const BUFFER_CAPACITY_VAR: &'static str = "PALLET_STACKER_BUFFER_CAPACITY";
    const MIN_SUPPORT_RATIO_VAR: &'static str = "PALLET_STACKER_MIN_SUPPORT_RATIO";

    pub fn new(packing: PackingConfig) -> Self {
        Self { packing }
    }

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::GAP_VAR),
            env_string(Self::BUFFER_CAPACITY_VAR),
            env_string(Self::MIN_SUPPORT_RATIO_VAR),
        )
    }

    fn from_values(
        gap: Option<String>,
        buffer_capacity: Option<String>,
        min_support_ratio: Option<String>,
    ) -> Self {
        let gap = parse_with_warning(
            Self::GAP_VAR,
            gap,
            PackingConfig::DEFAULT_GAP,
            |value| value > 0,
            "must be greater than 0",
        );

        let buffer_capacity = parse_with_warning(
            Self::BUFFER_CAPACITY_VAR,
            buffer_capacity,
            PackingConfig::DEFAULT_BUFFER_CAPACITY,
            |_| true,
            "",
        );

        let min_support_ratio = parse_with_warning(
            Self::MIN_SUPPORT_RATIO_VAR,
            min_support_ratio,
            PackingConfig::DEFAULT_MIN_SUPPORT_RATIO,
            |value: f64| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
        );

        let packing = PackingConfig::builder()
            .gap(gap)
            .buffer_capacity(buffer_capacity)
            .min_support_ratio(min_support_ratio)
            .build();

        Self { packing }
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(var = name, %err, "could not read variable, using default value");
            None
        }
    }
}

/// Parses an optional raw value, falling back to `default` with a warning
/// when it does not parse or fails `validator`.
fn parse_with_warning<T>(
    var_name: &str,
    raw: Option<String>,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.parse::<T>() {
        Ok(value) if validator(value) => {
            tracing::debug!(var = var_name, %value, "using configured value");
            value
        }
        Ok(_) => {
            tracing::warn!(
                var = var_name,
                value = %raw,
                "invalid value: {invalid_hint}, using {default}"
            );
            default
        }
        Err(err) => {
            tracing::warn!(
                var = var_name,
                value = %raw,
                %err,
                "could not parse value, using {default}"
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn api_defaults_bind_all_interfaces() {
        let config = ApiConfig::from_values(None, None);
        assert_eq!(config.port(), 8080);
        assert!(config.binds_to_all_interfaces());
        assert!(config.uses_default_host());
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn api_invalid_host_and_zero_port_fall_back() {
        let config = ApiConfig::from_values(some("not-an-ip"), some("0"));
        assert_eq!(config.display_host(), "0.0.0.0");
        assert_eq!(config.port(), 8080);

        let config = ApiConfig::from_values(some("127.0.0.1"), some("9000"));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert!(!config.binds_to_all_interfaces());
    }

    #[test]
    fn engine_defaults_match_packing_defaults() {
        let config = EngineConfig::from_values(None, None, None);
        assert_eq!(config.packing_config(), PackingConfig::default());
    }

    #[test]
    fn engine_values_are_parsed_and_validated() {
        let config = EngineConfig::from_values(some("10"), some("3"), some("0.5"));
        let packing = config.packing_config();
        assert_eq!(packing.gap, 10);
        assert_eq!(packing.buffer_capacity, 3);
        assert_eq!(packing.min_support_ratio, 0.5);

        let config = EngineConfig::from_values(some("0"), some("-1"), some("1.5"));
        assert_eq!(config.packing_config(), PackingConfig::default());
    }

    #[test]
    fn parse_with_warning_handles_garbage() {
        assert_eq!(parse_with_warning("TEST_VAR", some("abc"), 7u32, |_| true, ""), 7);
        assert_eq!(parse_with_warning("TEST_VAR", some("12"), 7u32, |_| true, ""), 12);
        assert_eq!(parse_with_warning::<u32>("TEST_VAR", None, 7, |_| true, ""), 7);
    }
}
