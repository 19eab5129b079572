use clap::Parser;
use std::path::PathBuf;

/// Daemon configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "ipam")]
#[command(about = "IPv4 address pool manager with reservations and lease history")]
pub struct Config {
    /// Listen address for the REST API
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    pub listen: String,

    /// Directory holding the SQLite database
    #[arg(short, long, default_value = "/var/lib/ipam")]
    pub data_dir: PathBuf,

    /// Largest number of addresses a single subnet may expand to
    #[arg(long, default_value_t = 65534)]
    pub max_subnet_hosts: u64,

    /// SQLite connection pool size
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["ipam"]);
        assert_eq!(config.listen, "127.0.0.1:5000");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/ipam"));
        assert_eq!(config.max_subnet_hosts, 65534);
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "ipam",
            "--listen",
            "[::]:8080",
            "-d",
            "/tmp/ipam",
            "--max-subnet-hosts",
            "1024",
        ]);
        assert_eq!(config.listen, "[::]:8080");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/ipam"));
        assert_eq!(config.max_subnet_hosts, 1024);
    }
}
