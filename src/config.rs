// config.rs - configuration
//
// chatircd - simple IRC-like chat server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

use anyhow::Context;
use serde::Deserializer;
use serde_derive::Deserialize;
use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use validator::Validate;

use crate::command::DEFAULT_MAX_LINE_LENGTH;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "chatircd.toml";

#[derive(clap::Parser, Clone, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Cli {
    #[clap(short, long, help = "Configuration file path")]
    pub(crate) config: Option<String>,
    #[clap(short, long, help = "Listen bind address")]
    pub(crate) listen: Option<IpAddr>,
    #[clap(short, long, help = "Listen port")]
    pub(crate) port: Option<u16>,
    #[clap(short = 'n', long, help = "Server name")]
    pub(crate) name: Option<String>,
    #[clap(short = 'N', long, help = "Network")]
    pub(crate) network: Option<String>,
    #[clap(short = 'P', long, help = "Connection password")]
    pub(crate) password: Option<String>,
    #[clap(short = 'L', long, help = "Log file path")]
    pub(crate) log_file: Option<String>,
    #[clap(short, long, help = "Run in background")]
    pub(crate) background: bool,
}

/// Main configuration structure.
#[derive(Clone, PartialEq, Eq, Deserialize, Debug, Validate)]
#[serde(default)]
pub(crate) struct MainConfig {
    #[validate(contains(pattern = "."))]
    pub(crate) name: String,
    #[validate(length(min = 1))]
    pub(crate) network: String,
    pub(crate) info: String,
    pub(crate) motd: Option<String>,
    pub(crate) listen: IpAddr,
    pub(crate) port: u16,
    // plain connection password shared by all clients
    #[validate(length(min = 1))]
    pub(crate) password: Option<String>,
    pub(crate) max_connections: Option<usize>,
    #[validate(range(min = 1))]
    pub(crate) ping_timeout: u64,
    #[validate(range(min = 1))]
    pub(crate) pong_timeout: u64,
    #[validate(range(min = 64))]
    pub(crate) max_line_length: usize,
    pub(crate) log_file: Option<String>,
    #[serde(deserialize_with = "tracing_log_level_deserialize")]
    pub(crate) log_level: tracing::Level,
}

struct TracingLevelVisitor;

impl serde::de::Visitor<'_> for TracingLevelVisitor {
    type Value = tracing::Level;
    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("TracingLevel")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
        tracing::Level::from_str(v).map_err(serde::de::Error::custom)
    }
}

fn tracing_log_level_deserialize<'de, D: Deserializer<'de>>(
    ds: D,
) -> Result<tracing::Level, D::Error> {
    ds.deserialize_str(TracingLevelVisitor)
}

impl MainConfig {
    // create new main config from command line.
    pub(crate) fn new(cli: Cli) -> anyhow::Result<MainConfig> {
        let mut config = match cli.config.as_deref() {
            Some(path) => MainConfig::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                MainConfig::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => MainConfig::default(),
        };
        // modify configuration by CLI options
        if let Some(addr) = cli.listen {
            config.listen = addr;
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(name) = cli.name {
            config.name = name;
        }
        if let Some(network) = cli.network {
            config.network = network;
        }
        if let Some(password) = cli.password {
            config.password = Some(password);
        }
        if let Some(log_file) = cli.log_file {
            config.log_file = Some(log_file)
        }
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn from_file(path: &str) -> anyhow::Result<MainConfig> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Can't read configuration file {}", path))?;
        toml::from_str(&config_str)
            .with_context(|| format!("Can't parse configuration file {}", path))
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        MainConfig {
            name: "irc.irc".to_string(),
            network: "IRCnetwork".to_string(),
            info: "This is IRC server".to_string(),
            motd: Some("Hello, world!".to_string()),
            listen: IpAddr::from([0, 0, 0, 0]),
            port: 6667,
            password: None,
            max_connections: None,
            ping_timeout: 120,
            pong_timeout: 20,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            log_file: None,
            log_level: tracing::Level::INFO,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::env::temp_dir;
    use std::fs;

    struct TempFileHandle {
        path: String,
    }

    impl TempFileHandle {
        fn new(path: &str) -> TempFileHandle {
            TempFileHandle {
                path: temp_dir().join(path).to_string_lossy().to_string(),
            }
        }
    }

    impl Drop for TempFileHandle {
        fn drop(&mut self) {
            fs::remove_file(self.path.as_str()).unwrap();
        }
    }

    #[test]
    fn test_mainconfig_new() {
        let file = TempFileHandle::new("chatircd_test_config.toml");
        fs::write(
            file.path.as_str(),
            r##"
name = "irc.example.com"
network = "ExampleNet"
info = "Example server"
motd = "Be nice"
listen = "127.0.0.1"
port = 6688
password = "secret"
max_connections = 4000
ping_timeout = 100
pong_timeout = 15
max_line_length = 1024
log_level = "debug"
"##,
        )
        .unwrap();
        let cli = Cli {
            config: Some(file.path.clone()),
            ..Cli::default()
        };
        let result = MainConfig::new(cli).unwrap();
        assert_eq!(
            MainConfig {
                name: "irc.example.com".to_string(),
                network: "ExampleNet".to_string(),
                info: "Example server".to_string(),
                motd: Some("Be nice".to_string()),
                listen: "127.0.0.1".parse().unwrap(),
                port: 6688,
                password: Some("secret".to_string()),
                max_connections: Some(4000),
                ping_timeout: 100,
                pong_timeout: 15,
                max_line_length: 1024,
                log_file: None,
                log_level: tracing::Level::DEBUG,
            },
            result
        );
    }

    #[test]
    fn test_mainconfig_partial_and_cli() {
        let file = TempFileHandle::new("chatircd_test_config_partial.toml");
        fs::write(file.path.as_str(), "name = \"irc.partial.net\"\nport = 7000\n").unwrap();
        let cli = Cli {
            config: Some(file.path.clone()),
            listen: Some("192.168.1.2".parse().unwrap()),
            port: Some(7001),
            password: Some("xyz".to_string()),
            log_file: Some("/tmp/chatircd.log".to_string()),
            ..Cli::default()
        };
        let result = MainConfig::new(cli).unwrap();
        assert_eq!(
            MainConfig {
                name: "irc.partial.net".to_string(),
                listen: "192.168.1.2".parse().unwrap(),
                port: 7001,
                password: Some("xyz".to_string()),
                log_file: Some("/tmp/chatircd.log".to_string()),
                ..MainConfig::default()
            },
            result
        );
    }

    #[test]
    fn test_mainconfig_invalid() {
        let file = TempFileHandle::new("chatircd_test_config_invalid.toml");
        fs::write(file.path.as_str(), "name = \"nodots\"\n").unwrap();
        let cli = Cli {
            config: Some(file.path.clone()),
            ..Cli::default()
        };
        assert!(MainConfig::new(cli).is_err());

        let file2 = TempFileHandle::new("chatircd_test_config_badlevel.toml");
        fs::write(file2.path.as_str(), "log_level = \"loud\"\n").unwrap();
        let cli = Cli {
            config: Some(file2.path.clone()),
            ..Cli::default()
        };
        assert!(MainConfig::new(cli).is_err());

        let cli = Cli {
            config: Some("/nonexistent/chatircd.toml".to_string()),
            ..Cli::default()
        };
        assert!(MainConfig::new(cli).is_err());
    }
}
