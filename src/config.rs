use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path};

pub const DEFAULT_CONFIG_PATH: &str = "/data/config.yaml";

const CONFIG_PATH_VAR: &str = "TALLYD_CFG_PATH";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub redis: RedisConfig,
    pub mysql: MysqlConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RedisConfig {
    pub addr: String,
    #[serde(default = "redis_port_default")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MysqlConfig {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(default = "mysql_port_default")]
    pub port: u16,
    pub dbname: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let file_path = if let Ok(cfg_path) = env::var(CONFIG_PATH_VAR) {
            path::PathBuf::from(cfg_path)
        } else {
            path::PathBuf::from(DEFAULT_CONFIG_PATH)
        };

        Self::from_path(&file_path)
    }

    pub fn from_path(file_path: &path::Path) -> anyhow::Result<Self> {
        if !file_path.exists() {
            anyhow::bail!("config file not found in {file_path:?}");
        }
        let content = fs::read_to_string(file_path).with_context(|| "fail to read config file")?;

        serde_yaml::from_str(&content).with_context(|| "fail to parse config from yaml")
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/0", self.addr, self.port)
        } else {
            format!("redis://:{}@{}:{}/0", self.password, self.addr, self.port)
        }
    }
}

fn redis_port_default() -> u16 {
    6379
}

fn mysql_port_default() -> u16 {
    3306
}
