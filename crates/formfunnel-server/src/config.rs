use formfunnel_mail::SmtpSettings;
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tables: TablesConfig,
    pub mail: MailConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Site that hosts the result pages every flow redirects to.
    pub redirect_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TablesConfig {
    pub leads: String,
    pub membership_applicants: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    Smtp,
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub templates_dir: String,
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Config {
    pub fn from_path(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.server
            .listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid server.listen_addr: {e}"))?;
        if self.metrics.enabled {
            self.metrics
                .listen_addr
                .parse::<SocketAddr>()
                .map_err(|e| anyhow::anyhow!("invalid metrics.listen_addr: {e}"))?;
        }
        if !self.server.redirect_base.starts_with("http://")
            && !self.server.redirect_base.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "server.redirect_base must be an http(s) URL"
            ));
        }
        if self.mail.transport == MailTransport::Smtp {
            let smtp = self
                .mail
                .smtp
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("smtp transport selected but [mail.smtp] missing"))?;
            if smtp.host.is_empty() {
                return Err(anyhow::anyhow!("mail.smtp.host is empty"));
            }
        }
        Ok(())
    }
}
