//! Process-wide configuration, read once at startup.
//!
//! Everything comes from the environment (a `.env` file is honored).
//! Only `DB_URI` is required; the optional blocks enable their sub-step
//! when present and silently disable it when absent.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Connection string of the database to back up
    pub db_uri: String,

    /// Connection string of the secondary cluster; enables replication
    pub replica_db_uri: Option<String>,

    /// Logical database name used in log lines and mail subjects
    pub db_name: String,

    /// Root of the local archive tree
    pub backup_root: PathBuf,

    /// Date-folders older than this many days are deleted after a run
    pub retention_days: u32,

    /// Dump tool executable (path or name resolved via PATH)
    pub mongodump_bin: String,

    /// Restore tool executable
    pub mongorestore_bin: String,

    pub log_level: String,

    /// All three of bucket/key/secret present → uploads enabled
    pub s3: Option<S3Config>,

    /// Host and recipient present → notifications enabled
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub alert_to: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let db_uri = std::env::var("DB_URI")
            .map_err(|_| anyhow::anyhow!("DB_URI must be set to the source connection string"))?;

        let s3 = match (
            std::env::var("S3_BUCKET").ok(),
            std::env::var("S3_ACCESS_KEY").ok(),
            std::env::var("S3_SECRET_KEY").ok(),
        ) {
            (Some(bucket), Some(access_key), Some(secret_key)) => Some(S3Config {
                bucket,
                access_key,
                secret_key,
                region: std::env::var("S3_REGION").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
            }),
            _ => None,
        };

        let mail = match (
            std::env::var("SMTP_HOST").ok(),
            std::env::var("ALERT_EMAIL").ok(),
        ) {
            (Some(host), Some(alert_to)) => {
                let username = std::env::var("SMTP_USER").ok();
                Some(MailConfig {
                    port: std::env::var("SMTP_PORT")
                        .ok()
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(587),
                    password: std::env::var("SMTP_PASS").ok(),
                    from: std::env::var("SMTP_FROM")
                        .ok()
                        .or_else(|| username.clone())
                        .unwrap_or_else(|| "backup-runner@localhost".into()),
                    username,
                    host,
                    alert_to,
                })
            }
            _ => None,
        };

        Ok(Self {
            db_uri,
            replica_db_uri: std::env::var("REPLICA_DB_URI").ok(),
            db_name: std::env::var("DB_NAME").unwrap_or_else(|_| "database".into()),
            backup_root: PathBuf::from(
                std::env::var("BACKUP_ROOT").unwrap_or_else(|_| "/backup/data/db".into()),
            ),
            retention_days: std::env::var("RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(7),
            mongodump_bin: std::env::var("MONGODUMP_BIN").unwrap_or_else(|_| "mongodump".into()),
            mongorestore_bin: std::env::var("MONGORESTORE_BIN")
                .unwrap_or_else(|_| "mongorestore".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            s3,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so the process-global environment is only touched once.
    #[test]
    fn test_from_env() {
        std::env::remove_var("DB_URI");
        assert!(AppConfig::from_env().is_err());

        std::env::set_var("DB_URI", "mongodb://localhost/app");
        std::env::set_var("RETENTION_DAYS", "14");
        std::env::set_var("S3_BUCKET", "archives");
        // Access key and secret missing: the upload block must stay disabled.

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.db_uri, "mongodb://localhost/app");
        assert_eq!(config.retention_days, 14);
        assert_eq!(config.db_name, "database");
        assert_eq!(config.mongodump_bin, "mongodump");
        assert!(config.s3.is_none());
        assert!(config.mail.is_none());
        assert!(config.replica_db_uri.is_none());

        std::env::set_var("S3_ACCESS_KEY", "ak");
        std::env::set_var("S3_SECRET_KEY", "sk");
        std::env::set_var("SMTP_HOST", "smtp.example.com");
        std::env::set_var("ALERT_EMAIL", "ops@example.com");

        let config = AppConfig::from_env().unwrap();
        let s3 = config.s3.expect("upload block enabled");
        assert_eq!(s3.bucket, "archives");
        let mail = config.mail.expect("mail block enabled");
        assert_eq!(mail.port, 587);
        assert_eq!(mail.from, "backup-runner@localhost");

        for key in [
            "DB_URI",
            "RETENTION_DAYS",
            "S3_BUCKET",
            "S3_ACCESS_KEY",
            "S3_SECRET_KEY",
            "SMTP_HOST",
            "ALERT_EMAIL",
        ] {
            std::env::remove_var(key);
        }
    }
}
