//! Invocations of the external dump/restore tools.

use crate::config::AppConfig;
use crate::error::ToolError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Collections restored in parallel when replicating.
const RESTORE_PARALLELISM: u32 = 4;

/// Dump the source database into a single compressed archive file.
pub async fn dump_to_archive(config: &AppConfig, archive: &Path) -> Result<(), ToolError> {
    let output = Command::new(&config.mongodump_bin)
        .arg("--uri")
        .arg(&config.db_uri)
        .arg(format!("--archive={}", archive.display()))
        .arg("--gzip")
        .output()
        .await
        .map_err(|e| ToolError::Launch {
            tool: config.mongodump_bin.clone(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(ToolError::Failed {
            tool: config.mongodump_bin.clone(),
            status: output.status,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(())
}

/// Stream a fresh dump of the source straight into a restore against the
/// secondary cluster, dropping and replacing the target collections.
pub async fn replicate(config: &AppConfig, replica_uri: &str) -> Result<(), ToolError> {
    let mut dump = Command::new(&config.mongodump_bin)
        .arg("--uri")
        .arg(&config.db_uri)
        .arg("--archive")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ToolError::Launch {
            tool: config.mongodump_bin.clone(),
            source: e,
        })?;

    let pipe: Stdio = dump
        .stdout
        .take()
        .expect("stdout was piped")
        .try_into()
        .map_err(|e| ToolError::Launch {
            tool: config.mongorestore_bin.clone(),
            source: e,
        })?;

    let restore = Command::new(&config.mongorestore_bin)
        .arg("--uri")
        .arg(replica_uri)
        .arg("--archive")
        .arg("--drop")
        .arg(format!("--numParallelCollections={}", RESTORE_PARALLELISM))
        .stdin(pipe)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    // Drive both ends of the pipe to completion.
    let (restore_out, dump_out) = tokio::join!(restore, dump.wait_with_output());

    let dump_out = dump_out.map_err(|e| ToolError::Launch {
        tool: config.mongodump_bin.clone(),
        source: e,
    })?;
    if !dump_out.status.success() {
        return Err(ToolError::Failed {
            tool: config.mongodump_bin.clone(),
            status: dump_out.status,
            detail: String::from_utf8_lossy(&dump_out.stderr).trim().to_string(),
        });
    }

    let restore_out = restore_out.map_err(|e| ToolError::Launch {
        tool: config.mongorestore_bin.clone(),
        source: e,
    })?;
    if !restore_out.status.success() {
        let mut detail = String::from_utf8_lossy(&restore_out.stderr).trim().to_string();
        if detail.is_empty() {
            detail = String::from_utf8_lossy(&restore_out.stdout).trim().to_string();
        }
        return Err(ToolError::Failed {
            tool: config.mongorestore_bin.clone(),
            status: restore_out.status,
            detail,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().to_string()
    }

    fn test_config(dump_bin: &str, restore_bin: &str) -> AppConfig {
        AppConfig {
            db_uri: "mongodb://localhost/app".into(),
            replica_db_uri: None,
            db_name: "app".into(),
            backup_root: PathBuf::from("/tmp/unused"),
            retention_days: 7,
            mongodump_bin: dump_bin.into(),
            mongorestore_bin: restore_bin.into(),
            log_level: "info".into(),
            s3: None,
            mail: None,
        }
    }

    #[tokio::test]
    async fn test_dump_writes_archive() {
        let tmp = TempDir::new().unwrap();
        let dump_bin = write_script(
            tmp.path(),
            "mongodump",
            "#!/bin/sh\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    --archive=*) : > \"${arg#--archive=}\" ;;\n  esac\ndone\nexit 0\n",
        );
        let config = test_config(&dump_bin, "mongorestore");
        let archive = tmp.path().join("backup.gz");

        dump_to_archive(&config, &archive).await.unwrap();
        assert!(archive.exists());
    }

    #[tokio::test]
    async fn test_dump_failure_surfaces_stderr() {
        let tmp = TempDir::new().unwrap();
        let dump_bin = write_script(
            tmp.path(),
            "mongodump",
            "#!/bin/sh\necho \"connection refused\" >&2\nexit 1\n",
        );
        let config = test_config(&dump_bin, "mongorestore");

        let err = dump_to_archive(&config, &tmp.path().join("backup.gz"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_dump_missing_tool_is_launch_error() {
        let config = test_config("/nonexistent/mongodump", "mongorestore");
        let err = dump_to_archive(&config, Path::new("/tmp/backup.gz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_replicate_pipes_dump_into_restore() {
        let tmp = TempDir::new().unwrap();
        let received = tmp.path().join("received");
        let dump_bin = write_script(tmp.path(), "mongodump", "#!/bin/sh\necho payload\n");
        let restore_bin = write_script(
            tmp.path(),
            "mongorestore",
            &format!("#!/bin/sh\ncat > {}\nexit 0\n", received.display()),
        );
        let config = test_config(&dump_bin, &restore_bin);

        replicate(&config, "mongodb://replica/app").await.unwrap();
        assert_eq!(std::fs::read_to_string(&received).unwrap(), "payload\n");
    }

    #[tokio::test]
    async fn test_replicate_restore_failure_surfaces_stderr() {
        let tmp = TempDir::new().unwrap();
        let dump_bin = write_script(tmp.path(), "mongodump", "#!/bin/sh\necho payload\n");
        let restore_bin = write_script(
            tmp.path(),
            "mongorestore",
            "#!/bin/sh\ncat > /dev/null\necho \"replica out of space\" >&2\nexit 2\n",
        );
        let config = test_config(&dump_bin, &restore_bin);

        let err = replicate(&config, "mongodb://replica/app").await.unwrap_err();
        assert!(err.to_string().contains("replica out of space"));
    }

    #[tokio::test]
    async fn test_replicate_dump_failure_wins_over_restore() {
        let tmp = TempDir::new().unwrap();
        let dump_bin = write_script(
            tmp.path(),
            "mongodump",
            "#!/bin/sh\necho \"dump died\" >&2\nexit 1\n",
        );
        let restore_bin = write_script(tmp.path(), "mongorestore", "#!/bin/sh\ncat > /dev/null\nexit 0\n");
        let config = test_config(&dump_bin, &restore_bin);

        let err = replicate(&config, "mongodb://replica/app").await.unwrap_err();
        assert!(err.to_string().contains("dump died"));
    }
}
