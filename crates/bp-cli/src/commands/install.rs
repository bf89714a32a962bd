//! The install command

use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressDrawTarget};

use bp_core::config::{load_push_config, PushConfig};
use bp_core::{Credentials, Target, UploadJob};
use bp_transport::SshConnector;
use bp_uploader::{RebootState, Uploader};

/// Operator input for one install run
#[derive(Debug, Clone, Default)]
pub struct InstallArgs {
    pub target: String,
    pub bundles: Vec<PathBuf>,
    pub user: Option<String>,
    /// Password from the flag or its environment variable
    pub pass: Option<String>,
    pub reboot: bool,
    pub only_bundles: bool,
    /// Hide progress bars
    pub quiet: bool,
}

impl InstallArgs {
    /// Layer command-line values over the loaded configuration
    pub fn apply(&self, config: &mut PushConfig) {
        if let Some(user) = &self.user {
            config.user = user.clone();
        }
        if let Some(pass) = &self.pass {
            config.password = pass.clone();
        }
        if self.only_bundles {
            config.only_bundles = true;
        }
    }
}

/// Push every bundle in `args` to the target device
pub async fn install_command(config_path: Option<&Path>, args: InstallArgs) -> Result<()> {
    let mut config = load_push_config(config_path)?;
    args.apply(&mut config);
    tracing::debug!("Effective configuration: {:?}", config.redacted());

    let target = Target::parse(&args.target)?;
    let job = UploadJob::new(
        target.clone(),
        Credentials::password(&config.user, &config.password),
        args.bundles.clone(),
    )
    .with_reboot(args.reboot);

    let progress = if args.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };

    let connector = SshConnector::from_config(&config);
    let report = Uploader::new(job, connector, config)
        .with_progress(progress)
        .run()
        .await?;

    let suffix = match report.reboot {
        RebootState::NotRequested => String::new(),
        state => format!(", reboot {}", state),
    };
    tracing::info!(
        "Installed {} bundle(s) on {}{}",
        report.installed.len(),
        target,
        suffix
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = PushConfig {
            user: "admin".to_string(),
            password: "from-file".to_string(),
            ..PushConfig::default()
        };
        let args = InstallArgs {
            pass: Some("from-flag".to_string()),
            only_bundles: true,
            ..InstallArgs::default()
        };

        args.apply(&mut config);

        assert_eq!(config.user, "admin");
        assert_eq!(config.password, "from-flag");
        assert!(config.only_bundles);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = PushConfig {
            only_bundles: true,
            ..PushConfig::default()
        };
        InstallArgs::default().apply(&mut config);

        assert_eq!(config, PushConfig {
            only_bundles: true,
            ..PushConfig::default()
        });
    }
}
