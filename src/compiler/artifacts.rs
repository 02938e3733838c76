//! Notebook ConfigMaps
//!
//! The startup script and bash profile are identical for every notebook; only
//! the notebook config is parameterized, carrying the access token and the
//! base URL the server is routed under.

use std::collections::BTreeMap;

use super::NotebookNames;
use crate::token::AccessToken;
use crate::workload::{ConfigMap, ObjectMeta};
use crate::Error;

/// Data key of the bash profile
pub const PROFILE_KEY: &str = ".bash_profile";

/// Data key of the startup script
pub const STARTUP_KEY: &str = "start.sh";

/// Data key of the notebook config
pub const CONFIG_KEY: &str = "jupyter_notebook_config.json";

/// Container startup script
///
/// Runs with the project directory mounted at `/home/jovyan` and HOME set to
/// a per-notebook directory beneath it. It rewrites `~/.bashrc` on every
/// start, copies the profile and notebook config into HOME on first start,
/// then launches JupyterLab.
pub const STARTUP_SCRIPT: &str = r#"#!/bin/bash
echo "PS1='\$(pwd) \$UID$ '" > ~/.bashrc
echo "umask 0002" >> ~/.bashrc
conda init
source ~/.bashrc

if [ ! -f ~/.bash_profile ]; then
    echo "Copying bash_profile into place"
    cp /etc/.bash_profile ~
fi

if [ ! -f ~/jupyter_notebook_config.json ]; then
    echo "Copying config into place"
    cp /etc/jupyter_notebook_config.json ~
fi

jupyter lab --config=~/jupyter_notebook_config.json
"#;

/// Bash profile; just sources `~/.bashrc`
pub const BASH_PROFILE: &str = r#"if [ -f ~/.bashrc ]; then
    source ~/.bashrc
fi
"#;

/// The three ConfigMaps of a notebook
#[derive(Clone, Debug, PartialEq)]
pub struct NotebookArtifacts {
    /// Bash profile
    pub profile: ConfigMap,
    /// Startup script
    pub startup: ConfigMap,
    /// Notebook config with the access token
    pub config: ConfigMap,
}

/// Compose the notebook's ConfigMaps
pub fn compose_artifacts(
    names: &NotebookNames,
    namespace: &str,
    token: &AccessToken,
) -> Result<NotebookArtifacts, Error> {
    let meta = |name: &str| ObjectMeta::new(name, namespace, names.notebook.as_str());

    Ok(NotebookArtifacts {
        profile: ConfigMap::new(meta(&names.profile)).with_data(PROFILE_KEY, BASH_PROFILE),
        startup: ConfigMap::new(meta(&names.startup)).with_data(STARTUP_KEY, STARTUP_SCRIPT),
        config: ConfigMap::new(meta(&names.config))
            .with_data(CONFIG_KEY, notebook_config(token, &names.notebook)?),
    })
}

/// Render the notebook server config
pub fn notebook_config(token: &AccessToken, base_url: &str) -> Result<String, Error> {
    let config = serde_json::json!({
        "NotebookApp": {
            "token": token.as_str(),
            "base_url": base_url,
        }
    });
    Ok(serde_json::to_string_pretty(&config)?)
}

/// Read the access token back out of a notebook config ConfigMap's data
pub fn token_from_config(data: &BTreeMap<String, String>) -> Option<AccessToken> {
    let config: serde_json::Value = serde_json::from_str(data.get(CONFIG_KEY)?).ok()?;
    config["NotebookApp"]["token"]
        .as_str()
        .filter(|t| !t.is_empty())
        .map(AccessToken::from_existing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> AccessToken {
        AccessToken::from_existing("aBcDeFgHiJkLmN01")
    }

    #[test]
    fn artifacts_are_named_per_notebook() {
        let artifacts = compose_artifacts(&NotebookNames::new("nb"), "ns", &token()).unwrap();
        assert_eq!(artifacts.profile.metadata.name, "bp-nb");
        assert_eq!(artifacts.startup.metadata.name, "startup-nb");
        assert_eq!(artifacts.config.metadata.name, "config-nb");
    }

    #[test]
    fn shared_templates_are_not_parameterized() {
        let a = compose_artifacts(&NotebookNames::new("one"), "ns", &token()).unwrap();
        let b = compose_artifacts(&NotebookNames::new("two"), "ns", &token()).unwrap();
        assert_eq!(a.startup.data, b.startup.data);
        assert_eq!(a.profile.data, b.profile.data);
        assert_eq!(a.startup.data[STARTUP_KEY], STARTUP_SCRIPT);
        assert_eq!(a.profile.data[PROFILE_KEY], BASH_PROFILE);
    }

    #[test]
    fn config_embeds_token_and_base_url() {
        let artifacts = compose_artifacts(&NotebookNames::new("nb"), "ns", &token()).unwrap();
        let config: serde_json::Value =
            serde_json::from_str(&artifacts.config.data[CONFIG_KEY]).unwrap();
        assert_eq!(config["NotebookApp"]["token"], "aBcDeFgHiJkLmN01");
        assert_eq!(config["NotebookApp"]["base_url"], "nb");
    }

    #[test]
    fn token_round_trips_through_config_data() {
        let artifacts = compose_artifacts(&NotebookNames::new("nb"), "ns", &token()).unwrap();
        assert_eq!(token_from_config(&artifacts.config.data), Some(token()));
    }

    #[test]
    fn token_recovery_rejects_foreign_data() {
        assert_eq!(token_from_config(&BTreeMap::new()), None);

        let mut data = BTreeMap::new();
        data.insert(CONFIG_KEY.to_string(), "not json".to_string());
        assert_eq!(token_from_config(&data), None);

        data.insert(
            CONFIG_KEY.to_string(),
            r#"{"NotebookApp": {"token": ""}}"#.to_string(),
        );
        assert_eq!(token_from_config(&data), None);
    }

    #[test]
    fn startup_script_launches_with_copied_config() {
        assert!(STARTUP_SCRIPT.starts_with("#!/bin/bash"));
        assert!(STARTUP_SCRIPT.contains("cp /etc/jupyter_notebook_config.json ~"));
        assert!(STARTUP_SCRIPT.contains("jupyter lab --config=~/jupyter_notebook_config.json"));
    }
}
