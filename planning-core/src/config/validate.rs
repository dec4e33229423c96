//! Structural validation of the settings.

use std::collections::HashSet;

use url::Url;

use super::{BranchSettings, GroupSettings, Settings};
use crate::error::ConfigError;
use crate::store::CUSTOM_BRANCH;

const MAX_BRANCH_NAME_LEN: usize = 46;
const MAX_GROUP_NAME_LEN: usize = 10;

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.updater.frequency == Some(0) {
            return Err(ConfigError::invalid(
                "updater.frequency",
                "must be a positive number of seconds",
            ));
        }
        if self.updater.download_attempts == 0 {
            return Err(ConfigError::invalid(
                "updater.download_attempts",
                "at least one attempt is required",
            ));
        }
        if self.database.name.trim().is_empty() {
            return Err(ConfigError::invalid("database.name", "must not be empty"));
        }

        let mut branch_names = HashSet::new();
        for (i, branch) in self.branches.iter().enumerate() {
            let path = format!("branches[{i}]");
            validate_branch(&path, branch)?;
            if !branch_names.insert(branch.name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("{path}.name"),
                    format!("branch '{}' already exists", branch.name),
                ));
            }
        }

        Ok(())
    }
}

fn validate_branch(path: &str, branch: &BranchSettings) -> Result<(), ConfigError> {
    let name = &branch.name;
    if name.is_empty() || name.len() > MAX_BRANCH_NAME_LEN {
        return Err(ConfigError::invalid(
            format!("{path}.name"),
            format!("must be 1 to {MAX_BRANCH_NAME_LEN} characters long"),
        ));
    }
    // Branch names end up in collection names.
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::invalid(
            format!("{path}.name"),
            format!("'{name}' must be alphanumeric"),
        ));
    }
    if name == CUSTOM_BRANCH {
        return Err(ConfigError::invalid(
            format!("{path}.name"),
            format!("'{name}' is reserved for hand-entered events"),
        ));
    }
    if branch.parser.delimiter.is_empty() {
        return Err(ConfigError::invalid(
            format!("{path}.parser.delimiter"),
            "must not be empty",
        ));
    }
    if branch.groups.is_empty() {
        return Err(ConfigError::invalid(
            format!("{path}.groups"),
            "at least one group is required",
        ));
    }

    let mut group_names = HashSet::new();
    for (j, group) in branch.groups.iter().enumerate() {
        let group_path = format!("{path}.groups[{j}]");
        validate_group(&group_path, group)?;
        if !group_names.insert(group.name.as_str()) {
            return Err(ConfigError::invalid(
                format!("{group_path}.name"),
                format!("group '{}' already exists", group.name),
            ));
        }
    }

    Ok(())
}

fn validate_group(path: &str, group: &GroupSettings) -> Result<(), ConfigError> {
    let len = group.name.chars().count();
    if len == 0 || len > MAX_GROUP_NAME_LEN {
        return Err(ConfigError::invalid(
            format!("{path}.name"),
            format!("must be 1 to {MAX_GROUP_NAME_LEN} characters long"),
        ));
    }
    if group.addresses.is_empty() {
        return Err(ConfigError::invalid(
            format!("{path}.addresses"),
            "at least one address is required",
        ));
    }
    for (k, address) in group.addresses.iter().enumerate() {
        let valid = Url::parse(address)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        if !valid {
            return Err(ConfigError::invalid(
                format!("{path}.addresses[{k}]"),
                format!("'{address}' is not an http(s) URL"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::Settings;
    use crate::error::ConfigError;

    fn settings_with(branches: &str) -> String {
        format!(
            r#"{{
                "updater": {{ "error_tolerance": 0 }},
                "database": {{ "name": "planning" }},
                "branches": {branches}
            }}"#
        )
    }

    fn invalid_path(content: &str) -> String {
        match Settings::from_json(content) {
            Err(ConfigError::Invalid { path, .. }) => path,
            other => panic!("Expected an invalid value, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_branch_names_are_rejected() {
        let content = settings_with(
            r#"[
                { "name": "info", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": ["http://a.test/x.ics"] } ] },
                { "name": "info", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": ["http://a.test/x.ics"] } ] }
            ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[1].name");
    }

    #[test]
    fn test_branch_name_must_be_alphanumeric() {
        let content = settings_with(
            r#"[ { "name": "in-fo", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": ["http://a.test/x.ics"] } ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].name");
    }

    #[test]
    fn test_custom_branch_name_is_reserved() {
        let content = settings_with(
            r#"[ { "name": "custom", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": ["http://a.test/x.ics"] } ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].name");
    }

    #[test]
    fn test_branch_name_length_is_bounded() {
        let name = "b".repeat(47);
        let content = settings_with(&format!(
            r#"[ {{ "name": "{name}", "parser": {{ "mode": "ENT" }}, "groups": [ {{ "name": "g1", "addresses": ["http://a.test/x.ics"] }} ] }} ]"#
        ));
        assert_eq!(invalid_path(&content), "branches[0].name");
    }

    #[test]
    fn test_group_name_length_is_bounded() {
        let content = settings_with(
            r#"[ { "name": "info", "parser": { "mode": "ENT" }, "groups": [ { "name": "waytoolonggroup", "addresses": ["http://a.test/x.ics"] } ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].groups[0].name");
    }

    #[test]
    fn test_duplicate_group_names_are_rejected() {
        let content = settings_with(
            r#"[ { "name": "info", "parser": { "mode": "ENT" }, "groups": [
                { "name": "g1", "addresses": ["http://a.test/x.ics"] },
                { "name": "g1", "addresses": ["http://a.test/y.ics"] }
            ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].groups[1].name");
    }

    #[test]
    fn test_addresses_must_be_http_urls() {
        let content = settings_with(
            r#"[ { "name": "info", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": ["ftp://a.test/x.ics"] } ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].groups[0].addresses[0]");
    }

    #[test]
    fn test_empty_address_list_is_rejected() {
        let content = settings_with(
            r#"[ { "name": "info", "parser": { "mode": "ENT" }, "groups": [ { "name": "g1", "addresses": [] } ] } ]"#,
        );
        assert_eq!(invalid_path(&content), "branches[0].groups[0].addresses");
    }

    #[test]
    fn test_zero_frequency_is_rejected() {
        let content = r#"{
            "updater": { "frequency": 0, "error_tolerance": 0 },
            "database": { "name": "planning" },
            "branches": []
        }"#;
        assert_eq!(invalid_path(content), "updater.frequency");
    }
}
