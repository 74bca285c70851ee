//! Run-time meta-parameters
//!
//! Options such as "list from these projects" are turned into listing
//! parameters once, before any call, according to the resource's [`Scope`].

use crate::error::{QueryError, QueryResult};
use crate::filter::RemoteFilterGroup;
use crate::resource::{ResourceType, Scope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Caller-supplied scoping options for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub from_projects: Vec<String>,
    pub all_projects: bool,
    pub as_admin: bool,
    pub from_domain: Option<String>,
}

/// One listing per value of `param`
#[derive(Debug, Clone, PartialEq)]
pub struct FanOut {
    pub param: String,
    pub values: Vec<String>,
    /// Derived from the session rather than asked for by the caller
    pub implicit: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaParams {
    /// Added to every listing call
    pub fixed: RemoteFilterGroup,
    pub fan_out: Option<FanOut>,
}

impl MetaParams {
    /// Combine the plan's remote groups with these meta-parameters, giving the
    /// parameters of every listing call to issue.
    pub fn expand(&self, groups: &[RemoteFilterGroup]) -> QueryResult<Vec<RemoteFilterGroup>> {
        let unfiltered = [RemoteFilterGroup::new()];
        let groups = if groups.is_empty() { &unfiltered[..] } else { groups };

        let mut calls = Vec::new();
        for group in groups {
            if let Some(key) = self.fixed.keys().find(|k| group.contains_key(*k)) {
                return Err(QueryError::meta(format!(
                    "filter parameter '{}' conflicts with a run option",
                    key
                )));
            }

            let mut base = group.clone();
            base.extend(self.fixed.iter().map(|(k, v)| (k.clone(), v.clone())));

            match &self.fan_out {
                Some(fan_out) if group.contains_key(&fan_out.param) => {
                    if !fan_out.implicit {
                        return Err(QueryError::meta(format!(
                            "filter parameter '{}' conflicts with the requested projects",
                            fan_out.param
                        )));
                    }
                    // the filter already scopes the listing
                    calls.push(base);
                }
                Some(fan_out) => {
                    for value in &fan_out.values {
                        let mut call = base.clone();
                        call.insert(fan_out.param.clone(), Value::String(value.clone()));
                        calls.push(call);
                    }
                }
                None => calls.push(base),
            }
        }
        Ok(calls)
    }
}

/// Resolve run options into meta-parameters for `resource`
pub fn parse_meta_params(
    resource: &ResourceType,
    options: &RunOptions,
    current_project: Option<&str>,
) -> QueryResult<MetaParams> {
    match resource.scope() {
        Scope::Unscoped => {
            if !options.from_projects.is_empty() || options.all_projects || options.from_domain.is_some() {
                warn!("{}: project and domain options do not apply, ignoring them", resource.key);
            }
            Ok(MetaParams::default())
        }
        Scope::Domain {
            domain_param,
            default_domain,
        } => {
            if !options.from_projects.is_empty() || options.all_projects {
                warn!("{}: project options do not apply, ignoring them", resource.key);
            }
            let domain = options.from_domain.as_deref().unwrap_or(default_domain);
            Ok(MetaParams {
                fixed: RemoteFilterGroup::from([(domain_param.clone(), Value::String(domain.to_string()))]),
                fan_out: None,
            })
        }
        Scope::Projects {
            project_param,
            all_projects_param,
        } => {
            if options.from_domain.is_some() {
                warn!("{}: domain option does not apply, ignoring it", resource.key);
            }
            if !options.from_projects.is_empty() && options.all_projects {
                return Err(QueryError::meta(
                    "query is ambiguous: give either specific projects or all projects, not both",
                ));
            }
            if options.all_projects && !options.as_admin {
                return Err(QueryError::meta(
                    "listing from all projects requires running as admin",
                ));
            }

            let admin_fixed = || match all_projects_param {
                Some(param) if options.as_admin => {
                    RemoteFilterGroup::from([(param.clone(), Value::Bool(true))])
                }
                _ => RemoteFilterGroup::new(),
            };

            if options.all_projects {
                return Ok(MetaParams {
                    fixed: admin_fixed(),
                    fan_out: None,
                });
            }

            if !options.from_projects.is_empty() {
                let mut values: Vec<String> = Vec::new();
                for project in &options.from_projects {
                    if !values.contains(project) {
                        values.push(project.clone());
                    }
                }
                return Ok(MetaParams {
                    fixed: admin_fixed(),
                    fan_out: Some(FanOut {
                        param: project_param.clone(),
                        values,
                        implicit: false,
                    }),
                });
            }

            Ok(MetaParams {
                fixed: RemoteFilterGroup::new(),
                fan_out: current_project.map(|project| FanOut {
                    param: project_param.clone(),
                    values: vec![project.to_string()],
                    implicit: true,
                }),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Catalogue;
    use serde_json::json;

    fn options() -> RunOptions {
        RunOptions::default()
    }

    #[test]
    fn test_servers_default_to_current_project() {
        let catalogue = Catalogue::builtin().unwrap();
        let servers = catalogue.resource("servers").unwrap();
        let meta = parse_meta_params(&servers, &options(), Some("p0")).unwrap();
        let calls = meta.expand(&[]).unwrap();
        assert_eq!(calls, vec![RemoteFilterGroup::from([("project_id".to_string(), json!("p0"))])]);
    }

    #[test]
    fn test_servers_from_projects_as_admin() {
        let catalogue = Catalogue::builtin().unwrap();
        let servers = catalogue.resource("servers").unwrap();
        let opts = RunOptions {
            from_projects: vec!["p1".into(), "p2".into(), "p1".into()],
            as_admin: true,
            ..options()
        };
        let meta = parse_meta_params(&servers, &opts, Some("p0")).unwrap();
        let groups = vec![RemoteFilterGroup::from([("status".to_string(), json!("ACTIVE"))])];
        let calls = meta.expand(&groups).unwrap();
        assert_eq!(calls.len(), 2);
        for (call, project) in calls.iter().zip(["p1", "p2"]) {
            assert_eq!(call["project_id"], json!(project));
            assert_eq!(call["all_tenants"], json!(true));
            assert_eq!(call["status"], json!("ACTIVE"));
        }
    }

    #[test]
    fn test_all_projects_rules() {
        let catalogue = Catalogue::builtin().unwrap();
        let servers = catalogue.resource("servers").unwrap();

        let ambiguous = RunOptions {
            from_projects: vec!["p1".into()],
            all_projects: true,
            as_admin: true,
            ..options()
        };
        assert!(matches!(
            parse_meta_params(&servers, &ambiguous, None),
            Err(QueryError::InvalidMetaParams(_))
        ));

        let not_admin = RunOptions {
            all_projects: true,
            ..options()
        };
        assert!(parse_meta_params(&servers, &not_admin, None).is_err());

        let admin = RunOptions {
            all_projects: true,
            as_admin: true,
            ..options()
        };
        let meta = parse_meta_params(&servers, &admin, Some("p0")).unwrap();
        assert_eq!(meta.expand(&[]).unwrap(), vec![RemoteFilterGroup::from([("all_tenants".to_string(), json!(true))])]);
    }

    #[test]
    fn test_explicit_projects_conflict_with_project_filter() {
        let catalogue = Catalogue::builtin().unwrap();
        let servers = catalogue.resource("servers").unwrap();
        let groups = vec![RemoteFilterGroup::from([("project_id".to_string(), json!("p9"))])];

        let explicit = RunOptions {
            from_projects: vec!["p1".into()],
            ..options()
        };
        let meta = parse_meta_params(&servers, &explicit, None).unwrap();
        assert!(matches!(meta.expand(&groups), Err(QueryError::InvalidMetaParams(_))));

        let implicit = parse_meta_params(&servers, &options(), Some("p0")).unwrap();
        assert_eq!(implicit.expand(&groups).unwrap(), groups);
    }

    #[test]
    fn test_users_domain_scope() {
        let catalogue = Catalogue::builtin().unwrap();
        let users = catalogue.resource("users").unwrap();
        let meta = parse_meta_params(&users, &options(), None).unwrap();
        assert_eq!(meta.fixed["domain_id"], json!("default"));

        let opts = RunOptions {
            from_domain: Some("stfc".into()),
            ..options()
        };
        let meta = parse_meta_params(&users, &opts, None).unwrap();
        assert_eq!(meta.fixed["domain_id"], json!("stfc"));

        let groups = vec![RemoteFilterGroup::from([("domain_id".to_string(), json!("x"))])];
        assert!(meta.expand(&groups).is_err());
    }

    #[test]
    fn test_unscoped_ignores_options() {
        let catalogue = Catalogue::builtin().unwrap();
        let flavors = catalogue.resource("flavors").unwrap();
        let opts = RunOptions {
            from_projects: vec!["p1".into()],
            ..options()
        };
        let meta = parse_meta_params(&flavors, &opts, Some("p0")).unwrap();
        assert_eq!(meta, MetaParams::default());
        assert_eq!(meta.expand(&[]).unwrap(), vec![RemoteFilterGroup::new()]);
    }
}
