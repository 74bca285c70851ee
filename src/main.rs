/// Version injected at compile time via STACKQUERY_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("STACKQUERY_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use serde_json::Value;
use stackquery::config::Config;
use stackquery::openstack::{format_openstack_error, OpenStackClient};
use stackquery::query::output::parse_sort_key;
use stackquery::{Catalogue, Query, QueryError, QueryResults, ResourceLister, RunOptions, RunSettings};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Query OpenStack resources with filters that run server-side where possible
#[derive(Parser, Debug)]
#[command(name = "stackquery", version, about, long_about = None)]
struct Args {
    /// Resource type to list (servers, flavors, hypervisors, aggregates, images, projects, users)
    resource: String,

    /// Filter as PRESET PROPERTY ARGS, e.g. --where equal_to status '{"value":"ACTIVE"}'
    #[arg(
        long = "where",
        num_args = 3,
        value_names = ["PRESET", "PROPERTY", "ARGS"],
        action = ArgAction::Append
    )]
    filters: Vec<String>,

    /// Properties to output (default: all). With --then, properties of the chained resource
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Sort key as PROPERTY or PROPERTY:desc (repeatable, first is most significant)
    #[arg(long = "sort-by")]
    sort_by: Vec<String>,

    /// Group output by the value of a property
    #[arg(long = "group-by")]
    group_by: Option<String>,

    /// Only output these groups
    #[arg(long, value_delimiter = ',', requires = "group_by")]
    groups: Vec<String>,

    /// List from this project (repeatable)
    #[arg(long = "from-project")]
    from_projects: Vec<String>,

    /// List from every project (requires --admin)
    #[arg(long)]
    all_projects: bool,

    /// Run with admin privileges
    #[arg(long)]
    admin: bool,

    /// Identity domain to search
    #[arg(long)]
    from_domain: Option<String>,

    /// Chain the results into a query on another resource type
    #[arg(long)]
    then: Option<String>,

    /// Project the token is scoped to
    #[arg(short, long)]
    project: Option<String>,

    /// Records requested per page
    #[arg(long)]
    page_size: Option<usize>,

    /// Evaluate every filter locally
    #[arg(long)]
    no_server_side_filters: bool,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("stackquery {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("stackquery").join("stackquery.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".stackquery").join("stackquery.log");
    }
    PathBuf::from("stackquery.log")
}

fn build_query(catalogue: &Catalogue, args: &Args) -> Result<Query> {
    let mut query = Query::new(catalogue, &args.resource)?;

    for filter in args.filters.chunks(3) {
        let [preset, property, raw_args] = filter else {
            bail!("--where takes PRESET PROPERTY ARGS");
        };
        let filter_args: Value = serde_json::from_str(raw_args)
            .with_context(|| format!("Filter arguments for '{}' are not valid JSON: {}", property, raw_args))?;
        query.where_filter(preset, property, filter_args)?;
    }

    Ok(query)
}

/// Sorting, selection and grouping of the query whose results are printed
fn shape_output(query: &mut Query, args: &Args) -> Result<()> {
    for key in &args.sort_by {
        let (property, order) = parse_sort_key(key)?;
        query.sort_by(&property, order)?;
    }

    if !args.select.is_empty() {
        let props: Vec<&str> = args.select.iter().map(|s| s.as_str()).collect();
        query.select(&props)?;
    }

    if let Some(property) = &args.group_by {
        query.group_by(property)?;
    }

    Ok(())
}

fn render(results: &QueryResults, args: &Args) -> Result<Value> {
    if results.grouped_by().is_some() {
        let names: Vec<&str> = args.groups.iter().map(|s| s.as_str()).collect();
        return Ok(serde_json::to_value(results.to_grouped_props(&names)?)?);
    }
    Ok(serde_json::to_value(results.to_props())?)
}

/// Run the query described by `args`, following `--then` if given
async fn execute(
    catalogue: &Catalogue,
    args: &Args,
    lister: &dyn ResourceLister,
    settings: &RunSettings,
) -> Result<Value> {
    let mut query = build_query(catalogue, args)?;

    let Some(target) = &args.then else {
        shape_output(&mut query, args)?;
        let results = query.run(lister, settings).await?;
        tracing::info!("{} {} matched", results.len(), results.resource().key);
        return render(&results, args);
    };

    let source = query.run(lister, settings).await?;
    tracing::info!("{} {} matched", source.len(), source.resource().key);

    match source.then(catalogue, target)? {
        Some(mut next) => {
            shape_output(&mut next, args)?;
            let results = next.run(lister, settings).await?;
            tracing::info!("{} {} matched", results.len(), results.resource().key);
            render(&results, args)
        }
        None if args.group_by.is_some() => Ok(Value::Object(Default::default())),
        None => Ok(Value::Array(Vec::new())),
    }
}

fn describe_error(err: &QueryError) -> String {
    match err {
        QueryError::Listing { resource, group, source } => format!(
            "listing '{}' failed (remote group: {}): {}",
            resource,
            group,
            format_openstack_error(source)
        ),
        other => other.to_string(),
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load();
    if let Some(project) = &args.project {
        config.project_id = Some(project.clone());
    }

    let catalogue = Catalogue::builtin()?;
    let client = OpenStackClient::from_config(&config)?;

    let settings = RunSettings {
        page_size: args.page_size.unwrap_or(config.page_size),
        max_concurrency: config.max_concurrency,
        server_side_filters: config.server_side_filters && !args.no_server_side_filters,
        options: RunOptions {
            from_projects: args.from_projects.clone(),
            all_projects: args.all_projects,
            as_admin: args.admin,
            from_domain: args.from_domain.clone(),
        },
        current_project: config.effective_project(),
    };

    let output = execute(&catalogue, &args, &client, &settings).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _log_guard = match setup_logging(args.log_level) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Warning: {err:#}");
            None
        }
    };

    if let Err(err) = run(args).await {
        match err.downcast_ref::<QueryError>() {
            Some(query_err) => eprintln!("Error: {}", describe_error(query_err)),
            None => eprintln!("Error: {err:#}"),
        }
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use stackquery::resource::{PageRequest, ResourceType};
    use std::collections::HashMap;

    /// Returns every record of a resource type in one page, whatever the parameters
    struct FixedLister {
        records: HashMap<&'static str, Vec<Value>>,
    }

    #[async_trait]
    impl ResourceLister for FixedLister {
        async fn list_page(&self, resource: &ResourceType, _: &PageRequest) -> Result<Vec<Value>> {
            Ok(self
                .records
                .get(resource.key.as_str())
                .cloned()
                .unwrap_or_default())
        }
    }

    fn lister() -> FixedLister {
        FixedLister {
            records: HashMap::from([
                (
                    "servers",
                    vec![
                        json!({"id": "s1", "name": "web-1", "flavor": {"id": "f1"}}),
                        json!({"id": "s2", "name": "web-2", "flavor": {"id": "f2"}}),
                    ],
                ),
                (
                    "flavors",
                    vec![
                        json!({"id": "f1", "name": "small", "ram": 1024}),
                        json!({"id": "f2", "name": "large", "ram": 4096}),
                        json!({"id": "f3", "name": "unused", "ram": 4096}),
                    ],
                ),
            ]),
        }
    }

    async fn execute_args(argv: &[&str]) -> Result<Value> {
        let args = Args::parse_from(std::iter::once("stackquery").chain(argv.iter().copied()));
        let catalogue = Catalogue::builtin()?;
        execute(&catalogue, &args, &lister(), &RunSettings::default()).await
    }

    #[tokio::test]
    async fn test_output_options_apply_to_chained_query() {
        let output = execute_args(&["servers", "--then", "flavors", "--select", "name", "--sort-by", "ram:desc"])
            .await
            .unwrap();
        assert_eq!(
            output,
            json!([{"flavor_name": "large"}, {"flavor_name": "small"}])
        );
    }

    #[tokio::test]
    async fn test_filters_apply_to_source_query() {
        let output = execute_args(&[
            "servers",
            "--where",
            "matches_regex",
            "name",
            r#"{"value":"web-2"}"#,
            "--then",
            "flavors",
            "--select",
            "id",
        ])
        .await
        .unwrap();
        assert_eq!(output, json!([{"flavor_id": "f2"}]));
    }

    #[tokio::test]
    async fn test_group_by_output() {
        let output = execute_args(&["flavors", "--group-by", "ram", "--select", "name"])
            .await
            .unwrap();
        assert_eq!(
            output,
            json!({
                "1024": [{"flavor_name": "small"}],
                "4096": [{"flavor_name": "large"}, {"flavor_name": "unused"}]
            })
        );

        let output = execute_args(&["flavors", "--group-by", "ram", "--groups", "1024", "--select", "id"])
            .await
            .unwrap();
        assert_eq!(output, json!({"1024": [{"flavor_id": "f1"}]}));

        let err = execute_args(&["flavors", "--group-by", "ram", "--groups", "512"])
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<QueryError>(), Some(QueryError::InvalidGroups(_))));
    }

    #[test]
    fn test_groups_require_group_by() {
        let parsed = Args::try_parse_from(["stackquery", "flavors", "--groups", "1024"]);
        assert!(parsed.is_err());
    }
}
