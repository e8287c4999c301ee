use std::fmt::Debug;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use fieldx::fxstruct;
use fieldx_plus::fx_plus;
use garde::Validate;
use serde_json::json;
use tracing::info;
use tracing::instrument;

use crate::aggregator::Aggregator;
use crate::aggregator::Records;
use crate::catalogue::Catalogue;
use crate::clock::Clock;
use crate::clock::ManualClock;
use crate::clock::SystemClock;
use crate::error::Result;
use crate::error::VizError;
use crate::generator::RecordGenerator;
use crate::generator::DEFAULT_SEED;
use crate::report::sidebar_table;
use crate::report::DashboardView;
use crate::summary::category_badge;
use crate::summary::QuickStats;

const ALL_CATEGORIES: &str = "All Categories";

#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, name = "vizcount")]
pub(crate) struct Cli {
    /// Category to show. Repeat for several; all categories are shown together when omitted.
    #[clap(long, short, env = "VIZCOUNT_CATEGORY", value_delimiter = ',')]
    #[fieldx(get(clone))]
    #[garde(inner(length(min = 1)))]
    category: Vec<String>,

    /// JSON catalogue file replacing the built-in product list.
    #[clap(long, env = "VIZCOUNT_CATALOGUE")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    catalogue: Option<PathBuf>,

    /// Seed of the mock inventory generator.
    #[clap(long, env = "VIZCOUNT_SEED", default_value_t = DEFAULT_SEED)]
    #[garde(skip)]
    seed: u64,

    /// How long, in seconds, generated inventory is reused.
    #[clap(long, env = "VIZCOUNT_TTL", default_value_t = 60)]
    #[garde(range(min = 1))]
    ttl: u64,

    /// Print the dashboard as JSON instead of tables.
    #[clap(long, env = "VIZCOUNT_JSON", default_value_t = false)]
    #[garde(skip)]
    json: bool,

    /// Pin the calendar date, YYYY-MM-DD. Defaults to the local date.
    #[clap(long, env = "VIZCOUNT_TODAY")]
    #[garde(skip)]
    today: Option<NaiveDate>,

    /// File to send log into
    #[clap(long, env = "VIZCOUNT_LOG_FILE")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    log_file: Option<PathBuf>,
}

/// The `vizcount` terminal dashboard.
#[fx_plus(
    app,
    rc,
    new(private),
    sync,
    get,
    fallible(off, error(VizError)),
    builder(vis(pub))
)]
pub struct DashboardApp {
    #[fieldx(inner_mut, clearer, builder("_cli_args"))]
    cli_args: Vec<String>,

    #[fieldx(lazy, private, fallible(error(clap::Error)), get(clone))]
    cli: Cli,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    clock: Arc<dyn Clock>,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    catalogue: Arc<Catalogue>,

    #[fieldx(lazy, fallible, get(clone), builder(off))]
    aggregator: Arc<Aggregator>,
}

impl DashboardApp {
    fn build_cli(&self) -> Result<Cli, clap::Error> {
        Ok(if let Some(custom_args) = self.clear_cli_args() {
            Cli::try_parse_from(custom_args.into_iter())?
        }
        else {
            Cli::try_parse()?
        })
    }

    fn build_clock(&self) -> Result<Arc<dyn Clock>> {
        Ok(match self.cli()?.today() {
            Some(today) => Arc::new(ManualClock::new(today)),
            None => Arc::new(SystemClock),
        })
    }

    fn build_catalogue(&self) -> Result<Arc<Catalogue>> {
        Ok(Arc::new(match self.cli()?.catalogue() {
            Some(path) => Catalogue::load(&path)?,
            None => Catalogue::default(),
        }))
    }

    fn build_aggregator(&self) -> Result<Arc<Aggregator>> {
        let cli = self.cli()?;
        Ok(Arc::new(
            Aggregator::builder()
                .generator(
                    RecordGenerator::builder()
                        .catalogue(self.catalogue()?)
                        .seed(cli.seed())
                        .build()?,
                )
                .clock(self.clock()?)
                .ttl(Duration::from_secs(cli.ttl()))
                .build()?,
        ))
    }

    fn validate(&self) -> Result<()> {
        if let Err(err) = self.cli()?.validate() {
            let mut cmd = Cli::command();
            return Err(cmd.error(ErrorKind::InvalidValue, err).into());
        }

        Ok(())
    }

    fn setup_tracing(&self) -> Result<()> {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let cli = self.cli()?;

        let (dest_writer, ansi) = if let Some(log_file) = cli.log_file() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(log_file)?;
            (Box::new(file) as Box<dyn io::Write + Send>, false)
        }
        else {
            (Box::new(io::stderr()) as Box<dyn io::Write + Send>, true)
        };

        let tracing_registry = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(dest_writer))
                    .with_ansi(ansi),
            );

        // Only the first app of a process gets to install the subscriber.
        if tracing_registry.try_init().is_ok() {
            info!("Tracing initialized");
        }

        Ok(())
    }

    /// Records of the requested selection, one `(title, records)` pair per view.
    async fn views(&self) -> Result<Vec<(String, Records)>> {
        let aggregator = self.aggregator()?;
        let categories = self.cli()?.category();

        if categories.is_empty() {
            return Ok(vec![(ALL_CATEGORIES.to_string(), aggregator.get_all().await?)]);
        }

        let mut views = Vec::with_capacity(categories.len());
        for category in categories {
            let records = aggregator.get_category(&category).await?;
            views.push((category, records));
        }
        Ok(views)
    }

    /// Per-category badges in catalogue order, plus the quick stats over all records.
    async fn sidebar(&self) -> Result<(Vec<(String, Records)>, QuickStats)> {
        let aggregator = self.aggregator()?;
        let mut per_category = Vec::new();
        for name in aggregator.catalogue().category_names() {
            per_category.push((name.to_string(), aggregator.get_category(name).await?));
        }
        Ok((per_category, QuickStats::from_records(&aggregator.get_all().await?)))
    }

    /// The whole dashboard as it is printed.
    #[instrument(level = "debug", skip(self))]
    pub async fn render(&self) -> Result<String> {
        let views = self.views().await?;
        let (per_category, quick_stats) = self.sidebar().await?;

        if self.cli()?.json() {
            let views = views
                .iter()
                .map(|(title, records)| DashboardView::new(title.as_str(), records))
                .collect::<Vec<_>>();
            let badges = per_category
                .iter()
                .map(|(name, records)| json!({ "category": name, "alerts": category_badge(records) }))
                .collect::<Vec<_>>();

            return Ok(serde_json::to_string_pretty(&json!({
                "views": views,
                "sidebar": { "categories": badges, "quick_stats": quick_stats },
            }))?);
        }

        let mut sections = vec![sidebar_table(
            per_category
                .iter()
                .map(|(name, records)| (name.as_str(), records.as_slice())),
            &quick_stats,
        )
        .to_string()];
        for (title, records) in &views {
            sections.push(DashboardView::new(title.as_str(), records).render());
        }

        Ok(sections.join("\n\n"))
    }

    pub async fn execute(&self) -> Result<()> {
        if let Err(err) = self.cli() {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    err.print()?;
                    Ok(())
                }
                _ => Err(err.into()),
            };
        }

        self.validate()?;
        self.setup_tracing()?;

        let output = self.render().await?;
        println!("{output}");

        Ok(())
    }

    pub async fn run() -> Result<()> {
        DashboardApp::__fieldx_new().execute().await
    }
}

impl DashboardAppBuilder {
    pub fn cli_args<S: ToString>(self, args: Vec<S>) -> Self {
        self._cli_args(args.into_iter().map(|s| s.to_string()).collect())
    }
}

impl Debug for DashboardApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DashboardApp {{ ... }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(args: &[&str]) -> Arc<DashboardApp> {
        let mut cli_args = vec!["vizcount", "--today", "2025-03-03"];
        cli_args.extend_from_slice(args);
        DashboardApp::builder().cli_args(cli_args).build().unwrap()
    }

    #[test]
    fn test_cli_parsing() {
        let args = vec![
            "vizcount",
            "--category",
            "Beef",
            "-c",
            "Pork,Halal",
            "--seed",
            "7",
            "--ttl",
            "5",
            "--json",
            "--today",
            "2024-02-29",
        ];
        let cli = Cli::try_parse_from(args).expect("Failed to parse CLI arguments");
        assert_eq!(cli.category(), vec!["Beef", "Pork", "Halal"]);
        assert_eq!(cli.seed(), 7);
        assert_eq!(cli.ttl(), 5);
        assert!(cli.json());
        assert_eq!(cli.today(), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["vizcount"]).unwrap();
        assert!(cli.category().is_empty());
        assert_eq!(cli.seed(), DEFAULT_SEED);
        assert_eq!(cli.ttl(), 60);
        assert!(!cli.json());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let app = app(&["--ttl", "0"]);
        assert!(matches!(app.validate(), Err(VizError::Cli(_))));
    }

    #[tokio::test]
    async fn renders_tables() {
        let output = app(&["--category", "Seafood"]).render().await.unwrap();
        assert!(output.contains("*** Seafood ***"));
        assert!(output.contains("Atlantic Salmon"));
        assert!(output.contains("Already expired"));
    }

    #[tokio::test]
    async fn renders_json() {
        let output = app(&["--json"]).render().await.unwrap();
        let document: serde_json::Value = serde_json::from_str(&output).unwrap();

        let views = document["views"].as_array().unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0]["title"], ALL_CATEGORIES);
        assert_eq!(views[0]["records"].as_array().unwrap().len(), 34);
        assert_eq!(document["sidebar"]["categories"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_category_is_reported() {
        assert!(matches!(
            app(&["--category", "Lamb"]).render().await,
            Err(VizError::UnknownCategory(name)) if name == "Lamb"
        ));
    }

    #[tokio::test]
    async fn help_is_not_an_error() {
        let app = DashboardApp::builder().cli_args(vec!["vizcount", "--help"]).build().unwrap();
        assert!(app.execute().await.is_ok());
    }
}
