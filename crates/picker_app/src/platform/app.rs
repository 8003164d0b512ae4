use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use picker_core::{Affordance, MediaKind};
use picker_engine::{
    decode_page, EngineConfig, EngineHandle, FetchSettings, Fetcher, HttpPageSource, PageCommand,
    PageEvent, PageSnapshot, PageSource, ReqwestFetcher, Response, SelectorGroup, ServiceCommand,
    SrcsetRanking, StaticPage,
};
use picker_logging::{picker_debug, picker_info};
use url::Url;

use super::logging::{self, LogDestination};
use super::settings::{load_settings, save_settings, SETTINGS_FILENAME};
use super::status::status_line;

/// Detect, select and download the media on a web page.
#[derive(Debug, Parser)]
#[command(name = "media-picker", version, long_about = None)]
pub struct Cli {
    /// Where log output goes.
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,
    /// Log debug details.
    #[arg(long, short)]
    pub verbose: bool,
    /// Download directory.
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,
    /// Settings file [default: <output>/.media_picker.ron].
    #[arg(long)]
    pub settings: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the media detected on a page.
    Scan {
        /// Page URL or local HTML file.
        page: String,
        /// Keep detecting for this many seconds before listing.
        #[arg(long, default_value_t = 0, value_name = "SECS")]
        watch: u64,
    },
    /// Select media on a page and download it.
    Download {
        /// Page URL or local HTML file.
        page: String,
        #[arg(long, value_enum, default_value_t = DeliveryMode::Zip)]
        mode: DeliveryMode,
        /// Positions printed by `scan`, comma separated. Everything when omitted.
        #[arg(long = "pick", value_delimiter = ',', value_name = "N")]
        picks: Vec<usize>,
        /// Keep detecting for this many seconds before selecting.
        #[arg(long, default_value_t = 0, value_name = "SECS")]
        watch: u64,
    },
    /// Download one media URL directly.
    Single {
        url: String,
        /// Treat the URL as a video.
        #[arg(long)]
        video: bool,
    },
    /// Update the stored detector settings.
    Configure {
        #[arg(long)]
        min_width: Option<u32>,
        #[arg(long)]
        min_height: Option<u32>,
        /// Custom selector as NAME=CSS; repeatable. Replaces stored selectors.
        #[arg(long = "selector", value_name = "NAME=CSS")]
        selectors: Vec<String>,
        #[arg(long, value_enum)]
        srcset: Option<RankingArg>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeliveryMode {
    /// One archive, fetched with the page's credentials.
    Zip,
    /// One file per item.
    Individual,
    /// Retrieve in the page context, then archive.
    Blobs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RankingArg {
    Literal,
    WidthFirst,
}

impl From<RankingArg> for SrcsetRanking {
    fn from(arg: RankingArg) -> Self {
        match arg {
            RankingArg::Literal => SrcsetRanking::Literal,
            RankingArg::WidthFirst => SrcsetRanking::WidthFirst,
        }
    }
}

pub fn run_app() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);
    let settings_path = cli
        .settings
        .clone()
        .unwrap_or_else(|| cli.output.join(SETTINGS_FILENAME));

    match cli.command {
        Command::Scan { page, watch } => {
            let session = Session::open(&cli.output, &settings_path, &page)?;
            let detected = session.detect(Duration::from_secs(watch))?;
            for (position, item) in detected.iter().enumerate() {
                println!("{:>3}  {:<5}  {}", position + 1, item.kind.to_string(), item.url);
            }
            println!("{} detected", detected.len());
            session.finish()
        }
        Command::Download {
            page,
            mode,
            picks,
            watch,
        } => {
            let session = Session::open(&cli.output, &settings_path, &page)?;
            let detected = session.detect(Duration::from_secs(watch))?;
            session.select(&detected, &picks)?;
            let response = session.deliver(mode);
            println!("{}", status_line(&response));
            session.finish()?;
            ensure_success(&response)
        }
        Command::Single { url, video } => {
            let kind = if video {
                MediaKind::Video
            } else {
                MediaKind::Image
            };
            let session = Session::open(&cli.output, &settings_path, "about:blank")?;
            let response = session
                .engine
                .send_service(ServiceCommand::DownloadSingle { url, kind });
            println!("{}", status_line(&response));
            ensure_success(&response)
        }
        Command::Configure {
            min_width,
            min_height,
            selectors,
            srcset,
        } => {
            let mut settings = load_settings(&settings_path)?;
            if let Some(width) = min_width {
                settings.min_width = width;
            }
            if let Some(height) = min_height {
                settings.min_height = height;
            }
            if !selectors.is_empty() {
                settings.custom_selectors = parse_selector_groups(&selectors)?;
            }
            if let Some(ranking) = srcset {
                settings.srcset_ranking = Some(ranking.into());
            }
            let saved = save_settings(&settings_path, &settings)?;
            println!("Settings saved to {}", saved.display());
            Ok(())
        }
    }
}

/// One page opened in the engine.
struct Session {
    engine: EngineHandle,
}

impl Session {
    fn open(output: &Path, settings_path: &Path, page: &str) -> Result<Self> {
        let settings = load_settings(settings_path)?;
        let mut config = EngineConfig::default_with_output(output.to_path_buf());
        config.detector.apply(&settings);
        picker_debug!("detector config: {:?}", config.detector);
        let source = page_source(page)?;
        Ok(Self {
            engine: EngineHandle::new(config, source),
        })
    }

    fn detect(&self, watch: Duration) -> Result<Vec<Affordance>> {
        let response = self.engine.send_page(PageCommand::StartSelection);
        ensure_success(&response)?;
        if !watch.is_zero() {
            picker_info!("watching the page for {}s", watch.as_secs());
            let deadline = Instant::now() + watch;
            while Instant::now() < deadline {
                self.drain_events();
                thread::sleep(Duration::from_millis(100));
            }
        }
        self.drain_events();
        match self.engine.send_page(PageCommand::GetDetected) {
            Response::Detected(list) => Ok(list.detected),
            other => Err(anyhow!(status_line(&other))),
        }
    }

    fn select(&self, detected: &[Affordance], picks: &[usize]) -> Result<()> {
        let chosen: Vec<&Affordance> = if picks.is_empty() {
            detected.iter().collect()
        } else {
            picks
                .iter()
                .map(|&position| {
                    position
                        .checked_sub(1)
                        .and_then(|index| detected.get(index))
                        .ok_or_else(|| anyhow!("no detected item at position {position}"))
                })
                .collect::<Result<_>>()?
        };
        if chosen.is_empty() {
            bail!("nothing detected on the page");
        }
        for item in chosen {
            if item.selected {
                continue;
            }
            let response = self.engine.send_page(PageCommand::ToggleItem { id: item.id });
            ensure_success(&response)?;
        }
        Ok(())
    }

    fn deliver(&self, mode: DeliveryMode) -> Response {
        if mode == DeliveryMode::Blobs {
            return match self.engine.send_page(PageCommand::FetchMediaAsBlobs) {
                Response::Blobs(bundle) => {
                    self.engine.send_service(ServiceCommand::CreateZipFromBlobs {
                        blobs: bundle.blobs,
                        filenames: bundle.filenames,
                    })
                }
                other => other,
            };
        }
        let urls = match self.engine.send_page(PageCommand::GetDownloadUrls) {
            Response::DownloadUrls(list) => list.urls,
            other => return other,
        };
        let command = match mode {
            DeliveryMode::Individual => ServiceCommand::DownloadIndividual { urls },
            _ => ServiceCommand::DownloadBatch { urls },
        };
        self.engine.send_service(command)
    }

    fn drain_events(&self) {
        while let Some(PageEvent::StateUpdate { state }) = self.engine.try_recv_event() {
            picker_debug!(
                "{} detected, {} selected",
                state.detected_count,
                state.selected_count
            );
        }
    }

    fn finish(&self) -> Result<()> {
        ensure_success(&self.engine.send_page(PageCommand::StopSelection))
    }
}

fn page_source(page: &str) -> Result<Arc<dyn PageSource>> {
    if page == "about:blank" {
        let blank = PageSnapshot::parse(page, "<html></html>")?;
        return Ok(Arc::new(StaticPage::new(blank)));
    }
    if page.starts_with("http://") || page.starts_with("https://") {
        let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(FetchSettings::for_pages()));
        return Ok(Arc::new(HttpPageSource::new(page, fetcher)));
    }
    let path = fs::canonicalize(page).with_context(|| format!("cannot open page {page:?}"))?;
    let bytes = fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;
    let decoded = decode_page(&bytes, None)?;
    let base = Url::from_file_path(&path)
        .map_err(|()| anyhow!("cannot address {} as a URL", path.display()))?;
    Ok(Arc::new(StaticPage::new(PageSnapshot::new(base, decoded.html))))
}

fn parse_selector_groups(raw: &[String]) -> Result<Vec<SelectorGroup>> {
    let mut groups: Vec<SelectorGroup> = Vec::new();
    for entry in raw {
        let (name, css) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("selector {entry:?} is not NAME=CSS"))?;
        let (name, css) = (name.trim(), css.trim());
        if css.is_empty() {
            bail!("selector {entry:?} has no CSS");
        }
        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.selectors.push(css.to_string()),
            None => groups.push(SelectorGroup {
                name: name.to_string(),
                selectors: vec![css.to_string()],
            }),
        }
    }
    Ok(groups)
}

fn ensure_success(response: &Response) -> Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(anyhow!(status_line(response)))
    }
}
