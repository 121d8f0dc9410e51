use clap::{Parser, Subcommand};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sleet::cache::{FsHashStore, HashStore, MemoryHashStore};
use sleet::collection::{BuildContext, BuildReport, Collection};
use sleet::config::{self, SiteConfig};
use sleet::imaging::RustBackend;
use sleet::output;
use sleet::registry::PublishedPathRegistry;
use sleet::scan::{self, FsReader, Source};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use tracing::{debug, error, info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Shared flags for commands that encode images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the image hash cache: re-encode every photograph, persist nothing
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "sleet")]
#[command(about = "Static site generator for writing and photographs, on the web and Gemini")]
#[command(long_about = "\
Static site generator for writing and photographs, on the web and Gemini

Project structure:

  project/
  ├── sleet.toml                 # Configuration (see 'sleet gen-config')
  ├── src/
  │   ├── index.md               # Markdown → index.html + index.gmi
  │   ├── notes.txt              # Text → notes.html + notes.gmi + notes.txt
  │   ├── uris.txt               # Every path ever published (commit this)
  │   ├── templates/             # Changes here rebuild every page
  │   └── img/2023/dawn.jpg      # Photograph → img/2023/dawn.webp + thumbnails
  └── public/
      └── style.css              # Copied verbatim

Every build ends by checking that no previously published path has vanished.
Run 'sleet freeze' to accept a removal on purpose.")]
#[command(version)]
struct Cli {
    /// Project root, the directory holding sleet.toml
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build every document, then check for vanished paths
    Build(CacheArgs),
    /// Rebuild only what depends on one changed path
    Rebuild {
        /// Changed path, relative to the project root
        path: PathBuf,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Build, then rebuild on every change until interrupted
    Watch(CacheArgs),
    /// Record the current output tree in the registry, accepting removals
    Freeze,
    /// List every document, newest first
    List {
        /// Print metadata as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock sleet.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) -> CliResult<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run(cli: Cli) -> CliResult<()> {
    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let project = Project::open(&cli.root)?;
    init_thread_pool(&project.config.processing);

    match cli.command {
        Command::Build(cache) => {
            let mut collection = project.collection(cache.no_cache)?;
            let report = collection.build_all(&project.reader, &project.dist)?;
            project.finish(&report)
        }
        Command::Rebuild { path, cache } => {
            let changed = project.relative(&path);
            let mut collection = project.collection(cache.no_cache)?;
            let report = collection.rebuild(&changed, &project.reader, &project.dist)?;
            project.finish(&report)
        }
        Command::Watch(cache) => project.watch(cache.no_cache),
        Command::Freeze => {
            let added = project.registry.freeze(&project.dist)?;
            for line in output::format_freeze(added, project.registry.file()) {
                println!("{}", line);
            }
            Ok(())
        }
        Command::List { json } => {
            let mut collection = project.collection(true)?;
            let report = collection.load_all(&project.reader)?;
            for error in &report.failed {
                warn!("{error}");
            }
            let listing = collection.listing();
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                output::print_listing(&listing);
            }
            Ok(())
        }
        Command::GenConfig => Ok(()),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// A loaded project: configuration plus the paths every command needs.
struct Project {
    root: PathBuf,
    config: SiteConfig,
    dist: PathBuf,
    reader: FsReader,
    registry: PublishedPathRegistry,
}

impl Project {
    fn open(root: &Path) -> CliResult<Self> {
        let root = root.canonicalize()?;
        let config = config::load_config(&root)?;
        Ok(Self {
            dist: root.join(&config.paths.dist),
            reader: FsReader::new(&root),
            registry: PublishedPathRegistry::from_config(&root, &config),
            root,
            config,
        })
    }

    fn hash_store(&self, no_cache: bool) -> Arc<dyn HashStore> {
        if no_cache {
            return Arc::new(MemoryHashStore::new());
        }
        let store = match &self.config.paths.cache {
            Some(dir) => FsHashStore::new(self.root.join(dir)),
            None => FsHashStore::in_user_cache(&self.root.join(".sleet-cache")),
        };
        debug!(root = %store.root().display(), "image hash cache");
        Arc::new(store)
    }

    fn context(&self, no_cache: bool) -> BuildContext {
        BuildContext::from_config(
            &self.config,
            Arc::new(RustBackend::new()),
            self.hash_store(no_cache),
        )
    }

    fn collection(&self, no_cache: bool) -> CliResult<Collection> {
        let sources = scan::discover(&self.root, &self.config)?;
        info!(sources = sources.len(), root = %self.root.display(), "discovered sources");
        Ok(Collection::from_sources(&self.context(no_cache), &sources))
    }

    /// `path` relative to the project root. Relative paths are taken as
    /// already relative to it.
    fn relative(&self, path: &Path) -> PathBuf {
        if !path.is_absolute() {
            return path.to_path_buf();
        }
        let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        match absolute.strip_prefix(&self.root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.to_path_buf(),
        }
    }

    /// True for files that become documents of their own.
    fn is_source(&self, rel: &Path) -> bool {
        let hidden = rel.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        let paths = &self.config.paths;
        !hidden
            && (rel.starts_with(&paths.source) || rel.starts_with(&paths.static_dir))
            && !rel.starts_with(&paths.templates)
            && rel != Path::new(&paths.known_uris)
    }

    /// Print the report and reconcile the registry.
    fn finish(&self, report: &BuildReport) -> CliResult<()> {
        output::print_build_report(report);
        self.registry.reconcile(&self.dist)?;
        if !report.is_clean() {
            return Err(format!("{} documents failed to build", report.failed.len()).into());
        }
        Ok(())
    }

    /// Full build, then one incremental build and one reconcile per changed
    /// path, strictly one after another.
    fn watch(&self, no_cache: bool) -> CliResult<()> {
        let context = self.context(no_cache);
        let sources = scan::discover(&self.root, &self.config)?;
        let mut collection = Collection::from_sources(&context, &sources);
        let report = collection.build_all(&self.reader, &self.dist)?;
        if let Err(e) = self.finish(&report) {
            error!("{e}");
        }

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            notify::Config::default(),
        )?;
        for dir in [&self.config.paths.source, &self.config.paths.static_dir] {
            let dir = self.root.join(dir);
            if dir.is_dir() {
                watcher.watch(&dir, RecursiveMode::Recursive)?;
            }
        }
        println!("Watching {} for changes (Ctrl+C to stop)...", self.root.display());

        for event in rx {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("watcher error: {e}");
                    continue;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            let changed: BTreeSet<PathBuf> = event
                .paths
                .iter()
                .filter_map(|p| p.strip_prefix(&self.root).ok())
                .filter(|rel| *rel != Path::new(&self.config.paths.known_uris))
                .map(Path::to_path_buf)
                .collect();
            for rel in changed {
                self.apply_change(&context, &mut collection, &rel)?;
            }
        }
        Ok(())
    }

    fn apply_change(
        &self,
        context: &BuildContext,
        collection: &mut Collection,
        rel: &Path,
    ) -> CliResult<()> {
        let exists = self.root.join(rel).is_file();
        if self.is_source(rel) {
            if exists && !collection.contains(rel) {
                debug!(path = %rel.display(), "new source");
                collection.upsert(context.document_for(&Source::new(rel)));
            } else if !exists && collection.remove(rel) {
                debug!(path = %rel.display(), "source removed");
            }
        }

        // Location data stops the watcher too; everything else waits for the next change.
        let report = collection.rebuild(rel, &self.reader, &self.dist)?;
        if report.built.is_empty() && report.is_clean() {
            return Ok(());
        }
        if let Err(e) = self.finish(&report) {
            error!("{e}");
        }
        Ok(())
    }
}
