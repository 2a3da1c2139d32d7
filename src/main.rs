use std::process::ExitCode;

use clap::Parser;

use catalog_localizer::LocalizeError;

#[derive(Parser, Debug)]
#[command(
    name = "catalog-localizer",
    version,
    about = "Fill missing translations in a String Catalog and track new keys"
)]
struct Cli {
    /// Compute and report everything without touching the filesystem
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Merge new keys into the catalog (with backup and rollback)
    #[arg(long = "auto-merge")]
    auto_merge: bool,

    /// Enable debug logging and sample keys in the summary
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "settings")]
    settings: Option<String>,

    /// String Catalog path (.xcstrings)
    #[arg(long = "catalog")]
    catalog: Option<String>,

    /// Supported languages file (languages.json)
    #[arg(long = "languages")]
    languages: Option<String>,

    /// Tracked keys file (keys.json)
    #[arg(long = "keys")]
    keys: Option<String>,

    /// Where the staging catalog for new keys is written
    #[arg(long = "staging")]
    staging: Option<String>,

    /// Backup path used by --auto-merge (default: <catalog>.backup)
    #[arg(long = "backup")]
    backup: Option<String>,

    /// Translator bridge executable
    #[arg(long = "translator")]
    translator: Option<String>,

    /// Maximum concurrent translation requests
    #[arg(short = 'j', long = "concurrency")]
    concurrency: Option<usize>,

    /// Generate website locale files from this en.json instead
    #[arg(long = "website")]
    website: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = catalog_localizer::logging::init(cli.verbose) {
        eprintln!("{:#}", err);
        return ExitCode::FAILURE;
    }

    let result = catalog_localizer::run(catalog_localizer::Config {
        dry_run: cli.dry_run,
        auto_merge: cli.auto_merge,
        verbose: cli.verbose,
        settings_path: cli.settings,
        catalog: cli.catalog,
        languages: cli.languages,
        keys: cli.keys,
        staging: cli.staging,
        backup: cli.backup,
        translator: cli.translator,
        concurrency: cli.concurrency,
        website: cli.website,
    })
    .await;

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            match err.downcast_ref::<LocalizeError>() {
                Some(localize) => eprintln!("{}", localize.report()),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}
