mod cache;
mod catalog;
mod cli;
mod config;
mod dispatch;
mod engine;
mod error;
mod execution;
mod handlers;
mod harness;
mod llm;
mod logging;
mod printer;
mod process;
mod session;
mod store;
mod tutor;
mod verdict;

use anyhow::Result;
use catalog::Catalog;
use config::Config;
use handlers::{
    ask::AskHandler, catalog::CatalogHandler, grade::GradeHandler, read_source, repl::ReplHandler, Options,
};
use session::Identity;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = cli::Cli::parse();

    let cfg = Config::load();
    tracing::debug!(path = %cfg.config_path.display(), "configuration loaded");
    let catalog = Catalog::from_config(&cfg)?;

    // Resolve model: CLI overrides config; fall back to DEFAULT_MODEL
    let model = args
        .model
        .clone()
        .or_else(|| cfg.get("DEFAULT_MODEL"))
        .unwrap_or_else(|| "gpt-4o".to_string());

    let markdown = if args.no_md { false } else if args.md { true } else { cfg.get_bool("PRETTIFY_MARKDOWN") };

    let identity = if args.anonymous { Identity::Anonymous } else { Identity::from_user(args.user.clone().or_else(|| cfg.default_user())) };

    // Canonical id, so slugs work everywhere downstream
    let exercise = catalog.get(&args.exercise)?.id.clone();

    let opts = Options {
        identity,
        exercise,
        markdown,
        feedback: args.feedback || cfg.get_bool("TUTOR_FEEDBACK"),
        model,
    };

    if let Some(path) = &args.run {
        let source = read_source(path)?;
        return GradeHandler::run(&cfg, catalog, &opts, &source).await;
    }
    if let Some(path) = &args.submit {
        let source = read_source(path)?;
        if !GradeHandler::submit(&cfg, catalog, &opts, &source).await? {
            std::process::exit(1);
        }
        return Ok(());
    }
    if args.reset {
        return GradeHandler::reset(&cfg, catalog, &opts).await;
    }
    if args.show {
        return CatalogHandler::show(&cfg, &catalog, &opts);
    }
    if let Some(question) = &args.ask {
        let code = args.code.as_deref().map(read_source).transpose()?;
        return AskHandler::run(&cfg, &catalog, &opts, question, code).await;
    }
    if args.repl {
        return ReplHandler::run(&cfg, catalog, opts).await;
    }

    CatalogHandler::list(&cfg, &catalog, &opts)
}
