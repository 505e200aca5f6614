use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailsieve::api::{http::HttpTransport, Transport};
use mailsieve::command_line::{self, Input};
use mailsieve::config::{self, AppConfig};
use mailsieve::controller::{Command, Confirm, Controller};
use mailsieve::metrics::Metrics;
use mailsieve::poller::IntervalTicks;
use mailsieve::render;
use mailsieve::types::AccountId;

#[derive(Debug, Parser)]
#[command(name = "mailsieve", about = "Terminal console for the mailsieve email filtering server")]
struct Args {
    /// Configuration file; replaces mailsieve.toml and the environment overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Server base URL, e.g. http://127.0.0.1:5000
    #[arg(long)]
    base_url: Option<String>,
    /// Account to select after startup.
    #[arg(long)]
    account: Option<String>,
    /// Answer yes to every confirmation.
    #[arg(long)]
    yes: bool,
}

/// Destructive commands go through only with `--yes` or a trailing `!`.
struct ConsoleConfirm {
    auto: bool,
    approved: Rc<Cell<bool>>,
}

impl Confirm for ConsoleConfirm {
    fn confirm(&self, question: &str) -> bool {
        if self.auto || self.approved.get() {
            return true;
        }
        println!("{} Repeat the command with a trailing '!' to confirm.", question);
        false
    }
}

/// Prints the page when it differs from what was printed last.
struct Screen {
    cfg: AppConfig,
    last: RefCell<String>,
}

impl Screen {
    fn show(&self, controller: &Controller, force: bool) {
        let text = controller.with_page(|p| render::render(p, &self.cfg, Utc::now()));
        let mut last = self.last.borrow_mut();
        if force || *last != text {
            println!("{}", text);
            *last = text;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logging (stderr + daily file rotation under ./logs); stdout belongs to the console
    std::fs::create_dir_all("logs").ok();
    let (stderr_nb, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    let file_appender = tracing_appender::rolling::daily("logs", "mailsieve.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stderr_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stderr_guard, file_guard);

    // Load configuration (embedded defaults -> mailsieve.toml -> env/.env, or one explicit file)
    let mut app_cfg = match &args.config {
        Some(path) => config::load_file(path)?,
        None => config::load()?,
    };
    if let Some(base_url) = &args.base_url {
        app_cfg.server.base_url = base_url.clone();
        config::validate(&app_cfg)?;
    }

    // Page and session state are not Send: one thread, one LocalSet
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, run(args, app_cfg))
}

async fn run(args: Args, app_cfg: AppConfig) -> anyhow::Result<()> {
    let transport: Rc<dyn Transport> = Rc::new(HttpTransport::new(&app_cfg.server)?);
    let (ticks, mut tick_rx) = IntervalTicks::channel();
    let approved = Rc::new(Cell::new(false));
    let confirm = ConsoleConfirm {
        auto: args.yes,
        approved: approved.clone(),
    };
    let controller = Controller::new(transport, Box::new(ticks), Box::new(confirm), &app_cfg, Metrics::new());
    let screen = Rc::new(Screen {
        cfg: app_cfg.clone(),
        last: RefCell::new(String::new()),
    });

    info!("connecting to {}", app_cfg.server.base_url);
    if let Err(e) = controller.bootstrap().await {
        error!("bootstrap failed: {}", e);
        return Err(e.into());
    }
    if let Some(id) = args.account.as_deref() {
        // A failure is already flashed; the console stays usable.
        let _ = controller.dispatch(Command::SelectAccount(AccountId::from(id))).await;
    }
    screen.show(&controller, true);
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match command_line::parse_line(&line) {
                    Ok(Input::Empty) => {}
                    Ok(Input::Help) => println!("{}", command_line::HELP),
                    Ok(Input::Show) => screen.show(&controller, true),
                    Ok(Input::Quit) => break,
                    Ok(Input::Commands { commands, confirmed }) => {
                        let controller = controller.clone();
                        let approved = approved.clone();
                        let screen = screen.clone();
                        // Commands run on the LocalSet so poll ticks keep flowing
                        // while a long request is pending.
                        tokio::task::spawn_local(async move {
                            for command in commands {
                                approved.set(confirmed);
                                let result = controller.dispatch(command).await;
                                approved.set(false);
                                if result.is_err() {
                                    break;
                                }
                            }
                            screen.show(&controller, true);
                        });
                    }
                    Err(msg) => println!("{}", msg),
                }
            }
            Some(kind) = tick_rx.recv() => {
                let controller = controller.clone();
                let screen = screen.clone();
                tokio::task::spawn_local(async move {
                    let _ = controller.on_tick(kind).await;
                    screen.show(&controller, false);
                });
            }
        }
        controller.prune_flashes();
    }

    controller.shutdown();
    let snapshot = serde_json::to_string(&controller.metrics().get_snapshot())?;
    info!("session finished: {}", snapshot);
    Ok(())
}
