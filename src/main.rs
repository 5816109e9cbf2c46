//! Interactive shell for trying out a brain.
//!
//! Loads every path given on the command line (files or directories), sorts
//! the replies and then reads messages from stdin, one per line. Lines that
//! start with `/` are shell commands, see `/help`.
mod debug_report;

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rivescript::{Bot, Options};

#[derive(Parser)]
#[command(name = "rivescript")]
#[command(about = "Chat with a brain loaded from rule scripts")]
#[command(version)]
struct Cli {
    /// Script files or directories to load
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Keep non-ASCII characters in messages and triggers
    #[arg(long)]
    utf8: bool,

    /// Load triggers even when they fail the syntax checks
    #[arg(long)]
    nostrict: bool,

    /// Maximum redirect and macro nesting per reply
    #[arg(long, default_value_t = 50)]
    depth: usize,

    /// User id the messages are sent as
    #[arg(short, long, default_value = "localuser")]
    user: String,

    /// Print what matched and how long each reply took
    #[arg(long)]
    trace: bool,

    /// Force ANSI color output
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable ANSI color output
    #[arg(long)]
    no_color: bool,

    /// Verbose logging (-v, -vv, -vvv for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = Options { strict: !cli.nostrict, depth: cli.depth, utf8: cli.utf8, ..Options::default() };
    let mut bot = Bot::new(options);

    for path in &cli.paths {
        let loaded = if path.is_dir() { bot.load_directory(path, &[]).map(|_| ()) } else { bot.load_file(path) };
        if let Err(err) = loaded {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    }
    bot.sort_replies();

    let color = if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        io::stdout().is_terminal()
    };

    match repl(&bot, &cli.user, cli.trace, color) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn repl(bot: &Bot, user: &str, trace: bool, color: bool) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    println!("Type a message to the bot and press Return. /help lists the commands.");

    loop {
        write!(stdout, "You> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            return Ok(());
        }
        let message = line.trim();

        match message {
            "" => continue,
            "/quit" | "/exit" => return Ok(()),
            "/help" => print_help(),
            "/dump topics" => debug_report::print_topics(&bot.topic_summaries(), color),
            "/dump sorted" => debug_report::print_sorted(&bot.topic_summaries(), color),
            _ if message.starts_with('/') => println!("Unknown command {message}, try /help"),
            _ => match bot.reply_verbose(user, message) {
                Ok(details) => {
                    println!("Bot> {}", details.reply);
                    if trace {
                        debug_report::print_reply(&details, color);
                    }
                }
                Err(err) => eprintln!("error: {err}"),
            },
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn print_help() {
    println!(
        "Commands:
  /help          Show this message.
  /dump topics   List topics with their includes, inherits and triggers.
  /dump sorted   Show every topic's sort buffer in match order.
  /quit          Leave the shell."
    );
}
