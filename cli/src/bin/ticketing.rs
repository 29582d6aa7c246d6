//! Ticket sale simulation front-end

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use ticketpool::utils::config::DEFAULT_CONFIG_PATH;
use ticketpool::utils::logging::init_logger;
use ticketpool::{Config, ConfigStore, Result, Simulation, SimulationReport, StopHandle};

#[derive(Parser, Debug)]
#[command(name = "ticketing", version, about = "Vendor/customer ticket sale simulation")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Console log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and save a configuration
    Configure(Overrides),
    /// Run a sale using the saved configuration and any overrides
    Start(Overrides),
    /// Interactive menu (default)
    Menu,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

#[derive(Args, Debug, Default)]
struct Overrides {
    /// Lifetime ticket capacity
    #[arg(long)]
    max_capacity: Option<u32>,
    /// Tickets per vendor release
    #[arg(long)]
    batch_size: Option<u32>,
    /// Milliseconds between releases
    #[arg(long)]
    release_interval_ms: Option<u64>,
    /// Milliseconds between customer attempts
    #[arg(long)]
    retrieval_interval_ms: Option<u64>,
    /// Number of customers
    #[arg(long)]
    customers: Option<u32>,
    /// Tickets per customer attempt
    #[arg(long)]
    retrieval_amount: Option<u32>,
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.max_capacity.is_none()
            && self.batch_size.is_none()
            && self.release_interval_ms.is_none()
            && self.retrieval_interval_ms.is_none()
            && self.customers.is_none()
            && self.retrieval_amount.is_none()
    }

    fn apply(&self, base: Config) -> Config {
        Config {
            max_ticket_capacity: self.max_capacity.unwrap_or(base.max_ticket_capacity),
            release_batch_size: self.batch_size.unwrap_or(base.release_batch_size),
            release_interval_ms: self.release_interval_ms.unwrap_or(base.release_interval_ms),
            retrieval_interval_ms: self
                .retrieval_interval_ms
                .unwrap_or(base.retrieval_interval_ms),
            customer_count: self.customers.unwrap_or(base.customer_count),
            retrieval_amount: self.retrieval_amount.unwrap_or(base.retrieval_amount),
        }
    }
}

/// Stop handle of the run in progress, shared with the Ctrl-C handler
type ActiveRun = Arc<Mutex<Option<StopHandle>>>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level.into(), cli.log_file.as_deref())?;

    let active: ActiveRun = Arc::new(Mutex::new(None));
    let handler_slot = Arc::clone(&active);
    ctrlc::set_handler(move || {
        println!("\nReceived shutdown signal...");
        if let Some(stop) = handler_slot.lock().as_ref() {
            stop.stop();
        } else {
            std::process::exit(130);
        }
    })
    .unwrap_or_else(|_| {
        eprintln!("Warning: Could not set Ctrl-C handler");
    });

    let store = ConfigStore::new(&cli.config);

    match cli.command.unwrap_or(Command::Menu) {
        Command::Configure(overrides) => {
            let config = overrides.apply(store.load_or_none().unwrap_or_default());
            store.save(&config)?;
            println!("✓ Configuration saved to {}", store.path().display());
            print_config(&config);
        }
        Command::Start(overrides) => {
            let base = match store.load_or_none() {
                Some(config) => config,
                None => {
                    if overrides.is_empty() {
                        println!("No saved configuration, using defaults");
                    }
                    Config::default()
                }
            };
            run_sale(overrides.apply(base), &active)?;
        }
        Command::Menu => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            run_menu(&mut input, &mut output, &store, &active)?;
        }
    }

    Ok(())
}

fn run_menu<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    store: &ConfigStore,
    active: &ActiveRun,
) -> Result<()> {
    info!("Starting the ticket booking system");
    let mut current: Option<Config> = None;

    loop {
        writeln!(output, "\n--- Ticket Booking System Menu ---")?;
        writeln!(output, "1. Configure System")?;
        writeln!(output, "2. Start System")?;
        writeln!(output, "3. Stop System")?;
        write!(output, "Enter your choice: ")?;
        output.flush()?;

        let Some(choice) = read_line(input)? else {
            return Ok(());
        };

        match choice.as_str() {
            "1" => {
                let Some(config) = configure_interactively(input, output, store)? else {
                    return Ok(());
                };
                run_sale(config, active)?;
                return Ok(());
            }
            "2" => {
                let config = match current.or_else(|| store.load_or_none()) {
                    Some(config) => config,
                    None => {
                        writeln!(output, "No configuration found. Please configure the system.")?;
                        let Some(config) = prompt_config(input, output)? else {
                            return Ok(());
                        };
                        store.save(&config)?;
                        config
                    }
                };
                current = Some(config);
                run_sale(config, active)?;
            }
            "3" => {
                writeln!(output, "System stopped. Exiting...")?;
                info!("System stopped by user");
                return Ok(());
            }
            _ => writeln!(output, "Invalid choice! Please try again.")?,
        }
    }
}

fn configure_interactively<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    store: &ConfigStore,
) -> Result<Option<Config>> {
    if store.exists() {
        writeln!(output, "Configuration file exists.")?;
        let Some(load) = prompt_yes_no(
            input,
            output,
            "Do you want to load previous configuration data? (yes/no): ",
        )?
        else {
            return Ok(None);
        };

        if load {
            if let Some(config) = store.load_or_none() {
                return Ok(Some(config));
            }
            writeln!(
                output,
                "Failed to load previous configuration. Enter new configuration."
            )?;
        }
    } else {
        writeln!(output, "No configuration file found. Enter new configuration.")?;
    }

    let Some(config) = prompt_config(input, output)? else {
        return Ok(None);
    };
    store.save(&config)?;
    Ok(Some(config))
}

/// Prompt for every field. `None` means input ended.
fn prompt_config<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<Option<Config>> {
    let defaults = Config::default();

    let Some(max_ticket_capacity) =
        prompt_positive::<u32, _, _>(input, output, "Enter maximum ticket capacity: ")?
    else {
        return Ok(None);
    };
    let Some(release_batch_size) =
        prompt_positive::<u32, _, _>(input, output, "Enter tickets per release: ")?
    else {
        return Ok(None);
    };
    let Some(release_interval_ms) =
        prompt_positive::<u64, _, _>(input, output, "Enter ticket release rate (ms): ")?
    else {
        return Ok(None);
    };
    let Some(retrieval_interval_ms) =
        prompt_positive::<u64, _, _>(input, output, "Enter ticket retrieval rate (ms): ")?
    else {
        return Ok(None);
    };

    info!("Configuration input completed");
    Ok(Some(Config {
        max_ticket_capacity,
        release_batch_size,
        release_interval_ms,
        retrieval_interval_ms,
        ..defaults
    }))
}

/// Ask until the answer parses as a number greater than zero
fn prompt_positive<T, R, W>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<Option<T>>
where
    T: FromStr + PartialOrd + Default,
    R: BufRead,
    W: Write,
{
    loop {
        write!(output, "{}", prompt)?;
        output.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(None);
        };

        match line.parse::<T>() {
            Ok(value) if value > T::default() => return Ok(Some(value)),
            Ok(_) => writeln!(output, "Please enter a positive integer greater than 0.")?,
            Err(_) => writeln!(output, "Invalid input! Please enter a valid integer.")?,
        }
    }
}

fn prompt_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<Option<bool>> {
    loop {
        write!(output, "{}", prompt)?;
        output.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(None);
        };

        match line.to_lowercase().as_str() {
            "yes" | "y" => return Ok(Some(true)),
            "no" | "n" => return Ok(Some(false)),
            _ => writeln!(output, "Invalid response! Please enter 'yes' or 'no'.")?,
        }
    }
}

/// Next trimmed line, or `None` at end of input
fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn run_sale(config: Config, active: &ActiveRun) -> Result<()> {
    print_config(&config);

    let simulation = Simulation::new(config)?;
    *active.lock() = Some(simulation.stop_handle());
    println!("✓ Sale running, press Ctrl+C to stop");

    let result = simulation.run();
    active.lock().take();

    let report = result?;
    if report.interrupted() {
        warn!("Sale stopped before every ticket was sold");
    }
    print_report(&report);
    Ok(())
}

fn print_config(config: &Config) {
    println!("Configuration:");
    println!("  Max ticket capacity:   {}", config.max_ticket_capacity);
    println!("  Tickets per release:   {}", config.release_batch_size);
    println!("  Release interval:      {} ms", config.release_interval_ms);
    println!("  Retrieval interval:    {} ms", config.retrieval_interval_ms);
    println!("  Customers:             {}", config.customer_count);
    println!("  Tickets per attempt:   {}", config.retrieval_amount);
}

fn print_report(report: &SimulationReport) {
    println!();
    println!("Sale Summary");
    println!("============");
    println!(
        "Released:  {} of {} in {} batches",
        report.pool.total_released, report.pool.max_capacity, report.vendor.batches
    );
    for customer in &report.customers {
        println!(
            "Customer {}: {} tickets ({} attempts, {} empty)",
            customer.id,
            customer.tickets_purchased,
            customer.successful_attempts + customer.failed_attempts,
            customer.failed_attempts
        );
    }
    println!("Purchased: {}", report.total_purchased());
    println!("Left over: {}", report.pool.available);
    println!("Elapsed:   {:.2?}", report.elapsed);
    if report.interrupted() {
        println!("(stopped early)");
    }
}
