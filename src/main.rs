use clap::Parser;
use core::time;
use std::{
    path::PathBuf,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};
use tracing_subscriber::FmtSubscriber;

use opensprinkler_core::opensprinkler::{
    clock::SystemClock,
    gpio,
    options::cli,
    store::{layout, FileStore},
    Controller,
};

#[cfg(unix)]
const STORE_FILE_PATH: &'static str = "/etc/opt/opensprinkler.nvm";

#[cfg(not(unix))]
const STORE_FILE_PATH: &'static str = "./opensprinkler.nvm";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Non-volatile store file path
    #[clap(short = 's', long = "store", default_value = STORE_FILE_PATH, parse(from_os_str))]
    store: PathBuf,

    /// Directory that marks removable storage as present
    #[clap(long = "removable-storage", parse(from_os_str))]
    removable_storage: Option<PathBuf>,

    /// Set an option value (by JSON name)
    #[clap(long = "set", takes_value = true, required = false, min_values = 2, max_values = 2)]
    set: Option<Vec<String>>,

    /// List option values
    #[clap(long = "list", takes_value = false)]
    list: bool,

    /// Reset the controller to factory defaults
    #[clap(long = "reset", takes_value = false)]
    reset: bool,

    /// Print the controller status
    #[clap(long = "status", takes_value = false)]
    status: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long = "verbose", parse(from_occurrences))]
    verbose: usize,
}

fn setup_tracing(verbose: usize) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn open_store(args: &Args) -> FileStore {
    match FileStore::open(&args.store, layout::DEVICE_SIZE) {
        Ok(store) => store,
        Err(error) => {
            tracing::error!("Cannot open store {}: {}", args.store.display(), error);
            process::exit(1);
        }
    }
}

/// Handle command line operations (these never touch the station outputs)
///
/// Returns [true] if an operation was handled.
fn run_cli(args: &Args) -> bool {
    if !(args.list || args.reset || args.status || args.set.is_some()) {
        return false;
    }

    let mut controller = Controller::new(open_store(args), gpio::Simulated::new(), SystemClock);
    if let Err(error) = controller.load() {
        println!("Error: {}", error);
        return true;
    }

    if args.reset {
        if let Err(error) = cli::reset(&mut controller) {
            println!("Error: {}", error);
        }
        return true;
    }

    if args.list {
        cli::list(&controller);
        return true;
    }

    if args.status {
        cli::status(&controller);
        return true;
    }

    if let Some(ref option_set) = args.set {
        match cli::set(option_set.clone(), &mut controller) {
            Ok(value) => println!("Success: {}", value),
            Err(err) => println!("Error: {}", err),
        }
    }

    true
}

fn main() {
    let args = Args::parse();

    setup_tracing(args.verbose);

    if run_cli(&args) {
        return;
    }

    // region: SIGNALS
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");
    // endregion SIGNALS

    #[cfg(feature = "demo")]
    tracing::info!("DEMO MODE");

    tracing::info!("Using store file: {}", args.store.display());

    #[cfg(all(feature = "station-gpio", not(feature = "demo")))]
    let gpio = match gpio::ShiftRegister::new() {
        Ok(gpio) => gpio,
        Err(error) => {
            tracing::error!("Cannot access GPIO peripheral: {}", error);
            process::exit(1);
        }
    };

    #[cfg(not(all(feature = "station-gpio", not(feature = "demo"))))]
    let gpio = gpio::Simulated::new();

    let mut controller = Controller::new(open_store(&args), gpio, SystemClock);
    if let Some(ref path) = args.removable_storage {
        controller = controller.with_removable_storage(path);
    }

    if let Err(error) = controller.setup() {
        tracing::error!("Setup failed: {}", error);
        process::exit(1);
    }

    let mut last_seconds = 0;

    // Main loop
    while running.load(Ordering::SeqCst) {
        let now_seconds = controller.now();

        // The main control loop runs once every second
        if now_seconds > last_seconds {
            last_seconds = now_seconds;

            if let Err(error) = controller.tick() {
                tracing::error!("{}", error);
            }

            if controller.reboot_requested() {
                reboot(&mut controller);
            }
        }

        // sleep 1 ms to minimize CPU usage
        thread::sleep(time::Duration::from_millis(1));
    }

    tracing::info!("Got Ctrl-C, exiting...");

    // Turn off all stations
    controller.clear_all_station_bits();
    if let Err(error) = controller.apply_all_station_bits() {
        tracing::error!("{}", error);
    }
}

fn reboot(controller: &mut Controller) {
    controller.clear_all_station_bits();
    if let Err(error) = controller.apply_all_station_bits() {
        tracing::error!("{}", error);
    }

    #[cfg(not(feature = "demo"))]
    if let Err(error) = system_shutdown::reboot() {
        tracing::error!("Cannot reboot: {}", error);
    }

    // Nothing rebooted (demo mode or the reboot failed), start over in place
    if let Err(error) = controller.setup() {
        tracing::error!("Setup failed: {}", error);
    }
}
