use std::array;
use std::env::var;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use dotenv::dotenv;
use log::{debug, info, warn};
use sysinfo::System;
use lapkey::app::App;
use lapkey::command::{Flow, Interpreter};
use lapkey::config::Config;
use lapkey::indicator::Indicator;
use lapkey::net::NetworkDispatcher;
use lapkey::net::probe::wait_for_network;
use lapkey::power::SystemPower;
use lapkey::sensor::{EdgeWatcher, SensorHandler};
use lapkey::signal::spawn_interrupt_watcher;
use lapkey_gpio::{GpioDriver, GpioPin, GpioResult};
use lapkey_gpio::GpioActiveLevel::Low;
use lapkey_gpio::GpioBias::PullUp;
use lapkey_gpio::edge::EdgeTrigger;
use lapkey_gpio::gpiod::GpiodDriver;
use lapkey_gpio::keypad::GpioKeypad;

fn claim<'a>(gpio: &'a dyn GpioDriver, indices: &[usize]) -> GpioResult<Vec<Box<dyn GpioPin + 'a>>> {
    indices
        .iter()
        .map(|&index| {
            let pin = gpio.get_pin(index)?;
            debug!("Claimed line {}.", pin.index());
            Ok(pin)
        })
        .collect()
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "LapKey {} starting on {} ({})...",
        env!("CARGO_PKG_VERSION"),
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
    );

    let config = Config::load_or_init();

    let running = Arc::new(AtomicBool::new(true));
    spawn_interrupt_watcher(running.clone(), config.timing.shutdown_grace())?;

    info!("Waiting for network connection...");
    if !wait_for_network(&config.network.probe_addr, config.network.probe_interval(), &running) {
        info!("Stopped before the network came up.");
        return Ok(());
    }
    info!("Network connection established.");

    run(&config, &running)?;

    info!("LapKey stopped.");
    Ok(())
}

/// Claims the pins, runs the input loops until `running` is cleared, then releases the pins.
fn run(config: &Config, running: &AtomicBool) -> eyre::Result<()> {
    let pins = &config.pins;
    let timing = &config.timing;

    info!("Keypad @ Cols: {:?}, Rows: {:?}", pins.cols, pins.rows);
    info!(
        "Indicator @ {}, Sensors @ {:?}",
        pins.indicator,
        config.sensors.iter().map(|s| s.pin).collect::<Vec<_>>()
    );

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&pins.chip)?;
    debug!("{:?} initialized.", gpio);

    let mut indicator_pin = gpio.get_pin(pins.indicator)?;
    let indicator_out = indicator_pin.as_output()?;
    let indicator = Indicator::new(&*indicator_out, timing.pulse(), timing.pulse_gap());

    debug!("Initializing keypad driver...");
    let mut col_pins = claim(&gpio, &pins.cols)?;
    let mut row_pins = claim(&gpio, &pins.rows)?;
    for pin in &mut col_pins {
        pin.set_active_level(Low)?;
    }
    for pin in &mut row_pins {
        pin.set_bias(PullUp)?;
        pin.set_active_level(Low)?;
    }
    let col_outs = col_pins
        .iter_mut()
        .map(|pin| pin.as_output())
        .collect::<GpioResult<Vec<_>>>()?;
    let row_ins = row_pins
        .iter_mut()
        .map(|pin| pin.as_input())
        .collect::<GpioResult<Vec<_>>>()?;

    let keypad = GpioKeypad::new(
        array::from_fn(|i| &*col_outs[i]),
        array::from_fn(|i| &*row_ins[i]),
    )
    .with_release_poll(timing.release_poll());
    keypad.reset()?;
    debug!("{:?} initialized.", keypad);

    debug!("Initializing sensors...");
    let sensor_lines = config.sensors.iter().map(|s| s.pin).collect::<Vec<_>>();
    let mut sensor_pins = claim(&gpio, &sensor_lines)?;
    for pin in &mut sensor_pins {
        pin.set_bias(PullUp)?;
    }
    let sensor_ins = sensor_pins
        .into_iter()
        .map(|pin| pin.into_edge_input(EdgeTrigger::Falling))
        .collect::<GpioResult<Vec<_>>>()?;

    let dispatcher = NetworkDispatcher::new(config, &indicator)?;
    let power = SystemPower::new(config.power.shutdown.clone(), config.power.reboot.clone());
    let mut app = App::new(&keypad, &indicator, Interpreter::new(&dispatcher, &power, &indicator));
    let handler = SensorHandler::new(&config.sensors, &indicator, &dispatcher);

    // Watchers block on the kernel edge queue and are left behind on exit.
    let (events, received) = mpsc::channel();
    for (sensor, input) in sensor_ins.into_iter().enumerate() {
        EdgeWatcher::new(sensor, input, timing.bounce()).spawn(events.clone())?;
    }
    drop(events);

    info!("LapKey initialized.");

    thread::scope(|s| {
        let handler = &handler;
        s.spawn(move || handler.run(received, running));

        info!("Starting main loop...");
        while running.load(Ordering::SeqCst) {
            match app.update() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    info!("Input handling halted.");
                    running.store(false, Ordering::SeqCst);
                }
                Err(e) => warn!("Keypad scan failed: {}", e),
            }
            thread::sleep(timing.poll_interval());
        }
    });

    info!("Releasing GPIO...");
    if let Err(e) = keypad.reset() {
        warn!("Failed to reset keypad columns: {}", e);
    }
    if let Err(e) = indicator.off() {
        warn!("Failed to switch the indicator off: {}", e);
    }

    Ok(())
}
